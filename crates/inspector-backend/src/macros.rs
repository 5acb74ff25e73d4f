//! Typed agents generated from a compact domain description.
//!
//! [`protocol_domain!`](crate::protocol_domain) declares one domain's
//! commands in Rust and produces two things from the same list:
//!
//! - a `register(&mut SchemaRegistry)` function that records the signatures,
//! - a typed wrapper around [`Agent`](crate::application::Agent) with one
//!   async method per command.
//!
//! # For beginners: reading a declaration
//!
//! ```rust
//! inspector_backend::protocol_domain! {
//!     /// Commands of the `Network` domain.
//!     pub struct NetworkAgent("Network") {
//!         /// Starts network tracking.
//!         fn enable = "enable"();
//!
//!         /// Fetches a response body.
//!         fn get_response_body = "getResponseBody"(request_id: "requestId" String) -> ["body", "base64Encoded"];
//!
//!         fn set_cache_disabled = "setCacheDisabled"(disabled: "cacheDisabled" Boolean, reason: "reason" String optional);
//!
//!         fn replay_xhr = "replayXHR"(request_id: "requestId" String), error_data = true;
//!     }
//! }
//! ```
//!
//! Each command line reads: Rust method name, wire name, then the parameters
//! as `rust_name: "wireName" Type`, where `Type` is a
//! [`ParamType`](inspector_core::ParamType) variant.  A trailing `optional`
//! makes the parameter an `Option<Value>`; required parameters take any
//! `impl Into<Value>`.  `-> [...]` lists the reply fields (the method resolves
//! to the first one) and `error_data = true` keeps remote error data on the
//! raw path.

/// Declares a domain's commands and generates a typed agent for them.
///
/// See the [module documentation](crate::macros) for the syntax.
#[macro_export]
macro_rules! protocol_domain {
    (@descriptor $arg_wire:literal $ty:ident) => {
        $crate::__private::inspector_core::ParamDescriptor::required(
            $arg_wire,
            $crate::__private::inspector_core::ParamType::$ty,
        )
    };
    (@descriptor $arg_wire:literal $ty:ident optional) => {
        $crate::__private::inspector_core::ParamDescriptor::optional(
            $arg_wire,
            $crate::__private::inspector_core::ParamType::$ty,
        )
    };

    (@arg_type) => {
        impl ::std::convert::Into<$crate::__private::serde_json::Value>
    };
    (@arg_type optional) => {
        ::std::option::Option<$crate::__private::serde_json::Value>
    };

    (@arg_value $arg:ident) => {
        ::std::option::Option::Some(::std::convert::Into::<$crate::__private::serde_json::Value>::into($arg))
    };
    (@arg_value $arg:ident optional) => {
        $arg
    };

    (
        $(#[$struct_meta:meta])*
        $vis:vis struct $name:ident ($domain:literal) {
            $(
                $(#[$fn_meta:meta])*
                fn $fn_name:ident = $wire:literal (
                    $( $arg:ident : $arg_wire:literal $ty:ident $($opt:ident)? ),* $(,)?
                ) $( -> [ $($reply:literal),* $(,)? ] )? $( , error_data = $error_data:literal )? ;
            )*
        }
    ) => {
        $(#[$struct_meta])*
        #[derive(Debug, Clone, Copy)]
        $vis struct $name<'a> {
            agent: $crate::application::Agent<'a>,
        }

        impl<'a> $name<'a> {
            /// The domain these commands belong to.
            pub const DOMAIN: &'static str = $domain;

            /// Records every command signature of this domain in `registry`.
            pub fn register(registry: &mut $crate::__private::inspector_core::SchemaRegistry) {
                $(
                    let reply: &[&str] = &[$($($reply),*)?];
                    registry.register_command(
                        concat!($domain, ".", $wire),
                        ::std::vec![
                            $( $crate::protocol_domain!(@descriptor $arg_wire $ty $($opt)?) ),*
                        ],
                        reply.iter().copied(),
                        false $( || $error_data )?,
                    );
                )*
            }

            /// Wraps the target's agent for this domain.
            ///
            /// Returns `None` if the target's registry does not know the domain.
            pub fn new(target: &'a $crate::application::Target) -> ::std::option::Option<Self> {
                target.agent($domain).map(|agent| Self { agent })
            }

            /// The untyped agent underneath.
            pub fn agent(&self) -> $crate::application::Agent<'a> {
                self.agent
            }

            $(
                $(#[$fn_meta])*
                pub fn $fn_name(
                    &self,
                    $( $arg: $crate::protocol_domain!(@arg_type $($opt)?) ),*
                ) -> impl ::std::future::Future<
                    Output = ::std::result::Result<
                        ::std::option::Option<$crate::__private::serde_json::Value>,
                        $crate::domain::CallError,
                    >,
                > + Send + 'static {
                    let args: ::std::vec::Vec<::std::option::Option<$crate::__private::serde_json::Value>> =
                        ::std::vec![$( $crate::protocol_domain!(@arg_value $arg $($opt)?) ),*];
                    self.agent.call($wire, $crate::__private::inspector_core::CallArgs::from(args))
                }
            )*
        }
    };
}
