//! Command senders: one domain's commands, bound to one target.
//!
//! An [`Agent`] is a lightweight view (`&Target` + the domain's schema) that
//! turns a command name plus arguments into a sent envelope and a future for
//! its reply.  It offers the two call shapes every command has:
//!
//! - [`Agent::call`]: positional arguments, validated against the signature,
//!   resolving to the command's primary reply field.
//! - [`Agent::invoke`]: a pre-built parameter object, no validation,
//!   resolving to the full result or a failure ([`ProtocolResponse`]).
//!
//! Both send immediately, before returning.  Only waiting for the reply is
//! deferred to the returned future.

use std::future::Future;

use inspector_core::{prepare_parameters, AgentSchema, CallArgs, CommandSignature, ResponseEnvelope};
use serde_json::{Map, Value};
use tracing::error;

use crate::application::pending::{PendingCall, ReplyFuture};
use crate::application::target::Target;
use crate::domain::{BackendOptions, CallError, ProtocolResponse};

/// The commands of one domain, bound to a target.
#[derive(Debug, Clone, Copy)]
pub struct Agent<'a> {
    target: &'a Target,
    schema: &'a AgentSchema,
}

impl<'a> Agent<'a> {
    pub(crate) fn new(target: &'a Target, schema: &'a AgentSchema) -> Self {
        Self { target, schema }
    }

    pub fn domain(&self) -> &'a str {
        self.schema.domain()
    }

    /// Returns `true` if the domain declares the command `name`.
    pub fn has_command(&self, name: &str) -> bool {
        self.schema.command(name).is_some()
    }

    fn signature(&self, name: &str) -> Result<&'a CommandSignature, CallError> {
        self.schema.command(name).ok_or_else(|| {
            let error = CallError::UnknownCommand {
                method: format!("{}.{name}", self.domain()),
            };
            error!("{error}");
            error
        })
    }

    /// Calls `name` with positional arguments.
    ///
    /// The arguments are validated first; on failure the error is logged and
    /// the returned future fails immediately without anything being sent.
    /// On success the future resolves to the first declared reply field of
    /// the result, or `None` if the command declares no reply fields or the
    /// result lacks that field.
    pub fn call(
        &self,
        name: &str,
        args: CallArgs,
    ) -> impl Future<Output = Result<Option<Value>, CallError>> + Send + 'static {
        let sent = self.send_positional(name, args);
        async move {
            let (reply, field) = sent?;
            let result = reply.await?;
            Ok(field.and_then(|field| result.get(&field).cloned()))
        }
    }

    fn send_positional(
        &self,
        name: &str,
        args: CallArgs,
    ) -> Result<(ReplyFuture, Option<String>), CallError> {
        let signature = self.signature(name)?;
        let params =
            prepare_parameters(&signature.method, &signature.params, args).map_err(|e| {
                error!("{e}");
                CallError::from(e)
            })?;
        let reply = self.target.invoke(self.domain(), &signature.method, params);
        Ok((reply, signature.primary_reply_field().map(str::to_string)))
    }

    /// Calls `name` with a ready-made parameter object.
    ///
    /// The future resolves to [`ProtocolResponse::Success`] with the full
    /// result object (`{}` if the reply had none), or to
    /// [`ProtocolResponse::Failure`] with the error message.  The remote
    /// error's `data` is kept only for commands registered with extended
    /// error data.
    pub fn invoke(
        &self,
        name: &str,
        params: Option<Map<String, Value>>,
    ) -> impl Future<Output = ProtocolResponse> + Send + 'static {
        let sent = self.signature(name).map(|signature| {
            let reply = self.target.invoke(self.domain(), &signature.method, params);
            (reply, signature.has_error_data)
        });
        async move {
            let (reply, has_error_data) = match sent {
                Ok(sent) => sent,
                Err(e) => {
                    return ProtocolResponse::Failure {
                        message: e.to_string(),
                        data: None,
                    }
                }
            };
            match reply.await {
                Ok(result) => ProtocolResponse::Success(result),
                Err(e) => {
                    let wire = e.to_response_error();
                    ProtocolResponse::Failure {
                        message: wire.message,
                        data: if has_error_data { wire.data } else { None },
                    }
                }
            }
        }
    }
}

/// Completes a pending call from its response.
///
/// Remote errors are logged unless their code is one of the reserved benign
/// codes or request-error logging is suppressed.  The call is completed
/// exactly once either way; a response without `result` completes with `{}`.
pub(crate) fn dispatch_response(options: &BackendOptions, call: PendingCall, response: ResponseEnvelope) {
    if let Some(error) = &response.error {
        if !error.is_benign() && !options.suppress_request_errors {
            let id = if options.dump_protocol_messages {
                format!(" with id = {}", response.id)
            } else {
                String::new()
            };
            let detail = serde_json::to_string(error).unwrap_or_else(|_| error.to_string());
            error!("Request {}{id} failed. {detail}", call.method);
        }
    }

    let outcome = match response.error {
        Some(error) => Err(CallError::Remote(error)),
        None => Ok(response.result.unwrap_or_else(|| Value::Object(Map::new()))),
    };
    call.complete(outcome);
}

/// Re-serialises a response for log lines.
pub(crate) fn response_text(response: &ResponseEnvelope) -> String {
    let mut object = Map::new();
    object.insert("id".to_string(), Value::from(response.id));
    if let Some(result) = &response.result {
        object.insert("result".to_string(), result.clone());
    }
    if let Some(error) = &response.error {
        if let Ok(error) = serde_json::to_value(error) {
            object.insert("error".to_string(), error);
        }
    }
    Value::Object(object).to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
