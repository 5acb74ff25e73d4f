//! Diagnostics configuration for targets.
//!
//! Every target is constructed with a [`BackendOptions`] value.  The options
//! only change what gets *logged*; they never change what is sent or how a
//! call completes.
//!
//! # File format (for beginners)
//!
//! Options can be loaded from a small TOML file.  Every field is optional;
//! anything left out falls back to its default:
//!
//! ```toml
//! dump_protocol_messages = true
//! dump_time_stats = false
//! suppress_request_errors = false
//! log_level = "debug"
//! ```
//!
//! The `#[serde(default = "...")]` attributes tell `serde` which function to
//! call for a missing field, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for options file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading options at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse options TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Diagnostics switches scoped to one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendOptions {
    /// Log every outbound envelope and every inbound message.
    #[serde(default)]
    pub dump_protocol_messages: bool,
    /// Log the elapsed time of every response and every event dispatch.
    #[serde(default)]
    pub dump_time_stats: bool,
    /// Do not log remote errors.  Used by test suites that expect failures.
    #[serde(default)]
    pub suppress_request_errors: bool,
    /// `tracing` filter used by the binary when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            dump_protocol_messages: false,
            dump_time_stats: false,
            suppress_request_errors: false,
            log_level: default_log_level(),
        }
    }
}

impl BackendOptions {
    /// Parses options from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed or a field has
    /// the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads options from a file, returning the defaults if the file does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] for file-system errors other than "not
    /// found", and [`ConfigError::Parse`] if the TOML is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
