//! Error taxonomy for `bulwark-kernel`.
//!
//! Two families of errors exist and they never mix:
//!
//! - [`ConfigError`] is raised while a policy, breaker or orchestrator is
//!   being configured (or while a settings file is loaded). It is surfaced
//!   directly to the configuring caller and is never retried.
//! - [`AttemptError`] describes why a single attempt failed. Attempt errors
//!   are captured into the [`ExecutionContext`](crate::context::ExecutionContext)
//!   and drive the retry loop; they are never re-raised out of `execute`.
//!
//! Settings loading uses [`error_stack::Report`] so callers get the file
//! path and format attached to the root cause.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bulwark_kernel::error::{ConfigError, ConfigResult};
//! use error_stack::{Report, ResultExt};
//!
//! fn read_settings(path: &str) -> ConfigResult<String> {
//!     std::fs::read_to_string(path)
//!         .map_err(ConfigError::from)
//!         .map_err(Report::new)
//!         .attach(format!("reading {path}"))
//! }
//! ```

use crate::circuit::CircuitState;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by a wrapped operation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while configuring a component or loading settings.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A builder argument was out of range.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// Name of the offending option.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A low-level I/O error while reading a settings file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings source could not be parsed.
    #[error("Config parsing error: {0}")]
    Parse(String),

    /// The settings file extension is not a supported format.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The parsed settings could not be deserialized into the target type.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidArgument`].
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

/// Result alias for settings loading, carrying an [`error_stack::Report`].
pub type ConfigResult<T> = Result<T, error_stack::Report<ConfigError>>;

/// Why a single attempt failed.
///
/// Cheap to clone: operation errors are shared behind an [`Arc`] so the
/// execution context can be snapshotted into hooks and reports.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum AttemptError {
    /// A tripped or isolated circuit breaker rejected the attempt before the
    /// operation was invoked.
    #[error("circuit breaker '{name}' is {state}")]
    CircuitOpen {
        /// Breaker name.
        name: String,
        /// State that caused the rejection.
        state: CircuitState,
    },

    /// The deadline elapsed before the operation settled.
    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),

    /// The wrapped operation itself raised an error.
    #[error("operation failed: {0}")]
    Operation(Arc<dyn std::error::Error + Send + Sync>),
}

impl AttemptError {
    /// Wrap an error raised by the operation.
    pub fn operation(err: impl Into<BoxError>) -> Self {
        Self::Operation(Arc::from(err.into()))
    }

    /// Whether this attempt lost a timeout race.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    /// Whether this attempt was rejected by a circuit breaker.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_stack::{Report, ResultExt};

    #[test]
    fn invalid_argument_display() {
        let err = ConfigError::invalid_argument("timeout", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "invalid argument `timeout`: must be greater than zero"
        );
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: ConfigError = io_err.into();

        assert!(matches!(err, ConfigError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn report_carries_context() {
        let result: ConfigResult<()> =
            Err(Report::new(ConfigError::Parse("bad toml".into()))).attach("while loading settings");

        let report = result.unwrap_err();
        let display = format!("{report:?}");

        assert!(display.contains("bad toml"));
        assert!(display.contains("while loading settings"));
    }

    #[test]
    fn attempt_error_kinds() {
        let timeout = AttemptError::TimedOut(Duration::from_millis(250));
        assert!(timeout.is_timeout());
        assert!(!timeout.is_circuit_open());
        assert_eq!(timeout.to_string(), "operation timed out after 250ms");

        let open = AttemptError::CircuitOpen {
            name: "payments".into(),
            state: CircuitState::Isolated,
        };
        assert!(open.is_circuit_open());
        assert_eq!(open.to_string(), "circuit breaker 'payments' is isolated");

        let failed = AttemptError::operation("connection reset");
        assert_eq!(failed.to_string(), "operation failed: connection reset");
        let cloned = failed.clone();
        assert_eq!(cloned.to_string(), failed.to_string());
    }
}
