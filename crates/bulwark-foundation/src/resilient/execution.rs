//! What an `execute` call hands back.

use bulwark_kernel::{AttemptError, ExecutionContext};
use serde::{Deserialize, Serialize};

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// An attempt produced an accepted value.
    Succeeded,
    /// A value matched an abort condition and no fallback was configured.
    Aborted,
    /// Attempts ran out without success and no fallback was configured.
    Exhausted,
    /// Attempts ran out or were aborted, and the fallback produced the value.
    FellBack,
    /// Attempts ran out or were aborted, and the fallback raised an error.
    FallbackFailed,
    /// The throttle deferred the call; no value is produced.
    Throttled,
}

impl Disposition {
    /// Whether the call produced a value.
    pub fn has_value(self) -> bool {
        matches!(self, Self::Succeeded | Self::FellBack)
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Succeeded => "succeeded",
            Self::Aborted => "aborted",
            Self::Exhausted => "exhausted",
            Self::FellBack => "fell back",
            Self::FallbackFailed => "fallback failed",
            Self::Throttled => "throttled",
        };
        f.write_str(name)
    }
}

/// Result of one `execute` call.
///
/// Attempt errors never escape `execute`; they are kept in
/// [`context`](Self::context) in the order they happened.
#[derive(Debug)]
pub struct Execution<T> {
    /// Value from the operation or the fallback, if any.
    pub value: Option<T>,
    /// How the call ended.
    pub disposition: Disposition,
    /// Final attempt count, timing and error history.
    pub context: ExecutionContext,
    /// Error raised by the fallback, when it failed.
    pub fallback_error: Option<AttemptError>,
}

impl<T> Execution<T> {
    pub(crate) fn new(value: Option<T>, disposition: Disposition, context: ExecutionContext) -> Self {
        Self {
            value,
            disposition,
            context,
            fallback_error: None,
        }
    }

    /// Whether an attempt of the operation itself succeeded.
    pub fn is_success(&self) -> bool {
        self.disposition == Disposition::Succeeded
    }

    /// Borrow the value.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Take the value, dropping the report.
    pub fn into_value(self) -> Option<T> {
        self.value
    }
}
