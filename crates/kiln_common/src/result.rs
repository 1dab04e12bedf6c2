//! Result and error types for contract violations.

/// The result type for orchestrator operations that can hit a contract
/// violation.
///
/// `Ok` carries the (possibly degraded) result after configuration or input
/// problems, which are reported through the diagnostic sink instead.
/// `Err` means the caller broke the orchestrator's contract: a stage invoked
/// out of order, a restore onto a mismatched unit set, or reuse of an instance
/// that timed out. These terminate the attempt.
pub type KilnResult<T> = Result<T, InternalError>;

/// A contract violation or internal bug, as opposed to a user input problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal compiler error: {message}")]
pub struct InternalError {
    /// Description of the violated invariant.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// Returns `Err(InternalError)` from the enclosing function unless `cond` holds.
#[macro_export]
macro_rules! ensure_state {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::InternalError::new(format!($($arg)+)));
        }
    };
}
