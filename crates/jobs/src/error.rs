use std::io;
use std::sync::Arc;

use thiserror::Error;

/// The taxonomy of failures a clone operation can surface, independent of
/// which stage or engine variant produced them.
///
/// Kept small and closed deliberately: callers match on this to decide
/// whether a failure is retryable, should abort the whole clone, or is a
/// programming error in the host integration.
#[derive(Debug, Error, Clone)]
pub enum CloneError {
    /// A caller-supplied locator, stage, or path failed validation before
    /// any work was attempted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The registry has no free slot, or a repository's queue depth limit
    /// was reached.
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    /// A filesystem or transport read/write failed.
    #[error("I/O error during {context}: {source}")]
    Io { context: String, #[source] source: Arc<io::Error> },

    /// A mutex guarding shared registry or repository state could not be
    /// acquired (poisoned by a panicking holder).
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),

    /// The host's session was killed or the operation was explicitly
    /// cancelled mid-flight.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// A request named a capability or code path this build does not
    /// implement.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// One concurrent task in a multi-task clone failed; this variant
    /// wraps that task's own error for a sibling or coordinator to observe.
    #[error("concurrent task failed: {0}")]
    TaskFailed(Box<CloneError>),
}

impl CloneError {
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    #[must_use]
    pub fn capacity(msg: impl Into<String>) -> Self {
        Self::Capacity(msg.into())
    }

    #[must_use]
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io { context: context.into(), source: Arc::new(source) }
    }

    #[must_use]
    pub fn lock_failed(msg: impl Into<String>) -> Self {
        Self::LockFailed(msg.into())
    }

    #[must_use]
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    #[must_use]
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    #[must_use]
    pub fn task_failed(inner: CloneError) -> Self {
        Self::TaskFailed(Box::new(inner))
    }

    /// True for failures that stem from the host cancelling the session
    /// rather than from the clone logic itself.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

pub type CloneResult<T> = Result<T, CloneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_failed_wraps_and_displays_inner() {
        let inner = CloneError::invalid_input("bad offset");
        let wrapped = CloneError::task_failed(inner);
        assert!(wrapped.to_string().contains("bad offset"));
    }

    #[test]
    fn cancellation_is_identified() {
        assert!(CloneError::cancelled("session killed").is_cancellation());
        assert!(!CloneError::capacity("full").is_cancellation());
    }
}
