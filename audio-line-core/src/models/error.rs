use thiserror::Error;

/// Errors surfaced by line, mixer, and backend operations.
///
/// Every error is returned synchronously to the caller; nothing is retried
/// internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LineError {
    /// The requested format or native resource cannot be satisfied.
    #[error("line unavailable: {0}")]
    LineUnavailable(String),

    /// The operation is not valid in the line's (or mixer's) current state.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Malformed transfer size, line description, or parameter value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A transfer range falls outside the backing buffer.
    #[error("index out of bounds: offset {offset}, length {length}, buffer length {buffer_len}")]
    IndexOutOfBounds {
        offset: i64,
        length: i64,
        buffer_len: usize,
    },

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}

impl LineError {
    pub(crate) fn closed(operation: &str) -> Self {
        Self::IllegalState(format!("{} requires an open line", operation))
    }
}
