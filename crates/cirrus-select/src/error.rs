//! Selection error types

use thiserror::Error;

/// Result type for selection operations
pub type SelectResult<T> = Result<T, SelectError>;

/// Selection error types
///
/// All of these are local validation failures: they surface before any
/// network operation is attempted.
#[derive(Debug, Clone, Error)]
pub enum SelectError {
    /// Malformed or out-of-bounds indexing expression
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// A construct that is recognized but not supported
    #[error("Unsupported selection: {0}")]
    UnsupportedSelection(String),

    /// Broadcast or assignment shape incompatibility
    #[error("Shape mismatch: cannot broadcast {src:?} to {dest:?}")]
    ShapeMismatch {
        /// Source buffer shape
        src: Vec<u64>,
        /// Destination selection shape
        dest: Vec<u64>,
    },

    /// Chunk planning requested on a non-chunked target
    #[error("Target is not chunked")]
    NotChunked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_carries_both_shapes() {
        let err = SelectError::ShapeMismatch {
            src: vec![2, 4],
            dest: vec![3, 4],
        };
        assert_eq!(
            err.to_string(),
            "Shape mismatch: cannot broadcast [2, 4] to [3, 4]"
        );
        // Plain data variant: nothing chains as an underlying cause.
        assert!(std::error::Error::source(&err).is_none());
    }
}
