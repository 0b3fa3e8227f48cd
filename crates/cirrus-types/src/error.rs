//! Type model error types

use thiserror::Error;

/// Result type for type-model operations
pub type TypeResult<T> = Result<T, TypeError>;

/// Type model error types
#[derive(Debug, Error)]
pub enum TypeError {
    /// A construct that is recognized but not implemented
    #[error("Unsupported type: {0}")]
    Unsupported(String),

    /// Malformed wire type descriptor
    #[error("Invalid type descriptor: {0}")]
    Descriptor(String),

    /// Host value does not match the declared dtype
    #[error("Value mismatch for {dtype}: {reason}")]
    ValueMismatch {
        /// Name of the declared dtype class
        dtype: String,
        /// What disagreed
        reason: String,
    },

    /// String longer than its fixed-length declaration
    #[error("String of {length} bytes exceeds fixed length {capacity}")]
    StringOverflow {
        /// Byte length of the offending string
        length: usize,
        /// Declared fixed capacity
        capacity: usize,
    },

    /// Buffer too short for the requested element count
    #[error("Buffer truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required
        needed: usize,
        /// Bytes present
        available: usize,
    },

    /// Descriptor JSON error
    #[error("Descriptor JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
