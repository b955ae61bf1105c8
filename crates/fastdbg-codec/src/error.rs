//! Codec error types.

use thiserror::Error;

/// Errors from decoding wire bytes or parsing user-supplied values.
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    /// The buffer ended before the value did.
    #[error("buffer truncated: need {needed} bytes at offset {offset}, have {len}")]
    Truncated {
        /// Offset the read started at.
        offset: usize,
        /// Bytes the value requires.
        needed: usize,
        /// Total buffer length.
        len: usize,
    },

    /// Text could not be interpreted as a number.
    #[error("invalid number: {0}")]
    InvalidNumber(String),
}
