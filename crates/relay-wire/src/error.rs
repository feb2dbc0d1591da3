use std::fmt;

/// A stream table that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub message: String,
    /// Byte offset into the buffer where decoding stopped.
    pub offset: usize,
}

impl DecodeError {
    pub(crate) fn new(msg: impl Into<String>, offset: usize) -> Self {
        Self { message: msg.into(), offset }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream table decode error at byte {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for DecodeError {}
