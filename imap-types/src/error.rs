//! Validation errors raised when constructing core data types.
//!
//! These are distinct from [`crate::response::Error`], which is the
//! protocol-level BAD/NO/BYE taxonomy returned to a client. A
//! [`ValidationError`] means a caller tried to build an impossible value
//! (an atom containing a space, an empty sequence set, …) and is a
//! programming error, not a protocol event.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("value must not be empty")]
    Empty,

    #[error("byte not allowed at position {position}: {found:#04x}")]
    ByteNotAllowed { found: u8, position: usize },

    #[error("value is not valid UTF-8")]
    NotUtf8,

    #[error("numeric range is invalid: start={start}, stop={stop}")]
    InvalidRange { start: u32, stop: u32 },

    #[error("value must not be zero")]
    Zero,

    #[error("{0}")]
    Other(String),
}
