//! Decode/encode error types.
//!
//! [`DecodeError::LiteralFound`] is not really a failure: it is how the
//! `nom::bytes::complete`-based grammar in [`crate::decode`] signals to the
//! framing layer ([`crate::framing`]) that it needs `length` more bytes
//! spliced in at the current position before parsing can continue. The
//! framing layer turns that into a continuation request (or a rejection,
//! if the literal exceeds the configured maximum).

use thiserror::Error;

use imap_types::core::LiteralMode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// More bytes are needed before the current line can be re-attempted;
    /// the framing layer should keep buffering.
    #[error("incomplete: need more data")]
    Incomplete,

    /// A `{N}`/`{N+}`/`~{N}` literal header was seen; the framing layer
    /// must read exactly `length` more octets before retrying decode.
    #[error("literal of {length} byte(s) found (mode={mode:?}, binary={binary})")]
    LiteralFound {
        length: u32,
        mode: LiteralMode,
        binary: bool,
    },

    /// The line could not be parsed as any known grammar production.
    #[error("malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
