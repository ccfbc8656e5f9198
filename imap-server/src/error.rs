//! Handler-facing error type: a thin wrapper around
//! [`imap_types::response::Error`] with `From` impls so `?` works out of
//! handler bodies that also touch I/O and decode errors.

use imap_types::response::{Code, Error as ProtocolError, ErrorKind};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] imap_codec::DecodeError),

    #[error(transparent)]
    Framing(#[from] imap_codec::framing::ImapServerCodecError),
}

impl Error {
    pub fn bad(text: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::bad(text))
    }

    pub fn no(text: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::no(text))
    }

    pub fn bye(text: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::bye(text))
    }

    pub fn with_code(self, code: Code) -> Self {
        match self {
            Self::Protocol(e) => Self::Protocol(e.with_code(code)),
            other => other,
        }
    }

    /// Reduce any error to the tagged BAD/NO/BYE taxonomy a handler's
    /// caller must emit, folding I/O and codec failures into `BAD` since
    /// both mean "could not make sense of this command".
    pub fn into_protocol(self) -> ProtocolError {
        match self {
            Self::Protocol(e) => e,
            Self::Io(e) => ProtocolError {
                kind: ErrorKind::Bad,
                code: None,
                text: e.to_string(),
            },
            Self::Codec(e) => ProtocolError {
                kind: ErrorKind::Bad,
                code: None,
                text: e.to_string(),
            },
            Self::Framing(e) => ProtocolError {
                kind: ErrorKind::Bad,
                code: None,
                text: e.to_string(),
            },
        }
    }
}
