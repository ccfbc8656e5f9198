//! Wire codec for a server-side IMAP4rev1/IMAP4rev2 implementation: a
//! `nom`-based command decoder, a fragment-producing response encoder, and
//! (behind the `tokio` feature, on by default) a `tokio_util::codec`
//! framing layer tying the two together over a byte stream.

pub mod decode;
pub mod encode;
pub mod error;

#[cfg(feature = "tokio")]
pub mod framing;

pub use error::{DecodeError, EncodeError};
