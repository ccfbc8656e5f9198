//! Decoders: byte-level primitives ([`primitive`]) and the command grammar
//! built out of them ([`command`]).
//!
//! Both modules parse over complete, in-memory byte slices — by the time
//! anything here runs, [`crate::framing`] has already spliced every
//! literal's payload into the buffer at its `{N}` position, so there is no
//! "incomplete input" case to report back out of these parsers.

mod command;
mod primitive;

pub use command::{decode_authenticate_continuation, decode_command, is_idle_done};
