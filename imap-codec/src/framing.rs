//! Line/literal-aware framing on top of a byte stream (§4.1, §8 invariant 6:
//! "the decoder consumes exactly the bytes of a literal declared `{N}`
//! before reading further protocol tokens").
//!
//! IMAP commands are not simply CRLF-delimited: a `{N}` (or `{N+}`, or
//! `~{N}`) literal header can appear anywhere an argument is expected, and
//! its announced payload may itself contain bare `\n` or `\r\n` sequences
//! that must not be mistaken for the end of the command line. This module
//! finds the boundary by scanning for `CRLF`, and — whenever the line found
//! that way ends in a literal header — treats the announced length as
//! opaque bytes to skip before resuming the search, exactly mirroring how a
//! human reading the wire would find the next real line break.
//!
//! Kept independent of [`crate::decode`]: the decoder only ever sees a
//! complete line with every literal's payload already spliced in, so it
//! never needs to signal "not enough bytes yet" itself.

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder as TokioEncoder};

use imap_types::auth::AuthenticateData;
use imap_types::command::Command;
use imap_types::core::LiteralMode;

use crate::encode::{Encode, Encoded};
use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramingState {
    ReadLine { to_consume_acc: usize },
    ReadLiteral { to_consume_acc: usize, length: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("expected CRLF, found bare LF")]
    NotCrLf,
}

#[derive(Debug, Error)]
pub enum ImapServerCodecError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error("{0}")]
    Decode(#[from] DecodeError),
}

/// What the framing layer decided to hand the connection runtime for one
/// iteration of its read loop.
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    /// A full, CRLF-terminated command, literals and all.
    Command(Command),
    /// A `+`/base64 continuation line sent mid-`AUTHENTICATE`, read while
    /// the codec is in [`LineMode::AuthenticateContinuation`].
    AuthContinuation(AuthenticateData),
    /// A bare `DONE\r\n` terminating `IDLE`, read while the codec is in
    /// [`LineMode::IdleDone`].
    IdleDone,
    /// The framing layer needs the connection to act before it can make
    /// further progress (acknowledge or reject a literal).
    ActionRequired(Action),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    /// Write `+ ready\r\n` (or similar) so the client starts sending the
    /// announced sync literal's payload.
    SendLiteralAck(u32),
    /// The literal exceeds `max_literal_size`; reject it with a tagged
    /// `NO`/`BAD` and resynchronize by discarding the line.
    SendLiteralReject(u32),
}

/// What kind of line is expected next. Only `Command` lines can carry
/// literals; the other two are always single CRLF-terminated lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMode {
    Command,
    AuthenticateContinuation,
    IdleDone,
}

/// `Decoder`/`Encoder` pair turning a byte stream into [`Event`]s and
/// [`Encoded`] responses back into bytes, with literal payloads read and
/// written as raw octets rather than copied through a textual grammar.
#[derive(Debug)]
pub struct ImapServerCodec {
    state: FramingState,
    max_literal_size: usize,
    mode: LineMode,
}

impl ImapServerCodec {
    pub fn new(max_literal_size: usize) -> Self {
        Self {
            state: FramingState::ReadLine { to_consume_acc: 0 },
            max_literal_size,
            mode: LineMode::Command,
        }
    }

    /// Switches what kind of line is expected next. The connection runtime
    /// calls this around `AUTHENTICATE` continuations and `IDLE`/`DONE`.
    pub fn set_mode(&mut self, mode: LineMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> LineMode {
        self.mode
    }
}

/// Skip the first `skip` bytes of `buf` and look for the next `\n`.
///
/// `Some(Ok(len))` means `buf[..skip + len]` is a complete `\r\n`-terminated
/// line; `Some(Err(len))` means a bare `\n` was found at that length
/// instead; `None` means no line break has arrived yet.
fn find_crlf_inclusive(skip: usize, buf: &[u8]) -> Option<Result<usize, usize>> {
    match buf.iter().skip(skip).position(|b| *b == b'\n') {
        Some(position) => {
            if buf[skip + position.saturating_sub(1)] == b'\r' {
                Some(Ok(position + 1))
            } else {
                Some(Err(position + 1))
            }
        }
        None => None,
    }
}

/// If `line` (a full line including its trailing `\r\n`) ends in a literal
/// header — `{N}`, `{N+}`, or `~{N}` immediately before the CRLF — returns
/// its announced length and mode. Returns `None` for a literal-free line.
///
/// Locates the header by its *last* `{` so that, once a line accumulates
/// past an earlier literal's raw payload (re-scanned here verbatim, braces
/// and all), an earlier `{...}` does not get mistaken for the trailing one.
fn trailing_literal_header(line: &[u8]) -> Option<(u32, LiteralMode, bool)> {
    let body = line.strip_suffix(b"\r\n")?;
    if *body.last()? != b'}' {
        return None;
    }
    let open = body.iter().rposition(|b| *b == b'{')?;
    let inner = &body[open + 1..body.len() - 1];
    let (digits, non_sync) = match inner.strip_suffix(b"+") {
        Some(d) => (d, true),
        None => (inner, false),
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let binary = open > 0 && body[open - 1] == b'~';
    let length: u32 = std::str::from_utf8(digits).ok()?.parse().ok()?;
    let mode = if non_sync { LiteralMode::NonSync } else { LiteralMode::Sync };
    Some((length, mode, binary))
}

impl Decoder for ImapServerCodec {
    type Item = Event;
    type Error = ImapServerCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                FramingState::ReadLine {
                    ref mut to_consume_acc,
                } => match find_crlf_inclusive(*to_consume_acc, src) {
                    None => return Ok(None),
                    Some(Err(to_discard)) => {
                        src.advance(*to_consume_acc + to_discard);
                        self.state = FramingState::ReadLine { to_consume_acc: 0 };
                        return Err(FramingError::NotCrLf.into());
                    }
                    Some(Ok(to_consume)) => {
                        *to_consume_acc += to_consume;
                        let line = &src[..*to_consume_acc];

                        let literal = match self.mode {
                            LineMode::Command => trailing_literal_header(line),
                            LineMode::AuthenticateContinuation | LineMode::IdleDone => None,
                        };

                        match literal {
                            Some((length, _mode, _binary)) => {
                                if length as usize > self.max_literal_size {
                                    src.advance(*to_consume_acc);
                                    self.state = FramingState::ReadLine { to_consume_acc: 0 };
                                    return Ok(Some(Event::ActionRequired(Action::SendLiteralReject(length))));
                                }
                                src.reserve(length as usize);
                                self.state = FramingState::ReadLiteral {
                                    to_consume_acc: *to_consume_acc,
                                    length: length as usize,
                                };
                                return Ok(Some(Event::ActionRequired(Action::SendLiteralAck(length))));
                            }
                            None => {
                                let consumed = *to_consume_acc;
                                let line = src.split_to(consumed);
                                self.state = FramingState::ReadLine { to_consume_acc: 0 };

                                return match self.mode {
                                    LineMode::Command => {
                                        let cmd = crate::decode::decode_command(&line)?;
                                        Ok(Some(Event::Command(cmd)))
                                    }
                                    LineMode::AuthenticateContinuation => {
                                        let data = crate::decode::decode_authenticate_continuation(&line)?;
                                        Ok(Some(Event::AuthContinuation(data)))
                                    }
                                    LineMode::IdleDone => {
                                        if crate::decode::is_idle_done(&line) {
                                            Ok(Some(Event::IdleDone))
                                        } else {
                                            Err(DecodeError::Malformed("expected DONE".into()).into())
                                        }
                                    }
                                };
                            }
                        }
                    }
                },
                FramingState::ReadLiteral {
                    to_consume_acc,
                    length,
                } => {
                    if to_consume_acc + length <= src.len() {
                        self.state = FramingState::ReadLine {
                            to_consume_acc: to_consume_acc + length,
                        };
                    } else {
                        return Ok(None);
                    }
                }
            }
        }
    }
}

impl<T: Encode> TokioEncoder<&T> for ImapServerCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: &T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let encoded: Encoded = crate::encode::encode(item);
        for fragment in encoded.fragments() {
            match fragment {
                crate::encode::Fragment::Line(bytes) => dst.extend_from_slice(bytes),
                crate::encode::Fragment::Literal(bytes) => dst.extend_from_slice(bytes),
            }
        }
        Ok(())
    }
}
