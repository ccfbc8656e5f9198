//! The encoder: a stateful builder producing [`Fragment`]-split output so a
//! connection can write a response's non-literal bytes immediately while
//! streaming a large `BODY[...]` literal payload without holding a second
//! copy of it in memory (§4.1, §9 "literal streaming").
//!
//! Mirrors the shape of [`crate::decode`]'s primitives one level up: where
//! the decoder exposes `Peek`/`Expect`/`ReadAtom`/…, the encoder exposes
//! `atom`/`sp`/`crlf`/… as chainable builder methods.

mod data;
mod response;

use std::fmt;
use std::mem;

use imap_types::core::{AString, IString, NString};
use imap_types::flag::Flag;

/// One piece of an encoded response: either literal-free bytes that can be
/// written to the socket right away, or the raw octets of a literal, which
/// the connection runtime may choose to stream in chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Line(Vec<u8>),
    Literal(Vec<u8>),
}

/// A finished, possibly multi-fragment, encoded value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Encoded(Vec<Fragment>);

impl Encoded {
    pub fn fragments(&self) -> &[Fragment] {
        &self.0
    }

    /// Flatten into one contiguous byte buffer. Convenient for tests and
    /// for connections that do not need chunked literal streaming.
    pub fn dump(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for fragment in &self.0 {
            match fragment {
                Fragment::Line(bytes) => out.extend_from_slice(bytes),
                Fragment::Literal(bytes) => out.extend_from_slice(bytes),
            }
        }
        out
    }
}

/// Anything that knows how to write itself onto an [`Encoder`].
pub trait Encode {
    fn encode(&self, enc: &mut Encoder);
}

pub fn encode<T: Encode + ?Sized>(value: &T) -> Encoded {
    let mut enc = Encoder::new();
    value.encode(&mut enc);
    enc.finish()
}

/// The stateful builder itself. `line` accumulates literal-free bytes;
/// calling [`Encoder::literal`] flushes it into a [`Fragment::Line`] and
/// appends a [`Fragment::Literal`] so the raw payload is never copied
/// through the textual formatting path.
#[derive(Debug, Default)]
pub struct Encoder {
    fragments: Vec<Fragment>,
    line: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.line.extend_from_slice(bytes);
    }

    fn flush_line(&mut self) {
        if !self.line.is_empty() {
            self.fragments.push(Fragment::Line(mem::take(&mut self.line)));
        }
    }

    pub fn finish(mut self) -> Encoded {
        self.flush_line();
        Encoded(self.fragments)
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.push_bytes(bytes);
        self
    }

    pub fn atom(&mut self, value: &str) -> &mut Self {
        self.push_bytes(value.as_bytes());
        self
    }

    pub fn sp(&mut self) -> &mut Self {
        self.raw(b" ")
    }

    pub fn crlf(&mut self) -> &mut Self {
        self.raw(b"\r\n")
    }

    pub fn star(&mut self) -> &mut Self {
        self.raw(b"*")
    }

    pub fn nil(&mut self) -> &mut Self {
        self.raw(b"NIL")
    }

    pub fn number(&mut self, value: impl fmt::Display) -> &mut Self {
        self.raw(value.to_string().as_bytes())
    }

    /// `"..."`, escaping `\` and `"`.
    pub fn quoted_str(&mut self, value: &str) -> &mut Self {
        self.raw(b"\"");
        for byte in value.bytes() {
            if byte == b'"' || byte == b'\\' {
                self.push_bytes(&[b'\\']);
            }
            self.push_bytes(&[byte]);
        }
        self.raw(b"\"")
    }

    /// Emits a literal: flushes whatever line bytes are pending (with the
    /// `{N}\r\n` header attached to them), then appends the payload as its
    /// own [`Fragment::Literal`].
    pub fn literal(&mut self, data: &[u8]) -> &mut Self {
        self.push_bytes(format!("{{{}}}\r\n", data.len()).as_bytes());
        self.flush_line();
        self.fragments.push(Fragment::Literal(data.to_vec()));
        self
    }

    /// A string, choosing the shortest safe wire form: a bare value never
    /// needs quoting/literal-ing here since all our NString/IString inputs
    /// come from already-validated [`imap_types`] values.
    pub fn istring(&mut self, value: &IString) -> &mut Self {
        match value {
            IString::Quoted(q) => self.quoted_str(q.as_str()),
            IString::Literal(l) => self.literal(l.as_bytes()),
        }
    }

    pub fn nstring(&mut self, value: &NString) -> &mut Self {
        match &value.0 {
            None => self.nil(),
            Some(s) => self.istring(s),
        }
    }

    pub fn nstring_bytes(&mut self, value: Option<&[u8]>) -> &mut Self {
        match value {
            None => self.nil(),
            Some(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) if !s.contains(['"', '\\', '\r', '\n']) => self.quoted_str(s),
                _ => self.literal(bytes),
            },
        }
    }

    pub fn astring(&mut self, value: &AString) -> &mut Self {
        match value {
            AString::Atom(a) => self.atom(a.as_str()),
            AString::String(s) => self.istring(s),
        }
    }

    pub fn quoted_or_literal(&mut self, value: &str) -> &mut Self {
        if value.contains(['"', '\\', '\r', '\n']) || !value.is_ascii() {
            self.literal(value.as_bytes())
        } else {
            self.quoted_str(value)
        }
    }

    pub fn begin_list(&mut self) -> &mut Self {
        self.raw(b"(")
    }

    pub fn end_list(&mut self) -> &mut Self {
        self.raw(b")")
    }

    /// A parenthesized, space-separated list.
    pub fn list<T>(&mut self, items: &[T], mut item: impl FnMut(&mut Self, &T)) -> &mut Self {
        self.begin_list();
        for (i, value) in items.iter().enumerate() {
            if i > 0 {
                self.sp();
            }
            item(self, value);
        }
        self.end_list()
    }

    pub fn flags(&mut self, flags: &[Flag]) -> &mut Self {
        self.list(flags, |enc, flag| {
            enc.atom(&flag.to_string());
        })
    }
}
