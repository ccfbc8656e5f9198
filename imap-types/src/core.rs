//! Core string and literal types.
//!
//! ```text
//!        ┌───────┐ ┌─────────┐
//!        │AString│ │ NString │
//!        └──┬─┬──┘ │Option<  │
//!           │ │    │ IString>│
//!           │ │    └─┬───────┘
//!           │ └──────┤
//! ┌────┐ ┌──▼──┐  ┌──▼────┐
//! │Atom│ │     │  │IString│
//! └────┘ │     │  └┬─────┬┘
//!        └─────┘   │     │
//!             ┌─────▼─┐ ┌─▼────┐
//!             │Literal│ │Quoted│
//!             └───────┘ └──────┘
//! ```
//!
//! Unlike the zero-copy `imap-codec` these types are derived from, every
//! value here owns its bytes. A connection holds decoded commands across
//! `.await` points, inside wrapped handler chains, and sometimes past the
//! lifetime of the buffer they were parsed from (e.g. `APPEND`'s streamed
//! literal) — an owned representation is the only one that survives that.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

fn is_atom_char(b: u8) -> bool {
    !matches!(
        b,
        b'(' | b')' | b'{' | b' ' | 0..=0x1f | 0x7f | b'%' | b'*' | b'"' | b'\\' | b']'
    )
}

fn is_text_char(b: u8) -> bool {
    b != b'\r' && b != b'\n'
}

/// An atom: "one or more non-special characters" (RFC 3501 §9).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(pub(crate) String);

impl Atom {
    pub fn verify(value: impl AsRef<[u8]>) -> Result<(), ValidationError> {
        let value = value.as_ref();
        if value.is_empty() {
            return Err(ValidationError::Empty);
        }
        if let Some(position) = value.iter().position(|b| !is_atom_char(*b)) {
            return Err(ValidationError::ByteNotAllowed {
                found: value[position],
                position,
            });
        }
        Ok(())
    }

    /// Construct without validation. Only meant for parser internals and
    /// tests that already know the value is well-formed.
    pub fn unchecked(value: impl Into<String>) -> Self {
        let value = value.into();
        debug_assert!(Self::verify(value.as_bytes()).is_ok());
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn eq_ignore_ascii_case(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl TryFrom<&str> for Atom {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::verify(value.as_bytes())?;
        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for Atom {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::verify(value.as_bytes())?;
        Ok(Self(value))
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A quoted string: `"..."`, with `\"` and `\\` escapes, containing only
/// `TEXT-CHAR`s (no CR/LF).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quoted(pub(crate) String);

impl Quoted {
    pub fn verify(value: impl AsRef<[u8]>) -> Result<(), ValidationError> {
        let value = value.as_ref();
        if let Some(position) = value.iter().position(|b| !is_text_char(*b)) {
            return Err(ValidationError::ByteNotAllowed {
                found: value[position],
                position,
            });
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Quoted {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::verify(value.as_bytes())?;
        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for Quoted {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::verify(value.as_bytes())?;
        Ok(Self(value))
    }
}

/// Whether a literal was announced with `{N}` (synchronizing — the server
/// must send a continuation request before the client sends the data) or
/// `{N+}` (non-synchronizing, LITERAL+ — the client sends the data right
/// away). `~{N}` / `~{N+}` additionally mark the literal as IMAP4rev2
/// BINARY content; that is tracked by [`Literal::is_binary`] rather than a
/// third mode, since sync/non-sync and binary/text are independent axes.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralMode {
    Sync,
    NonSync,
}

/// A literal: a length-prefixed, otherwise unconstrained, run of octets.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    data: Vec<u8>,
    mode: LiteralMode,
    binary: bool,
}

impl Literal {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            mode: LiteralMode::Sync,
            binary: false,
        }
    }

    pub fn with_mode(mut self, mode: LiteralMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    pub fn into_non_sync(mut self) -> Self {
        self.mode = LiteralMode::NonSync;
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn mode(&self) -> LiteralMode {
        self.mode
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Literal")
            .field("data", &format_args!("{} byte(s)", self.data.len()))
            .field("mode", &self.mode)
            .field("binary", &self.binary)
            .finish()
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Literal {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

/// Either a [`Quoted`] string or a [`Literal`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IString {
    Quoted(Quoted),
    Literal(Literal),
}

impl IString {
    /// UTF-8 view of the contained bytes, when valid. `BINARY` literals may
    /// legitimately fail this.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Quoted(q) => Some(q.as_str()),
            Self::Literal(l) => std::str::from_utf8(l.as_bytes()).ok(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Quoted(q) => q.0.as_bytes(),
            Self::Literal(l) => l.as_bytes(),
        }
    }
}

impl From<&str> for IString {
    fn from(value: &str) -> Self {
        match Quoted::try_from(value) {
            Ok(q) => Self::Quoted(q),
            Err(_) => Self::Literal(Literal::from(value)),
        }
    }
}

/// An atom or a string — used wherever the grammar calls for `astring`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AString {
    Atom(Atom),
    String(IString),
}

impl AString {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Atom(a) => Some(a.as_str()),
            Self::String(s) => s.as_str(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Atom(a) => a.as_str().as_bytes(),
            Self::String(s) => s.as_bytes(),
        }
    }
}

impl From<&str> for AString {
    fn from(value: &str) -> Self {
        match Atom::try_from(value) {
            Ok(atom) => Self::Atom(atom),
            Err(_) => Self::String(IString::from(value)),
        }
    }
}

impl From<String> for AString {
    fn from(value: String) -> Self {
        AString::from(value.as_str())
    }
}

/// An optional string: either an [`IString`] or `NIL`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NString(pub Option<IString>);

impl NString {
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_ref().and_then(IString::as_str)
    }
}

impl From<Option<&str>> for NString {
    fn from(value: Option<&str>) -> Self {
        Self(value.map(IString::from))
    }
}

/// A client-chosen command tag: `1*<atom-char except '+'>`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(pub(crate) String);

impl Tag {
    pub fn verify(value: impl AsRef<[u8]>) -> Result<(), ValidationError> {
        let value = value.as_ref();
        if value.is_empty() {
            return Err(ValidationError::Empty);
        }
        if let Some(position) = value
            .iter()
            .position(|b| !is_atom_char(*b) || *b == b'+')
        {
            return Err(ValidationError::ByteNotAllowed {
                found: value[position],
                position,
            });
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Tag {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::verify(value.as_bytes())?;
        Ok(Self(value.to_string()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_rejects_specials() {
        assert!(Atom::try_from("NOOP").is_ok());
        assert!(Atom::try_from("").is_err());
        assert!(Atom::try_from("has space").is_err());
        assert!(Atom::try_from("a(b)").is_err());
    }

    #[test]
    fn astring_picks_atom_when_possible() {
        assert!(matches!(AString::from("INBOX"), AString::Atom(_)));
        assert!(matches!(AString::from("has space"), AString::String(_)));
    }

    #[test]
    fn literal_mode_round_trips() {
        let lit = Literal::new(b"hello".to_vec());
        assert_eq!(lit.mode(), LiteralMode::Sync);
        assert_eq!(lit.into_non_sync().mode(), LiteralMode::NonSync);
    }
}
