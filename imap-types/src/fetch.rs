//! `FETCH` data items: the macros (`ALL`/`FAST`/`FULL`), individual
//! attributes, and the values a handler reports back for them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::body::BodyStructure;
use crate::core::NString;
use crate::datetime::DateTime;
use crate::envelope::Envelope;
use crate::flag::Flag;

/// A `BODY[<section>]<<partial>>` / `BODY.PEEK[...]` / `BINARY[...]` /
/// `BINARY.PEEK[...]` / `BINARY.SIZE[...]` section specifier.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionPart {
    /// Empty section: the entire message (`BODY[]`).
    Full,
    /// `HEADER`
    Header,
    /// `HEADER.FIELDS (field …)`
    HeaderFields(Vec<String>),
    /// `HEADER.FIELDS.NOT (field …)`
    HeaderFieldsNot(Vec<String>),
    /// `TEXT`
    Text,
    /// `MIME` (only meaningful for a numbered part)
    Mime,
    /// A numbered MIME part path, e.g. `1.2.3`, optionally itself
    /// qualified by one of the above (`1.2.HEADER`).
    Part(Vec<u32>, Option<Box<SectionPart>>),
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partial {
    pub offset: u32,
    pub count: u32,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// `BODY[...]` — consumes the section and sets `\Seen`.
    Body,
    /// `BODY.PEEK[...]` — does not set `\Seen`.
    BodyPeek,
    /// `BINARY[...]` (IMAP4rev2 / RFC 3516) — consumes and sets `\Seen`.
    Binary,
    /// `BINARY.PEEK[...]`
    BinaryPeek,
    /// `BINARY.SIZE[...]` — only the decoded octet count, no data.
    BinarySize,
}

/// A single atomic item requested by `FETCH`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    Envelope,
    Flags,
    InternalDate,
    RFC822Size,
    Uid,
    BodyStructure { extensible: bool },
    Section {
        kind: BodyKind,
        section: SectionPart,
        partial: Option<Partial>,
    },
    ModSeq,
}

/// A `FETCH` macro, expanded by the handler before dispatch to the
/// session: `ALL` = FLAGS, INTERNALDATE, RFC822.SIZE, ENVELOPE; `FAST` =
/// FLAGS, INTERNALDATE, RFC822.SIZE; `FULL` = ALL + BODY.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Macro {
    All,
    Fast,
    Full,
}

impl Macro {
    pub fn expand(self) -> Vec<FetchAttribute> {
        use FetchAttribute::*;
        match self {
            Macro::Fast => vec![Flags, InternalDate, RFC822Size],
            Macro::All => vec![Flags, InternalDate, RFC822Size, Envelope],
            Macro::Full => vec![
                Flags,
                InternalDate,
                RFC822Size,
                Envelope,
                BodyStructure { extensible: false },
            ],
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroOrAttributes {
    Macro(Macro),
    Attributes(Vec<FetchAttribute>),
}

impl MacroOrAttributes {
    pub fn into_attributes(self) -> Vec<FetchAttribute> {
        match self {
            Self::Macro(m) => m.expand(),
            Self::Attributes(a) => a,
        }
    }
}

/// Modifiers accompanying a `FETCH`/`UID FETCH` command.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchOptions {
    /// `(CHANGEDSINCE modseq)` — CONDSTORE extension modifier.
    pub changed_since: Option<u64>,
}

/// The value a session reports for one requested [`FetchAttribute`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttributeValue {
    Envelope(Envelope),
    Flags(Vec<Flag>),
    InternalDate(DateTime),
    RFC822Size(u32),
    Uid(u32),
    BodyStructure(BodyStructure),
    Section {
        kind: BodyKind,
        section: SectionPart,
        origin: Option<u32>,
        data: NString,
    },
    ModSeq(u64),
}

/// One `FETCH` response line's worth of reported attributes for a single
/// message, plus the sequence number (or UID, under `UIDFETCH`) it
/// concerns.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchItem {
    pub seq_or_uid: u32,
    pub attributes: Vec<FetchAttributeValue>,
}
