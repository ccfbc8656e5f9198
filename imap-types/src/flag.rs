//! Flag-related types.
//!
//! There are two kinds of flags: system flags (pre-defined, `\`-prefixed)
//! and keywords (server- or client-defined, no leading `\`). A flag of
//! either kind can be permanent or session-only; [`FlagPerm::Asterisk`]
//! additionally lets a client learn that it may define new keywords.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::core::Atom;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    Answered,
    Deleted,
    Draft,
    Flagged,
    Seen,
    /// `\Recent` is not settable by clients but is reported by the server.
    Recent,
    /// A `\`-prefixed flag not recognized above.
    Extension(String),
    /// A plain keyword (no leading `\`).
    Keyword(Atom),
}

impl Flag {
    pub fn system(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "answered" => Self::Answered,
            "deleted" => Self::Deleted,
            "draft" => Self::Draft,
            "flagged" => Self::Flagged,
            "seen" => Self::Seen,
            "recent" => Self::Recent,
            _ => Self::Extension(name.to_string()),
        }
    }

    pub fn keyword(atom: Atom) -> Self {
        Self::Keyword(atom)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Answered => write!(f, "\\Answered"),
            Self::Deleted => write!(f, "\\Deleted"),
            Self::Draft => write!(f, "\\Draft"),
            Self::Flagged => write!(f, "\\Flagged"),
            Self::Seen => write!(f, "\\Seen"),
            Self::Recent => write!(f, "\\Recent"),
            Self::Extension(name) => write!(f, "\\{name}"),
            Self::Keyword(atom) => write!(f, "{atom}"),
        }
    }
}

/// A flag advertised in the `PERMANENTFLAGS` response code.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlagPerm {
    Flag(Flag),
    /// `\*` — the client may create new keywords in this mailbox.
    Asterisk,
}

impl fmt::Display for FlagPerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(flag) => flag.fmt(f),
            Self::Asterisk => write!(f, "\\*"),
        }
    }
}

/// The `STORE` modification kind: replace, add, or remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreType {
    Replace,
    Add,
    Remove,
}

/// Whether a `STORE` should reply with the resulting `FETCH` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreResponse {
    Answer,
    Silent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_flag_is_case_insensitive() {
        assert_eq!(Flag::system("SEEN"), Flag::Seen);
        assert_eq!(Flag::system("sEeN"), Flag::Seen);
    }

    #[test]
    fn unknown_backslash_flag_is_extension() {
        assert_eq!(
            Flag::system("Junk"),
            Flag::Extension("Junk".to_string())
        );
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(Flag::Seen.to_string(), "\\Seen");
        assert_eq!(
            Flag::Keyword(Atom::try_from("$Label1").unwrap_or_else(|_| Atom::unchecked("Label1")))
                .to_string(),
            "Label1"
        );
    }
}
