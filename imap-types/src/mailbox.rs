//! Mailbox names and attributes.

use std::collections::BTreeSet;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A mailbox name. `INBOX` is case-insensitive per RFC 3501 §5.1 and is
/// always normalized to the canonical spelling `INBOX`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Eq)]
pub struct Mailbox(String);

impl Mailbox {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case("INBOX") {
            Self("INBOX".to_string())
        } else {
            Self(name)
        }
    }

    pub fn is_inbox(&self) -> bool {
        self.0 == "INBOX"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Mailbox {
    fn eq(&self, other: &Self) -> bool {
        if self.is_inbox() && other.is_inbox() {
            return true;
        }
        self.0 == other.0
    }
}

impl std::hash::Hash for Mailbox {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl From<&str> for Mailbox {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Mailbox {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `mbx-list-flags` — attributes reported by `LIST`/`LSUB`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MailboxAttribute {
    Noinferiors,
    Noselect,
    Marked,
    Unmarked,
    HasChildren,
    HasNoChildren,
    /// `\Sent`, `\Drafts`, `\Junk`, `\Trash`, `\Important`, `\All`, `\Archive`, … (RFC 6154)
    Special(String),
}

impl fmt::Display for MailboxAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noinferiors => write!(f, "\\Noinferiors"),
            Self::Noselect => write!(f, "\\Noselect"),
            Self::Marked => write!(f, "\\Marked"),
            Self::Unmarked => write!(f, "\\Unmarked"),
            Self::HasChildren => write!(f, "\\HasChildren"),
            Self::HasNoChildren => write!(f, "\\HasNoChildren"),
            Self::Special(name) => write!(f, "\\{name}"),
        }
    }
}

pub type MailboxAttributeSet = BTreeSet<MailboxAttribute>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_is_case_insensitive() {
        assert_eq!(Mailbox::new("inbox"), Mailbox::new("INBOX"));
        assert_eq!(Mailbox::new("InBoX"), Mailbox::new("INBOX"));
        assert_ne!(Mailbox::new("Drafts"), Mailbox::new("drafts2"));
    }

    #[test]
    fn non_inbox_names_are_case_sensitive() {
        assert_ne!(Mailbox::new("Drafts"), Mailbox::new("drafts"));
    }
}
