//! Capabilities: the case-insensitive feature names advertised by
//! `CAPABILITY` and mutated at boot (extension registration) and by
//! `STARTTLS`/`LOGIN`/`ENABLE`.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Capability(String);

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn auth(mechanism: &str) -> Self {
        Self(format!("AUTH={}", mechanism.to_ascii_uppercase()))
    }
}

impl PartialEq<str> for Capability {
    fn eq(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl From<&str> for Capability {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ordered set of capabilities, deduplicated case-insensitively.
/// Ordering is preserved from first insertion, matching how real clients
/// expect `CAPABILITY` to list `IMAP4rev2` first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(Vec<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|c| c.as_str().eq_ignore_ascii_case(name))
    }

    pub fn insert(&mut self, cap: Capability) -> bool {
        if self.contains(cap.as_str()) {
            return false;
        }
        self.0.push(cap);
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|c| !c.as_str().eq_ignore_ascii_case(name));
        before != self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `self` is a superset of `other` when every capability in `other`
    /// also appears in `self`. Used to check the invariant that
    /// pre-authentication capabilities are a superset of post-auth ones
    /// (minus `LOGINDISABLED`/TLS-gated capabilities).
    pub fn is_superset_of(&self, other: &CapabilitySet) -> bool {
        other.0.iter().all(|c| self.contains(c.as_str()))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        let mut set = Self::new();
        for cap in iter {
            set.insert(cap);
        }
        set
    }
}

impl<'a> IntoIterator for &'a CapabilitySet {
    type Item = &'a Capability;
    type IntoIter = std::slice::Iter<'a, Capability>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
