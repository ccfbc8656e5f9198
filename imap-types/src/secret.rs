//! Handling of secret values.
//!
//! Ensures passwords, initial SASL responses, and bearer tokens are not
//! `Debug`-printed by accident (a command line ends up in more log
//! statements than anyone intends).

use std::fmt::{Debug, Formatter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub fn new(inner: T) -> Self {
        Self(inner)
    }

    pub fn declassify(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> Debug for Secret<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "/* REDACTED */")
    }
}

#[cfg(test)]
mod tests {
    use super::Secret;

    #[test]
    fn secret_is_redacted() {
        let secret = Secret::new("xyz123");
        let got = format!("{secret:?}");
        assert!(!got.contains("xyz123"));
        assert_eq!(got, "/* REDACTED */");
    }

    #[test]
    fn secret_declassify_exposes_inner() {
        let secret = Secret::new("xyz123".to_string());
        assert_eq!(secret.declassify(), "xyz123");
    }
}
