//! Authentication-related types: SASL mechanism names and the base64
//! continuation data exchanged during `AUTHENTICATE`.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::secret::Secret;

/// A SASL mechanism name, matched case-insensitively (RFC 4422 §3.1).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthMechanism(String);

impl AuthMechanism {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub const PLAIN: &'static str = "PLAIN";
    pub const LOGIN: &'static str = "LOGIN";
    pub const ANONYMOUS: &'static str = "ANONYMOUS";
    pub const EXTERNAL: &'static str = "EXTERNAL";
    pub const CRAM_MD5: &'static str = "CRAM-MD5";
    pub const OAUTHBEARER: &'static str = "OAUTHBEARER";
    pub const SCRAM_SHA_1: &'static str = "SCRAM-SHA-1";
    pub const SCRAM_SHA_256: &'static str = "SCRAM-SHA-256";
}

impl From<&str> for AuthMechanism {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Continuation data sent by the client during an `AUTHENTICATE` exchange:
/// either a base64-encoded response, or `*` to cancel (RFC 3501 §6.2.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticateData {
    Response(Secret<Vec<u8>>),
    Cancel,
}
