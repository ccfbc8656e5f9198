//! The backend credential-verification boundary (§6 "Authenticator
//! (backend boundary)").
//!
//! `imap-server` never hashes or compares a secret itself — every SASL
//! mechanism in [`crate::sasl`] parses the wire shape and then calls
//! through here, handing the backend whatever raw material the mechanism
//! collected (a cleartext password, an HMAC digest plus the challenge it
//! was computed over, a bearer token, …) so the backend can look it up
//! and verify it against its own store.

use imap_types::secret::Secret;

use crate::error::Result;

/// What a SASL exchange collected once its wire shape completed, handed
/// to [`Authenticator::authenticate`] for verification. Kept as one enum
/// rather than one method per mechanism so the registry in
/// [`crate::sasl`] stays mechanism-agnostic.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// PLAIN / LOGIN: a cleartext password the backend hashes and
    /// compares itself.
    Plain { authzid: Option<String>, password: Secret<String> },
    /// ANONYMOUS / EXTERNAL: a trace string (ANONYMOUS) or nothing at all
    /// (EXTERNAL trusts the transport layer's own identity).
    Trace(Option<String>),
    /// CRAM-MD5: the response's raw `username SP hex-digest` halves plus
    /// the challenge the digest was computed over, so the backend can
    /// recompute `HMAC-MD5(password, challenge)` and compare.
    ChallengeResponse {
        challenge: Secret<Vec<u8>>,
        digest_hex: Secret<String>,
    },
    /// OAUTHBEARER: the bearer token lifted out of the GS2 framing.
    Bearer(Secret<String>),
    /// SCRAM-*: the client-first/server-first/client-final messages,
    /// verbatim, so the backend can look up the stored key/salt/iteration
    /// count for `authzid` and perform the SCRAM math itself.
    Scram {
        client_first_bare: String,
        server_first: String,
        client_final_without_proof: String,
        client_proof_base64: Secret<String>,
    },
}

/// Identity claimed by the client for this authentication attempt (the
/// SASL authcid, or the LOGIN/PLAIN username).
pub type Identity = String;

/// The backend-supplied verifier every built-in mechanism delegates to.
/// Implementations typically look the identity up in a user store and
/// compare (or recompute and compare) the credential material.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, mechanism: &str, identity: &Identity, credentials: &Credentials) -> Result<()>;
}

/// A fixed-identity authenticator useful for tests and demonstrations:
/// accepts exactly one username/password pair and rejects everything
/// else. Not meant for production use — a real backend looks credentials
/// up in a user store.
pub struct StaticAuthenticator {
    username: String,
    password: Secret<String>,
}

impl StaticAuthenticator {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }
}

impl Authenticator for StaticAuthenticator {
    fn authenticate(&self, _mechanism: &str, identity: &Identity, credentials: &Credentials) -> Result<()> {
        if identity != &self.username {
            return Err(crate::error::Error::no("authentication failed"));
        }

        match credentials {
            Credentials::Plain { password, .. } => {
                if password.declassify() == self.password.declassify() {
                    Ok(())
                } else {
                    Err(crate::error::Error::no("authentication failed"))
                }
            }
            _ => Err(crate::error::Error::no("mechanism not supported by this authenticator")),
        }
    }
}

/// The salt/iteration count a SCRAM mechanism needs to build its
/// server-first message, looked up before the client has proven anything.
/// Kept as its own trait rather than folded into [`Authenticator`]: most
/// backends never need to hand out a salt ahead of verification, and
/// `Authenticate` alone cannot express "look this up, then verify" in one
/// call. A backend that supports SCRAM implements both traits against the
/// same user store; [`Authenticator::authenticate`] still does the actual
/// proof verification, recomputing whatever it needs from its own record.
pub trait ScramCredentialLookup: Send + Sync {
    fn lookup(&self, identity: &Identity) -> Option<ScramCredentials>;
}

#[derive(Debug, Clone)]
pub struct ScramCredentials {
    pub salt: Vec<u8>,
    pub iterations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_authenticator_accepts_matching_credentials() {
        let auth = StaticAuthenticator::new("alice", "hunter2");
        let creds = Credentials::Plain {
            authzid: None,
            password: Secret::new("hunter2".to_string()),
        };
        assert!(auth.authenticate("PLAIN", &"alice".to_string(), &creds).is_ok());
    }

    #[test]
    fn static_authenticator_rejects_wrong_password() {
        let auth = StaticAuthenticator::new("alice", "hunter2");
        let creds = Credentials::Plain {
            authzid: None,
            password: Secret::new("wrong".to_string()),
        };
        assert!(auth.authenticate("PLAIN", &"alice".to_string(), &creds).is_err());
    }

    #[test]
    fn static_authenticator_rejects_unknown_identity() {
        let auth = StaticAuthenticator::new("alice", "hunter2");
        let creds = Credentials::Plain {
            authzid: None,
            password: Secret::new("hunter2".to_string()),
        };
        assert!(auth.authenticate("PLAIN", &"mallory".to_string(), &creds).is_err());
    }
}
