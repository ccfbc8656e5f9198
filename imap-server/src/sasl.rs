//! The SASL authentication framework (§4.3): client/server mechanism
//! interfaces, a case-insensitive registry, and the built-in mechanisms
//! RFC 4422/4616/2195/7628 describe. Every mechanism here parses its own
//! wire shape and then calls through to the backend-supplied
//! [`Authenticator`] — none of them hash or compare a secret themselves.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use base64::Engine;
use rand::RngCore;

use imap_types::secret::Secret;

use crate::authenticator::{Authenticator, Credentials, Identity, ScramCredentialLookup};
use crate::error::{Error, Result};

/// A client-side mechanism driver. Not used by the server runtime itself
/// (the server only ever plays the [`ServerMechanism`] role) but kept
/// alongside it since the registry is the natural home for both halves of
/// a SASL mechanism, and a test harness or client-mode reuse of this crate
/// wants the same mechanism table.
pub trait ClientMechanism: Send + Sync {
    fn name(&self) -> &str;
    fn start(&mut self) -> Option<Vec<u8>>;
    fn next(&mut self, challenge: &[u8]) -> Vec<u8>;
}

/// A server-side mechanism driver, one instance per in-flight
/// `AUTHENTICATE` exchange. `next` is fed the client's base64-decoded
/// response (empty on the very first call when the client sent no initial
/// response) and returns the next challenge to send, or `None` once the
/// exchange is `done`. A mechanism must be idempotent in its terminal
/// state: once `done` is true, calling `next` again is an error.
pub trait ServerMechanism: Send {
    fn name(&self) -> &str;
    fn next(&mut self, response: &[u8]) -> Result<(Option<Vec<u8>>, bool)>;
}

type ServerFactory = Arc<dyn Fn(Arc<dyn Authenticator>) -> Box<dyn ServerMechanism> + Send + Sync>;
type ClientFactory = Arc<dyn Fn() -> Box<dyn ClientMechanism> + Send + Sync>;

/// Mechanism factories keyed case-insensitively (uppercased) on mechanism
/// name. `register_*` is concurrent-safe; re-registering a name replaces
/// the prior factory, matching the registry semantics §4.3 and §4.5 both
/// describe for "replace on conflict".
#[derive(Default)]
pub struct SaslRegistry {
    server: RwLock<HashMap<String, ServerFactory>>,
    client: RwLock<HashMap<String, ClientFactory>>,
    scram_lookup: RwLock<Option<Arc<dyn ScramCredentialLookup>>>,
}

impl fmt::Debug for SaslRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaslRegistry")
            .field("server", &self.server_names())
            .finish()
    }
}

impl SaslRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with every built-in mechanism (§2 "SASL
    /// framework"), ready to hand to a connection once an `Authenticator`
    /// is known.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_server("ANONYMOUS", |auth| Box::new(Anonymous { auth, done: false }));
        registry.register_server("EXTERNAL", |auth| Box::new(External { auth, done: false }));
        registry.register_server("PLAIN", |auth| Box::new(Plain { auth, done: false }));
        registry.register_server("LOGIN", |auth| {
            Box::new(Login {
                auth,
                state: LoginState::AwaitingUsername,
            })
        });
        registry.register_server("CRAM-MD5", |auth| {
            let mut challenge = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut challenge);
            Box::new(CramMd5 {
                auth,
                challenge: challenge.to_vec(),
                state: CramMd5State::AwaitingResponse,
            })
        });
        registry.register_server("OAUTHBEARER", |auth| {
            Box::new(OAuthBearer {
                auth,
                state: OAuthBearerState::AwaitingInitial,
            })
        });
        registry
    }

    pub fn set_scram_credential_lookup(&self, lookup: Arc<dyn ScramCredentialLookup>) {
        *self.scram_lookup.write().expect("sasl lock poisoned") = Some(lookup);
    }

    pub fn register_server<F>(&self, name: &str, factory: F)
    where
        F: Fn(Arc<dyn Authenticator>) -> Box<dyn ServerMechanism> + Send + Sync + 'static,
    {
        self.server
            .write()
            .expect("sasl lock poisoned")
            .insert(name.to_ascii_uppercase(), Arc::new(factory));
    }

    pub fn register_client<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn ClientMechanism> + Send + Sync + 'static,
    {
        self.client
            .write()
            .expect("sasl lock poisoned")
            .insert(name.to_ascii_uppercase(), Arc::new(factory));
    }

    pub fn start_server(&self, name: &str, auth: Arc<dyn Authenticator>) -> Option<Box<dyn ServerMechanism>> {
        if name.eq_ignore_ascii_case("SCRAM-SHA-1") || name.eq_ignore_ascii_case("SCRAM-SHA-256") {
            let lookup = self.scram_lookup.read().expect("sasl lock poisoned").clone();
            return Some(Box::new(Scram {
                variant: name.to_ascii_uppercase(),
                auth,
                lookup,
                state: ScramState::AwaitingClientFirst,
                client_first_bare: String::new(),
                server_first: String::new(),
            }));
        }
        let factory = self.server.read().expect("sasl lock poisoned").get(&name.to_ascii_uppercase())?.clone();
        Some(factory(auth))
    }

    pub fn server_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.server.read().expect("sasl lock poisoned").keys().cloned().collect();
        if self.scram_lookup.read().expect("sasl lock poisoned").is_some() {
            names.push("SCRAM-SHA-1".to_string());
            names.push("SCRAM-SHA-256".to_string());
        }
        names.sort();
        names
    }
}

fn decode_b64(data: &[u8]) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|_| Error::bad("invalid base64 SASL response"))
}

// --- ANONYMOUS (RFC 4505) -----------------------------------------------

struct Anonymous {
    auth: Arc<dyn Authenticator>,
    done: bool,
}

impl ServerMechanism for Anonymous {
    fn name(&self) -> &str {
        "ANONYMOUS"
    }

    fn next(&mut self, response: &[u8]) -> Result<(Option<Vec<u8>>, bool)> {
        if self.done {
            return Err(Error::bad("mechanism already completed"));
        }
        self.done = true;
        let trace = String::from_utf8(response.to_vec()).ok().filter(|s| !s.is_empty());
        self.auth
            .authenticate("ANONYMOUS", &String::new(), &Credentials::Trace(trace))?;
        Ok((None, true))
    }
}

// --- EXTERNAL (RFC 4422 appendix A) -------------------------------------

struct External {
    auth: Arc<dyn Authenticator>,
    done: bool,
}

impl ServerMechanism for External {
    fn name(&self) -> &str {
        "EXTERNAL"
    }

    fn next(&mut self, response: &[u8]) -> Result<(Option<Vec<u8>>, bool)> {
        if self.done {
            return Err(Error::bad("mechanism already completed"));
        }
        self.done = true;
        let authzid = String::from_utf8(response.to_vec()).ok().filter(|s| !s.is_empty());
        self.auth.authenticate("EXTERNAL", &String::new(), &Credentials::Trace(authzid))?;
        Ok((None, true))
    }
}

// --- PLAIN (RFC 4616) ----------------------------------------------------

struct Plain {
    auth: Arc<dyn Authenticator>,
    done: bool,
}

impl ServerMechanism for Plain {
    fn name(&self) -> &str {
        "PLAIN"
    }

    fn next(&mut self, response: &[u8]) -> Result<(Option<Vec<u8>>, bool)> {
        if self.done {
            return Err(Error::bad("mechanism already completed"));
        }
        self.done = true;

        // authzid NUL authcid NUL passwd
        let mut parts = response.splitn(3, |b| *b == 0);
        let authzid = parts.next().unwrap_or(b"");
        let authcid = parts.next().ok_or_else(|| Error::bad("malformed PLAIN response"))?;
        let password = parts.next().ok_or_else(|| Error::bad("malformed PLAIN response"))?;

        let identity = String::from_utf8(authcid.to_vec()).map_err(|_| Error::bad("authcid is not valid UTF-8"))?;
        let authzid = String::from_utf8(authzid.to_vec())
            .ok()
            .filter(|s| !s.is_empty());
        let password = String::from_utf8(password.to_vec()).map_err(|_| Error::bad("password is not valid UTF-8"))?;

        self.auth.authenticate(
            "PLAIN",
            &identity,
            &Credentials::Plain {
                authzid,
                password: Secret::new(password),
            },
        )?;
        Ok((None, true))
    }
}

// --- LOGIN (non-standard, widely implemented) ----------------------------

enum LoginState {
    AwaitingUsername,
    AwaitingPassword(String),
    Done,
}

struct Login {
    auth: Arc<dyn Authenticator>,
    state: LoginState,
}

impl ServerMechanism for Login {
    fn name(&self) -> &str {
        "LOGIN"
    }

    fn next(&mut self, response: &[u8]) -> Result<(Option<Vec<u8>>, bool)> {
        match std::mem::replace(&mut self.state, LoginState::Done) {
            LoginState::AwaitingUsername => {
                let username =
                    String::from_utf8(response.to_vec()).map_err(|_| Error::bad("username is not valid UTF-8"))?;
                self.state = LoginState::AwaitingPassword(username);
                Ok((Some(b"Password:".to_vec()), false))
            }
            LoginState::AwaitingPassword(username) => {
                let password =
                    String::from_utf8(response.to_vec()).map_err(|_| Error::bad("password is not valid UTF-8"))?;
                self.auth.authenticate(
                    "LOGIN",
                    &username,
                    &Credentials::Plain {
                        authzid: None,
                        password: Secret::new(password),
                    },
                )?;
                Ok((None, true))
            }
            LoginState::Done => Err(Error::bad("mechanism already completed")),
        }
    }
}

// --- CRAM-MD5 (RFC 2195) --------------------------------------------------

enum CramMd5State {
    AwaitingResponse,
    Done,
}

struct CramMd5 {
    auth: Arc<dyn Authenticator>,
    challenge: Vec<u8>,
    state: CramMd5State,
}

impl ServerMechanism for CramMd5 {
    fn name(&self) -> &str {
        "CRAM-MD5"
    }

    fn next(&mut self, response: &[u8]) -> Result<(Option<Vec<u8>>, bool)> {
        match self.state {
            CramMd5State::Done => return Err(Error::bad("mechanism already completed")),
            CramMd5State::AwaitingResponse => {}
        }
        self.state = CramMd5State::Done;

        // The very first call carries no data of its own; the challenge is
        // delivered as this mechanism's initial outbound message, so
        // `next` is called once to emit it and once more with the client's
        // reply. Detect the "emit the challenge" call by an empty input.
        if response.is_empty() {
            self.state = CramMd5State::AwaitingResponse;
            return Ok((Some(format!("<{}>", hex::encode(&self.challenge)).into_bytes()), false));
        }

        let text = std::str::from_utf8(response).map_err(|_| Error::bad("CRAM-MD5 response is not valid UTF-8"))?;
        let (username, digest_hex) = text
            .rsplit_once(' ')
            .ok_or_else(|| Error::bad("malformed CRAM-MD5 response"))?;

        self.auth.authenticate(
            "CRAM-MD5",
            &username.to_string(),
            &Credentials::ChallengeResponse {
                challenge: Secret::new(self.challenge.clone()),
                digest_hex: Secret::new(digest_hex.to_string()),
            },
        )?;
        Ok((None, true))
    }
}

mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

// --- OAUTHBEARER (RFC 7628) ----------------------------------------------

enum OAuthBearerState {
    AwaitingInitial,
    AwaitingErrorAck,
    Done,
}

struct OAuthBearer {
    auth: Arc<dyn Authenticator>,
    state: OAuthBearerState,
}

impl ServerMechanism for OAuthBearer {
    fn name(&self) -> &str {
        "OAUTHBEARER"
    }

    fn next(&mut self, response: &[u8]) -> Result<(Option<Vec<u8>>, bool)> {
        match self.state {
            OAuthBearerState::Done => return Err(Error::bad("mechanism already completed")),
            OAuthBearerState::AwaitingErrorAck => {
                self.state = OAuthBearerState::Done;
                // Client acknowledged our error with a lone 0x01; the
                // exchange fails regardless of what it sends.
                return Err(Error::no("authentication failed"));
            }
            OAuthBearerState::AwaitingInitial => {}
        }

        let text = std::str::from_utf8(response).map_err(|_| Error::bad("OAUTHBEARER message is not valid UTF-8"))?;
        // GS2 header: "n,a=<authzid>," or "n,,"
        let rest = text
            .strip_prefix("n,")
            .ok_or_else(|| Error::bad("malformed OAUTHBEARER GS2 header"))?;
        let (_gs2_authzid, rest) = match rest.strip_prefix("a=") {
            Some(after) => {
                let end = after.find(',').ok_or_else(|| Error::bad("malformed OAUTHBEARER GS2 header"))?;
                (Some(after[..end].to_string()), &after[end + 1..])
            }
            None => (None, rest.strip_prefix(',').unwrap_or(rest)),
        };

        let mut token = None;
        for field in rest.split('\x01').filter(|s| !s.is_empty()) {
            if let Some(value) = field.strip_prefix("auth=Bearer ") {
                token = Some(value.to_string());
            }
        }
        let token = token.ok_or_else(|| Error::bad("OAUTHBEARER message has no bearer token"))?;

        match self
            .auth
            .authenticate("OAUTHBEARER", &String::new(), &Credentials::Bearer(Secret::new(token)))
        {
            Ok(()) => {
                self.state = OAuthBearerState::Done;
                Ok((None, true))
            }
            Err(_) => {
                self.state = OAuthBearerState::AwaitingErrorAck;
                let error_json = br#"{"status":"invalid_token"}"#.to_vec();
                Ok((Some(error_json), false))
            }
        }
    }
}

// --- SCRAM-SHA-1 / SCRAM-SHA-256 (RFC 5802/7677) --------------------------
//
// The mechanism only drives the wire shape: it combines nonces and (when a
// `ScramCredentialLookup` is wired up) the stored salt/iteration count into
// the server-first message, then hands the whole transcript to
// `Authenticator::authenticate` for the backend to redo the SCRAM math
// itself against its own credential store (see
// `crate::authenticator::Credentials::Scram`).

enum ScramState {
    AwaitingClientFirst,
    AwaitingClientFinal,
    Done,
}

struct Scram {
    variant: String,
    auth: Arc<dyn Authenticator>,
    lookup: Option<Arc<dyn ScramCredentialLookup>>,
    state: ScramState,
    client_first_bare: String,
    server_first: String,
}

fn random_nonce() -> String {
    let mut raw = [0u8; 18];
    rand::thread_rng().fill_bytes(&mut raw);
    base64::engine::general_purpose::STANDARD.encode(raw)
}

impl ServerMechanism for Scram {
    fn name(&self) -> &str {
        &self.variant
    }

    fn next(&mut self, response: &[u8]) -> Result<(Option<Vec<u8>>, bool)> {
        match std::mem::replace(&mut self.state, ScramState::Done) {
            ScramState::AwaitingClientFirst => {
                let text = std::str::from_utf8(response).map_err(|_| Error::bad("SCRAM message is not valid UTF-8"))?;
                let bare = text
                    .strip_prefix("n,,")
                    .or_else(|| text.strip_prefix("y,,"))
                    .ok_or_else(|| Error::bad("malformed SCRAM client-first-message"))?;
                let username = bare
                    .split(',')
                    .find_map(|f| f.strip_prefix("n="))
                    .ok_or_else(|| Error::bad("malformed SCRAM client-first-message"))?;
                let client_nonce = bare
                    .split(',')
                    .find_map(|f| f.strip_prefix("r="))
                    .ok_or_else(|| Error::bad("malformed SCRAM client-first-message"))?;

                let identity = username.replace("=2C", ",").replace("=3D", "=");
                let creds = self
                    .lookup
                    .as_ref()
                    .and_then(|lookup| lookup.lookup(&identity))
                    .unwrap_or(crate::authenticator::ScramCredentials {
                        salt: b"unconfigured-scram-salt".to_vec(),
                        iterations: 4096,
                    });

                let server_nonce = format!("{client_nonce}{}", random_nonce());
                let salt_b64 = base64::engine::general_purpose::STANDARD.encode(&creds.salt);
                let server_first = format!("r={server_nonce},s={salt_b64},i={}", creds.iterations);

                self.client_first_bare = bare.to_string();
                self.server_first = server_first.clone();
                self.state = ScramState::AwaitingClientFinal;
                Ok((Some(server_first.into_bytes()), false))
            }
            ScramState::AwaitingClientFinal => {
                let text = std::str::from_utf8(response).map_err(|_| Error::bad("SCRAM message is not valid UTF-8"))?;
                let comma_p = text.rfind(",p=").ok_or_else(|| Error::bad("malformed SCRAM client-final-message"))?;
                let without_proof = text[..comma_p].to_string();
                let proof = text[comma_p + 3..].to_string();

                let identity = self
                    .client_first_bare
                    .split(',')
                    .find_map(|f| f.strip_prefix("n="))
                    .unwrap_or_default()
                    .replace("=2C", ",")
                    .replace("=3D", "=");

                self.auth.authenticate(
                    &self.variant,
                    &identity,
                    &Credentials::Scram {
                        client_first_bare: self.client_first_bare.clone(),
                        server_first: self.server_first.clone(),
                        client_final_without_proof: without_proof,
                        client_proof_base64: Secret::new(proof),
                    },
                )?;
                Ok((None, true))
            }
            ScramState::Done => Err(Error::bad("mechanism already completed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authenticator::StaticAuthenticator;

    #[test]
    fn plain_mechanism_verifies_credentials() {
        let registry = SaslRegistry::with_builtins();
        let auth: Arc<dyn Authenticator> = Arc::new(StaticAuthenticator::new("alice", "hunter2"));
        let mut mech = registry.start_server("plain", auth).unwrap();
        let response = b"\x00alice\x00hunter2";
        let (challenge, done) = mech.next(response).unwrap();
        assert!(challenge.is_none());
        assert!(done);
    }

    #[test]
    fn plain_mechanism_rejects_bad_password() {
        let registry = SaslRegistry::with_builtins();
        let auth: Arc<dyn Authenticator> = Arc::new(StaticAuthenticator::new("alice", "hunter2"));
        let mut mech = registry.start_server("PLAIN", auth).unwrap();
        assert!(mech.next(b"\x00alice\x00wrong").is_err());
    }

    #[test]
    fn login_mechanism_round_trips_two_steps() {
        let registry = SaslRegistry::with_builtins();
        let auth: Arc<dyn Authenticator> = Arc::new(StaticAuthenticator::new("alice", "hunter2"));
        let mut mech = registry.start_server("LOGIN", auth).unwrap();
        let (challenge, done) = mech.next(b"").unwrap();
        assert_eq!(challenge, Some(b"Password:".to_vec()));
        assert!(!done);
        let (challenge, done) = mech.next(b"hunter2").unwrap();
        assert!(challenge.is_none());
        assert!(done);
    }

    #[test]
    fn cram_md5_emits_unique_angle_bracketed_challenge() {
        let registry = SaslRegistry::with_builtins();
        let auth: Arc<dyn Authenticator> = Arc::new(StaticAuthenticator::new("alice", "hunter2"));
        let mut mech = registry.start_server("CRAM-MD5", auth).unwrap();
        let (challenge, done) = mech.next(b"").unwrap();
        let challenge = challenge.unwrap();
        assert!(challenge.starts_with(b"<"));
        assert!(challenge.ends_with(b">"));
        assert!(!done);
    }

    #[test]
    fn mechanism_rejects_reuse_after_done() {
        let registry = SaslRegistry::with_builtins();
        let auth: Arc<dyn Authenticator> = Arc::new(StaticAuthenticator::new("alice", "hunter2"));
        let mut mech = registry.start_server("PLAIN", auth).unwrap();
        mech.next(b"\x00alice\x00hunter2").unwrap();
        assert!(mech.next(b"\x00alice\x00hunter2").is_err());
    }

    #[test]
    fn registry_names_are_case_insensitive() {
        let registry = SaslRegistry::with_builtins();
        assert!(registry.server_names().contains(&"PLAIN".to_string()));
        let auth: Arc<dyn Authenticator> = Arc::new(StaticAuthenticator::new("alice", "hunter2"));
        assert!(registry.start_server("plain", auth).is_some());
    }

    #[test]
    fn oauthbearer_parses_bearer_token() {
        struct AcceptAny;
        impl Authenticator for AcceptAny {
            fn authenticate(&self, _m: &str, _i: &Identity, _c: &Credentials) -> Result<()> {
                Ok(())
            }
        }
        let registry = SaslRegistry::with_builtins();
        let auth: Arc<dyn Authenticator> = Arc::new(AcceptAny);
        let mut mech = registry.start_server("OAUTHBEARER", auth).unwrap();
        let msg = b"n,a=user@example.com,\x01host=imap.example.com\x01port=993\x01auth=Bearer abcd1234\x01\x01";
        let (challenge, done) = mech.next(msg).unwrap();
        assert!(challenge.is_none());
        assert!(done);
    }
}
