//! The per-connection runtime (§5 "Connection lifecycle"): reads
//! [`imap_codec::framing::Event`]s off a framed transport, drives
//! `AUTHENTICATE`/`STARTTLS`/`IDLE` (which need more than one round trip
//! and so cannot be ordinary one-shot [`crate::dispatcher::CommandHandler`]s),
//! and routes everything else through the shared [`crate::dispatcher::Dispatcher`].
//!
//! [`Shared`] holds everything built once per server (the dispatcher with
//! every builtin and extension handler registered, the SASL registry, the
//! authenticator, metrics, the rate limiter); [`Connection`] holds
//! everything scoped to one client.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::Engine;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use imap_codec::framing::{Action, Event, ImapServerCodec, ImapServerCodecError, LineMode};
use imap_types::auth::{AuthMechanism, AuthenticateData};
use imap_types::capability::{Capability, CapabilitySet};
use imap_types::command::{Command, CommandBody};
use imap_types::core::Tag;
use imap_types::response::{Code, Continuation, Data, ErrorKind, Greeting, StatusKind, StatusResponse};
use imap_types::secret::Secret;
use imap_types::state::{SelectedMailbox, State};

use crate::authenticator::Authenticator;
use crate::config::ServerConfig;
use crate::context::{CommandContext, TaggedOutcome};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::extensions::{Extension, ExtensionLoadError, ExtensionRegistry};
use crate::handlers;
use crate::metrics::Metrics;
use crate::middleware::{self, ConnectionIdAllocator, RateLimiter};
use crate::sasl::SaslRegistry;
use crate::session::{IdleEvent, Session};
use crate::state::StateMachine;

/// Anything a connection can be built on top of. Blanket-implemented for
/// every `AsyncRead + AsyncWrite` stream so a plain TCP socket and a
/// post-`STARTTLS` TLS stream are interchangeable once boxed.
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

pub type BoxedStream = Box<dyn Stream>;

/// The `STARTTLS` hook (§4.6): wraps a plaintext stream in a TLS session.
/// Written by hand rather than with an `async fn` in the trait — nothing
/// else in this workspace reaches for an attribute macro to get there, so
/// this follows the same boxed-future shape [`crate::authenticator::Authenticator`]'s
/// synchronous cousin avoids needing altogether.
pub trait TlsUpgrade: Send + Sync {
    fn upgrade(&self, io: BoxedStream) -> Pin<Box<dyn Future<Output = Result<BoxedStream>> + Send>>;
}

/// Everything built once per server and shared by every [`Connection`].
pub struct Shared<S: Session> {
    config: ServerConfig,
    capabilities: CapabilitySet,
    sasl: Arc<SaslRegistry>,
    authenticator: Arc<dyn Authenticator>,
    metrics: Arc<Metrics>,
    rate_limiter: Arc<RateLimiter>,
    ids: Arc<ConnectionIdAllocator>,
    extensions: Arc<ExtensionRegistry<S>>,
    base_dispatcher: Arc<Dispatcher<S>>,
    tls: Option<Arc<dyn TlsUpgrade>>,
}

impl<S: Session + 'static> Shared<S> {
    /// Registers the builtin handlers, loads `extensions` in dependency
    /// order (merging their capabilities and wrappers), and computes the
    /// capability set a fresh connection starts with.
    pub fn new(
        config: ServerConfig,
        authenticator: Arc<dyn Authenticator>,
        sasl: Arc<SaslRegistry>,
        extensions: Vec<Arc<dyn Extension<S>>>,
        tls: Option<Arc<dyn TlsUpgrade>>,
    ) -> std::result::Result<Self, ExtensionLoadError> {
        let mut dispatcher = Dispatcher::new();
        handlers::register_builtin(&mut dispatcher);

        let mut capabilities = config.initial_capabilities.clone();
        if tls.is_some() {
            capabilities.insert(Capability::new("STARTTLS"));
        }

        let registry = ExtensionRegistry::load(extensions, &mut dispatcher, &mut capabilities)?;

        let rate_limiter = Arc::new(RateLimiter::new(config.max_commands_per_second as u32, config.burst_size));

        Ok(Self {
            config,
            capabilities,
            sasl,
            authenticator,
            metrics: Arc::new(Metrics::new()),
            rate_limiter,
            ids: Arc::new(ConnectionIdAllocator::default()),
            extensions: Arc::new(registry),
            base_dispatcher: Arc::new(dispatcher),
            tls,
        })
    }
}

/// One client's worth of connection state: the framed transport, the
/// session it fronts, the state machine, and a per-connection clone of
/// the dispatcher with middleware installed (§4.7).
pub struct Connection<S: Session> {
    id: u64,
    framed: Framed<BoxedStream, ImapServerCodec>,
    session: S,
    state: StateMachine,
    selected: Option<SelectedMailbox>,
    capabilities: CapabilitySet,
    enabled: CapabilitySet,
    uid_only: bool,
    dispatcher: Dispatcher<S>,
    sasl: Arc<SaslRegistry>,
    authenticator: Arc<dyn Authenticator>,
    extensions: Arc<ExtensionRegistry<S>>,
    metrics: Arc<Metrics>,
    rate_limiter: Arc<RateLimiter>,
    max_literal_size: usize,
    tls: Option<Arc<dyn TlsUpgrade>>,
    cancelled: Arc<AtomicBool>,
}

impl<S: Session + 'static> Connection<S> {
    pub fn new(io: impl Stream + 'static, session: S, shared: &Shared<S>) -> Self {
        let id = shared.ids.next();

        let mut dispatcher = (*shared.base_dispatcher).clone();
        middleware::install(
            &mut dispatcher,
            shared.metrics.clone(),
            shared.rate_limiter.clone(),
            id,
            shared.config.command_timeout,
        );

        let boxed: BoxedStream = Box::new(io);
        let framed = Framed::new(boxed, ImapServerCodec::new(shared.config.max_literal_size));

        Self {
            id,
            framed,
            session,
            state: StateMachine::new(State::NotAuthenticated),
            selected: None,
            capabilities: shared.capabilities.clone(),
            enabled: CapabilitySet::new(),
            uid_only: false,
            dispatcher,
            sasl: shared.sasl.clone(),
            authenticator: shared.authenticator.clone(),
            extensions: shared.extensions.clone(),
            metrics: shared.metrics.clone(),
            rate_limiter: shared.rate_limiter.clone(),
            max_literal_size: shared.config.max_literal_size,
            tls: shared.tls.clone(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle a supervising task can flip to ask a long-running handler
    /// to wind down early; observed via [`CommandContext::is_cancelled`].
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Sends the greeting and reads commands until `LOGOUT` (or the
    /// client disconnects), dispatching each one and writing back
    /// whatever response it produces.
    pub async fn run(mut self) -> Result<()> {
        let greeting = Greeting {
            kind: StatusKind::Ok,
            code: Some(Code::Capability(self.capabilities.iter().map(|c| c.as_str().to_string()).collect())),
            text: "IMAP4rev2 server ready".to_string(),
        };
        self.framed.send(&greeting).await?;

        loop {
            if self.state.current() == State::Logout {
                break;
            }

            match self.framed.next().await {
                None => break,
                Some(Ok(Event::Command(cmd))) => {
                    self = self.handle_command(cmd).await?;
                }
                Some(Ok(Event::ActionRequired(Action::SendLiteralAck(_size)))) => {
                    self.framed.send(&Continuation("ready for literal".to_string())).await?;
                }
                Some(Ok(Event::ActionRequired(Action::SendLiteralReject(size)))) => {
                    let resp = StatusResponse::untagged(StatusKind::Bad, None, format!("literal too large ({size} bytes)"));
                    self.framed.send(&resp).await?;
                }
                Some(Ok(Event::AuthContinuation(_))) | Some(Ok(Event::IdleDone)) => {
                    let resp = StatusResponse::untagged(StatusKind::Bad, None, "unexpected continuation data");
                    self.framed.send(&resp).await?;
                }
                Some(Err(ImapServerCodecError::Io(io_err))) => {
                    self.rate_limiter.forget(self.id);
                    return Err(io_err.into());
                }
                Some(Err(err)) => {
                    let resp = StatusResponse::untagged(StatusKind::Bad, None, err.to_string());
                    self.framed.send(&resp).await?;
                }
            }
        }

        self.rate_limiter.forget(self.id);
        Ok(())
    }

    /// `STARTTLS`, `AUTHENTICATE`, and `IDLE` each need more than a single
    /// handler call; everything else goes through [`Self::dispatch`].
    async fn handle_command(mut self, cmd: Command) -> Result<Self> {
        let Command { tag, body } = cmd;
        match body {
            CommandBody::StartTls => self.handle_starttls(tag).await,
            CommandBody::Authenticate { mechanism, initial_response } => {
                self.handle_authenticate(tag, mechanism, initial_response).await?;
                Ok(self)
            }
            CommandBody::Idle => self.handle_idle(tag).await,
            other => {
                self.dispatch(tag, other).await?;
                Ok(self)
            }
        }
    }

    /// Looks up `body`'s handler, materializes a [`CommandContext`],
    /// writes whatever untagged data it emitted, then writes the tagged
    /// completion (§4.5).
    async fn dispatch(&mut self, tag: Tag, body: CommandBody) -> Result<()> {
        let name = body.name();

        let Some(handler) = self.dispatcher.get(name) else {
            let resp = StatusResponse::tagged(tag, StatusKind::Bad, None, format!("{name} unknown command"));
            self.framed.send(&resp).await?;
            return Ok(());
        };

        let mut emitted: Vec<Data> = Vec::new();
        let mut emit = |data: Data| emitted.push(data);

        let cancelled = self.cancelled.clone();
        let is_cancelled = move || cancelled.load(Ordering::Relaxed);

        let outcome = {
            let mut ctx = CommandContext::new(
                tag.clone(),
                name,
                body,
                &mut self.session,
                &self.state,
                &mut self.selected,
                &mut self.enabled,
                &self.capabilities,
                self.uid_only,
                &mut emit,
                &is_cancelled,
            );
            handler.handle(&mut ctx)
        };

        for data in &emitted {
            if let Data::Enabled(names) = data {
                for name in names {
                    self.extensions.notify_enabled(name, self.id)?;
                }
            }
        }

        for data in emitted {
            self.framed.send(&data).await?;
        }

        match outcome {
            Ok(TaggedOutcome::Default) => {
                let resp = StatusResponse::tagged(tag, StatusKind::Ok, None, format!("{name} completed"));
                self.framed.send(&resp).await?;
            }
            Ok(TaggedOutcome::WithCode { code, text }) => {
                let resp = StatusResponse::tagged(tag, StatusKind::Ok, Some(code), text);
                self.framed.send(&resp).await?;
            }
            Err(err) => {
                let protocol_err = err.into_protocol();
                let is_bye = protocol_err.kind == ErrorKind::Bye;
                let resp = StatusResponse::from_error(tag, &protocol_err);
                self.framed.send(&resp).await?;
                if is_bye {
                    let _ = self.state.transition(State::Logout);
                }
            }
        }

        if self.enabled.contains("UIDONLY") {
            self.uid_only = true;
        }

        Ok(())
    }

    /// `STARTTLS` (§4.6): only valid before authentication, and only once
    /// a [`TlsUpgrade`] hook has been wired up. Destructures and rebuilds
    /// the connection around the upgraded transport rather than trying to
    /// swap `self.framed`'s generic parameter in place.
    async fn handle_starttls(mut self, tag: Tag) -> Result<Self> {
        if let Err(err) = self.state.require(&[State::NotAuthenticated]) {
            let resp = StatusResponse::from_error(tag, &err);
            self.framed.send(&resp).await?;
            return Ok(self);
        }

        let Some(upgrader) = self.tls.clone() else {
            let resp = StatusResponse::tagged(tag, StatusKind::Bad, None, "STARTTLS not available");
            self.framed.send(&resp).await?;
            return Ok(self);
        };

        let resp = StatusResponse::tagged(tag, StatusKind::Ok, None, "begin TLS negotiation now");
        self.framed.send(&resp).await?;

        let Connection {
            framed,
            session,
            state,
            selected,
            mut capabilities,
            enabled,
            uid_only,
            dispatcher,
            sasl,
            authenticator,
            extensions,
            metrics,
            rate_limiter,
            max_literal_size,
            tls,
            cancelled,
            id,
        } = self;

        let parts = framed.into_parts();
        let upgraded = upgrader.upgrade(parts.io).await?;
        capabilities.remove("STARTTLS");

        let new_framed = Framed::new(upgraded, ImapServerCodec::new(max_literal_size));

        Ok(Connection {
            id,
            framed: new_framed,
            session,
            state,
            selected,
            capabilities,
            enabled,
            uid_only,
            dispatcher,
            sasl,
            authenticator,
            extensions,
            metrics,
            rate_limiter,
            max_literal_size,
            tls,
            cancelled,
        })
    }

    /// `AUTHENTICATE` (§4.3): drives a [`crate::sasl::ServerMechanism`]
    /// through its challenge/response loop, switching the codec into
    /// [`LineMode::AuthenticateContinuation`] for the duration so plain
    /// base64 lines (not full commands) are expected back.
    async fn handle_authenticate(
        &mut self,
        tag: Tag,
        mechanism: AuthMechanism,
        initial_response: Option<Secret<Vec<u8>>>,
    ) -> Result<()> {
        self.state.require(&[State::NotAuthenticated])?;

        let Some(mut mech) = self.sasl.start_server(mechanism.as_str(), self.authenticator.clone()) else {
            let resp = StatusResponse::tagged(tag, StatusKind::No, None, format!("unsupported mechanism {}", mechanism.as_str()));
            self.framed.send(&resp).await?;
            return Ok(());
        };

        self.framed.codec_mut().set_mode(LineMode::AuthenticateContinuation);

        let mut response = initial_response.map(Secret::into_inner).unwrap_or_default();

        let outcome: std::result::Result<(), Error> = loop {
            match mech.next(&response) {
                Ok((Some(challenge), false)) => {
                    let encoded = base64::engine::general_purpose::STANDARD.encode(&challenge);
                    if let Err(err) = self.framed.send(&Continuation(encoded)).await {
                        break Err(err.into());
                    }

                    match self.framed.next().await {
                        Some(Ok(Event::AuthContinuation(AuthenticateData::Response(secret)))) => {
                            response = secret.into_inner();
                        }
                        Some(Ok(Event::AuthContinuation(AuthenticateData::Cancel))) => {
                            break Err(Error::bad("authentication cancelled"));
                        }
                        Some(Ok(_)) => break Err(Error::bad("expected AUTHENTICATE continuation data")),
                        Some(Err(err)) => break Err(err.into()),
                        None => break Err(Error::bye("connection closed during authentication")),
                    }
                }
                Ok((None, true)) => break Ok(()),
                Ok((Some(_), true)) | Ok((None, false)) => break Err(Error::bad("mechanism returned an inconsistent state")),
                Err(err) => break Err(err),
            }
        };

        self.framed.codec_mut().set_mode(LineMode::Command);

        match outcome {
            Ok(()) => {
                self.state.transition(State::Authenticated)?;
                let caps = self.capabilities.iter().map(|c| c.as_str().to_string()).collect();
                let resp = StatusResponse::tagged(tag, StatusKind::Ok, Some(Code::Capability(caps)), "AUTHENTICATE completed");
                self.framed.send(&resp).await?;
            }
            Err(err) => {
                let protocol_err = err.into_protocol();
                let resp = StatusResponse::from_error(tag, &protocol_err);
                self.framed.send(&resp).await?;
            }
        }

        Ok(())
    }

    /// `IDLE` (§4.6): acknowledges with a `+` continuation, then waits for
    /// either `DONE` on the wire or an asynchronous update from the
    /// session, whichever comes first. [`Session::idle`] is synchronous
    /// and may block, so it runs on a blocking-pool thread; the session
    /// value itself moves there and back across the call, since nothing
    /// else may touch it while idling.
    async fn handle_idle(mut self, tag: Tag) -> Result<Self> {
        if let Err(err) = self.state.require(&[State::Authenticated, State::Selected]) {
            let resp = StatusResponse::from_error(tag, &err);
            self.framed.send(&resp).await?;
            return Ok(self);
        }

        self.framed.send(&Continuation("idling".to_string())).await?;
        self.framed.codec_mut().set_mode(LineMode::IdleDone);

        let done = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<IdleEvent>();

        let blocking_done = done.clone();
        let mut session = self.session;
        let idle_task = tokio::task::spawn_blocking(move || {
            let mut push = |event: IdleEvent| {
                let _ = tx.send(event);
            };
            let is_done = || blocking_done.load(Ordering::Relaxed);
            let result = session.idle(&mut push, &is_done);
            (session, result)
        });

        enum Step {
            Pushed(IdleEvent),
            Done,
            Closed,
            Unexpected,
            ReadError(ImapServerCodecError),
        }

        loop {
            let step = tokio::select! {
                biased;
                Some(event) = rx.recv() => Step::Pushed(event),
                next = self.framed.next() => match next {
                    Some(Ok(Event::IdleDone)) => Step::Done,
                    Some(Ok(_)) => Step::Unexpected,
                    Some(Err(err)) => Step::ReadError(err),
                    None => Step::Closed,
                },
            };

            match step {
                Step::Pushed(event) => {
                    let data = match event {
                        IdleEvent::Exists(n) => Data::Exists(n),
                        IdleEvent::Expunge(n) => Data::Expunge(n),
                        IdleEvent::FetchFlags { seq_or_uid, flags } => Data::Fetch(imap_types::fetch::FetchItem {
                            seq_or_uid,
                            attributes: vec![imap_types::fetch::FetchAttributeValue::Flags(flags)],
                        }),
                    };
                    self.framed.send(&data).await?;
                }
                Step::Done | Step::Closed => {
                    done.store(true, Ordering::Relaxed);
                    break;
                }
                Step::Unexpected => {
                    let resp = StatusResponse::untagged(StatusKind::Bad, None, "expected DONE");
                    self.framed.send(&resp).await?;
                }
                Step::ReadError(err) => {
                    done.store(true, Ordering::Relaxed);
                    let _ = idle_task.await;
                    return Err(err.into());
                }
            }
        }

        self.framed.codec_mut().set_mode(LineMode::Command);

        let (session, idle_result) = idle_task.await.map_err(|_| Error::no("idle task panicked"))?;
        self.session = session;

        match idle_result {
            Ok(()) => {
                let resp = StatusResponse::tagged(tag, StatusKind::Ok, None, "IDLE completed");
                self.framed.send(&resp).await?;
            }
            Err(err) => {
                let resp = StatusResponse::from_error(tag, &err.into_protocol());
                self.framed.send(&resp).await?;
            }
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authenticator::StaticAuthenticator;
    use crate::session::test_double::MemorySession;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_shared() -> Shared<MemorySession> {
        Shared::new(
            ServerConfig::default(),
            Arc::new(StaticAuthenticator::new("alice", "hunter2")),
            Arc::new(SaslRegistry::with_builtins()),
            Vec::new(),
            None,
        )
        .unwrap()
    }

    struct IdentityTls;
    impl TlsUpgrade for IdentityTls {
        fn upgrade(&self, io: BoxedStream) -> Pin<Box<dyn Future<Output = Result<BoxedStream>> + Send>> {
            Box::pin(async move { Ok(io) })
        }
    }

    #[tokio::test]
    async fn greeting_advertises_capabilities() {
        let (mut client, server) = tokio::io::duplex(8192);
        let shared = test_shared();
        let connection = Connection::new(server, MemorySession::with_inbox(), &shared);

        tokio::spawn(async move {
            let _ = connection.run().await;
        });

        let mut buf = vec![0u8; 4096];
        let n = client.read(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
        assert!(text.starts_with("* OK"));
        assert!(text.contains("CAPABILITY"));
    }

    #[tokio::test]
    async fn noop_completes_with_tagged_ok() {
        let (mut client, server) = tokio::io::duplex(4096);
        let shared = test_shared();
        let mut connection = Connection::new(server, MemorySession::with_inbox(), &shared);
        connection.state.transition(State::Authenticated).unwrap();

        let tag = Tag::try_from("a1").unwrap();
        connection.dispatch(tag, CommandBody::Noop).await.unwrap();

        let mut buf = vec![0u8; 4096];
        let n = client.read(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
        assert!(text.contains("a1 OK"));
    }

    #[tokio::test]
    async fn enable_notifies_the_matching_extension() {
        use std::sync::Mutex;
        use imap_types::command::CommandBody;

        struct Recording(Arc<Mutex<Vec<u64>>>);
        impl Extension<MemorySession> for Recording {
            fn name(&self) -> &'static str {
                "UIDONLY"
            }
            fn capabilities(&self) -> Vec<Capability> {
                vec![Capability::new("UIDONLY")]
            }
            fn on_enabled(&self, connection_id: u64) -> Result<()> {
                self.0.lock().unwrap().push(connection_id);
                Ok(())
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let shared = Shared::new(
            ServerConfig::default(),
            Arc::new(StaticAuthenticator::new("alice", "hunter2")),
            Arc::new(SaslRegistry::with_builtins()),
            vec![Arc::new(Recording(seen.clone()))],
            None,
        )
        .unwrap();
        let (_client, server) = tokio::io::duplex(4096);
        let mut connection = Connection::new(server, MemorySession::with_inbox(), &shared);
        connection.state.transition(State::Authenticated).unwrap();

        let tag = Tag::try_from("a1").unwrap();
        connection
            .dispatch(tag, CommandBody::Enable { capabilities: vec!["UIDONLY".to_string()] })
            .await
            .unwrap();

        assert_eq!(&*seen.lock().unwrap(), &[connection.id]);
    }

    #[tokio::test]
    async fn dispatch_reports_unknown_command_as_tagged_bad() {
        let (mut client, server) = tokio::io::duplex(4096);
        let shared = test_shared();
        let mut connection = Connection::new(server, MemorySession::with_inbox(), &shared);
        connection.dispatcher = Dispatcher::new();

        let tag = Tag::try_from("a1").unwrap();
        connection.dispatch(tag, CommandBody::Noop).await.unwrap();

        let mut buf = vec![0u8; 4096];
        let n = client.read(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
        assert!(text.contains("a1 BAD"));
    }

    #[tokio::test]
    async fn oversized_literal_is_rejected() {
        let (mut client, server) = tokio::io::duplex(8192);
        let mut config = ServerConfig::default();
        config.max_literal_size = 4;
        let shared = Shared::new(
            config,
            Arc::new(StaticAuthenticator::new("alice", "hunter2")),
            Arc::new(SaslRegistry::with_builtins()),
            Vec::new(),
            None,
        )
        .unwrap();
        let connection = Connection::new(server, MemorySession::with_inbox(), &shared);

        tokio::spawn(async move {
            let _ = connection.run().await;
        });

        let mut buf = vec![0u8; 8192];
        let _ = client.read(&mut buf).await.unwrap(); // greeting

        client.write_all(b"a1 APPEND INBOX {100}\r\n").await.unwrap();

        let n = client.read(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
        assert!(text.contains("BAD"));
        assert!(text.contains("literal too large"));
    }

    #[tokio::test]
    async fn starttls_removes_capability_and_rebuilds_connection() {
        let (mut client, server) = tokio::io::duplex(8192);
        let shared = Shared::new(
            ServerConfig::default(),
            Arc::new(StaticAuthenticator::new("alice", "hunter2")),
            Arc::new(SaslRegistry::with_builtins()),
            Vec::new(),
            Some(Arc::new(IdentityTls) as Arc<dyn TlsUpgrade>),
        )
        .unwrap();
        let connection = Connection::new(server, MemorySession::with_inbox(), &shared);
        assert!(connection.capabilities.contains("STARTTLS"));

        let tag = Tag::try_from("a1").unwrap();
        let connection = connection.handle_starttls(tag).await.unwrap();
        assert!(!connection.capabilities.contains("STARTTLS"));

        let mut buf = vec![0u8; 4096];
        let n = client.read(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
        assert!(text.contains("a1 OK"));
    }

    #[tokio::test]
    async fn idle_completes_once_client_sends_done() {
        let (mut client, server) = tokio::io::duplex(8192);
        let shared = test_shared();
        let mut connection = Connection::new(server, MemorySession::with_inbox(), &shared);
        connection.state.transition(State::Authenticated).unwrap();

        let tag = Tag::try_from("a1").unwrap();
        let handle = tokio::spawn(async move { connection.handle_idle(tag).await });

        let mut buf = vec![0u8; 4096];
        let n = client.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("+ "));

        client.write_all(b"DONE\r\n").await.unwrap();

        let n = client.read(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
        assert!(text.contains("a1 OK"));

        let connection = handle.await.unwrap().unwrap();
        assert_eq!(connection.state.current(), State::Authenticated);
    }
}
