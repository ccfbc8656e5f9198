//! Core command handlers (§4.6). `AUTHENTICATE`, `STARTTLS`, and `IDLE`
//! are driven directly by [`crate::connection`] instead of being
//! registered here: each needs more than one round trip with the client
//! (a SASL challenge/response loop, a mid-command transport swap, a
//! suspended read loop waiting on `DONE`), which does not fit the
//! one-shot [`crate::dispatcher::CommandHandler`] shape the rest of
//! these commands use.

pub mod mailbox;
pub mod message;

use imap_types::command::CommandBody;
use imap_types::response::Data;
use imap_types::state::State;

use crate::context::{CommandContext, TaggedOutcome};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::session::Session;

/// Registers every handler this module provides into `dispatcher`. Called
/// once at connection (or server) setup, before any extension's own
/// `command_handlers()` run, so an extension wrapping a built-in command
/// always wraps something that is already there (§4.5 point 3).
pub fn register_builtin<S: Session + 'static>(dispatcher: &mut Dispatcher<S>) {
    dispatcher.register("CAPABILITY", std::sync::Arc::new(capability));
    dispatcher.register("NOOP", std::sync::Arc::new(noop));
    dispatcher.register("LOGOUT", std::sync::Arc::new(logout));
    dispatcher.register("LOGIN", std::sync::Arc::new(login));
    dispatcher.register("ENABLE", std::sync::Arc::new(enable));

    mailbox::register(dispatcher);
    message::register(dispatcher);
}

fn capability<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    let names = ctx.capabilities.iter().map(|c| c.as_str().to_string()).collect();
    ctx.emit(Data::Capability(names));
    Ok(TaggedOutcome::Default)
}

fn noop<S: Session>(_ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    Ok(TaggedOutcome::Default)
}

/// `LOGOUT` is valid in every state (§4.6): it always transitions to
/// `Logout`, even mid-`Selected`, and the connection runtime closes the
/// socket once the tagged `OK` is flushed.
fn logout<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.emit(Data::Bye { code: None, text: "logging out".to_string() });
    ctx.state.transition(State::Logout)?;
    Ok(TaggedOutcome::Default)
}

/// Plaintext `LOGIN username password` (§4.6). Distinct from the
/// `AUTHENTICATE` SASL exchange: here the password reaches the backend
/// in the clear over whatever transport is already in place (ideally
/// post-`STARTTLS`), so [`Session::login`] gets to verify it directly
/// rather than through an [`crate::authenticator::Authenticator`].
fn login<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::NotAuthenticated])?;
    let CommandBody::Login { username, password } = &ctx.body else {
        return Err(Error::bad("LOGIN handler invoked with mismatched command body"));
    };
    let username = String::from_utf8_lossy(username.as_bytes()).into_owned();
    let password = String::from_utf8_lossy(password.declassify().as_bytes()).into_owned();
    ctx.session.login(&username, &password)?;
    ctx.state.transition(State::Authenticated)?;
    Ok(TaggedOutcome::Default)
}

/// `ENABLE capability...` (§4.6, §4.4): only capabilities the connection
/// already advertises can be enabled, and enabling is monotonic — already
/// enabled capabilities are silently skipped rather than re-reported.
/// `UIDONLY` is just another name from the dispatcher's point of view;
/// the connection runtime is the one that notices it landed in
/// `ctx.enabled` afterward and starts rendering `UIDFETCH`/`VANISHED`.
fn enable<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    let CommandBody::Enable { capabilities } = &ctx.body else {
        return Err(Error::bad("ENABLE handler invoked with mismatched command body"));
    };
    let mut newly_enabled = Vec::new();
    for name in capabilities {
        if !ctx.capabilities.contains(name) {
            continue;
        }
        if ctx.enabled.insert(imap_types::capability::Capability::new(name.clone())) {
            newly_enabled.push(name.clone());
        }
    }
    ctx.emit(Data::Enabled(newly_enabled));
    Ok(TaggedOutcome::Default)
}
