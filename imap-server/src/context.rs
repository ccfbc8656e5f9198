//! [`CommandContext`]: the bundle a [`crate::dispatcher::CommandHandler`]
//! receives for one in-flight command (§4.5 "materializes a
//! `CommandContext`").
//!
//! The wire decoder in `imap-codec` parses a whole command line eagerly
//! (literals and all) rather than exposing an argument-at-a-time cursor,
//! so there is no residual-argument decoder to carry here the way §4.1
//! describes for a streaming grammar; `body` already holds every argument
//! a handler needs.

use imap_types::capability::CapabilitySet;
use imap_types::command::CommandBody;
use imap_types::core::Tag;
use imap_types::response::{Code, Data};
use imap_types::state::SelectedMailbox;

use crate::session::Session;
use crate::state::StateMachine;

/// What a handler hands back when it has nothing more specific to say:
/// the dispatcher/connection writes the default `tag OK <NAME> completed`
/// line. [`Self::WithCode`] lets a handler (or a wrapping extension) echo
/// a response code (`APPENDUID`, `COPYUID`, `MODIFIED`, …) alongside a
/// custom completion text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaggedOutcome {
    Default,
    WithCode { code: Code, text: String },
}

impl TaggedOutcome {
    pub fn with_code(code: Code, text: impl Into<String>) -> Self {
        Self::WithCode { code, text: text.into() }
    }
}

/// Everything a handler needs to do its work and report back, borrowed
/// from the owning [`crate::connection::Connection`] for the duration of
/// one command.
pub struct CommandContext<'a, S: Session> {
    pub tag: Tag,
    /// Upper-cased base command name (`FETCH`, `STORE`, …); the `UID`
    /// prefix has already been folded into `num_kind` by the decoder.
    pub command_name: &'static str,
    pub body: CommandBody,
    pub session: &'a mut S,
    pub state: &'a StateMachine,
    pub selected: &'a mut Option<SelectedMailbox>,
    pub enabled: &'a mut CapabilitySet,
    pub capabilities: &'a CapabilitySet,
    /// Set once `ENABLE UIDONLY` has taken effect (§4.4): response
    /// writers downstream of a handler consult this to choose `FETCH` vs
    /// `UIDFETCH`, `EXPUNGE` vs `VANISHED`.
    pub uid_only: bool,
    emit: &'a mut dyn FnMut(Data),
    cancelled: &'a dyn Fn() -> bool,
}

impl<'a, S: Session> CommandContext<'a, S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tag: Tag,
        command_name: &'static str,
        body: CommandBody,
        session: &'a mut S,
        state: &'a StateMachine,
        selected: &'a mut Option<SelectedMailbox>,
        enabled: &'a mut CapabilitySet,
        capabilities: &'a CapabilitySet,
        uid_only: bool,
        emit: &'a mut dyn FnMut(Data),
        cancelled: &'a dyn Fn() -> bool,
    ) -> Self {
        Self {
            tag,
            command_name,
            body,
            session,
            state,
            selected,
            enabled,
            capabilities,
            uid_only,
            emit,
            cancelled,
        }
    }

    /// Streams one untagged response line. Handlers must call this rather
    /// than write to the connection directly so the encoder serialization
    /// (§5 "writes go through a serialized encoder") and the UIDONLY
    /// rewrite stay centralized.
    pub fn emit(&mut self, data: Data) {
        (self.emit)(data);
    }

    /// Observed by long-running handlers per §5 "handlers should observe
    /// it during long-running session calls".
    pub fn is_cancelled(&self) -> bool {
        (self.cancelled)()
    }
}
