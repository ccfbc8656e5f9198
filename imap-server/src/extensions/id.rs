//! A demonstration extension implementing RFC 2971 `ID`: client/server
//! identification as a flat key-value list. Chosen for the worked
//! composition example in §9 because it has no dependencies and no
//! session-capability surface of its own — it only needs a new command
//! handler — so it exercises registration without also entangling the
//! wrapping/probing machinery in its own test.

use std::sync::Arc;

use imap_types::capability::Capability;
use imap_types::response::Data;

use crate::context::{CommandContext, TaggedOutcome};
use crate::dispatcher::CommandHandler;
use crate::error::{Error, Result};
use crate::session::Session;

use super::Extension;

pub struct IdExtension;

impl<S: Session + 'static> Extension<S> for IdExtension {
    fn name(&self) -> &'static str {
        "ID"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::new("ID")]
    }

    fn command_handlers(&self) -> Vec<(&'static str, Arc<dyn CommandHandler<S>>)> {
        vec![("ID", Arc::new(IdHandler))]
    }
}

struct IdHandler;

impl<S: Session> CommandHandler<S> for IdHandler {
    fn handle(&self, ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
        let imap_types::command::CommandBody::Id { parameters } = &ctx.body else {
            return Err(Error::bad("ID handler invoked with mismatched command body"));
        };
        let reply = ctx.session.id(parameters)?;
        ctx.emit(Data::Id(reply));
        Ok(TaggedOutcome::Default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::session::test_double::MemorySession;
    use imap_types::capability::CapabilitySet;
    use imap_types::command::CommandBody;
    use imap_types::core::Tag;
    use imap_types::state::SelectedMailbox;

    use crate::extensions::ExtensionRegistry;
    use crate::state::StateMachine;

    #[test]
    fn id_handler_round_trips_through_session() {
        let mut dispatcher: Dispatcher<MemorySession> = Dispatcher::new();
        let mut caps = CapabilitySet::new();
        ExtensionRegistry::load(vec![Arc::new(IdExtension)], &mut dispatcher, &mut caps).unwrap();
        assert!(caps.contains("ID"));

        let handler = dispatcher.get("ID").unwrap();
        let mut session = MemorySession::with_inbox();
        let state = StateMachine::new(imap_types::state::State::Authenticated);
        let mut selected: Option<SelectedMailbox> = None;
        let mut enabled = CapabilitySet::new();
        let mut emitted = Vec::new();
        let mut emit = |data: imap_types::response::Data| emitted.push(data);
        let cancelled = || false;

        let mut ctx = CommandContext::new(
            Tag::try_from("a1").unwrap(),
            "ID",
            CommandBody::Id { parameters: vec![] },
            &mut session,
            &state,
            &mut selected,
            &mut enabled,
            &caps,
            false,
            &mut emit,
            &cancelled,
        );
        handler.handle(&mut ctx).unwrap();
        assert_eq!(emitted.len(), 1);
        assert!(matches!(emitted[0], imap_types::response::Data::Id(_)));
    }
}
