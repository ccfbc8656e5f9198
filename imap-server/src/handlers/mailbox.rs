//! Mailbox-management commands valid in the `Authenticated` state (§4.6):
//! `SELECT`/`EXAMINE`, `CREATE`/`DELETE`/`RENAME`,
//! `SUBSCRIBE`/`UNSUBSCRIBE`, `LIST`/`LSUB`, `STATUS`.

use std::sync::Arc;

use imap_types::command::CommandBody;
use imap_types::response::{Code, Data};
use imap_types::state::{SelectedMailbox, State};

use crate::context::{CommandContext, TaggedOutcome};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::session::Session;

pub fn register<S: Session + 'static>(dispatcher: &mut Dispatcher<S>) {
    dispatcher.register("SELECT", Arc::new(select));
    dispatcher.register("EXAMINE", Arc::new(examine));
    dispatcher.register("CREATE", Arc::new(create));
    dispatcher.register("DELETE", Arc::new(delete));
    dispatcher.register("RENAME", Arc::new(rename));
    dispatcher.register("SUBSCRIBE", Arc::new(subscribe));
    dispatcher.register("UNSUBSCRIBE", Arc::new(unsubscribe));
    dispatcher.register("LIST", Arc::new(list));
    dispatcher.register("LSUB", Arc::new(lsub));
    dispatcher.register("STATUS", Arc::new(status));
}

/// Shared `SELECT`/`EXAMINE` body: the only difference between the two
/// commands is `read_only` and which state hook fires (§4.6).
fn select_or_examine<S: Session>(ctx: &mut CommandContext<'_, S>, read_only: bool) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Authenticated, State::Selected])?;
    let (mailbox, options) = match &ctx.body {
        CommandBody::Select { mailbox, options } | CommandBody::Examine { mailbox, options } => (mailbox, options),
        _ => return Err(Error::bad("SELECT/EXAMINE handler invoked with mismatched command body")),
    };

    let data = ctx.session.select(mailbox, options, read_only)?;

    ctx.emit(Data::Flags(data.flags.clone()));
    ctx.emit(Data::Exists(data.exists));
    ctx.emit(Data::Recent(data.recent));

    // RFC 3501 §6.3.1/§7.1 make `UIDVALIDITY` and `UIDNEXT` mandatory
    // untagged `OK` lines on every successful SELECT/EXAMINE; the rest are
    // emitted only when the backend's `SelectData` carries them.
    ctx.emit(Data::Ok {
        code: Some(Code::UidValidity(data.uid_validity)),
        text: "UIDVALIDITY".to_string(),
    });
    ctx.emit(Data::Ok {
        code: Some(Code::UidNext(data.uid_next)),
        text: "UIDNEXT".to_string(),
    });
    if let Some(permanent_flags) = &data.permanent_flags {
        ctx.emit(Data::Ok {
            code: Some(Code::PermanentFlags(permanent_flags.clone())),
            text: "PERMANENTFLAGS".to_string(),
        });
    }
    if let Some(unseen) = data.unseen {
        ctx.emit(Data::Ok {
            code: Some(Code::Unseen(unseen)),
            text: "UNSEEN".to_string(),
        });
    }
    if let Some(highest_mod_seq) = data.highest_mod_seq {
        ctx.emit(Data::Ok {
            code: Some(Code::HighestModSeq(highest_mod_seq)),
            text: "HIGHESTMODSEQ".to_string(),
        });
    }
    if let Some(mailbox_id) = &data.mailbox_id {
        ctx.emit(Data::Ok {
            code: Some(Code::MailboxId(mailbox_id.clone())),
            text: "MAILBOXID".to_string(),
        });
    }

    *ctx.selected = Some(SelectedMailbox {
        name: mailbox.clone(),
        read_only,
    });
    ctx.state.transition(State::Selected)?;

    // The one response code RFC 3501 §6.3.1 requires on the tagged
    // completion rather than an untagged `OK` line: READ-ONLY vs
    // READ-WRITE.
    let verb = if read_only { "EXAMINE" } else { "SELECT" };
    let code = if read_only { Code::ReadOnly } else { Code::ReadWrite };
    Ok(TaggedOutcome::with_code(code, format!("{verb} completed")))
}

fn select<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    select_or_examine(ctx, false)
}

fn examine<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    select_or_examine(ctx, true)
}

fn create<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Authenticated, State::Selected])?;
    let CommandBody::Create { mailbox } = &ctx.body else {
        return Err(Error::bad("CREATE handler invoked with mismatched command body"));
    };
    ctx.session.create(mailbox)?;
    Ok(TaggedOutcome::Default)
}

fn delete<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Authenticated, State::Selected])?;
    let CommandBody::Delete { mailbox } = &ctx.body else {
        return Err(Error::bad("DELETE handler invoked with mismatched command body"));
    };
    if mailbox.is_inbox() {
        return Err(Error::no("INBOX may not be deleted"));
    }
    ctx.session.delete(mailbox)?;
    Ok(TaggedOutcome::Default)
}

fn rename<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Authenticated, State::Selected])?;
    let CommandBody::Rename { from, to } = &ctx.body else {
        return Err(Error::bad("RENAME handler invoked with mismatched command body"));
    };
    ctx.session.rename(from, to)?;
    Ok(TaggedOutcome::Default)
}

fn subscribe<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Authenticated, State::Selected])?;
    let CommandBody::Subscribe { mailbox } = &ctx.body else {
        return Err(Error::bad("SUBSCRIBE handler invoked with mismatched command body"));
    };
    ctx.session.subscribe(mailbox)?;
    Ok(TaggedOutcome::Default)
}

fn unsubscribe<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Authenticated, State::Selected])?;
    let CommandBody::Unsubscribe { mailbox } = &ctx.body else {
        return Err(Error::bad("UNSUBSCRIBE handler invoked with mismatched command body"));
    };
    ctx.session.unsubscribe(mailbox)?;
    Ok(TaggedOutcome::Default)
}

fn list<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Authenticated, State::Selected])?;
    let CommandBody::List { reference, pattern, options } = &ctx.body else {
        return Err(Error::bad("LIST handler invoked with mismatched command body"));
    };
    let entries = ctx.session.list(reference, pattern, options)?;
    for entry in entries {
        ctx.emit(Data::List {
            attributes: entry.attributes,
            delimiter: entry.delimiter,
            mailbox: entry.mailbox,
        });
    }
    Ok(TaggedOutcome::Default)
}

fn lsub<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Authenticated, State::Selected])?;
    let CommandBody::Lsub { reference, pattern } = &ctx.body else {
        return Err(Error::bad("LSUB handler invoked with mismatched command body"));
    };
    let entries = ctx.session.lsub(reference, pattern)?;
    for entry in entries {
        ctx.emit(Data::Lsub {
            attributes: entry.attributes,
            delimiter: entry.delimiter,
            mailbox: entry.mailbox,
        });
    }
    Ok(TaggedOutcome::Default)
}

fn status<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Authenticated, State::Selected])?;
    let CommandBody::Status { mailbox, options } = &ctx.body else {
        return Err(Error::bad("STATUS handler invoked with mismatched command body"));
    };
    let attributes = ctx.session.status(mailbox, options)?;
    ctx.emit(Data::Status {
        mailbox: mailbox.clone(),
        attributes,
    });
    Ok(TaggedOutcome::Default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imap_types::capability::CapabilitySet;
    use imap_types::command::{AppendMessage, AppendOptions, SelectOptions};
    use imap_types::core::Tag;
    use imap_types::mailbox::Mailbox;

    use crate::session::test_double::MemorySession;
    use crate::state::StateMachine;

    #[test]
    fn select_emits_uidvalidity_and_uidnext_untagged_ok_lines() {
        let mut session = MemorySession::with_inbox();
        session
            .append(
                &Mailbox::new("INBOX"),
                &[AppendMessage {
                    options: AppendOptions::default(),
                    literal: b"hello".to_vec(),
                }],
            )
            .unwrap();
        let state = StateMachine::new(State::Authenticated);
        let mut selected = None;
        let mut enabled = CapabilitySet::new();
        let caps = CapabilitySet::new();
        let mut emitted = Vec::new();
        let mut emit = |data: Data| emitted.push(data);
        let cancelled = || false;

        let mut ctx = CommandContext::new(
            Tag::try_from("a1").unwrap(),
            "SELECT",
            CommandBody::Select {
                mailbox: Mailbox::new("INBOX"),
                options: SelectOptions::default(),
            },
            &mut session,
            &state,
            &mut selected,
            &mut enabled,
            &caps,
            false,
            &mut emit,
            &cancelled,
        );

        let outcome = select(&mut ctx).unwrap();
        assert_eq!(outcome, TaggedOutcome::with_code(Code::ReadWrite, "SELECT completed"));

        assert!(emitted.iter().any(|d| matches!(d, Data::Ok { code: Some(Code::UidValidity(_)), .. })));
        assert!(emitted.iter().any(|d| matches!(d, Data::Ok { code: Some(Code::UidNext(_)), .. })));
        assert!(emitted.iter().any(|d| matches!(d, Data::Ok { code: Some(Code::Unseen(_)), .. })));
        assert!(emitted.iter().any(|d| matches!(d, Data::Ok { code: Some(Code::PermanentFlags(_)), .. })));
        assert!(emitted.iter().any(|d| matches!(d, Data::Ok { code: Some(Code::HighestModSeq(_)), .. })));
    }
}
