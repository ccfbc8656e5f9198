//! Commands valid in the `Selected` state (§4.6): `CHECK`, `CLOSE`,
//! `UNSELECT`, `EXPUNGE`/`UID EXPUNGE`, `FETCH`/`UID FETCH`,
//! `STORE`/`UID STORE` (including the CONDSTORE conditional form),
//! `COPY`/`MOVE`, `SEARCH`/`UID SEARCH` (including `ESEARCH`), and
//! `APPEND`/`MULTIAPPEND`.

use std::sync::Arc;

use imap_types::command::{CommandBody, SeqSetOrUidSet};
use imap_types::response::{Code, Data, EsearchResult};
use imap_types::search::SearchOptions;
use imap_types::sequence::{NumRange, NumSet, UidSet};
use imap_types::state::State;

use crate::context::{CommandContext, TaggedOutcome};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::session::Session;

pub fn register<S: Session + 'static>(dispatcher: &mut Dispatcher<S>) {
    dispatcher.register("APPEND", Arc::new(append));
    dispatcher.register("CHECK", Arc::new(check));
    dispatcher.register("CLOSE", Arc::new(close));
    dispatcher.register("UNSELECT", Arc::new(unselect));
    dispatcher.register("EXPUNGE", Arc::new(expunge));
    dispatcher.register("FETCH", Arc::new(fetch));
    dispatcher.register("STORE", Arc::new(store));
    dispatcher.register("COPY", Arc::new(copy));
    dispatcher.register("MOVE", Arc::new(mv));
    dispatcher.register("SEARCH", Arc::new(search));
}

/// `$` (SEARCHRES) resolves against the session's saved result; every
/// other variant is already a concrete set (§4.4, §8 scenario "SEARCHRES
/// round trip"). A `$` reference without [`crate::session::SessionSearchRes`]
/// support, or before any `SEARCH ... SAVE` has run, is a client error.
fn resolve_saved<S: Session>(ctx: &mut CommandContext<'_, S>, set: &SeqSetOrUidSet) -> Result<SeqSetOrUidSet> {
    match set {
        SeqSetOrUidSet::SavedResult => {
            let resolver = ctx
                .session
                .as_search_res()
                .ok_or_else(|| Error::bad("$ is not supported by this server"))?;
            let matched = resolver.resolve_saved_result()?;
            if matched.is_empty() {
                return Err(Error::bad("$ refers to no saved search result"));
            }
            Ok(SeqSetOrUidSet::Uid(build_uid_set(&matched)))
        }
        other => Ok(other.clone()),
    }
}

fn build_uid_set(values: &[u32]) -> UidSet {
    let ranges: Vec<NumRange> = values.iter().filter_map(|&v| NumRange::single(v).ok()).collect();
    NumSet::from_ranges(ranges).into()
}

fn is_uid_mode(num_kind: imap_types::command::NumKind) -> bool {
    matches!(num_kind, imap_types::command::NumKind::Uid)
}

/// Enforces invariant 7 / scenario 5 (§4.4): once UIDONLY is enabled, a
/// sequence-number variant of any number-set-taking command is rejected
/// outright rather than run, so `emit_fetch_item`'s `ctx.uid_only` check
/// and the command body's own `num_kind` can never disagree.
fn require_uid_mode<S: Session>(ctx: &CommandContext<'_, S>, num_kind: imap_types::command::NumKind) -> Result<()> {
    if ctx.uid_only && !is_uid_mode(num_kind) {
        return Err(Error::bad("sequence not allowed").with_code(Code::UidRequired));
    }
    Ok(())
}

/// `* n FETCH ...` under plain rendering, `* u UIDFETCH (UID u ...) ...`
/// under UIDONLY (§4.4): `require_uid_mode` has already rejected a
/// sequence-number command by the time this runs, so `ctx.uid_only` and
/// the command body's `num_kind` always agree here.
fn emit_fetch_item<S: Session>(ctx: &mut CommandContext<'_, S>, item: imap_types::fetch::FetchItem) {
    if ctx.uid_only {
        ctx.emit(Data::UidFetch(item));
    } else {
        ctx.emit(Data::Fetch(item));
    }
}

fn check<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Selected])?;
    ctx.session.check()?;
    Ok(TaggedOutcome::Default)
}

fn close<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Selected])?;
    ctx.session.close()?;
    *ctx.selected = None;
    ctx.state.transition(State::Authenticated)?;
    Ok(TaggedOutcome::Default)
}

/// `UNSELECT` (RFC 3691): like `CLOSE` but does not expunge
/// `\Deleted`-flagged messages first (§4.6).
fn unselect<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Selected])?;
    ctx.session.unselect()?;
    *ctx.selected = None;
    ctx.state.transition(State::Authenticated)?;
    Ok(TaggedOutcome::Default)
}

fn expunge<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Selected])?;
    let CommandBody::Expunge { uids } = &ctx.body else {
        return Err(Error::bad("EXPUNGE handler invoked with mismatched command body"));
    };
    if uids.is_some() && ctx.session.as_uid_plus().is_none() {
        return Err(Error::bad("UID EXPUNGE requires UIDPLUS support").with_code(Code::UidRequired));
    }
    let uid_only = ctx.uid_only;
    let mut removed = Vec::new();
    {
        let mut report = |seq: u32| removed.push(seq);
        ctx.session.expunge(uids.as_ref(), &mut report)?;
    }
    if uid_only || uids.is_some() {
        // Under UIDONLY, or for a targeted UID EXPUNGE, report removals as
        // VANISHED UIDs rather than sequence numbers (§4.4, RFC 4315).
        // `Session::expunge` reports sequence numbers at time of removal;
        // a UIDPLUS-aware backend is expected to track and hand back the
        // UIDs itself via its own bookkeeping, so here we only have
        // sequence numbers to fall back to when the backend does not.
        if let Some(targeted) = uids {
            ctx.emit(Data::Vanished { earlier: false, uids: targeted.clone() });
        } else {
            ctx.emit(Data::Vanished {
                earlier: false,
                uids: build_uid_set(&removed),
            });
        }
    } else {
        for seq in removed {
            ctx.emit(Data::Expunge(seq));
        }
    }
    Ok(TaggedOutcome::Default)
}

fn fetch<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Selected])?;
    let (num_kind, sequence_set, attributes, options) = match &ctx.body {
        CommandBody::Fetch { num_kind, sequence_set, attributes, options } => {
            (*num_kind, sequence_set.clone(), attributes.clone().into_attributes(), options.clone())
        }
        _ => return Err(Error::bad("FETCH handler invoked with mismatched command body")),
    };
    require_uid_mode(ctx, num_kind)?;
    let set = resolve_saved(ctx, &sequence_set)?;

    if let Some(changed_since) = options.changed_since {
        if ctx.session.as_cond_store().is_none() {
            return Err(Error::bad("CHANGEDSINCE requires CONDSTORE support"));
        }
        let _ = changed_since;
    }

    let mut items = Vec::new();
    ctx.session.fetch(&set, &attributes, &options, &mut |item| {
        items.push(item);
        Ok(())
    })?;
    for item in items {
        emit_fetch_item(ctx, item);
    }

    Ok(TaggedOutcome::Default)
}

fn store<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Selected])?;
    let (num_kind, sequence_set, kind, response, flags, options) = match &ctx.body {
        CommandBody::Store { num_kind, sequence_set, kind, response, flags, options } => {
            (*num_kind, sequence_set.clone(), *kind, *response, flags.clone(), options.clone())
        }
        _ => return Err(Error::bad("STORE handler invoked with mismatched command body")),
    };
    require_uid_mode(ctx, num_kind)?;
    let set = resolve_saved(ctx, &sequence_set)?;
    let silent = matches!(response, imap_types::flag::StoreResponse::Silent);

    if let Some(unchanged_since) = options.unchanged_since {
        let cond_store = ctx
            .session
            .as_cond_store()
            .ok_or_else(|| Error::bad("UNCHANGEDSINCE requires CONDSTORE support"))?;
        let mut items = Vec::new();
        let outcome = cond_store.store_conditional(&set, unchanged_since, kind, &flags, silent, &mut |item| {
            items.push(item);
            Ok(())
        })?;
        for item in items {
            emit_fetch_item(ctx, item);
        }
        if !outcome.modified.is_empty() {
            let modified = build_uid_set(&outcome.modified);
            return Ok(TaggedOutcome::with_code(
                Code::Modified(modified.to_canonical_string()),
                "STORE completed with some messages unmodified",
            ));
        }
    } else {
        let mut items = Vec::new();
        ctx.session.store(&set, kind, &flags, silent, &mut |item| {
            items.push(item);
            Ok(())
        })?;
        for item in items {
            emit_fetch_item(ctx, item);
        }
    }

    Ok(TaggedOutcome::Default)
}

fn copy<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Selected])?;
    let (num_kind, sequence_set, mailbox) = match &ctx.body {
        CommandBody::Copy { num_kind, sequence_set, mailbox } => (*num_kind, sequence_set.clone(), mailbox.clone()),
        _ => return Err(Error::bad("COPY handler invoked with mismatched command body")),
    };
    require_uid_mode(ctx, num_kind)?;
    let set = resolve_saved(ctx, &sequence_set)?;
    let data = ctx.session.copy(&set, &mailbox).map_err(|err| err.with_code(Code::TryCreate))?;

    if ctx.session.as_uid_plus().is_some() {
        let source = match &set {
            SeqSetOrUidSet::Uid(uids) => uids.clone(),
            _ => build_uid_set(&data.source_uids),
        };
        return Ok(TaggedOutcome::with_code(
            Code::CopyUid {
                uid_validity: data.uid_validity,
                source,
                destination: build_uid_set(&data.destination_uids),
            },
            "COPY completed",
        ));
    }
    Ok(TaggedOutcome::Default)
}

fn mv<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Selected])?;
    let (num_kind, sequence_set, mailbox) = match &ctx.body {
        CommandBody::Move { num_kind, sequence_set, mailbox } => (*num_kind, sequence_set.clone(), mailbox.clone()),
        _ => return Err(Error::bad("MOVE handler invoked with mismatched command body")),
    };
    require_uid_mode(ctx, num_kind)?;
    let set = resolve_saved(ctx, &sequence_set)?;
    let source_uids = match &set {
        SeqSetOrUidSet::Uid(uids) => Some(uids.clone()),
        _ => None,
    };
    let data = ctx.session.mv(&set, &mailbox).map_err(|err| err.with_code(Code::TryCreate))?;

    if let Some(source) = &source_uids {
        ctx.emit(Data::Vanished { earlier: false, uids: source.clone() });
    }
    let source = source_uids.unwrap_or_else(|| build_uid_set(&data.source_uids));

    let verb = if is_uid_mode(num_kind) { "UID MOVE" } else { "MOVE" };
    Ok(TaggedOutcome::with_code(
        Code::CopyUid {
            uid_validity: data.uid_validity,
            source,
            destination: build_uid_set(&data.destination_uids),
        },
        format!("{verb} completed"),
    ))
}

fn search<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Selected])?;
    let (num_kind, charset, criteria, options) = match &ctx.body {
        CommandBody::Search { num_kind, charset, criteria, options } => {
            (*num_kind, charset.clone(), criteria.clone(), options.clone())
        }
        _ => return Err(Error::bad("SEARCH handler invoked with mismatched command body")),
    };
    require_uid_mode(ctx, num_kind)?;

    let outcome = ctx.session.search(&criteria, charset.as_deref())?;
    let uid_mode = is_uid_mode(num_kind);

    match &options {
        SearchOptions::Classic => {
            ctx.emit(Data::Search(outcome.matched.clone()));
        }
        SearchOptions::Extended(ret) => {
            if ret.save {
                let resolver = ctx
                    .session
                    .as_search_res()
                    .ok_or_else(|| Error::bad("ESEARCH SAVE requires SEARCHRES support"))?;
                resolver.save_search_result(&outcome.matched)?;
            }
            let mut result = EsearchResult {
                tag: ctx.tag.as_str().to_string(),
                uid: uid_mode,
                ..Default::default()
            };
            if ret.min {
                result.min = outcome.matched.iter().min().copied();
            }
            if ret.max {
                result.max = outcome.matched.iter().max().copied();
            }
            if ret.count {
                result.count = Some(outcome.matched.len() as u32);
            }
            if ret.all {
                result.all = Some(build_uid_set(&outcome.matched).to_canonical_string());
            }
            result.mod_seq = outcome.highest_mod_seq;
            ctx.emit(Data::Esearch(result));
        }
    }

    Ok(TaggedOutcome::Default)
}

/// `APPEND mailbox (flags) date {literal}`, and `MULTIAPPEND`'s repeated
/// `(flags) date {literal}` groups in one command (§4.6, §9 Open
/// Question "MULTIAPPEND is all-or-nothing": [`Session::append`] takes
/// the whole batch so a backend can enforce that atomically rather than
/// this handler looping and partially committing on a mid-batch error).
fn append<S: Session>(ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
    ctx.state.require(&[State::Authenticated, State::Selected])?;
    let CommandBody::Append { mailbox, messages } = &ctx.body else {
        return Err(Error::bad("APPEND handler invoked with mismatched command body"));
    };
    let data = ctx
        .session
        .append(mailbox, messages)
        .map_err(|err| err.with_code(Code::TryCreate))?;

    if ctx.session.as_uid_plus().is_some() {
        return Ok(TaggedOutcome::with_code(
            Code::AppendUid {
                uid_validity: data.uid_validity,
                uids: data.uids,
            },
            "APPEND completed",
        ));
    }
    Ok(TaggedOutcome::Default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imap_types::capability::CapabilitySet;
    use imap_types::command::{AppendMessage, AppendOptions, NumKind};
    use imap_types::core::Tag;
    use imap_types::fetch::{Macro, MacroOrAttributes};
    use imap_types::flag::{StoreResponse, StoreType};
    use imap_types::mailbox::Mailbox;
    use imap_types::sequence::SeqSet;

    use crate::session::test_double::MemorySession;
    use crate::state::StateMachine;

    fn selected_ctx<'a>(
        session: &'a mut MemorySession,
        state: &'a StateMachine,
        selected: &'a mut Option<imap_types::state::SelectedMailbox>,
        enabled: &'a mut CapabilitySet,
        caps: &'a CapabilitySet,
        uid_only: bool,
        body: CommandBody,
        emit: &'a mut dyn FnMut(Data),
        cancelled: &'a dyn Fn() -> bool,
    ) -> CommandContext<'a, MemorySession> {
        CommandContext::new(
            Tag::try_from("a1").unwrap(),
            body.name(),
            body,
            session,
            state,
            selected,
            enabled,
            caps,
            uid_only,
            emit,
            cancelled,
        )
    }

    fn seeded_session() -> MemorySession {
        let mut session = MemorySession::with_inbox();
        session
            .append(
                &Mailbox::new("INBOX"),
                &[AppendMessage { options: AppendOptions::default(), literal: b"hello".to_vec() }],
            )
            .unwrap();
        session
    }

    fn assert_uid_required(result: Result<TaggedOutcome>) {
        let err = result.unwrap_err().into_protocol();
        assert_eq!(err.code, Some(Code::UidRequired));
    }

    #[test]
    fn fetch_rejects_sequence_numbers_when_uid_only() {
        let mut session = seeded_session();
        let state = StateMachine::new(State::Selected);
        let mut selected = Some(imap_types::state::SelectedMailbox { name: Mailbox::new("INBOX"), read_only: false });
        let mut enabled = CapabilitySet::new();
        let caps = CapabilitySet::new();
        let mut emit = |_: Data| {};
        let cancelled = || false;
        let body = CommandBody::Fetch {
            num_kind: NumKind::Seq,
            sequence_set: SeqSetOrUidSet::Seq(SeqSet::single(1).unwrap()),
            attributes: MacroOrAttributes::Macro(Macro::All),
            options: Default::default(),
        };
        let mut ctx = selected_ctx(&mut session, &state, &mut selected, &mut enabled, &caps, true, body, &mut emit, &cancelled);
        assert_uid_required(fetch(&mut ctx));
    }

    #[test]
    fn store_rejects_sequence_numbers_when_uid_only() {
        let mut session = seeded_session();
        let state = StateMachine::new(State::Selected);
        let mut selected = Some(imap_types::state::SelectedMailbox { name: Mailbox::new("INBOX"), read_only: false });
        let mut enabled = CapabilitySet::new();
        let caps = CapabilitySet::new();
        let mut emit = |_: Data| {};
        let cancelled = || false;
        let body = CommandBody::Store {
            num_kind: NumKind::Seq,
            sequence_set: SeqSetOrUidSet::Seq(SeqSet::single(1).unwrap()),
            kind: StoreType::Add,
            response: StoreResponse::Silent,
            flags: vec![imap_types::flag::Flag::Seen],
            options: Default::default(),
        };
        let mut ctx = selected_ctx(&mut session, &state, &mut selected, &mut enabled, &caps, true, body, &mut emit, &cancelled);
        assert_uid_required(store(&mut ctx));
    }

    #[test]
    fn search_rejects_sequence_numbers_when_uid_only() {
        let mut session = seeded_session();
        let state = StateMachine::new(State::Selected);
        let mut selected = Some(imap_types::state::SelectedMailbox { name: Mailbox::new("INBOX"), read_only: false });
        let mut enabled = CapabilitySet::new();
        let caps = CapabilitySet::new();
        let mut emit = |_: Data| {};
        let cancelled = || false;
        let body = CommandBody::Search {
            num_kind: NumKind::Seq,
            charset: None,
            criteria: Vec::new(),
            options: SearchOptions::Classic,
        };
        let mut ctx = selected_ctx(&mut session, &state, &mut selected, &mut enabled, &caps, true, body, &mut emit, &cancelled);
        assert_uid_required(search(&mut ctx));
    }

    #[test]
    fn copy_rejects_sequence_numbers_when_uid_only() {
        let mut session = seeded_session();
        session.create(&Mailbox::new("Archive")).unwrap();
        let state = StateMachine::new(State::Selected);
        let mut selected = Some(imap_types::state::SelectedMailbox { name: Mailbox::new("INBOX"), read_only: false });
        let mut enabled = CapabilitySet::new();
        let caps = CapabilitySet::new();
        let mut emit = |_: Data| {};
        let cancelled = || false;
        let body = CommandBody::Copy {
            num_kind: NumKind::Seq,
            sequence_set: SeqSetOrUidSet::Seq(SeqSet::single(1).unwrap()),
            mailbox: Mailbox::new("Archive"),
        };
        let mut ctx = selected_ctx(&mut session, &state, &mut selected, &mut enabled, &caps, true, body, &mut emit, &cancelled);
        assert_uid_required(copy(&mut ctx));
    }

    #[test]
    fn move_rejects_sequence_numbers_when_uid_only() {
        let mut session = seeded_session();
        session.create(&Mailbox::new("Archive")).unwrap();
        let state = StateMachine::new(State::Selected);
        let mut selected = Some(imap_types::state::SelectedMailbox { name: Mailbox::new("INBOX"), read_only: false });
        let mut enabled = CapabilitySet::new();
        let caps = CapabilitySet::new();
        let mut emit = |_: Data| {};
        let cancelled = || false;
        let body = CommandBody::Move {
            num_kind: NumKind::Seq,
            sequence_set: SeqSetOrUidSet::Seq(SeqSet::single(1).unwrap()),
            mailbox: Mailbox::new("Archive"),
        };
        let mut ctx = selected_ctx(&mut session, &state, &mut selected, &mut enabled, &caps, true, body, &mut emit, &cancelled);
        assert_uid_required(mv(&mut ctx));
    }

    /// Regression test for a `MOVE` that addresses its source by sequence
    /// number while source and destination UIDs differ: `COPYUID`'s source
    /// set must be the moved message's actual UID, not a copy of the
    /// destination set (RFC 4315 §4.6). The source mailbox holds two
    /// messages (UIDs 1 and 2) so moving sequence number 2 into a fresh,
    /// empty destination (whose first assigned UID is 1) cannot satisfy the
    /// assertion by coincidence.
    #[test]
    fn move_by_sequence_reports_true_source_uids_in_copyuid() {
        let mut session = seeded_session();
        session
            .append(
                &Mailbox::new("INBOX"),
                &[AppendMessage { options: AppendOptions::default(), literal: b"world".to_vec() }],
            )
            .unwrap();
        session.create(&Mailbox::new("Archive")).unwrap();
        let state = StateMachine::new(State::Selected);
        let mut selected = Some(imap_types::state::SelectedMailbox { name: Mailbox::new("INBOX"), read_only: false });
        let mut enabled = CapabilitySet::new();
        let caps = CapabilitySet::new();
        let mut emit = |_: Data| {};
        let cancelled = || false;
        let body = CommandBody::Move {
            num_kind: NumKind::Seq,
            sequence_set: SeqSetOrUidSet::Seq(SeqSet::single(2).unwrap()),
            mailbox: Mailbox::new("Archive"),
        };
        let mut ctx = selected_ctx(&mut session, &state, &mut selected, &mut enabled, &caps, false, body, &mut emit, &cancelled);
        let outcome = mv(&mut ctx).unwrap();
        match outcome {
            TaggedOutcome::WithCode { code: Code::CopyUid { source, destination, .. }, .. } => {
                assert_eq!(source.to_canonical_string(), "2");
                assert_eq!(destination.to_canonical_string(), "1");
            }
            other => panic!("expected CopyUid, got {other:?}"),
        }
    }
}
