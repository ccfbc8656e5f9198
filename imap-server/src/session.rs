//! The backend boundary (§4.8 "Session contract"): everything a command
//! handler needs from the mailbox store it fronts, plus the optional
//! sub-interfaces extensions probe for at dispatch time.
//!
//! `Session` is generic over the connection runtime (`ConnectionHandler<S>`
//! is `struct Connection<S: Session>`) rather than a `dyn Session` trait
//! object: the optional sub-capabilities below (`SessionCondStore`,
//! `SessionUidPlus`, …) are themselves traits, and `dyn Any`-style runtime
//! downcasting cannot turn one trait object into a different trait object.
//! A concrete `S: Session` keeps every `as_cond_store`-style upcast a plain
//! static dispatch the optimizer can see through, at the cost of monomorphizing
//! the server once per backend — an acceptable trade for a library with
//! exactly one live backend per process.

use imap_types::command::{AppendMessage, ListOptions, SelectOptions, StatusOptions};
use imap_types::fetch::{FetchAttribute, FetchItem, FetchOptions};
use imap_types::flag::{Flag, FlagPerm, StoreType};
use imap_types::mailbox::{Mailbox, MailboxAttribute};
use imap_types::search::SearchKey;
use imap_types::sequence::{SeqSet, UidSet};
use imap_types::status::StatusAttributeValue;

use crate::error::Result;

/// What a successful `SELECT`/`EXAMINE` reports back (§4.6 "SELECT /
/// EXAMINE").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectData {
    pub exists: u32,
    pub recent: u32,
    pub flags: Vec<Flag>,
    pub permanent_flags: Option<Vec<FlagPerm>>,
    pub uid_validity: u32,
    pub uid_next: u32,
    pub unseen: Option<u32>,
    pub highest_mod_seq: Option<u64>,
    pub mailbox_id: Option<String>,
}

/// One `LIST`/`LSUB` reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub mailbox: Mailbox,
    pub attributes: Vec<MailboxAttribute>,
    pub delimiter: Option<char>,
}

/// What `APPEND` reports back, always including the UID(s) assigned — every
/// mailbox store is UID-indexed internally, so this is never optional; what
/// is optional is whether the handler is allowed to *echo* it, which is
/// gated on [`SessionUidPlus`] rather than on this struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendData {
    pub uid_validity: u32,
    pub uids: Vec<u32>,
}

/// What `COPY`/`MOVE` report back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyData {
    pub uid_validity: u32,
    /// The resolved source UIDs, in the same order as `destination_uids`
    /// (RFC 4315's `COPYUID` needs both sets even when the client
    /// addressed the source by sequence number rather than UID).
    pub source_uids: Vec<u32>,
    /// Destination UIDs, in the same order as the resolved source set.
    pub destination_uids: Vec<u32>,
}

/// What `STORE` (unconditional form) reports back for one modified message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome;

/// What a conditional `STORE (UNCHANGEDSINCE n)` reports back in addition to
/// the streamed `FETCH` lines: the UIDs/sequence numbers that failed the
/// MODSEQ precondition and were therefore left unmodified (§8 invariant 9).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreConditionalOutcome {
    pub modified: Vec<u32>,
}

/// What a `SEARCH`/`ESEARCH` reports back, before the handler has decided
/// which `RETURN` subset the client asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    pub matched: Vec<u32>,
    pub highest_mod_seq: Option<u64>,
}

/// Untagged data a session may push asynchronously while a connection is
/// `IDLE`-ing (new message arrivals, expunges, flag changes from another
/// connection on the same mailbox).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleEvent {
    Exists(u32),
    Expunge(u32),
    FetchFlags { seq_or_uid: u32, flags: Vec<Flag> },
}

/// The required backend boundary (§4.8). A handler always has a concrete
/// `&mut S: Session` in its [`crate::context::CommandContext`]; optional
/// extension behavior is reached through the `as_*` probes, which default
/// to `None` and are overridden by a backend that implements the
/// corresponding sub-trait.
pub trait Session: Send {
    fn login(&mut self, username: &str, password: &str) -> Result<()>;

    fn select(&mut self, mailbox: &Mailbox, options: &SelectOptions, read_only: bool) -> Result<SelectData>;
    fn create(&mut self, mailbox: &Mailbox) -> Result<()>;
    fn delete(&mut self, mailbox: &Mailbox) -> Result<()>;
    fn rename(&mut self, from: &Mailbox, to: &Mailbox) -> Result<()>;
    fn subscribe(&mut self, mailbox: &Mailbox) -> Result<()>;
    fn unsubscribe(&mut self, mailbox: &Mailbox) -> Result<()>;
    fn list(&mut self, reference: &Mailbox, pattern: &str, options: &ListOptions) -> Result<Vec<ListEntry>>;
    fn lsub(&mut self, reference: &Mailbox, pattern: &str) -> Result<Vec<ListEntry>>;
    fn status(&mut self, mailbox: &Mailbox, options: &StatusOptions) -> Result<Vec<StatusAttributeValue>>;

    fn append(&mut self, mailbox: &Mailbox, messages: &[AppendMessage]) -> Result<AppendData>;

    /// Blocks, invoking `push` for each asynchronous update, until `done`
    /// returns `true` (the client sent `DONE`, or the connection is
    /// shutting down). Implementations should poll `done` at a reasonable
    /// cadence rather than spinning.
    fn idle(&mut self, push: &mut dyn FnMut(IdleEvent), done: &dyn Fn() -> bool) -> Result<()>;

    fn check(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    fn unselect(&mut self) -> Result<()>;

    /// `uids = None` means unqualified `EXPUNGE` (delete every `\Deleted`
    /// message); `Some` means `UID EXPUNGE uid-set` (RFC 4315), deleting
    /// only `\Deleted` messages that are also in `uids`. `report` is called
    /// once per removed message, with its *sequence number at the time of
    /// removal* — the handler downgrades that to `VANISHED` under UIDONLY
    /// or UID EXPUNGE itself.
    fn expunge(&mut self, uids: Option<&UidSet>, report: &mut dyn FnMut(u32)) -> Result<()>;

    fn fetch(
        &mut self,
        set: &SeqSetOrUidSet,
        attributes: &[FetchAttribute],
        options: &FetchOptions,
        sink: &mut dyn FnMut(FetchItem) -> Result<()>,
    ) -> Result<()>;

    fn store(
        &mut self,
        set: &SeqSetOrUidSet,
        kind: StoreType,
        flags: &[Flag],
        silent: bool,
        sink: &mut dyn FnMut(FetchItem) -> Result<()>,
    ) -> Result<StoreOutcome>;

    fn copy(&mut self, set: &SeqSetOrUidSet, destination: &Mailbox) -> Result<CopyData>;
    fn mv(&mut self, set: &SeqSetOrUidSet, destination: &Mailbox) -> Result<CopyData>;

    fn search(&mut self, criteria: &[SearchKey], charset: Option<&str>) -> Result<SearchOutcome>;

    /// RFC 2971 `ID`: the client's parameter list (possibly empty/NIL) and
    /// the server's own reply list.
    fn id(&mut self, client_params: &[(String, Option<String>)]) -> Result<Vec<(String, Option<String>)>>;

    fn as_cond_store(&mut self) -> Option<&mut dyn SessionCondStore> {
        None
    }

    fn as_uid_plus(&mut self) -> Option<&mut dyn SessionUidPlus> {
        None
    }

    fn as_search_res(&mut self) -> Option<&mut dyn SessionSearchRes> {
        None
    }

    fn as_qresync(&mut self) -> Option<&mut dyn SessionQresync> {
        None
    }

    fn as_uid_only(&mut self) -> Option<&mut dyn SessionUidOnly> {
        None
    }
}

/// RFC 7162 CONDSTORE's conditional `STORE`: implemented separately from
/// [`Session::store`] because its precondition-failure reporting
/// (`MODIFIED`) has no place in the unconditional method's signature.
pub trait SessionCondStore: Send {
    fn store_conditional(
        &mut self,
        set: &SeqSetOrUidSet,
        unchanged_since: u64,
        kind: StoreType,
        flags: &[Flag],
        silent: bool,
        sink: &mut dyn FnMut(FetchItem) -> Result<()>,
    ) -> Result<StoreConditionalOutcome>;
}

/// RFC 4315 UIDPLUS: purely a probe. Its presence tells the `APPEND` and
/// `COPY`/`MOVE` handlers to echo `APPENDUID`/`COPYUID` response codes from
/// the UID data [`Session::append`]/[`Session::copy`] already returned, and
/// tells `EXPUNGE` to report removed messages as `VANISHED` UIDs instead of
/// bare sequence numbers.
pub trait SessionUidPlus: Send {}

/// RFC 5182 SEARCHRES: the `$` saved-result marker.
pub trait SessionSearchRes: Send {
    fn save_search_result(&mut self, matched: &[u32]) -> Result<()>;
    fn resolve_saved_result(&mut self) -> Result<Vec<u32>>;
}

/// RFC 7162 QRESYNC: resynchronization on `SELECT`/`EXAMINE`.
pub trait SessionQresync: Send {
    /// `known_uids`/`known_mod_seq` come from the client's `(QRESYNC (uid-validity mod-seq known-uids))` option;
    /// returns the UIDs that vanished since `known_mod_seq`, for a `* VANISHED EARLIER` response.
    fn resync(&mut self, uid_validity: u32, known_mod_seq: u64, known_uids: Option<&UidSet>) -> Result<Vec<u32>>;
}

/// The UIDONLY extension (RFC 9586) carries no backend-visible state — it
/// only changes how the connection runtime renders responses — but is still
/// probed as a session capability per §4.4, so a backend can decline to
/// support it for mailboxes where it cannot guarantee UID stability.
pub trait SessionUidOnly: Send {
    fn supports_uid_only(&self) -> bool {
        true
    }
}

use imap_types::command::SeqSetOrUidSet;

#[cfg(test)]
pub(crate) mod test_double {
    //! A minimal in-memory [`Session`] implementation used by the unit
    //! tests in [`crate::dispatcher`]/[`crate::connection`]/handler modules.
    //! Not exported outside the crate: real backends supply their own.

    use std::collections::HashMap;

    use imap_types::datetime::DateTime;
    use imap_types::fetch::FetchAttributeValue;

    use super::*;
    use crate::error::Error;

    #[derive(Debug, Clone)]
    pub struct StoredMessage {
        pub uid: u32,
        pub flags: Vec<Flag>,
        pub mod_seq: u64,
        pub internal_date: Option<DateTime>,
        pub body: Vec<u8>,
    }

    #[derive(Default)]
    pub struct MemoryMailbox {
        pub uid_validity: u32,
        pub uid_next: u32,
        pub messages: Vec<StoredMessage>,
        pub mod_seq_counter: u64,
    }

    #[derive(Default)]
    pub struct MemorySession {
        pub mailboxes: HashMap<String, MemoryMailbox>,
        pub selected: Option<String>,
        pub saved_result: Vec<u32>,
    }

    impl MemorySession {
        pub fn with_inbox() -> Self {
            let mut session = Self::default();
            session.mailboxes.insert(
                "INBOX".to_string(),
                MemoryMailbox {
                    uid_validity: 1,
                    uid_next: 1,
                    ..Default::default()
                },
            );
            session
        }

        fn mailbox_mut(&mut self, name: &str) -> Result<&mut MemoryMailbox> {
            self.mailboxes
                .get_mut(name)
                .ok_or_else(|| Error::no("mailbox does not exist").with_code(imap_types::response::Code::NonExistent))
        }

        fn selected_mut(&mut self) -> Result<&mut MemoryMailbox> {
            let name = self.selected.clone().ok_or_else(|| Error::bad("no mailbox selected"))?;
            self.mailbox_mut(&name)
        }
    }

    impl Session for MemorySession {
        fn login(&mut self, _username: &str, _password: &str) -> Result<()> {
            Ok(())
        }

        fn select(&mut self, mailbox: &Mailbox, _options: &SelectOptions, _read_only: bool) -> Result<SelectData> {
            let name = mailbox.as_str().to_string();
            let mbox = self.mailbox_mut(&name)?;
            let exists = mbox.messages.len() as u32;
            let unseen = mbox.messages.iter().position(|m| !m.flags.contains(&Flag::Seen)).map(|p| p as u32 + 1);
            let data = SelectData {
                exists,
                recent: 0,
                flags: vec![Flag::Seen, Flag::Deleted, Flag::Flagged],
                permanent_flags: Some(vec![FlagPerm::Flag(Flag::Seen), FlagPerm::Flag(Flag::Deleted)]),
                uid_validity: mbox.uid_validity,
                uid_next: mbox.uid_next,
                unseen,
                highest_mod_seq: Some(mbox.mod_seq_counter),
                mailbox_id: None,
            };
            self.selected = Some(name);
            Ok(data)
        }

        fn create(&mut self, mailbox: &Mailbox) -> Result<()> {
            let name = mailbox.as_str().to_string();
            if self.mailboxes.contains_key(&name) {
                return Err(Error::no("mailbox already exists").with_code(imap_types::response::Code::AlreadyExists));
            }
            self.mailboxes.insert(
                name,
                MemoryMailbox {
                    uid_validity: 1,
                    uid_next: 1,
                    ..Default::default()
                },
            );
            Ok(())
        }

        fn delete(&mut self, mailbox: &Mailbox) -> Result<()> {
            self.mailboxes
                .remove(mailbox.as_str())
                .map(|_| ())
                .ok_or_else(|| Error::no("mailbox does not exist").with_code(imap_types::response::Code::NonExistent))
        }

        fn rename(&mut self, from: &Mailbox, to: &Mailbox) -> Result<()> {
            let mbox = self
                .mailboxes
                .remove(from.as_str())
                .ok_or_else(|| Error::no("mailbox does not exist").with_code(imap_types::response::Code::NonExistent))?;
            self.mailboxes.insert(to.as_str().to_string(), mbox);
            Ok(())
        }

        fn subscribe(&mut self, _mailbox: &Mailbox) -> Result<()> {
            Ok(())
        }

        fn unsubscribe(&mut self, _mailbox: &Mailbox) -> Result<()> {
            Ok(())
        }

        fn list(&mut self, _reference: &Mailbox, _pattern: &str, _options: &ListOptions) -> Result<Vec<ListEntry>> {
            Ok(self
                .mailboxes
                .keys()
                .map(|name| ListEntry {
                    mailbox: Mailbox::new(name.clone()),
                    attributes: vec![MailboxAttribute::HasNoChildren],
                    delimiter: Some('/'),
                })
                .collect())
        }

        fn lsub(&mut self, reference: &Mailbox, pattern: &str) -> Result<Vec<ListEntry>> {
            self.list(reference, pattern, &ListOptions::default())
        }

        fn status(&mut self, mailbox: &Mailbox, options: &StatusOptions) -> Result<Vec<StatusAttributeValue>> {
            let mbox = self.mailbox_mut(mailbox.as_str())?;
            Ok(options
                .attributes
                .iter()
                .map(|attr| match attr {
                    imap_types::status::StatusAttribute::Messages => StatusAttributeValue::Messages(mbox.messages.len() as u32),
                    imap_types::status::StatusAttribute::Recent => StatusAttributeValue::Recent(0),
                    imap_types::status::StatusAttribute::UidNext => StatusAttributeValue::UidNext(mbox.uid_next),
                    imap_types::status::StatusAttribute::UidValidity => StatusAttributeValue::UidValidity(mbox.uid_validity),
                    imap_types::status::StatusAttribute::Unseen => StatusAttributeValue::Unseen(0),
                    imap_types::status::StatusAttribute::HighestModSeq => StatusAttributeValue::HighestModSeq(mbox.mod_seq_counter),
                    imap_types::status::StatusAttribute::Size => StatusAttributeValue::Size(0),
                    imap_types::status::StatusAttribute::MailboxId => StatusAttributeValue::MailboxId(String::new()),
                })
                .collect())
        }

        fn append(&mut self, mailbox: &Mailbox, messages: &[AppendMessage]) -> Result<AppendData> {
            let name = mailbox.as_str().to_string();
            let mbox = self.mailbox_mut(&name)?;
            let mut uids = Vec::with_capacity(messages.len());
            for message in messages {
                let uid = mbox.uid_next;
                mbox.uid_next += 1;
                mbox.mod_seq_counter += 1;
                mbox.messages.push(StoredMessage {
                    uid,
                    flags: message.options.flags.clone(),
                    mod_seq: mbox.mod_seq_counter,
                    internal_date: message.options.internal_date,
                    body: message.literal.clone(),
                });
                uids.push(uid);
            }
            Ok(AppendData {
                uid_validity: mbox.uid_validity,
                uids,
            })
        }

        fn idle(&mut self, _push: &mut dyn FnMut(IdleEvent), done: &dyn Fn() -> bool) -> Result<()> {
            while !done() {
                std::thread::sleep(std::time::Duration::from_millis(20));
            }
            Ok(())
        }

        fn check(&mut self) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            if let Some(name) = self.selected.take() {
                if let Ok(mbox) = self.mailbox_mut(&name) {
                    mbox.messages.retain(|m| !m.flags.contains(&Flag::Deleted));
                }
            }
            Ok(())
        }

        fn unselect(&mut self) -> Result<()> {
            self.selected = None;
            Ok(())
        }

        fn expunge(&mut self, uids: Option<&UidSet>, report: &mut dyn FnMut(u32)) -> Result<()> {
            let mbox = self.selected_mut()?;
            let highest = mbox.messages.len() as u32;
            let mut seq = 0u32;
            let mut kept = Vec::with_capacity(mbox.messages.len());
            for message in mbox.messages.drain(..) {
                seq += 1;
                let targeted = uids.map(|set| set.contains_resolved(message.uid, highest)).unwrap_or(true);
                if message.flags.contains(&Flag::Deleted) && targeted {
                    report(seq);
                } else {
                    kept.push(message);
                }
            }
            mbox.messages = kept;
            Ok(())
        }

        fn fetch(
            &mut self,
            set: &SeqSetOrUidSet,
            attributes: &[FetchAttribute],
            _options: &FetchOptions,
            sink: &mut dyn FnMut(FetchItem) -> Result<()>,
        ) -> Result<()> {
            let mbox = self.selected_mut()?;
            let highest = mbox.messages.len() as u32;
            let matches = resolve_match_indices(set, &mbox.messages, highest);
            for (seq, message) in matches {
                let values = attributes
                    .iter()
                    .map(|attr| render_attribute(attr, message))
                    .collect();
                sink(FetchItem {
                    seq_or_uid: match set {
                        SeqSetOrUidSet::Uid(_) => message.uid,
                        _ => seq,
                    },
                    attributes: values,
                })?;
            }
            Ok(())
        }

        fn store(
            &mut self,
            set: &SeqSetOrUidSet,
            kind: StoreType,
            flags: &[Flag],
            silent: bool,
            sink: &mut dyn FnMut(FetchItem) -> Result<()>,
        ) -> Result<StoreOutcome> {
            let mbox = self.selected_mut()?;
            let highest = mbox.messages.len() as u32;
            let targets = resolved_targets(set, mbox.messages.len(), highest);
            mbox.mod_seq_counter += 1;
            let mod_seq = mbox.mod_seq_counter;
            for &index in &targets {
                apply_store(&mut mbox.messages[index], kind, flags, mod_seq);
            }
            if !silent {
                for &index in &targets {
                    let message = &mbox.messages[index];
                    sink(FetchItem {
                        seq_or_uid: match set {
                            SeqSetOrUidSet::Uid(_) => message.uid,
                            _ => index as u32 + 1,
                        },
                        attributes: vec![FetchAttributeValue::Flags(message.flags.clone())],
                    })?;
                }
            }
            Ok(StoreOutcome)
        }

        fn copy(&mut self, set: &SeqSetOrUidSet, destination: &Mailbox) -> Result<CopyData> {
            let source_name = self.selected.clone().ok_or_else(|| Error::bad("no mailbox selected"))?;
            let to_copy: Vec<StoredMessage> = {
                let mbox = self.mailbox_mut(&source_name)?;
                let highest = mbox.messages.len() as u32;
                resolve_match_indices(set, &mbox.messages, highest)
                    .into_iter()
                    .map(|(_, m)| m.clone())
                    .collect()
            };
            let source_uids: Vec<u32> = to_copy.iter().map(|m| m.uid).collect();
            let dest = self.mailbox_mut(destination.as_str())?;
            let mut uids = Vec::with_capacity(to_copy.len());
            for mut message in to_copy {
                let uid = dest.uid_next;
                dest.uid_next += 1;
                message.uid = uid;
                dest.messages.push(message);
                uids.push(uid);
            }
            Ok(CopyData {
                uid_validity: dest.uid_validity,
                source_uids,
                destination_uids: uids,
            })
        }

        fn mv(&mut self, set: &SeqSetOrUidSet, destination: &Mailbox) -> Result<CopyData> {
            let data = self.copy(set, destination)?;
            let source_name = self.selected.clone().ok_or_else(|| Error::bad("no mailbox selected"))?;
            let mbox = self.mailbox_mut(&source_name)?;
            let highest = mbox.messages.len() as u32;
            let removed: std::collections::HashSet<u32> = resolve_match_indices(set, &mbox.messages, highest)
                .into_iter()
                .map(|(_, m)| m.uid)
                .collect();
            mbox.messages.retain(|m| !removed.contains(&m.uid));
            Ok(data)
        }

        fn search(&mut self, criteria: &[SearchKey], _charset: Option<&str>) -> Result<SearchOutcome> {
            let mbox = self.selected_mut()?;
            let mut matched = Vec::new();
            for (i, message) in mbox.messages.iter().enumerate() {
                if criteria.iter().all(|key| matches_key(key, message)) {
                    matched.push(i as u32 + 1);
                }
            }
            Ok(SearchOutcome {
                matched,
                highest_mod_seq: Some(mbox.mod_seq_counter),
            })
        }

        fn id(&mut self, _client_params: &[(String, Option<String>)]) -> Result<Vec<(String, Option<String>)>> {
            Ok(vec![("name".to_string(), Some("memory-session".to_string()))])
        }

        fn as_search_res(&mut self) -> Option<&mut dyn SessionSearchRes> {
            Some(self)
        }

        fn as_uid_plus(&mut self) -> Option<&mut dyn SessionUidPlus> {
            Some(self)
        }
    }

    impl SessionUidPlus for MemorySession {}

    impl SessionSearchRes for MemorySession {
        fn save_search_result(&mut self, matched: &[u32]) -> Result<()> {
            self.saved_result = matched.to_vec();
            Ok(())
        }

        fn resolve_saved_result(&mut self) -> Result<Vec<u32>> {
            Ok(self.saved_result.clone())
        }
    }

    fn resolve_match_indices<'a>(
        set: &SeqSetOrUidSet,
        messages: &'a [StoredMessage],
        highest: u32,
    ) -> Vec<(u32, &'a StoredMessage)> {
        match set {
            SeqSetOrUidSet::Seq(seq) => seq
                .iter_resolved(highest)
                .filter_map(|n| messages.get(n as usize - 1).map(|m| (n, m)))
                .collect(),
            SeqSetOrUidSet::Uid(uid) => messages
                .iter()
                .enumerate()
                .filter(|(_, m)| uid.contains_resolved(m.uid, highest))
                .map(|(i, m)| (i as u32 + 1, m))
                .collect(),
            SeqSetOrUidSet::SavedResult => Vec::new(),
        }
    }

    fn resolved_targets(set: &SeqSetOrUidSet, len: usize, highest: u32) -> Vec<usize> {
        match set {
            SeqSetOrUidSet::Seq(seq) => seq
                .iter_resolved(highest)
                .filter(|&n| n as usize <= len)
                .map(|n| n as usize - 1)
                .collect(),
            SeqSetOrUidSet::Uid(_) | SeqSetOrUidSet::SavedResult => Vec::new(),
        }
    }

    fn apply_store(message: &mut StoredMessage, kind: StoreType, flags: &[Flag], mod_seq: u64) {
        match kind {
            StoreType::Replace => message.flags = flags.to_vec(),
            StoreType::Add => {
                for flag in flags {
                    if !message.flags.contains(flag) {
                        message.flags.push(flag.clone());
                    }
                }
            }
            StoreType::Remove => message.flags.retain(|f| !flags.contains(f)),
        }
        message.mod_seq = mod_seq;
    }

    fn render_attribute(attr: &FetchAttribute, message: &StoredMessage) -> FetchAttributeValue {
        match attr {
            FetchAttribute::Flags => FetchAttributeValue::Flags(message.flags.clone()),
            FetchAttribute::Uid => FetchAttributeValue::Uid(message.uid),
            FetchAttribute::RFC822Size => FetchAttributeValue::RFC822Size(message.body.len() as u32),
            FetchAttribute::ModSeq => FetchAttributeValue::ModSeq(message.mod_seq),
            FetchAttribute::InternalDate => FetchAttributeValue::InternalDate(
                message.internal_date.unwrap_or_else(|| {
                    DateTime(chrono::DateTime::from_naive_utc_and_offset(
                        chrono::NaiveDateTime::default(),
                        chrono::FixedOffset::east_opt(0).expect("zero offset is valid"),
                    ))
                }),
            ),
            _ => FetchAttributeValue::Flags(message.flags.clone()),
        }
    }

    fn matches_key(key: &SearchKey, message: &StoredMessage) -> bool {
        match key {
            SearchKey::All => true,
            SearchKey::Seen => message.flags.contains(&Flag::Seen),
            SearchKey::Unseen => !message.flags.contains(&Flag::Seen),
            SearchKey::Deleted => message.flags.contains(&Flag::Deleted),
            SearchKey::Undeleted => !message.flags.contains(&Flag::Deleted),
            SearchKey::Flagged => message.flags.contains(&Flag::Flagged),
            SearchKey::Unflagged => !message.flags.contains(&Flag::Flagged),
            SearchKey::Keyword(name) => message.flags.iter().any(|f| matches!(f, Flag::Keyword(a) if a.as_str().eq_ignore_ascii_case(name))),
            SearchKey::And(keys) => keys.iter().all(|k| matches_key(k, message)),
            SearchKey::Not(inner) => !matches_key(inner, message),
            SearchKey::Or(a, b) => matches_key(a, message) || matches_key(b, message),
            SearchKey::Larger(n) => message.body.len() as u32 > *n,
            SearchKey::Smaller(n) => (message.body.len() as u32) < *n,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_double::MemorySession;
    use super::*;
    use imap_types::command::AppendOptions;

    #[test]
    fn select_reports_message_count() {
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
        let data = session.select(&Mailbox::new("INBOX"), &SelectOptions::default(), false).unwrap();
        assert_eq!(data.exists, 1);
        assert_eq!(data.uid_next, 2);
    }

    #[test]
    fn create_rejects_duplicate_mailbox() {
        let mut session = MemorySession::with_inbox();
        assert!(session.create(&Mailbox::new("INBOX")).is_err());
    }

    #[test]
    fn expunge_removes_only_deleted_messages() {
        let mut session = MemorySession::with_inbox();
        session
            .append(
                &Mailbox::new("INBOX"),
                &[
                    AppendMessage { options: AppendOptions::default(), literal: b"a".to_vec() },
                    AppendMessage { options: AppendOptions::default(), literal: b"b".to_vec() },
                ],
            )
            .unwrap();
        session.select(&Mailbox::new("INBOX"), &SelectOptions::default(), false).unwrap();
        session
            .store(
                &SeqSetOrUidSet::Seq(SeqSet::single(1).unwrap()),
                StoreType::Add,
                &[Flag::Deleted],
                true,
                &mut |_| Ok(()),
            )
            .unwrap();
        let mut removed = Vec::new();
        session.expunge(None, &mut |seq| removed.push(seq)).unwrap();
        assert_eq!(removed, vec![1]);
        assert_eq!(session.mailboxes.get("INBOX").unwrap().messages.len(), 1);
    }

    #[test]
    fn as_search_res_probe_resolves_to_memory_session() {
        let mut session = MemorySession::with_inbox();
        assert!(session.as_search_res().is_some());
    }
}
