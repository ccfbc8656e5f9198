//! Commands: a client tag plus a [`CommandBody`], and the option records
//! that accompany the commands complex enough to need them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::auth::{AuthMechanism, AuthenticateData};
use crate::core::{AString, NString, Tag};
use crate::datetime::DateTime;
use crate::fetch::{FetchOptions, MacroOrAttributes};
use crate::flag::{Flag, StoreResponse, StoreType};
use crate::mailbox::Mailbox;
use crate::search::{SearchKey, SearchOptions};
use crate::sequence::{SeqSet, UidSet};
use crate::secret::Secret;
use crate::status::StatusOptions;

/// Whether a command's number set (and the responses it produces) talks
/// about sequence numbers or UIDs. Set by the dispatcher when it strips a
/// leading `UID` prefix and re-dispatches to the base command (§4.5).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumKind {
    Seq,
    Uid,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectOptions {
    /// `(CONDSTORE)` — request MODSEQ tracking for this mailbox.
    pub condstore: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListOptions {
    /// `LIST-EXTENDED` selection options, e.g. `SUBSCRIBED`, `REMOTE`.
    pub selection_subscribed: bool,
    /// `LIST-EXTENDED` return options, e.g. `CHILDREN`, `STATUS (...)`.
    pub return_status: Option<StatusOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreOptions {
    /// `(UNCHANGEDSINCE modseq)` — CONDSTORE conditional-store modifier.
    pub unchanged_since: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppendOptions {
    pub flags: Vec<Flag>,
    pub internal_date: Option<DateTime>,
}

/// One message to append; `MULTIAPPEND` (RFC 3502) extends `APPEND` to a
/// `Vec` of these instead of a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendMessage {
    pub options: AppendOptions,
    pub literal: Vec<u8>,
}

/// The body of a command: everything after `tag SP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandBody {
    // --- Any state ---
    Capability,
    Noop,
    Logout,
    Id { parameters: Vec<(String, Option<String>)> },

    // --- Not Authenticated ---
    StartTls,
    Authenticate {
        mechanism: AuthMechanism,
        initial_response: Option<Secret<Vec<u8>>>,
    },
    /// Continuation data sent mid-`AUTHENTICATE` exchange. Not a
    /// top-level command in the grammar, but modeled as a `CommandBody`
    /// so the connection runtime can feed it through the same pipeline.
    AuthenticateContinue(AuthenticateData),
    Login {
        username: AString,
        password: Secret<AString>,
    },

    // --- Authenticated ---
    Enable { capabilities: Vec<String> },
    Select { mailbox: Mailbox, options: SelectOptions },
    Examine { mailbox: Mailbox, options: SelectOptions },
    Create { mailbox: Mailbox },
    Delete { mailbox: Mailbox },
    Rename { from: Mailbox, to: Mailbox },
    Subscribe { mailbox: Mailbox },
    Unsubscribe { mailbox: Mailbox },
    List {
        reference: Mailbox,
        pattern: String,
        options: ListOptions,
    },
    Lsub {
        reference: Mailbox,
        pattern: String,
    },
    Status { mailbox: Mailbox, options: StatusOptions },
    Append {
        mailbox: Mailbox,
        messages: Vec<AppendMessage>,
    },
    Idle,
    IdleDone,

    // --- Selected ---
    Check,
    Close,
    Unselect,
    Expunge { uids: Option<UidSet> },
    Search {
        num_kind: NumKind,
        charset: Option<String>,
        criteria: Vec<SearchKey>,
        options: SearchOptions,
    },
    Fetch {
        num_kind: NumKind,
        sequence_set: SeqSetOrUidSet,
        attributes: MacroOrAttributes,
        options: FetchOptions,
    },
    Store {
        num_kind: NumKind,
        sequence_set: SeqSetOrUidSet,
        kind: StoreType,
        response: StoreResponse,
        flags: Vec<Flag>,
        options: StoreOptions,
    },
    Copy {
        num_kind: NumKind,
        sequence_set: SeqSetOrUidSet,
        mailbox: Mailbox,
    },
    Move {
        num_kind: NumKind,
        sequence_set: SeqSetOrUidSet,
        mailbox: Mailbox,
    },
}

/// `Fetch`/`Store`/`Copy`/`Move`/`Expunge` all key off a number set whose
/// flavor (sequence numbers vs. UIDs) is determined by [`NumKind`]; rather
/// than storing two optional fields, the decoded set is tagged once here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeqSetOrUidSet {
    Seq(SeqSet),
    Uid(UidSet),
    /// `$` (RFC 5182 SEARCHRES) — stands for the saved result of a previous
    /// `SEARCH ... SAVE`. Callers must resolve this against the session's
    /// saved set before use; [`Self::iter_resolved`] has no saved set to
    /// consult and yields nothing for it.
    SavedResult,
}

impl SeqSetOrUidSet {
    pub fn iter_resolved(&self, highest: u32) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            Self::Seq(s) => Box::new(s.iter_resolved(highest)),
            Self::Uid(u) => Box::new(u.iter_resolved(highest)),
            Self::SavedResult => Box::new(std::iter::empty()),
        }
    }
}

impl CommandBody {
    /// The uppercase command name a dispatcher registry keys handlers by.
    ///
    /// A `UID`-prefixed command (`UID FETCH`, `UID STORE`, ...) decodes into
    /// the same variant as its non-`UID` form with `num_kind` set to
    /// [`NumKind::Uid`], so this never needs to look at `num_kind` to tell
    /// them apart.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::Id { .. } => "ID",
            Self::StartTls => "STARTTLS",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::AuthenticateContinue(_) => "AUTHENTICATE",
            Self::Login { .. } => "LOGIN",
            Self::Enable { .. } => "ENABLE",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::Unsubscribe { .. } => "UNSUBSCRIBE",
            Self::List { .. } => "LIST",
            Self::Lsub { .. } => "LSUB",
            Self::Status { .. } => "STATUS",
            Self::Append { .. } => "APPEND",
            Self::Idle => "IDLE",
            Self::IdleDone => "IDLE",
            Self::Check => "CHECK",
            Self::Close => "CLOSE",
            Self::Unselect => "UNSELECT",
            Self::Expunge { .. } => "EXPUNGE",
            Self::Search { .. } => "SEARCH",
            Self::Fetch { .. } => "FETCH",
            Self::Store { .. } => "STORE",
            Self::Copy { .. } => "COPY",
            Self::Move { .. } => "MOVE",
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub tag: Tag,
    pub body: CommandBody,
}

impl Command {
    pub fn new(tag: impl TryInto<Tag, Error = crate::error::ValidationError>, body: CommandBody) -> Result<Self, crate::error::ValidationError> {
        Ok(Self {
            tag: tag.try_into()?,
            body,
        })
    }
}

/// Placeholder used where a handler needs to echo an otherwise-absent
/// mailbox name in a response, e.g. before `SELECT` has determined one.
pub type OptionalNString = NString;
