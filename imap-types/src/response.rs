//! Server responses: the tagged status line, untagged data, the greeting,
//! response codes, and the `Error` taxonomy handlers return.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use crate::capability::Capability;
use crate::core::{NString, Tag};
use crate::datetime::DateTime;
use crate::fetch::FetchItem;
use crate::flag::{Flag, FlagPerm};
use crate::mailbox::{Mailbox, MailboxAttribute};
use crate::sequence::UidSet;
use crate::status::StatusAttributeValue;

/// `resp-text-code` — the bracketed `[NAME]`/`[NAME value]` response code.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Code {
    Capability(Vec<String>),
    ReadOnly,
    ReadWrite,
    UidValidity(u32),
    UidNext(u32),
    PermanentFlags(Vec<FlagPerm>),
    Unseen(u32),
    HighestModSeq(u64),
    MailboxId(String),
    /// `APPENDUID validity uid[,uid…]`
    AppendUid { uid_validity: u32, uids: Vec<u32> },
    /// `COPYUID validity source-set dest-set`
    CopyUid {
        uid_validity: u32,
        source: UidSet,
        destination: UidSet,
    },
    UidRequired,
    /// `MODIFIED seq-set` — UIDs/sequence numbers that failed a
    /// conditional `STORE`'s `UNCHANGEDSINCE` precondition.
    Modified(String),
    TryCreate,
    AlreadyExists,
    NonExistent,
    ClientBug,
    ServerBug,
    /// Any response code not modeled above, kept as `(name, value)`.
    Other(String, Option<String>),
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::Capability(caps) => write!(f, "CAPABILITY {}", caps.join(" ")),
            Code::ReadOnly => write!(f, "READ-ONLY"),
            Code::ReadWrite => write!(f, "READ-WRITE"),
            Code::UidValidity(v) => write!(f, "UIDVALIDITY {v}"),
            Code::UidNext(v) => write!(f, "UIDNEXT {v}"),
            Code::PermanentFlags(flags) => {
                let joined = flags
                    .iter()
                    .map(|f| f.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                write!(f, "PERMANENTFLAGS ({joined})")
            }
            Code::Unseen(v) => write!(f, "UNSEEN {v}"),
            Code::HighestModSeq(v) => write!(f, "HIGHESTMODSEQ {v}"),
            Code::MailboxId(id) => write!(f, "MAILBOXID ({id})"),
            Code::AppendUid { uid_validity, uids } => {
                let joined = uids
                    .iter()
                    .map(|u| u.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "APPENDUID {uid_validity} {joined}")
            }
            Code::CopyUid {
                uid_validity,
                source,
                destination,
            } => write!(
                f,
                "COPYUID {uid_validity} {} {}",
                source.to_canonical_string(),
                destination.to_canonical_string()
            ),
            Code::UidRequired => write!(f, "UIDREQUIRED"),
            Code::Modified(set) => write!(f, "MODIFIED {set}"),
            Code::TryCreate => write!(f, "TRYCREATE"),
            Code::AlreadyExists => write!(f, "ALREADYEXISTS"),
            Code::NonExistent => write!(f, "NONEXISTENT"),
            Code::ClientBug => write!(f, "CLIENTBUG"),
            Code::ServerBug => write!(f, "SERVERBUG"),
            Code::Other(name, Some(value)) => write!(f, "{name} {value}"),
            Code::Other(name, None) => write!(f, "{name}"),
        }
    }
}

/// The three tagged-response kinds, plus `PREAUTH` which only ever
/// appears in a greeting.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Ok,
    No,
    Bad,
    PreAuth,
    Bye,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::Ok => write!(f, "OK"),
            StatusKind::No => write!(f, "NO"),
            StatusKind::Bad => write!(f, "BAD"),
            StatusKind::PreAuth => write!(f, "PREAUTH"),
            StatusKind::Bye => write!(f, "BYE"),
        }
    }
}

/// The error taxonomy of §7: every handler either succeeds or returns one
/// of these three kinds, optionally carrying a response code. `Error`
/// owns its text; it is constructed by the call stack that detected the
/// failure and copied verbatim into the tagged response line.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("{kind:?}: {text}")]
pub struct Error {
    pub kind: ErrorKind,
    pub code: Option<Code>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Protocol violation: grammar, wrong state, unknown command, invalid
    /// arguments. The client can retry; the session continues.
    Bad,
    /// Operation refused or failed; the session continues.
    No,
    /// Fatal: the connection is closed after the response is emitted.
    Bye,
}

impl Error {
    pub fn bad(text: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Bad,
            code: None,
            text: text.into(),
        }
    }

    pub fn no(text: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::No,
            code: None,
            text: text.into(),
        }
    }

    pub fn bye(text: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Bye,
            code: None,
            text: text.into(),
        }
    }

    pub fn with_code(mut self, code: Code) -> Self {
        self.code = Some(code);
        self
    }
}

impl From<ErrorKind> for StatusKind {
    fn from(value: ErrorKind) -> Self {
        match value {
            ErrorKind::Bad => StatusKind::Bad,
            ErrorKind::No => StatusKind::No,
            ErrorKind::Bye => StatusKind::Bye,
        }
    }
}

/// The tagged completion response to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub tag: Option<Tag>,
    pub kind: StatusKind,
    pub code: Option<Code>,
    pub text: String,
}

impl StatusResponse {
    pub fn tagged(tag: Tag, kind: StatusKind, code: Option<Code>, text: impl Into<String>) -> Self {
        Self {
            tag: Some(tag),
            kind,
            code,
            text: text.into(),
        }
    }

    pub fn untagged(kind: StatusKind, code: Option<Code>, text: impl Into<String>) -> Self {
        Self {
            tag: None,
            kind,
            code,
            text: text.into(),
        }
    }

    pub fn from_error(tag: Tag, error: &Error) -> Self {
        Self::tagged(tag, error.kind.into(), error.code.clone(), error.text.clone())
    }
}

/// The server greeting (RFC 3501 §7.1.1/§7.1.2/§7.1.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub kind: StatusKind,
    pub code: Option<Code>,
    pub text: String,
}

/// ESEARCH result items (RFC 4731/9051 §6.4.4).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EsearchResult {
    /// The command tag this `ESEARCH` response answers, echoed back in its
    /// `(TAG "...")` response code (RFC 4731 §3.1).
    pub tag: String,
    pub uid: bool,
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub count: Option<u32>,
    pub all: Option<String>,
    pub mod_seq: Option<u64>,
}

/// All untagged (`*`) data a handler can stream mid-command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Data {
    Capability(Vec<String>),
    Exists(u32),
    Recent(u32),
    Flags(Vec<Flag>),
    List {
        attributes: Vec<MailboxAttribute>,
        delimiter: Option<char>,
        mailbox: Mailbox,
    },
    Lsub {
        attributes: Vec<MailboxAttribute>,
        delimiter: Option<char>,
        mailbox: Mailbox,
    },
    Status {
        mailbox: Mailbox,
        attributes: Vec<StatusAttributeValue>,
    },
    Search(Vec<u32>),
    Esearch(EsearchResult),
    /// Untagged `* OK [code] text` (§6 "Response codes"): a status line
    /// carrying a response code but no tag, e.g. the mandatory
    /// `UIDVALIDITY`/`UIDNEXT` lines `SELECT`/`EXAMINE` must emit.
    Ok { code: Option<Code>, text: String },
    Fetch(FetchItem),
    /// `* n FETCH (UID u ...)` sent instead of `* n FETCH` when UIDONLY is
    /// enabled (§4.4): wraps the same item but marks it `UIDFETCH`.
    UidFetch(FetchItem),
    Expunge(u32),
    /// `* VANISHED [EARLIER] uid-set` (QRESYNC), used both for UIDONLY
    /// EXPUNGE and for QRESYNC resynchronization.
    Vanished { earlier: bool, uids: UidSet },
    Enabled(Vec<String>),
    Bye { code: Option<Code>, text: String },
    Id(Vec<(String, Option<String>)>),
}

/// `+ ...` command continuation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation(pub String);
