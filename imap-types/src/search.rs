//! `SEARCH`/`ESEARCH` criteria and result shapes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::datetime::NaiveDate;
use crate::flag::Flag;
use crate::sequence::{SeqSet, UidSet};

/// One search key of the IMAP `SEARCH` grammar (RFC 3501 §6.4.4 /
/// RFC 9051 §6.4.4). `And` is implicit in the wire grammar (space is the
/// connective); it is made explicit here as a `Vec`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    All,
    Answered,
    Bcc(String),
    Before(NaiveDate),
    Body(String),
    Cc(String),
    Deleted,
    Draft,
    Flagged,
    From(String),
    Header(String, String),
    Keyword(String),
    Larger(u32),
    New,
    Not(Box<SearchKey>),
    Old,
    On(NaiveDate),
    Or(Box<SearchKey>, Box<SearchKey>),
    Recent,
    Seen,
    SentBefore(NaiveDate),
    SentOn(NaiveDate),
    SentSince(NaiveDate),
    Since(NaiveDate),
    Smaller(u32),
    Subject(String),
    Text(String),
    To(String),
    Unanswered,
    Undeleted,
    Undraft,
    Unflagged,
    Unkeyword(String),
    Unseen,
    SequenceSet(SeqSet),
    Uid(UidSet),
    /// `$` — the saved result of a previous `SEARCH ... SAVE` (SEARCHRES).
    SavedResult,
    /// `(CHANGEDSINCE)`/modseq-aware criterion result of CONDSTORE parsing,
    /// kept generic as a flag name the caller interprets.
    ModSeqFlag { modseq: u64 },
    And(Vec<SearchKey>),
}

/// What `RETURN (...)` asked `ESEARCH` to compute.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReturnOptions {
    pub min: bool,
    pub max: bool,
    pub all: bool,
    pub count: bool,
    pub save: bool,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOptions {
    /// Classic `* SEARCH n1 n2 …` response.
    Classic,
    /// `* ESEARCH (TAG "…") …` response, requesting the given subset.
    Extended(ReturnOptions),
}

/// The numbers an `ESEARCH`-shaped search found, before the handler knows
/// which subset the client asked `RETURN` to report.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResult {
    pub matched: Vec<u32>,
    pub highest_mod_seq: Option<u64>,
}
