//! The `STATUS` command's data items.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusAttribute {
    Messages,
    Recent,
    UidNext,
    UidValidity,
    Unseen,
    HighestModSeq,
    /// `SIZE` (RFC 8438)
    Size,
    /// `MAILBOXID` (RFC 8474)
    MailboxId,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusAttributeValue {
    Messages(u32),
    Recent(u32),
    UidNext(u32),
    UidValidity(u32),
    Unseen(u32),
    HighestModSeq(u64),
    Size(u64),
    MailboxId(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusOptions {
    pub attributes: Vec<StatusAttribute>,
}
