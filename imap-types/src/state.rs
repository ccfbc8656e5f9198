//! Connection state and the selected-mailbox handle it carries.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::mailbox::Mailbox;

/// A snapshot of which mailbox is selected and whether it was opened
/// read-only (`EXAMINE`) or read-write (`SELECT`).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedMailbox {
    pub name: Mailbox,
    pub read_only: bool,
}

/// The four connection states of §3/§4.2. `State` itself does not carry
/// payload for `Selected` — that lives in [`SelectedMailbox`], owned by
/// the connection runtime, so that a `CLOSE`/`UNSELECT` can drop it
/// without constructing a new `State` value.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    NotAuthenticated,
    Authenticated,
    Selected,
    Logout,
}

impl State {
    /// The default transition table of §3: which states this state may
    /// move to.
    pub fn allowed_transitions(self) -> &'static [State] {
        match self {
            State::NotAuthenticated => &[State::Authenticated, State::Logout],
            State::Authenticated => &[State::Selected, State::NotAuthenticated, State::Logout],
            State::Selected => &[State::Authenticated, State::Logout],
            State::Logout => &[],
        }
    }

    pub fn can_transition_to(self, target: State) -> bool {
        self.allowed_transitions().contains(&target)
    }
}
