//! The per-connection state-machine holder (§4.2, §5 "per-connection
//! state machine mutation uses a read/write mutex").
//!
//! [`imap_types::state::State`] is the plain value and its transition
//! table; this module adds the lock, the hook lists, and the
//! `RequireState` guard a connection actually drives commands through.

use std::sync::RwLock;

use imap_types::response::Error as ProtocolError;
use imap_types::state::State;

type Hook = Box<dyn Fn(State, State) -> Result<(), ProtocolError> + Send + Sync>;

/// Runs under the write lock per §5; documented there as "must not call
/// back into the machine" — a hook that tries to `transition` again will
/// deadlock rather than silently reenter.
#[derive(Default)]
struct Hooks {
    before: Vec<Hook>,
    after: Vec<Hook>,
}

pub struct StateMachine {
    state: RwLock<State>,
    hooks: Hooks,
}

impl StateMachine {
    pub fn new(initial: State) -> Self {
        Self {
            state: RwLock::new(initial),
            hooks: Hooks::default(),
        }
    }

    pub fn on_before_transition<F>(&mut self, hook: F)
    where
        F: Fn(State, State) -> Result<(), ProtocolError> + Send + Sync + 'static,
    {
        self.hooks.before.push(Box::new(hook));
    }

    pub fn on_after_transition<F>(&mut self, hook: F)
    where
        F: Fn(State, State) -> Result<(), ProtocolError> + Send + Sync + 'static,
    {
        self.hooks.after.push(Box::new(hook));
    }

    pub fn current(&self) -> State {
        *self.state.read().expect("state lock poisoned")
    }

    pub fn require(&self, allowed: &[State]) -> Result<(), ProtocolError> {
        let current = self.current();
        if allowed.contains(&current) {
            Ok(())
        } else {
            Err(ProtocolError::bad(format!(
                "command not valid in state {current:?}"
            )))
        }
    }

    /// Validates, runs before-hooks, mutates, runs after-hooks. A failing
    /// before-hook aborts without mutation; a failing after-hook is
    /// reported to the caller but the transition already stands (§4.2).
    pub fn transition(&self, target: State) -> Result<(), ProtocolError> {
        let current = self.current();
        if !current.can_transition_to(target) {
            return Err(ProtocolError::bad(format!(
                "cannot transition from {current:?} to {target:?}"
            )));
        }

        for hook in &self.hooks.before {
            hook(current, target)?;
        }

        *self.state.write().expect("state lock poisoned") = target;

        for hook in &self.hooks.after {
            hook(current, target)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn disallowed_transition_leaves_state_unchanged() {
        let machine = StateMachine::new(State::NotAuthenticated);
        assert!(machine.transition(State::Selected).is_err());
        assert_eq!(machine.current(), State::NotAuthenticated);
    }

    #[test]
    fn allowed_transition_mutates() {
        let machine = StateMachine::new(State::NotAuthenticated);
        machine.transition(State::Authenticated).unwrap();
        assert_eq!(machine.current(), State::Authenticated);
    }

    #[test]
    fn failing_before_hook_blocks_mutation() {
        let mut machine = StateMachine::new(State::NotAuthenticated);
        machine.on_before_transition(|_from, _to| Err(ProtocolError::bad("nope")));
        assert!(machine.transition(State::Authenticated).is_err());
        assert_eq!(machine.current(), State::NotAuthenticated);
    }

    #[test]
    fn failing_after_hook_reports_but_transition_stands() {
        let mut machine = StateMachine::new(State::NotAuthenticated);
        machine.on_after_transition(|_from, _to| Err(ProtocolError::bad("leaky hook")));
        let result = machine.transition(State::Authenticated);
        assert!(result.is_err());
        assert_eq!(machine.current(), State::Authenticated);
    }

    #[test]
    fn hooks_observe_from_and_to() {
        let mut machine = StateMachine::new(State::NotAuthenticated);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        machine.on_after_transition(move |from, to| {
            if from == State::NotAuthenticated && to == State::Authenticated {
                seen2.fetch_add(1, Ordering::Relaxed);
            }
            Ok(())
        });
        machine.transition(State::Authenticated).unwrap();
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }
}
