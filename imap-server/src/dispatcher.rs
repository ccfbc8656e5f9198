//! The command registry (§4.5 "Dispatcher and extension registry"):
//! resolves a command name to a handler chain and invokes it with a
//! materialized [`CommandContext`].

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;

use crate::context::{CommandContext, TaggedOutcome};
use crate::error::Result;
use crate::session::Session;

/// One command's worth of behavior. Implementations read `ctx.body`,
/// validate state with `ctx.state.require(..)`, call through to
/// `ctx.session`, stream untagged data with `ctx.emit`, and return the
/// tagged outcome.
pub trait CommandHandler<S: Session>: Send + Sync {
    fn handle(&self, ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome>;
}

impl<S: Session, F> CommandHandler<S> for F
where
    F: Fn(&mut CommandContext<'_, S>) -> Result<TaggedOutcome> + Send + Sync,
{
    fn handle(&self, ctx: &mut CommandContext<'_, S>) -> Result<TaggedOutcome> {
        self(ctx)
    }
}

/// A `WrapHandler` hook (§4.5 point 3): given the handler currently
/// registered for a name, produces the handler that should run from now
/// on (almost always something that calls through to `existing`).
pub type Wrapper<S> = Arc<dyn Fn(Arc<dyn CommandHandler<S>>) -> Arc<dyn CommandHandler<S>> + Send + Sync>;

/// Command name → handler chain. Re-registering a name replaces the
/// prior handler; the extension registry logs an audit entry when that
/// happens (§4.5 point 2 "replace-on-conflict ... an audit entry is
/// logged").
#[derive(Default)]
pub struct Dispatcher<S: Session> {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler<S>>>,
}

/// Manual impl: a derived one would require `S: Clone`, but `S` only ever
/// appears behind the `Arc<dyn CommandHandler<S>>` trait objects, which are
/// cheap to clone regardless of `S`. Connections clone a shared, fully
/// registered `Dispatcher` to install their own per-connection middleware
/// chain (§5.2) without disturbing other connections' chains.
impl<S: Session> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self { handlers: self.handlers.clone() }
    }
}

impl<S: Session + 'static> Dispatcher<S> {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Registers `handler` for `name`, logging an audit entry if it
    /// replaces an existing registration — the "last wins" tie-break
    /// §4.5 point 2 specifies.
    pub fn register(&mut self, name: &'static str, handler: Arc<dyn CommandHandler<S>>) {
        if self.handlers.insert(name, handler).is_some() {
            warn!("command handler for {name} replaced by a later registration");
        }
    }

    /// Composes `wrapper` around whatever is currently registered for
    /// `name`, if anything (§4.5 point 3). A wrapper for a command no
    /// extension has registered yet is a no-op — extensions that add
    /// their own new commands register them directly instead.
    pub fn wrap(&mut self, name: &'static str, wrapper: &Wrapper<S>) {
        if let Some(existing) = self.handlers.remove(name) {
            self.handlers.insert(name, wrapper(existing));
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler<S>>> {
        self.handlers.get(name.to_ascii_uppercase().as_str()).cloned()
    }

    pub fn registered_names(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_double::MemorySession;
    use imap_types::response::Code;

    #[test]
    fn later_registration_wins() {
        let mut dispatcher: Dispatcher<MemorySession> = Dispatcher::new();
        dispatcher.register("NOOP", Arc::new(|_: &mut CommandContext<'_, MemorySession>| Ok(TaggedOutcome::Default)));
        dispatcher.register(
            "NOOP",
            Arc::new(|_: &mut CommandContext<'_, MemorySession>| {
                Ok(TaggedOutcome::with_code(Code::ServerBug, "replaced"))
            }),
        );
        assert_eq!(dispatcher.registered_names().len(), 1);
    }

    #[test]
    fn wrap_composes_around_existing_handler() {
        let mut dispatcher: Dispatcher<MemorySession> = Dispatcher::new();
        dispatcher.register("NOOP", Arc::new(|_: &mut CommandContext<'_, MemorySession>| Ok(TaggedOutcome::Default)));

        let wrapper: Wrapper<MemorySession> = Arc::new(|inner| {
            Arc::new(move |ctx: &mut CommandContext<'_, MemorySession>| {
                let outcome = inner.handle(ctx)?;
                match outcome {
                    TaggedOutcome::Default => Ok(TaggedOutcome::with_code(Code::ServerBug, "wrapped")),
                    other => Ok(other),
                }
            })
        });
        dispatcher.wrap("NOOP", &wrapper);
        assert!(dispatcher.get("noop").is_some());
    }

    #[test]
    fn wrap_is_noop_for_unregistered_name() {
        let mut dispatcher: Dispatcher<MemorySession> = Dispatcher::new();
        let wrapper: Wrapper<MemorySession> = Arc::new(|inner| inner);
        dispatcher.wrap("FETCH", &wrapper);
        assert!(dispatcher.get("FETCH").is_none());
    }
}
