//! The extension registry (§4.5, §9 "extension composition ... a tagged
//! variant over a capability set"): loads extensions in dependency order,
//! merges their capabilities, registers their handlers, and composes
//! their wrappers around whatever is already registered.
//!
//! Concrete extensions (CONDSTORE, UIDPLUS, SEARCHRES, QRESYNC, UIDONLY,
//! …) are external collaborators per §1; this module only specifies and
//! drives the registration contract. [`id`] is the one demonstration
//! extension this workspace ships, used to exercise the mechanism end to
//! end.

pub mod id;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::info;

use imap_types::capability::{Capability, CapabilitySet};

use crate::dispatcher::{CommandHandler, Dispatcher, Wrapper};
use crate::error::Result;
use crate::session::Session;

/// The programmatic boundary §6 "Extension registration" specifies.
/// `Name`/`Capabilities`/`Dependencies` are plain data; the rest are
/// hooks the registry calls once, at load time, in dependency order.
pub trait Extension<S: Session>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Capability strings this extension contributes to the process-wide
    /// set once loaded.
    fn capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// Names of other extensions that must be loaded first (e.g.
    /// `LIST-STATUS` depends on `LIST-EXTENDED`; `UIDONLY` on
    /// `CONDSTORE`). Unknown names are a startup error, same as a cycle.
    fn dependencies(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// New command handlers this extension adds outright (as opposed to
    /// wrapping an existing one).
    fn command_handlers(&self) -> Vec<(&'static str, Arc<dyn CommandHandler<S>>)> {
        Vec::new()
    }

    /// Wrappers to compose around already-registered handlers, applied
    /// outermost-extension-last per §4.5 point 3 ("earlier extensions sit
    /// closer to the base").
    fn wrappers(&self) -> Vec<(&'static str, Wrapper<S>)> {
        Vec::new()
    }

    /// Called once `ENABLE <this extension's capability>` has taken
    /// effect on a connection.
    fn on_enabled(&self, _connection_id: u64) -> Result<()> {
        Ok(())
    }
}

/// Topologically sorts `extensions` by [`Extension::dependencies`],
/// loads each one (merge capabilities, register handlers, compose
/// wrappers) into `dispatcher`/`capabilities`, and returns the load
/// order for diagnostics. A dependency cycle, or a dependency on an
/// extension not present in `extensions`, is a startup error.
pub struct ExtensionRegistry<S: Session> {
    load_order: Vec<&'static str>,
    extensions: Vec<Arc<dyn Extension<S>>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtensionLoadError {
    #[error("extension {0:?} depends on unregistered extension {1:?}")]
    UnknownDependency(&'static str, &'static str),
    #[error("extension dependency graph has a cycle involving {0:?}")]
    Cycle(&'static str),
}

impl<S: Session + 'static> ExtensionRegistry<S> {
    /// Topologically sorts and loads every extension into `dispatcher`
    /// and `capabilities`, mutating both in dependency order.
    pub fn load(
        extensions: Vec<Arc<dyn Extension<S>>>,
        dispatcher: &mut Dispatcher<S>,
        capabilities: &mut CapabilitySet,
    ) -> std::result::Result<Self, ExtensionLoadError> {
        let order = topological_order(&extensions)?;

        let by_name: HashMap<&'static str, Arc<dyn Extension<S>>> =
            extensions.iter().map(|e| (e.name(), e.clone())).collect();

        for name in &order {
            let ext = by_name.get(name).expect("name came from this same extension list");

            for cap in ext.capabilities() {
                capabilities.insert(cap);
            }
            for (command_name, handler) in ext.command_handlers() {
                dispatcher.register(command_name, handler);
            }
            for (command_name, wrapper) in ext.wrappers() {
                dispatcher.wrap(command_name, &wrapper);
            }
            info!("loaded extension {name}");
        }

        Ok(Self {
            load_order: order,
            extensions,
        })
    }

    pub fn load_order(&self) -> &[&'static str] {
        &self.load_order
    }

    pub fn notify_enabled(&self, capability: &str, connection_id: u64) -> Result<()> {
        for ext in &self.extensions {
            if ext.capabilities().iter().any(|c| c.as_str().eq_ignore_ascii_case(capability)) {
                ext.on_enabled(connection_id)?;
            }
        }
        Ok(())
    }
}

fn topological_order<S: Session>(
    extensions: &[Arc<dyn Extension<S>>],
) -> std::result::Result<Vec<&'static str>, ExtensionLoadError> {
    let names: HashSet<&'static str> = extensions.iter().map(|e| e.name()).collect();
    for ext in extensions {
        for dep in ext.dependencies() {
            if !names.contains(dep) {
                return Err(ExtensionLoadError::UnknownDependency(ext.name(), dep));
            }
        }
    }

    let mut order = Vec::with_capacity(extensions.len());
    let mut permanent = HashSet::new();
    let mut temporary = HashSet::new();
    let by_name: HashMap<&'static str, &Arc<dyn Extension<S>>> = extensions.iter().map(|e| (e.name(), e)).collect();

    fn visit<'e, S: Session>(
        name: &'static str,
        by_name: &HashMap<&'static str, &'e Arc<dyn Extension<S>>>,
        permanent: &mut HashSet<&'static str>,
        temporary: &mut HashSet<&'static str>,
        order: &mut Vec<&'static str>,
    ) -> std::result::Result<(), ExtensionLoadError> {
        if permanent.contains(name) {
            return Ok(());
        }
        if !temporary.insert(name) {
            return Err(ExtensionLoadError::Cycle(name));
        }
        let ext = by_name[name];
        for dep in ext.dependencies() {
            visit(dep, by_name, permanent, temporary, order)?;
        }
        temporary.remove(name);
        permanent.insert(name);
        order.push(name);
        Ok(())
    }

    for ext in extensions {
        visit(ext.name(), &by_name, &mut permanent, &mut temporary, &mut order)?;
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CommandContext, TaggedOutcome};
    use crate::session::test_double::MemorySession;

    struct Base;
    impl Extension<MemorySession> for Base {
        fn name(&self) -> &'static str {
            "BASE"
        }
        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::new("BASE")]
        }
    }

    struct DependsOnBase;
    impl Extension<MemorySession> for DependsOnBase {
        fn name(&self) -> &'static str {
            "DEPENDENT"
        }
        fn dependencies(&self) -> Vec<&'static str> {
            vec!["BASE"]
        }
        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::new("DEPENDENT")]
        }
    }

    #[test]
    fn dependencies_load_before_dependents() {
        let mut dispatcher = Dispatcher::new();
        let mut caps = CapabilitySet::new();
        let registry = ExtensionRegistry::load(
            vec![Arc::new(DependsOnBase), Arc::new(Base)],
            &mut dispatcher,
            &mut caps,
        )
        .unwrap();
        let order = registry.load_order();
        assert_eq!(order, &["BASE", "DEPENDENT"]);
        assert!(caps.contains("BASE"));
        assert!(caps.contains("DEPENDENT"));
    }

    #[test]
    fn unknown_dependency_is_a_load_error() {
        struct Orphan;
        impl Extension<MemorySession> for Orphan {
            fn name(&self) -> &'static str {
                "ORPHAN"
            }
            fn dependencies(&self) -> Vec<&'static str> {
                vec!["NOT-REGISTERED"]
            }
        }
        let mut dispatcher = Dispatcher::new();
        let mut caps = CapabilitySet::new();
        let err = ExtensionRegistry::load(vec![Arc::new(Orphan)], &mut dispatcher, &mut caps).unwrap_err();
        assert!(matches!(err, ExtensionLoadError::UnknownDependency("ORPHAN", "NOT-REGISTERED")));
    }

    #[test]
    fn cycle_is_a_load_error() {
        struct A;
        impl Extension<MemorySession> for A {
            fn name(&self) -> &'static str {
                "A"
            }
            fn dependencies(&self) -> Vec<&'static str> {
                vec!["B"]
            }
        }
        struct B;
        impl Extension<MemorySession> for B {
            fn name(&self) -> &'static str {
                "B"
            }
            fn dependencies(&self) -> Vec<&'static str> {
                vec!["A"]
            }
        }
        let mut dispatcher = Dispatcher::new();
        let mut caps = CapabilitySet::new();
        let err = ExtensionRegistry::load(vec![Arc::new(A), Arc::new(B)], &mut dispatcher, &mut caps).unwrap_err();
        assert!(matches!(err, ExtensionLoadError::Cycle(_)));
    }

    #[test]
    fn wrappers_compose_around_registered_handler() {
        let mut dispatcher: Dispatcher<MemorySession> = Dispatcher::new();
        dispatcher.register("NOOP", Arc::new(|_: &mut CommandContext<'_, MemorySession>| Ok(TaggedOutcome::Default)));

        struct Wrapping;
        impl Extension<MemorySession> for Wrapping {
            fn name(&self) -> &'static str {
                "WRAPPING"
            }
            fn wrappers(&self) -> Vec<(&'static str, Wrapper<MemorySession>)> {
                vec![(
                    "NOOP",
                    Arc::new(|inner| {
                        Arc::new(move |ctx: &mut CommandContext<'_, MemorySession>| inner.handle(ctx))
                            as Arc<dyn CommandHandler<MemorySession>>
                    }),
                )]
            }
        }

        let mut caps = CapabilitySet::new();
        ExtensionRegistry::load(vec![Arc::new(Wrapping)], &mut dispatcher, &mut caps).unwrap();
        assert!(dispatcher.get("NOOP").is_some());
    }

    #[test]
    fn notify_enabled_only_fires_the_matching_extension() {
        use std::sync::Mutex;

        struct Recording {
            cap: &'static str,
            seen: Arc<Mutex<Vec<u64>>>,
        }
        impl Extension<MemorySession> for Recording {
            fn name(&self) -> &'static str {
                self.cap
            }
            fn capabilities(&self) -> Vec<Capability> {
                vec![Capability::new(self.cap)]
            }
            fn on_enabled(&self, connection_id: u64) -> Result<()> {
                self.seen.lock().unwrap().push(connection_id);
                Ok(())
            }
        }

        let uidonly_seen = Arc::new(Mutex::new(Vec::new()));
        let condstore_seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();
        let mut caps = CapabilitySet::new();
        let registry = ExtensionRegistry::load(
            vec![
                Arc::new(Recording { cap: "UIDONLY", seen: uidonly_seen.clone() }),
                Arc::new(Recording { cap: "CONDSTORE", seen: condstore_seen.clone() }),
            ],
            &mut dispatcher,
            &mut caps,
        )
        .unwrap();

        registry.notify_enabled("UIDONLY", 7).unwrap();

        assert_eq!(&*uidonly_seen.lock().unwrap(), &[7]);
        assert!(condstore_seen.lock().unwrap().is_empty());
    }
}
