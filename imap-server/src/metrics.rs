//! Process-wide, atomically mutated counters and gauges (§3 "Metrics",
//! §4.7 "Metrics" middleware).
//!
//! Kept as a plain struct of atomics rather than pulling in a metrics
//! crate: nothing in the retrieval pack depends on one, and the surface
//! this spec asks for (two counters, a gauge, and a per-command table) is
//! small enough that a dedicated crate would be pure overhead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, Default)]
struct PerCommand {
    count: AtomicU64,
    duration_nanos: AtomicU64,
}

#[derive(Debug, Default)]
pub struct Metrics {
    commands_total: AtomicU64,
    command_errors: AtomicU64,
    active_commands: AtomicI64,
    per_command: RwLock<HashMap<String, PerCommand>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands_total(&self) -> u64 {
        self.commands_total.load(Ordering::Relaxed)
    }

    pub fn command_errors(&self) -> u64 {
        self.command_errors.load(Ordering::Relaxed)
    }

    pub fn active_commands(&self) -> i64 {
        self.active_commands.load(Ordering::Relaxed)
    }

    /// Call on handler entry; returns a guard that records completion
    /// (count, duration, and decrements `ActiveCommands`) on drop, so a
    /// panicking handler still releases the gauge (§4.7 "decremented on
    /// exit even on panic").
    pub fn start_command<'a>(&'a self, name: &str) -> CommandGuard<'a> {
        self.commands_total.fetch_add(1, Ordering::Relaxed);
        self.active_commands.fetch_add(1, Ordering::Relaxed);
        CommandGuard {
            metrics: self,
            name: name.to_ascii_uppercase(),
            start: Instant::now(),
            errored: false,
        }
    }

    fn finish_command(&self, name: &str, elapsed: Duration, errored: bool) {
        self.active_commands.fetch_sub(1, Ordering::Relaxed);
        if errored {
            self.command_errors.fetch_add(1, Ordering::Relaxed);
        }

        let table = self.per_command.read().expect("metrics lock poisoned");
        if let Some(entry) = table.get(name) {
            entry.count.fetch_add(1, Ordering::Relaxed);
            entry
                .duration_nanos
                .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
            return;
        }
        drop(table);

        let mut table = self.per_command.write().expect("metrics lock poisoned");
        let entry = table.entry(name.to_string()).or_default();
        entry.count.fetch_add(1, Ordering::Relaxed);
        entry
            .duration_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    /// `(count, total duration)` for one command name, for tests and
    /// diagnostic endpoints.
    pub fn command_stats(&self, name: &str) -> Option<(u64, Duration)> {
        let table = self.per_command.read().expect("metrics lock poisoned");
        table.get(&name.to_ascii_uppercase()).map(|entry| {
            (
                entry.count.load(Ordering::Relaxed),
                Duration::from_nanos(entry.duration_nanos.load(Ordering::Relaxed)),
            )
        })
    }
}

use std::time::Instant;

pub struct CommandGuard<'a> {
    metrics: &'a Metrics,
    name: String,
    start: Instant,
    errored: bool,
}

impl<'a> CommandGuard<'a> {
    pub fn mark_errored(&mut self) {
        self.errored = true;
    }
}

impl<'a> Drop for CommandGuard<'a> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        self.metrics.finish_command(&self.name, elapsed, self.errored);
    }
}
