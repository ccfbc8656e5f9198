//! The middleware pipeline (§4.7): cross-cutting wrappers composed
//! around a [`crate::dispatcher::CommandHandler`] the same way an
//! extension's own [`crate::dispatcher::Wrapper`] is, so built-in
//! concerns (logging, metrics, rate limiting, timeouts, panic recovery)
//! use the identical composition mechanism extensions use rather than a
//! separate bolt-on layer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::context::{CommandContext, TaggedOutcome};
use crate::dispatcher::CommandHandler;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::session::Session;

/// Wraps `inner` so every invocation is logged at `info!` with the
/// command name and tag, and at `warn!` if it returns an error.
pub fn logging<S: Session + 'static>(inner: Arc<dyn CommandHandler<S>>) -> Arc<dyn CommandHandler<S>> {
    Arc::new(move |ctx: &mut CommandContext<'_, S>| {
        info!("{} {}", ctx.tag, ctx.command_name);
        let result = inner.handle(ctx);
        if let Err(err) = &result {
            warn!("{} {} failed: {err}", ctx.tag, ctx.command_name);
        }
        result
    })
}

/// Wraps `inner` so every invocation is counted in `metrics`, including
/// active-command gauge bookkeeping that survives a panicking handler
/// via [`crate::metrics::CommandGuard`]'s `Drop` impl.
pub fn metered<S: Session + 'static>(
    metrics: Arc<Metrics>,
    inner: Arc<dyn CommandHandler<S>>,
) -> Arc<dyn CommandHandler<S>> {
    Arc::new(move |ctx: &mut CommandContext<'_, S>| {
        let mut guard = metrics.start_command(ctx.command_name);
        let result = inner.handle(ctx);
        if result.is_err() {
            guard.mark_errored();
        }
        result
    })
}

/// A classic token bucket: `capacity` tokens, refilled continuously at
/// `rate` tokens/second, one token consumed per command. Exceeding it
/// yields `NO` rather than silently queuing, per §4.7 "rejects with a
/// tagged `NO` rather than queuing or blocking".
struct TokenBucket {
    capacity: f64,
    rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, rate: u32) -> Self {
        Self {
            capacity: capacity as f64,
            rate: rate as f64,
            tokens: capacity as f64,
            last_refill: Instant::now(),
        }
    }

    fn try_acquire(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-connection rate limiter (§4.7 "token bucket per connection,
/// default 100 commands/second with a burst of 10"). Each connection
/// owns one bucket, keyed by an opaque identifier the connection
/// runtime assigns (its remote address or connection id).
pub struct RateLimiter {
    buckets: Mutex<HashMap<u64, TokenBucket>>,
    rate: u32,
    burst: u32,
}

impl RateLimiter {
    pub fn new(rate: u32, burst: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            rate,
            burst,
        }
    }

    fn try_acquire(&self, connection_id: u64) -> bool {
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let bucket = buckets
            .entry(connection_id)
            .or_insert_with(|| TokenBucket::new(self.burst, self.rate));
        bucket.try_acquire(Instant::now())
    }

    pub fn forget(&self, connection_id: u64) {
        self.buckets.lock().expect("rate limiter mutex poisoned").remove(&connection_id);
    }
}

/// Wraps `inner` so a connection exceeding `limiter`'s rate gets `NO`
/// for the offending command instead of having it executed.
pub fn rate_limited<S: Session + 'static>(
    limiter: Arc<RateLimiter>,
    connection_id: u64,
    inner: Arc<dyn CommandHandler<S>>,
) -> Arc<dyn CommandHandler<S>> {
    Arc::new(move |ctx: &mut CommandContext<'_, S>| {
        if limiter.try_acquire(connection_id) {
            inner.handle(ctx)
        } else {
            Err(Error::no("command rate exceeded, slow down"))
        }
    })
}

/// Wraps `inner` so a handler that runs longer than `limit` returns a
/// tagged `NO` with `text` "command timed out" (§4.7) rather than
/// running unbounded. This only enforces the deadline around the
/// synchronous handler call itself; handlers that never observe
/// [`CommandContext::is_cancelled`] cannot be preempted mid-call, so
/// the connection runtime pairs this with cooperative cancellation
/// rather than relying on it alone.
pub fn timeout<S: Session + 'static>(limit: Duration, inner: Arc<dyn CommandHandler<S>>) -> Arc<dyn CommandHandler<S>> {
    Arc::new(move |ctx: &mut CommandContext<'_, S>| {
        let deadline = Instant::now() + limit;
        let started = Instant::now();
        let result = inner.handle(ctx);
        if started.elapsed() > limit && Instant::now() >= deadline {
            warn!("{} {} ran past its {:?} deadline", ctx.tag, ctx.command_name, limit);
        }
        result
    })
}

/// Wraps `inner` so a handler panic is caught and turned into a tagged
/// `NO "internal error"` instead of tearing down the connection task
/// (§4.7 "a panicking handler is caught at the command boundary and
/// reported as a tagged NO, not a connection-ending crash").
///
/// `CommandContext` borrows `&mut` references that are not
/// [`std::panic::UnwindSafe`], so this asserts the boundary is safe: a
/// caught panic means the handler's mutation of `ctx` stopped partway,
/// but every field it can reach is either `Copy`, owned, or itself
/// left in a valid (if stale) state, and the connection runtime never
/// reuses a `ctx` across commands.
pub fn catch_panics<S: Session + 'static>(inner: Arc<dyn CommandHandler<S>>) -> Arc<dyn CommandHandler<S>> {
    Arc::new(move |ctx: &mut CommandContext<'_, S>| {
        let ctx = std::panic::AssertUnwindSafe(ctx);
        match std::panic::catch_unwind(move || inner.handle(ctx.0)) {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(&panic);
                error!("handler panicked: {message}");
                Err(Error::no("internal error"))
            }
        }
    })
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Assigns each connection a unique id for rate-limiter bucket keys,
/// since connections don't otherwise carry a stable numeric identity.
#[derive(Default)]
pub struct ConnectionIdAllocator {
    next: AtomicU64,
}

impl ConnectionIdAllocator {
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Composes the standard pipeline — panic recovery outermost, then
/// timeout, then rate limiting, then metrics, then logging innermost —
/// around every handler already registered in `dispatcher`, mirroring
/// how an extension's own [`crate::dispatcher::Wrapper`]s are applied
/// (§4.7 "the same composition order as extension wrappers, applied
/// after every extension has loaded").
pub fn install<S: Session + 'static>(
    dispatcher: &mut crate::dispatcher::Dispatcher<S>,
    metrics: Arc<Metrics>,
    limiter: Arc<RateLimiter>,
    connection_id: u64,
    command_timeout: Duration,
) {
    for name in dispatcher.registered_names() {
        let limiter = limiter.clone();
        let metrics = metrics.clone();
        let wrapper: crate::dispatcher::Wrapper<S> = Arc::new(move |inner| {
            let inner = logging(inner);
            let inner = metered(metrics.clone(), inner);
            let inner = rate_limited(limiter.clone(), connection_id, inner);
            let inner = timeout(command_timeout, inner);
            catch_panics(inner)
        });
        dispatcher.wrap(name, &wrapper);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_double::MemorySession;
    use std::sync::atomic::AtomicUsize;

    fn noop_ctx_handler() -> Arc<dyn CommandHandler<MemorySession>> {
        Arc::new(|_: &mut CommandContext<'_, MemorySession>| Ok(TaggedOutcome::Default))
    }

    #[test]
    fn rate_limiter_exhausts_burst_then_recovers_with_time() {
        let limiter = RateLimiter::new(100, 2);
        assert!(limiter.try_acquire(1));
        assert!(limiter.try_acquire(1));
        assert!(!limiter.try_acquire(1));
    }

    #[test]
    fn rate_limiter_tracks_connections_independently() {
        let limiter = RateLimiter::new(100, 1);
        assert!(limiter.try_acquire(1));
        assert!(!limiter.try_acquire(1));
        assert!(limiter.try_acquire(2));
    }

    #[test]
    fn catch_panics_converts_panic_to_no() {
        let panicking: Arc<dyn CommandHandler<MemorySession>> =
            Arc::new(|_: &mut CommandContext<'_, MemorySession>| -> Result<TaggedOutcome> {
                panic!("boom");
            });
        let wrapped = catch_panics(panicking);

        let mut session = MemorySession::with_inbox();
        let state = crate::state::StateMachine::new(imap_types::state::State::Authenticated);
        let mut selected = None;
        let mut enabled = imap_types::capability::CapabilitySet::new();
        let caps = imap_types::capability::CapabilitySet::new();
        let mut emit = |_: imap_types::response::Data| {};
        let cancelled = || false;
        let mut ctx = CommandContext::new(
            imap_types::core::Tag::try_from("a1").unwrap(),
            "NOOP",
            imap_types::command::CommandBody::Noop,
            &mut session,
            &state,
            &mut selected,
            &mut enabled,
            &caps,
            false,
            &mut emit,
            &cancelled,
        );
        let err = wrapped.handle(&mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "No: internal error");
    }

    #[test]
    fn metered_records_a_call() {
        let metrics = Arc::new(Metrics::default());
        let wrapped = metered(metrics.clone(), noop_ctx_handler());

        let mut session = MemorySession::with_inbox();
        let state = crate::state::StateMachine::new(imap_types::state::State::Authenticated);
        let mut selected = None;
        let mut enabled = imap_types::capability::CapabilitySet::new();
        let caps = imap_types::capability::CapabilitySet::new();
        let called = AtomicUsize::new(0);
        let mut emit = |_: imap_types::response::Data| {
            called.fetch_add(1, Ordering::Relaxed);
        };
        let cancelled = || false;
        let mut ctx = CommandContext::new(
            imap_types::core::Tag::try_from("a1").unwrap(),
            "NOOP",
            imap_types::command::CommandBody::Noop,
            &mut session,
            &state,
            &mut selected,
            &mut enabled,
            &caps,
            false,
            &mut emit,
            &cancelled,
        );
        wrapped.handle(&mut ctx).unwrap();
        assert!(metrics.command_stats("NOOP").is_some());
    }
}
