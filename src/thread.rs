//! Thread registration for schedule-point dispatch.
//!
//! The runtime under instrumentation runs one event-loop thread and a pool
//! of worker threads. Schedule points raised from the pool (`TP_*`) are only
//! legal on a thread registered as [`ThreadKind::Threadpool`]; dispatch
//! enforces this fatally. Registration also hands out the small integer
//! thread id recorded in callback records as the executing thread.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

/// The role a registered thread plays in the runtime under instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadKind {
    /// The event-loop thread.
    EventLoop,
    /// A worker thread in the pool.
    Threadpool,
}

impl ThreadKind {
    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EventLoop => "event-loop",
            Self::Threadpool => "threadpool",
        }
    }
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: Cell<Option<(ThreadKind, u64)>> = const { Cell::new(None) };
}

/// Registers the calling thread and returns its id.
///
/// Re-registering with the same kind is a no-op that returns the existing id.
///
/// # Panics
///
/// Panics if the thread was already registered with a different kind.
pub fn register_thread(kind: ThreadKind) -> u64 {
    CURRENT.with(|current| match current.get() {
        Some((existing, id)) => {
            assert_eq!(
                existing,
                kind,
                "thread already registered as {}",
                existing.name()
            );
            id
        }
        None => {
            let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
            current.set(Some((kind, id)));
            id
        }
    })
}

/// The calling thread's registered kind, if any.
#[must_use]
pub fn current_kind() -> Option<ThreadKind> {
    CURRENT.with(|current| current.get().map(|(kind, _)| kind))
}

/// The calling thread's registered id, if any.
#[must_use]
pub fn current_id() -> Option<u64> {
    CURRENT.with(|current| current.get().map(|(_, id)| id))
}
