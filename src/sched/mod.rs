//! Scheduler strategies and schedule-point dispatch.
//!
//! The runtime under instrumentation hands control to the active strategy at
//! each [`SchedulePoint`]; the strategy decides whether the calling thread
//! blocks, for how long, and what to report about remaining or diverged
//! schedule state. Exactly one strategy is installed per process lifetime,
//! selected at [`Scheduler::init`]; switching at runtime is unsupported and
//! strategy configuration is read-only after init.
//!
//! The [`Scheduler`] is an explicitly owned value. Call sites receive it (by
//! reference) instead of reaching into process-wide storage, so tests can
//! run several schedulers side by side.

pub mod fuzz;
pub mod point;
pub mod record;
pub mod replay;

pub use fuzz::{FuzzTimerConfig, FuzzTimerStrategy, DELAY_PROBABILITY_PCT};
pub use point::{SchedulePoint, WorkId, YieldPayload};
pub use record::{RecordStrategy, ScheduleEntry, ScheduleError};
pub use replay::{ReplayConfig, ReplayStrategy};

use crate::lcbn::{CallbackType, Lcbn};
use crate::thread::{self, ThreadKind};
use crate::tree::NodeRef;
use core::fmt;
use parking_lot::lock_api::RawMutex as _;
use std::io;
use std::path::Path;

// ============================================================================
// Execution lock
// ============================================================================

/// The process-wide execution lock.
///
/// Acquired at [`SchedulePoint::BeforeExecCb`] and released at
/// [`SchedulePoint::AfterExecCb`], and nowhere else: the worker-pool points
/// intentionally run unlocked so injected delays there create interleaving
/// diversity instead of serializing behind the lock. Not re-entrant; a
/// thread that acquires twice without releasing deadlocks.
///
/// Acquire and release happen at different call sites, so this wraps a raw
/// mutex rather than an RAII guard.
pub struct ExecLock {
    raw: parking_lot::RawMutex,
}

impl ExecLock {
    const fn new() -> Self {
        Self {
            raw: parking_lot::RawMutex::INIT,
        }
    }

    /// Blocks until the lock is held by the calling thread.
    pub fn acquire(&self) {
        self.raw.lock();
    }

    /// Releases the lock.
    ///
    /// The schedule-point protocol guarantees release happens on the thread
    /// that acquired at the matching `BeforeExecCb`.
    ///
    /// # Panics
    ///
    /// Panics if the lock is not held.
    pub fn release(&self) {
        assert!(self.raw.is_locked(), "execution lock released while free");
        // SAFETY: the point protocol pairs each release with an acquire on
        // the same thread (BeforeExecCb .. AfterExecCb bracket one callback
        // on one thread).
        unsafe { self.raw.unlock() }
    }

    /// Whether some thread currently holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }
}

impl fmt::Debug for ExecLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Shared state every strategy sees at a schedule point.
#[derive(Debug)]
pub struct SchedContext {
    exec_lock: ExecLock,
}

impl SchedContext {
    const fn new() -> Self {
        Self {
            exec_lock: ExecLock::new(),
        }
    }

    /// The process-wide execution lock.
    #[must_use]
    pub fn exec_lock(&self) -> &ExecLock {
        &self.exec_lock
    }
}

// ============================================================================
// Strategy interface
// ============================================================================

/// Advisory hint about which callback kind the runtime should prefer next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackHint {
    /// No preference; the runtime's natural order stands.
    Any,
    /// Prefer this callback type next.
    Only(CallbackType),
}

/// A pluggable scheduling policy.
///
/// Implementations decide what happens at each schedule point. All methods
/// take `&self`; strategies that track state use interior mutability, since
/// schedule points are raised concurrently from several threads.
pub trait Strategy: Send + Sync {
    /// Notifies the strategy that a node now exists.
    ///
    /// Strategies that track remaining work update counters here.
    fn register_lcbn(&self, lcbn: &Lcbn, node: NodeRef);

    /// Advisory hint about which callback kind should run next.
    fn next_cb_type(&self) -> CallbackHint;

    /// The core synchronization hook.
    ///
    /// May block the calling thread, may acquire or release the execution
    /// lock in `cx`, and must validate `payload` against `point`. The only
    /// operation with side effects visible across threads.
    ///
    /// # Panics
    ///
    /// Panics on a malformed payload or payload/point mismatch.
    fn thread_yield(&self, cx: &SchedContext, point: SchedulePoint, payload: &YieldPayload);

    /// Persists or discards the strategy's output at `path`.
    ///
    /// # Errors
    ///
    /// Propagates I/O failure writing or removing the artifact.
    fn emit(&self, path: &Path) -> io::Result<()>;

    /// Best-effort count of callbacks still expected, `None` when unknown.
    fn lcbns_remaining(&self) -> Option<u64>;

    /// Whether live execution has diverged from a target order, `None` when
    /// the strategy has no target to compare against.
    fn schedule_has_diverged(&self) -> Option<bool>;
}

// ============================================================================
// Modes and initialization
// ============================================================================

/// Which strategy family the scheduler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Record the live execution order for later replay.
    Record,
    /// Hold live execution to a previously recorded order.
    Replay,
    /// Perturb thread timing without changing logical order.
    FuzzTimer,
}

impl Mode {
    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::Replay => "replay",
            Self::FuzzTimer => "fuzz-timer",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mode-specific configuration handed to [`Scheduler::init`].
#[derive(Debug, Clone)]
pub enum ModeArgs {
    /// Arguments for [`Mode::Record`]. Recording needs none.
    Record,
    /// Arguments for [`Mode::Replay`].
    Replay(ReplayConfig),
    /// Arguments for [`Mode::FuzzTimer`].
    FuzzTimer(FuzzTimerConfig),
}

/// The installed strategy plus the shared schedule-point state.
///
/// Constructed once at process start; lives for the process.
pub struct Scheduler {
    mode: Mode,
    cx: SchedContext,
    strategy: Box<dyn Strategy>,
}

impl Scheduler {
    /// Installs the strategy for `mode`.
    ///
    /// # Panics
    ///
    /// Panics if `args` does not match `mode`, if the mode's configuration
    /// is invalid (fuzz bounds out of order), or if a replay schedule cannot
    /// be loaded. All are unrecoverable setup failures.
    #[must_use]
    pub fn init(mode: Mode, args: ModeArgs) -> Self {
        let strategy: Box<dyn Strategy> = match (mode, args) {
            (Mode::Record, ModeArgs::Record) => Box::new(RecordStrategy::new()),
            (Mode::Replay, ModeArgs::Replay(config)) => match ReplayStrategy::load(&config) {
                Ok(strategy) => Box::new(strategy),
                Err(err) => panic!("cannot load replay schedule: {err}"),
            },
            (Mode::FuzzTimer, ModeArgs::FuzzTimer(config)) => {
                Box::new(FuzzTimerStrategy::new(config))
            }
            (mode, args) => panic!("mode {mode} does not accept args {args:?}"),
        };
        tracing::info!(%mode, "scheduler strategy installed");
        Self {
            mode,
            cx: SchedContext::new(),
            strategy,
        }
    }

    /// The mode selected at init.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Notifies the strategy that `node` now exists.
    pub fn register_lcbn(&self, lcbn: &Lcbn, node: NodeRef) {
        self.strategy.register_lcbn(lcbn, node);
    }

    /// Advisory hint about which callback kind should run next.
    #[must_use]
    pub fn next_cb_type(&self) -> CallbackHint {
        self.strategy.next_cb_type()
    }

    /// Raises a schedule point.
    ///
    /// # Panics
    ///
    /// Panics if a `TP_*` point is raised from a thread not registered as
    /// [`ThreadKind::Threadpool`], or if the payload is malformed or does
    /// not belong to `point`.
    pub fn thread_yield(&self, point: SchedulePoint, payload: &YieldPayload) {
        if point.is_threadpool_point() {
            assert_eq!(
                thread::current_kind(),
                Some(ThreadKind::Threadpool),
                "{point} raised off a threadpool thread"
            );
        }
        self.strategy.thread_yield(&self.cx, point, payload);
    }

    /// Persists or discards the strategy's output at `path`.
    ///
    /// # Errors
    ///
    /// Propagates I/O failure from the strategy.
    pub fn emit(&self, path: &Path) -> io::Result<()> {
        self.strategy.emit(path)
    }

    /// Best-effort count of callbacks still expected, `None` when unknown.
    #[must_use]
    pub fn lcbns_remaining(&self) -> Option<u64> {
        self.strategy.lcbns_remaining()
    }

    /// Whether execution has diverged from the target order, `None` when not
    /// applicable.
    #[must_use]
    pub fn schedule_has_diverged(&self) -> Option<bool> {
        self.strategy.schedule_has_diverged()
    }

    /// The shared schedule-point state (exposed for strategy tests).
    #[must_use]
    pub fn context(&self) -> &SchedContext {
        &self.cx
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("mode", &self.mode)
            .field("cx", &self.cx)
            .finish_non_exhaustive()
    }
}
