//! Fuzzing-timer strategy.
//!
//! Perturbs thread interleaving without changing logical callback order.
//! Worker-pool schedule points become eligible for a randomized sleep drawn
//! uniformly from the configured delay range; event-loop points bracket the
//! callback with the execution lock and never sleep, since delaying while
//! holding the lock (or with nothing left to do) only stalls the run
//! without diversifying interleavings.

use super::point::{SchedulePoint, YieldPayload};
use super::{CallbackHint, SchedContext, Strategy};
use crate::lcbn::Lcbn;
use crate::tree::NodeRef;
use crate::util::DetRng;
use parking_lot::Mutex;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Chance (percent) that an eligible yield point sleeps.
///
/// Fixed by policy rather than user-supplied so that fuzz runs stay
/// comparable across configurations.
pub const DELAY_PROBABILITY_PCT: u32 = 25;

/// Configuration for [`FuzzTimerStrategy`].
#[derive(Debug, Clone)]
pub struct FuzzTimerConfig {
    /// Smallest injectable delay.
    pub min_delay: Duration,
    /// Largest injectable delay. Must be `>= min_delay`.
    pub max_delay: Duration,
    /// RNG seed for a repeatable delay sequence; entropy-seeded when `None`.
    pub seed: Option<u64>,
}

impl FuzzTimerConfig {
    /// A config with the given delay bounds and entropy seeding.
    #[must_use]
    pub const fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            seed: None,
        }
    }
}

/// The fuzzing-timer strategy.
///
/// Configuration is read-only after construction. The RNG has its own lock,
/// independent of the execution lock, and is never held while sleeping.
#[derive(Debug)]
pub struct FuzzTimerStrategy {
    config: FuzzTimerConfig,
    rng: Mutex<DetRng>,
}

impl FuzzTimerStrategy {
    /// Builds the strategy, seeding the RNG once.
    ///
    /// # Panics
    ///
    /// Panics unless `min_delay <= max_delay`.
    #[must_use]
    pub fn new(config: FuzzTimerConfig) -> Self {
        assert!(
            config.min_delay <= config.max_delay,
            "fuzz delay bounds out of order: {:?} > {:?}",
            config.min_delay,
            config.max_delay
        );
        let rng = match config.seed {
            Some(seed) => DetRng::new(seed),
            None => DetRng::from_entropy(),
        };
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    /// The configured delay bounds.
    #[must_use]
    pub fn delay_bounds(&self) -> (Duration, Duration) {
        (self.config.min_delay, self.config.max_delay)
    }

    /// Draws whether to sleep and for how long.
    ///
    /// One uniform draw in `[min_delay, max_delay]` inclusive; when the
    /// bounds are equal the duration is exactly `min_delay`, avoiding a
    /// degenerate empty range draw. The RNG lock is dropped before any
    /// sleeping happens.
    fn draw_delay(&self) -> Option<Duration> {
        let mut rng = self.rng.lock();
        if rng.next_percent() >= DELAY_PROBABILITY_PCT {
            return None;
        }
        Some(rng.duration_in(self.config.min_delay..=self.config.max_delay))
    }
}

impl Strategy for FuzzTimerStrategy {
    fn register_lcbn(&self, _lcbn: &Lcbn, node: NodeRef) {
        // No structural tracking; only the contract check.
        assert!(!node.is_none(), "register_lcbn with a null node ref");
    }

    fn next_cb_type(&self) -> CallbackHint {
        CallbackHint::Any
    }

    fn thread_yield(&self, cx: &SchedContext, point: SchedulePoint, payload: &YieldPayload) {
        payload.assert_valid_for(point);
        let delay = match point {
            SchedulePoint::BeforeExecCb => {
                // Sleeping while holding the lock would only stall the
                // system, not diversify interleavings.
                cx.exec_lock().acquire();
                None
            }
            SchedulePoint::AfterExecCb => {
                cx.exec_lock().release();
                None
            }
            SchedulePoint::TpGotWork | SchedulePoint::TpBeforePutDone => self.draw_delay(),
            // The thread has no further immediate action.
            SchedulePoint::TpAfterPutDone => None,
        };
        if let Some(delay) = delay {
            tracing::debug!(%point, ?delay, "injecting fuzz delay");
            std::thread::sleep(delay);
        }
    }

    fn emit(&self, path: &Path) -> io::Result<()> {
        // No durable artifact; an absent file signals "no schedule
        // recorded", so remove anything stale.
        match std::fs::remove_file(path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            result => result,
        }
    }

    fn lcbns_remaining(&self) -> Option<u64> {
        None
    }

    fn schedule_has_diverged(&self) -> Option<bool> {
        None
    }
}
