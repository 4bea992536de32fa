//! Replay strategy.
//!
//! Holds live execution to a previously recorded schedule. The strategy
//! advises the runtime through [`Strategy::next_cb_type`] which callback
//! kind the recording expects next, and latches divergence the first time a
//! completed callback's type disagrees with the recording. Divergence is a
//! finding, not an error: the run continues, and the runtime reads the
//! verdict through [`Strategy::schedule_has_diverged`].

use super::point::{SchedulePoint, YieldPayload};
use super::record::{ScheduleEntry, ScheduleError};
use super::{CallbackHint, SchedContext, Strategy};
use crate::lcbn::Lcbn;
use crate::tree::NodeRef;
use parking_lot::Mutex;
use std::io::{self, BufRead as _, Write as _};
use std::path::{Path, PathBuf};

/// Configuration for [`ReplayStrategy`].
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Path of the recorded schedule to replay.
    pub schedule: PathBuf,
}

impl ReplayConfig {
    /// A config replaying the schedule at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            schedule: path.into(),
        }
    }
}

#[derive(Debug)]
struct ReplayState {
    cursor: usize,
    diverged: bool,
}

/// The replay strategy.
#[derive(Debug)]
pub struct ReplayStrategy {
    entries: Vec<ScheduleEntry>,
    state: Mutex<ReplayState>,
}

impl ReplayStrategy {
    /// Loads the recorded schedule named by `config`.
    ///
    /// # Errors
    ///
    /// Fails if the schedule cannot be read or a line does not parse.
    pub fn load(config: &ReplayConfig) -> Result<Self, ScheduleError> {
        let file = std::fs::File::open(&config.schedule)?;
        let mut entries = Vec::new();
        for line in io::BufReader::new(file).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            entries.push(line.parse()?);
        }
        tracing::info!(
            path = %config.schedule.display(),
            entries = entries.len(),
            "replay schedule loaded"
        );
        Ok(Self {
            entries,
            state: Mutex::new(ReplayState {
                cursor: 0,
                diverged: false,
            }),
        })
    }

    /// The recorded entries, in execution order.
    #[must_use]
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }
}

impl Strategy for ReplayStrategy {
    fn register_lcbn(&self, _lcbn: &Lcbn, node: NodeRef) {
        assert!(!node.is_none(), "register_lcbn with a null node ref");
    }

    fn next_cb_type(&self) -> CallbackHint {
        let state = self.state.lock();
        match self.entries.get(state.cursor) {
            Some(entry) => CallbackHint::Only(entry.cb_type),
            None => CallbackHint::Any,
        }
    }

    fn thread_yield(&self, cx: &SchedContext, point: SchedulePoint, payload: &YieldPayload) {
        payload.assert_valid_for(point);
        match (point, payload) {
            (SchedulePoint::BeforeExecCb, YieldPayload::BeforeExecCb(_)) => {
                cx.exec_lock().acquire();
            }
            (SchedulePoint::AfterExecCb, YieldPayload::AfterExecCb(spd)) => {
                let mut state = self.state.lock();
                if !state.diverged {
                    match self.entries.get(state.cursor) {
                        Some(entry) if entry.cb_type == spd.cb_type => state.cursor += 1,
                        // Ran past the recording, or ran the wrong kind.
                        _ => {
                            tracing::warn!(
                                cursor = state.cursor,
                                observed = %spd.cb_type,
                                "live execution diverged from recorded schedule"
                            );
                            state.diverged = true;
                        }
                    }
                }
                drop(state);
                cx.exec_lock().release();
            }
            _ => {}
        }
    }

    fn emit(&self, path: &Path) -> io::Result<()> {
        // Persist what is left unconsumed, for post-run inspection.
        let state = self.state.lock();
        let mut out = io::BufWriter::new(std::fs::File::create(path)?);
        for entry in &self.entries[state.cursor.min(self.entries.len())..] {
            writeln!(out, "{entry}")?;
        }
        out.flush()
    }

    fn lcbns_remaining(&self) -> Option<u64> {
        let state = self.state.lock();
        Some((self.entries.len() - state.cursor.min(self.entries.len())) as u64)
    }

    fn schedule_has_diverged(&self) -> Option<bool> {
        Some(self.state.lock().diverged)
    }
}
