//! Recording strategy and the persisted schedule format.
//!
//! Records the live execution order — one [`ScheduleEntry`] per completed
//! callback — and writes it out at [`Strategy::emit`] so a later run can
//! replay it. The exec window is still bracketed by the execution lock so
//! recorded runs and fuzzed runs see the same serialization discipline.

use super::point::{SchedulePoint, YieldPayload};
use super::{CallbackHint, SchedContext, Strategy};
use crate::lcbn::{CallbackType, Lcbn};
use crate::tree::NodeRef;
use core::fmt;
use parking_lot::Mutex;
use std::io::{self, Write as _};
use std::path::Path;
use std::str::FromStr;

/// One line of a persisted schedule: execution index, callback type, and the
/// node identifier from the emitting run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Zero-based execution index.
    pub exec_id: u64,
    /// The callback type that ran.
    pub cb_type: CallbackType,
    /// The node that ran, as the emitting run's identifier.
    pub node: NodeRef,
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.exec_id, self.cb_type, self.node)
    }
}

impl FromStr for ScheduleEntry {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ScheduleError::Malformed {
            line: s.to_string(),
        };
        let mut parts = s.split(' ');
        let exec_id = parts
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(malformed)?;
        let cb_type = parts
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(malformed)?;
        let node = parts
            .next()
            .and_then(|v| v.strip_prefix("0x"))
            .and_then(|v| u64::from_str_radix(v, 16).ok())
            .map(NodeRef::from_raw)
            .ok_or_else(malformed)?;
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(Self {
            exec_id,
            cb_type,
            node,
        })
    }
}

/// Error reading or writing a persisted schedule.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// Underlying I/O failure.
    #[error("schedule I/O: {0}")]
    Io(#[from] io::Error),
    /// A line that does not parse as a schedule entry.
    #[error("malformed schedule line {line:?}")]
    Malformed {
        /// The offending line.
        line: String,
    },
}

#[derive(Debug, Default)]
struct RecordState {
    registered: u64,
    entries: Vec<ScheduleEntry>,
}

/// The recording strategy.
///
/// Buffers one entry per completed callback; [`Strategy::emit`] writes them
/// one per line in execution order.
#[derive(Debug, Default)]
pub struct RecordStrategy {
    state: Mutex<RecordState>,
}

impl RecordStrategy {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed callbacks recorded so far.
    #[must_use]
    pub fn recorded(&self) -> u64 {
        self.state.lock().entries.len() as u64
    }
}

impl Strategy for RecordStrategy {
    fn register_lcbn(&self, _lcbn: &Lcbn, node: NodeRef) {
        assert!(!node.is_none(), "register_lcbn with a null node ref");
        self.state.lock().registered += 1;
    }

    fn next_cb_type(&self) -> CallbackHint {
        // Recording observes the natural order.
        CallbackHint::Any
    }

    fn thread_yield(&self, cx: &SchedContext, point: SchedulePoint, payload: &YieldPayload) {
        payload.assert_valid_for(point);
        match (point, payload) {
            (SchedulePoint::BeforeExecCb, YieldPayload::BeforeExecCb(_)) => {
                cx.exec_lock().acquire();
            }
            (SchedulePoint::AfterExecCb, YieldPayload::AfterExecCb(spd)) => {
                let mut state = self.state.lock();
                let exec_id = state.entries.len() as u64;
                state.entries.push(ScheduleEntry {
                    exec_id,
                    cb_type: spd.cb_type,
                    node: spd.lcbn,
                });
                drop(state);
                cx.exec_lock().release();
            }
            // Worker-pool points carry no ordering information the record
            // needs; the exec-window entries already capture callback order.
            _ => {}
        }
    }

    fn emit(&self, path: &Path) -> io::Result<()> {
        let state = self.state.lock();
        let mut out = io::BufWriter::new(std::fs::File::create(path)?);
        for entry in &state.entries {
            writeln!(out, "{entry}")?;
        }
        out.flush()?;
        tracing::info!(path = %path.display(), entries = state.entries.len(), "schedule emitted");
        Ok(())
    }

    fn lcbns_remaining(&self) -> Option<u64> {
        let state = self.state.lock();
        Some(state.registered.saturating_sub(state.entries.len() as u64))
    }

    fn schedule_has_diverged(&self) -> Option<bool> {
        // A recording is its own target; divergence is not applicable.
        None
    }
}
