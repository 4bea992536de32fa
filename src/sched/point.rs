//! Schedule points and their payloads.
//!
//! A schedule point is a fixed location in the instrumented runtime where
//! control is handed to the active strategy, together with a payload
//! describing runtime state at that instant. Each payload carries a
//! validity predicate; a strategy must reject a malformed payload, or a
//! payload raised at the wrong point, with a fatal assert.

use crate::lcbn::CallbackType;
use crate::tree::NodeRef;
use core::fmt;

/// The instrumentation call sites the runtime raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulePoint {
    /// Immediately before a callback is invoked, on the event loop.
    BeforeExecCb,
    /// Immediately after a callback returns, on the event loop.
    AfterExecCb,
    /// A worker thread dequeued a unit of work.
    TpGotWork,
    /// A worker thread is about to publish completion.
    TpBeforePutDone,
    /// A worker thread has published completion.
    TpAfterPutDone,
}

impl SchedulePoint {
    /// Every schedule point.
    pub const ALL: [Self; 5] = [
        Self::BeforeExecCb,
        Self::AfterExecCb,
        Self::TpGotWork,
        Self::TpBeforePutDone,
        Self::TpAfterPutDone,
    ];

    /// Whether this point may only be raised from a worker thread.
    #[must_use]
    pub const fn is_threadpool_point(self) -> bool {
        matches!(
            self,
            Self::TpGotWork | Self::TpBeforePutDone | Self::TpAfterPutDone
        )
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BeforeExecCb => "before-exec-cb",
            Self::AfterExecCb => "after-exec-cb",
            Self::TpGotWork => "tp-got-work",
            Self::TpBeforePutDone => "tp-before-put-done",
            Self::TpAfterPutDone => "tp-after-put-done",
        }
    }
}

impl fmt::Display for SchedulePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifies a unit of thread-pool work. Zero is never a valid id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkId(pub u64);

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Payload for [`SchedulePoint::BeforeExecCb`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpdBeforeExecCb {
    /// The node about to run.
    pub lcbn: NodeRef,
    /// Its callback type.
    pub cb_type: CallbackType,
}

impl SpdBeforeExecCb {
    /// Whether the payload is well-formed.
    #[must_use]
    pub const fn looks_valid(&self) -> bool {
        !self.lcbn.is_none()
    }
}

/// Payload for [`SchedulePoint::AfterExecCb`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpdAfterExecCb {
    /// The node that just ran.
    pub lcbn: NodeRef,
    /// Its callback type.
    pub cb_type: CallbackType,
}

impl SpdAfterExecCb {
    /// Whether the payload is well-formed.
    #[must_use]
    pub const fn looks_valid(&self) -> bool {
        !self.lcbn.is_none()
    }
}

/// Payload for [`SchedulePoint::TpGotWork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpdGotWork {
    /// The dequeued work item.
    pub work: WorkId,
}

impl SpdGotWork {
    /// Whether the payload is well-formed.
    #[must_use]
    pub const fn looks_valid(&self) -> bool {
        self.work.0 != 0
    }
}

/// Payload for [`SchedulePoint::TpBeforePutDone`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpdBeforePutDone {
    /// The work item about to be published.
    pub work: WorkId,
}

impl SpdBeforePutDone {
    /// Whether the payload is well-formed.
    #[must_use]
    pub const fn looks_valid(&self) -> bool {
        self.work.0 != 0
    }
}

/// Payload for [`SchedulePoint::TpAfterPutDone`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpdAfterPutDone {
    /// The work item just published.
    pub work: WorkId,
}

impl SpdAfterPutDone {
    /// Whether the payload is well-formed.
    #[must_use]
    pub const fn looks_valid(&self) -> bool {
        self.work.0 != 0
    }
}

/// The payload handed to a strategy at a schedule point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldPayload {
    /// Payload for [`SchedulePoint::BeforeExecCb`].
    BeforeExecCb(SpdBeforeExecCb),
    /// Payload for [`SchedulePoint::AfterExecCb`].
    AfterExecCb(SpdAfterExecCb),
    /// Payload for [`SchedulePoint::TpGotWork`].
    TpGotWork(SpdGotWork),
    /// Payload for [`SchedulePoint::TpBeforePutDone`].
    TpBeforePutDone(SpdBeforePutDone),
    /// Payload for [`SchedulePoint::TpAfterPutDone`].
    TpAfterPutDone(SpdAfterPutDone),
}

impl YieldPayload {
    /// The point this payload belongs to.
    #[must_use]
    pub const fn point(&self) -> SchedulePoint {
        match self {
            Self::BeforeExecCb(_) => SchedulePoint::BeforeExecCb,
            Self::AfterExecCb(_) => SchedulePoint::AfterExecCb,
            Self::TpGotWork(_) => SchedulePoint::TpGotWork,
            Self::TpBeforePutDone(_) => SchedulePoint::TpBeforePutDone,
            Self::TpAfterPutDone(_) => SchedulePoint::TpAfterPutDone,
        }
    }

    /// Whether the payload is well-formed.
    #[must_use]
    pub const fn looks_valid(&self) -> bool {
        match self {
            Self::BeforeExecCb(p) => p.looks_valid(),
            Self::AfterExecCb(p) => p.looks_valid(),
            Self::TpGotWork(p) => p.looks_valid(),
            Self::TpBeforePutDone(p) => p.looks_valid(),
            Self::TpAfterPutDone(p) => p.looks_valid(),
        }
    }

    /// Asserts that the payload is well-formed and belongs to `point`.
    ///
    /// # Panics
    ///
    /// Panics on a malformed payload or a payload/point mismatch. Both are
    /// contract violations in the instrumented runtime.
    pub fn assert_valid_for(&self, point: SchedulePoint) {
        assert!(
            self.point() == point,
            "payload {self:?} raised at point {point}"
        );
        assert!(self.looks_valid(), "malformed payload {self:?} at {point}");
    }
}
