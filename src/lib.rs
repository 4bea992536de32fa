//! Callback-schedule instrumentation for event-loop runtimes.
//!
//! Schedlab instruments an asynchronous, event-loop-based runtime so that
//! the order and timing of callback execution can be recorded, replayed,
//! and deliberately perturbed — enough to expose and reproduce races
//! between the event-loop thread and a worker-thread pool.
//!
//! # Architecture
//!
//! Two tightly coupled subsystems:
//!
//! - **Logical callback nodes** ([`lcbn`]): a causal record of every
//!   callback invocation — identity, place in the registration forest,
//!   timing, and dependency edges. The [`lcbn::Registry`] owns the forest
//!   ([`tree::Forest`]) and is the data backbone every strategy reads and
//!   writes. Records round-trip through a fixed-order textual encoding.
//! - **Schedule points and strategies** ([`sched`]): the runtime raises a
//!   [`sched::SchedulePoint`] at fixed instrumentation sites (before/after
//!   a callback executes, when a worker picks up work, before/after it
//!   publishes completion); the installed [`sched::Strategy`] decides
//!   whether the calling thread blocks, for how long, and what to report
//!   about remaining or diverged schedule state. Concrete strategies:
//!   fuzzing-timer (randomized delays), record, and replay.
//!
//! Control flow: runtime → schedule point → active strategy → (reads or
//! writes registry state, takes or drops the execution lock, sleeps) →
//! returns control to the runtime.
//!
//! # Error handling
//!
//! This is an instrumentation layer for finding bugs in the runtime under
//! test, so it never masks impossible states in its own inputs: contract
//! violations (stale refs, malformed payloads, worker-pool points raised
//! off a worker thread) abort via panic. Recoverable errors exist only at
//! the decode/I-O boundary. Metrics a strategy does not track are `None`,
//! never zero or false.
//!
//! # Example
//!
//! ```
//! use schedlab::lcbn::{CallbackType, Handle, Registry};
//! use schedlab::sched::{FuzzTimerConfig, Mode, ModeArgs, Scheduler};
//! use std::time::Duration;
//!
//! let mut registry = Registry::new();
//! let root = registry.create(Handle(0x1), Handle(0x2), CallbackType::Timer);
//! let child = registry.create(Handle(0x1), Handle(0x3), CallbackType::Timer);
//! registry.add_child(root, child);
//!
//! let scheduler = Scheduler::init(
//!     Mode::FuzzTimer,
//!     ModeArgs::FuzzTimer(FuzzTimerConfig::new(
//!         Duration::from_micros(100),
//!         Duration::from_millis(1),
//!     )),
//! );
//! scheduler.register_lcbn(registry.node(root), root);
//! assert_eq!(scheduler.lcbns_remaining(), None);
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod lcbn;
pub mod sched;
pub mod stamp;
pub mod thread;
pub mod tree;
pub mod util;

pub use lcbn::{CallbackType, Handle, Lcbn, Registry};
pub use sched::{CallbackHint, Mode, ModeArgs, SchedulePoint, Scheduler, Strategy, YieldPayload};
pub use stamp::Stamp;
pub use thread::ThreadKind;
pub use tree::{Forest, NodeRef};
