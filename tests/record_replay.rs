//! Record and replay strategies end to end.
//!
//! A recorded run emits one schedule line per completed callback; replaying
//! that schedule against the same sequence never diverges, and replaying it
//! against a different sequence latches divergence.

mod common;
use common::{init_test_logging, temp_path};

use schedlab::lcbn::{CallbackType, Handle, Registry};
use schedlab::sched::point::{SpdAfterExecCb, SpdBeforeExecCb};
use schedlab::sched::replay::ReplayConfig;
use schedlab::sched::{FuzzTimerConfig, Mode, ModeArgs, SchedulePoint, Scheduler};
use schedlab::{CallbackHint, NodeRef, YieldPayload};
use std::time::Duration;

/// Drives one callback through its exec window.
fn run_callback(scheduler: &Scheduler, registry: &mut Registry, node: NodeRef) {
    let cb_type = registry.cb_type(node);
    scheduler.register_lcbn(registry.node(node), node);
    scheduler.thread_yield(
        SchedulePoint::BeforeExecCb,
        &YieldPayload::BeforeExecCb(SpdBeforeExecCb { lcbn: node, cb_type }),
    );
    registry.mark_begin(node);
    registry.assign_exec_id(node);
    registry.mark_end(node);
    scheduler.thread_yield(
        SchedulePoint::AfterExecCb,
        &YieldPayload::AfterExecCb(SpdAfterExecCb { lcbn: node, cb_type }),
    );
}

fn sequence(registry: &mut Registry, types: &[CallbackType]) -> Vec<NodeRef> {
    types
        .iter()
        .enumerate()
        .map(|(i, t)| registry.create(Handle(i as u64 + 1), Handle(0xCB), *t))
        .collect()
}

const RUN: [CallbackType; 4] = [
    CallbackType::Timer,
    CallbackType::Work,
    CallbackType::AfterWork,
    CallbackType::Timer,
];

#[test]
fn record_then_faithful_replay() {
    init_test_logging();
    let schedule = temp_path("record-faithful");

    // --- record ---
    let recorder = Scheduler::init(Mode::Record, ModeArgs::Record);
    let mut registry = Registry::new();
    for node in sequence(&mut registry, &RUN) {
        run_callback(&recorder, &mut registry, node);
    }
    assert_eq!(recorder.lcbns_remaining(), Some(0));
    assert_eq!(recorder.schedule_has_diverged(), None);
    recorder.emit(&schedule).unwrap();

    let text = std::fs::read_to_string(&schedule).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), RUN.len());
    for (i, (line, t)) in lines.iter().zip(RUN).enumerate() {
        assert!(line.starts_with(&format!("{i} {t} ")), "line {i}: {line}");
    }

    // --- replay the same sequence ---
    let replayer = Scheduler::init(Mode::Replay, ModeArgs::Replay(ReplayConfig::new(&schedule)));
    assert_eq!(replayer.lcbns_remaining(), Some(RUN.len() as u64));
    assert_eq!(replayer.next_cb_type(), CallbackHint::Only(CallbackType::Timer));

    let mut registry = Registry::new();
    for (i, node) in sequence(&mut registry, &RUN).into_iter().enumerate() {
        assert_eq!(replayer.next_cb_type(), CallbackHint::Only(RUN[i]));
        run_callback(&replayer, &mut registry, node);
        assert_eq!(replayer.schedule_has_diverged(), Some(false));
    }
    assert_eq!(replayer.lcbns_remaining(), Some(0));
    assert_eq!(replayer.next_cb_type(), CallbackHint::Any);

    let _ = std::fs::remove_file(&schedule);
}

#[test]
fn replay_latches_divergence_on_mismatch() {
    init_test_logging();
    let schedule = temp_path("record-diverge");

    let recorder = Scheduler::init(Mode::Record, ModeArgs::Record);
    let mut registry = Registry::new();
    for node in sequence(&mut registry, &RUN) {
        run_callback(&recorder, &mut registry, node);
    }
    recorder.emit(&schedule).unwrap();

    // Second run swaps the middle of the sequence.
    let divergent = [
        CallbackType::Timer,
        CallbackType::Idle,
        CallbackType::AfterWork,
        CallbackType::Timer,
    ];
    let replayer = Scheduler::init(Mode::Replay, ModeArgs::Replay(ReplayConfig::new(&schedule)));
    let mut registry = Registry::new();
    for node in sequence(&mut registry, &divergent) {
        run_callback(&replayer, &mut registry, node);
    }
    assert_eq!(replayer.schedule_has_diverged(), Some(true));
    // The cursor froze where the runs disagreed.
    assert_eq!(replayer.lcbns_remaining(), Some(3));

    let _ = std::fs::remove_file(&schedule);
}

#[test]
fn replay_emit_writes_the_unconsumed_tail() {
    init_test_logging();
    let schedule = temp_path("replay-tail-in");
    let tail = temp_path("replay-tail-out");

    let recorder = Scheduler::init(Mode::Record, ModeArgs::Record);
    let mut registry = Registry::new();
    for node in sequence(&mut registry, &RUN) {
        run_callback(&recorder, &mut registry, node);
    }
    recorder.emit(&schedule).unwrap();

    let replayer = Scheduler::init(Mode::Replay, ModeArgs::Replay(ReplayConfig::new(&schedule)));
    let mut registry = Registry::new();
    let nodes = sequence(&mut registry, &RUN);
    // Consume only the first two entries.
    for node in &nodes[..2] {
        run_callback(&replayer, &mut registry, *node);
    }
    replayer.emit(&tail).unwrap();

    let text = std::fs::read_to_string(&tail).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.starts_with("2 after-work "), "tail: {text}");

    let _ = std::fs::remove_file(&schedule);
    let _ = std::fs::remove_file(&tail);
}

#[test]
fn fuzz_emit_removes_a_stale_artifact() {
    init_test_logging();
    let path = temp_path("fuzz-stale");
    std::fs::write(&path, "stale schedule\n").unwrap();

    let scheduler = Scheduler::init(
        Mode::FuzzTimer,
        ModeArgs::FuzzTimer(FuzzTimerConfig::new(Duration::ZERO, Duration::ZERO)),
    );
    scheduler.emit(&path).unwrap();
    assert!(!path.exists(), "stale artifact survived emit");

    // A second emit with nothing to remove still succeeds.
    scheduler.emit(&path).unwrap();
}

#[test]
#[should_panic(expected = "cannot load replay schedule")]
fn replay_init_with_missing_schedule_panics() {
    let missing = temp_path("no-such-schedule");
    let _ = Scheduler::init(Mode::Replay, ModeArgs::Replay(ReplayConfig::new(missing)));
}
