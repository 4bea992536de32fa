//! Round-tripping callback records through the textual encoding.
//!
//! The encoder and decoder share a fixed field order; everything the
//! encoding covers must survive a round trip exactly.

mod common;
use common::init_test_logging;

use schedlab::lcbn::{decode, CallbackType, Handle, ParseError, Registry};
use schedlab::thread::{register_thread, ThreadKind};

#[test]
fn round_trip_zero_dependencies() {
    init_test_logging();
    let mut r = Registry::new();
    let n = r.create(Handle(0x10), Handle(0x20), CallbackType::Idle);
    let decoded = decode(&r.encode(n)).unwrap();
    assert_eq!(decoded, *r.node(n));
}

#[test]
fn round_trip_one_dependency() {
    init_test_logging();
    let mut r = Registry::new();
    let pred = r.create(Handle(0x1), Handle(0x2), CallbackType::Timer);
    let n = r.create(Handle(0x10), Handle(0x20), CallbackType::Check);
    r.add_dependency(pred, n);
    let decoded = decode(&r.encode(n)).unwrap();
    assert_eq!(decoded.dependencies(), &[pred]);
    assert_eq!(decoded, *r.node(n));
}

#[test]
fn round_trip_many_dependencies() {
    init_test_logging();
    let mut r = Registry::new();
    let preds: Vec<_> = (0..6)
        .map(|i| r.create(Handle(i), Handle(i + 100), CallbackType::Work))
        .collect();
    let n = r.create(Handle(0x10), Handle(0x20), CallbackType::AfterWork);
    for p in &preds {
        r.add_dependency(*p, n);
    }
    r.add_dependency(preds[0], n); // duplicate edge survives too
    let decoded = decode(&r.encode(n)).unwrap();
    let mut expected = preds.clone();
    expected.push(preds[0]);
    assert_eq!(decoded.dependencies(), expected.as_slice());
}

#[test]
fn round_trip_executed_node() {
    init_test_logging();
    std::thread::spawn(|| {
        register_thread(ThreadKind::EventLoop);
        let mut r = Registry::new();
        let n = r.create(Handle(0x10), Handle(0x20), CallbackType::Timer);
        r.assign_reg_id(n);
        r.assign_exec_id(n);
        r.set_info(n, Handle(0xBEEF));
        r.mark_begin(n);
        r.mark_end(n);

        let decoded = decode(&r.encode(n)).unwrap();
        let original = r.node(n);
        assert_eq!(decoded.reg_id(), Some(0));
        assert_eq!(decoded.exec_id(), Some(0));
        assert_eq!(decoded.info(), Some(Handle(0xBEEF)));
        assert_eq!(decoded.registration_time(), original.registration_time());
        assert_eq!(decoded.start_time(), original.start_time());
        assert_eq!(decoded.end_time(), original.end_time());
        assert_eq!(decoded.executing_thread(), original.executing_thread());
        assert!(decoded.is_finished());
        assert!(!decoded.is_active());
    })
    .join()
    .unwrap();
}

#[test]
fn unset_ids_encode_as_minus_one() {
    init_test_logging();
    let mut r = Registry::new();
    let n = r.create(Handle(0x10), Handle(0x20), CallbackType::Timer);
    let line = r.encode(n);
    assert!(line.contains("<exec_id> <-1>"), "line: {line}");
    assert!(line.contains("<reg_id> <-1>"), "line: {line}");
    assert!(line.contains("<executing_thread> <-1>"), "line: {line}");
    assert!(line.contains("<active> <0>"), "line: {line}");
    assert!(line.contains("<finished> <0>"), "line: {line}");
    assert!(line.ends_with("<dependencies> <>"), "line: {line}");
}

#[test]
fn classification_tokens_match_the_type() {
    init_test_logging();
    let mut r = Registry::new();
    let n = r.create(Handle(1), Handle(2), CallbackType::Write);
    let line = r.encode(n);
    assert!(line.contains("<context_type> <request>"), "line: {line}");
    assert!(line.contains("<cb_type> <write>"), "line: {line}");
    assert!(line.contains("<cb_behavior> <one-shot>"), "line: {line}");
}

#[test]
fn tree_position_is_encoded_but_not_reconstructed() {
    init_test_logging();
    let mut r = Registry::new();
    let root = r.create(Handle(1), Handle(2), CallbackType::Timer);
    let a = r.create(Handle(1), Handle(3), CallbackType::Timer);
    let b = r.create(Handle(1), Handle(4), CallbackType::Timer);
    r.add_child(root, a);
    r.add_child(root, b);

    let line = r.encode(b);
    assert!(line.contains("<tree_level> <1>"), "line: {line}");
    assert!(line.contains("<level_entry> <1>"), "line: {line}");
    assert!(line.contains(&format!("<tree_parent> <{root}>")), "line: {line}");

    // The decoded node is detached.
    let decoded = decode(&line).unwrap();
    assert_eq!(decoded.registrar(), None);
}

#[test]
fn decoder_rejects_malformed_records() {
    init_test_logging();
    assert!(matches!(decode(""), Err(ParseError::Truncated { .. })));

    let mut r = Registry::new();
    let n = r.create(Handle(1), Handle(2), CallbackType::Timer);
    let line = r.encode(n);

    let bad_flag = line.replace("<active> <0>", "<active> <2>");
    assert!(matches!(
        decode(&bad_flag),
        Err(ParseError::Malformed { field: "active", .. })
    ));

    let bad_type = line.replace("<cb_type> <timer>", "<cb_type> <nope>");
    assert!(matches!(
        decode(&bad_type),
        Err(ParseError::UnknownToken { field: "cb_type", .. })
    ));

    let bad_behavior = line.replace("<cb_behavior> <repeating>", "<cb_behavior> <one-shot>");
    assert!(matches!(
        decode(&bad_behavior),
        Err(ParseError::Inconsistent { field: "cb_behavior", .. })
    ));
}
