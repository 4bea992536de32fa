//! Structural equality across independently built trees.
//!
//! Equality walks both parent chains simultaneously and matches callback
//! type and sibling index at every level, so corresponding nodes in a
//! recorded run and a replayed run compare equal despite different node
//! identities.

mod common;
use common::init_test_logging;

use proptest::prelude::*;
use schedlab::lcbn::{CallbackType, Handle, Registry};
use schedlab::NodeRef;

fn node(r: &mut Registry, t: CallbackType) -> NodeRef {
    r.create(Handle(0xA), Handle(0xB), t)
}

/// Builds a root-to-leaf chain and returns the leaf.
fn chain(r: &mut Registry, types: &[CallbackType]) -> NodeRef {
    let mut current = node(r, types[0]);
    for t in &types[1..] {
        let child = node(r, *t);
        r.add_child(current, child);
        current = child;
    }
    current
}

#[test]
fn timer_child_scenario() {
    init_test_logging();
    // run 1: a (root, timer) -> b (child, timer)
    let mut run1 = Registry::new();
    let a = node(&mut run1, CallbackType::Timer);
    let b = node(&mut run1, CallbackType::Timer);
    run1.add_child(a, b);

    // run 2: same shape, different identities
    let mut run2 = Registry::new();
    let a2 = node(&mut run2, CallbackType::Timer);
    let b2 = node(&mut run2, CallbackType::Timer);
    run2.add_child(a2, b2);

    assert!(run1.structural_eq(Some(b), &run2, Some(b2)));

    // change b2's type to idle: no longer equal
    let mut run3 = Registry::new();
    let a3 = node(&mut run3, CallbackType::Timer);
    let b3 = node(&mut run3, CallbackType::Idle);
    run3.add_child(a3, b3);
    assert!(!run1.structural_eq(Some(b), &run3, Some(b3)));
}

#[test]
fn reflexive_and_symmetric() {
    init_test_logging();
    let mut r = Registry::new();
    let leaf = chain(
        &mut r,
        &[CallbackType::Timer, CallbackType::Read, CallbackType::Write],
    );
    assert!(r.structural_eq(Some(leaf), &r, Some(leaf)));

    let mut other = Registry::new();
    let leaf2 = chain(
        &mut other,
        &[CallbackType::Timer, CallbackType::Read, CallbackType::Write],
    );
    assert!(r.structural_eq(Some(leaf), &other, Some(leaf2)));
    assert!(other.structural_eq(Some(leaf2), &r, Some(leaf)));
}

#[test]
fn null_handling() {
    init_test_logging();
    let mut r = Registry::new();
    let n = node(&mut r, CallbackType::Timer);
    assert!(r.structural_eq(None, &r, None));
    assert!(!r.structural_eq(Some(n), &r, None));
    assert!(!r.structural_eq(None, &r, Some(n)));
}

#[test]
fn ancestor_type_change_breaks_equality() {
    init_test_logging();
    let mut r1 = Registry::new();
    let leaf1 = chain(
        &mut r1,
        &[CallbackType::Timer, CallbackType::Idle, CallbackType::Check],
    );
    let mut r2 = Registry::new();
    let leaf2 = chain(
        &mut r2,
        &[CallbackType::Async, CallbackType::Idle, CallbackType::Check],
    );
    // leaves and middles agree; the roots differ
    assert!(!r1.structural_eq(Some(leaf1), &r2, Some(leaf2)));
}

#[test]
fn sibling_index_change_breaks_equality() {
    init_test_logging();
    let mut r1 = Registry::new();
    let root1 = node(&mut r1, CallbackType::Timer);
    let first1 = node(&mut r1, CallbackType::Idle);
    let second1 = node(&mut r1, CallbackType::Idle);
    r1.add_child(root1, first1);
    r1.add_child(root1, second1);

    let mut r2 = Registry::new();
    let root2 = node(&mut r2, CallbackType::Timer);
    let first2 = node(&mut r2, CallbackType::Idle);
    let second2 = node(&mut r2, CallbackType::Idle);
    r2.add_child(root2, first2);
    r2.add_child(root2, second2);

    assert!(r1.structural_eq(Some(first1), &r2, Some(first2)));
    assert!(r1.structural_eq(Some(second1), &r2, Some(second2)));
    assert!(!r1.structural_eq(Some(first1), &r2, Some(second2)));
    assert!(!r1.structural_eq(Some(second1), &r2, Some(first2)));
}

#[test]
fn different_depths_are_never_equal() {
    init_test_logging();
    let mut r1 = Registry::new();
    let leaf1 = chain(&mut r1, &[CallbackType::Timer, CallbackType::Timer]);
    let mut r2 = Registry::new();
    let leaf2 = chain(
        &mut r2,
        &[
            CallbackType::Timer,
            CallbackType::Timer,
            CallbackType::Timer,
        ],
    );
    assert!(!r1.structural_eq(Some(leaf1), &r2, Some(leaf2)));
}

proptest! {
    /// Mirror-built chains always compare equal, and flipping any one
    /// ancestor's type breaks equality.
    #[test]
    fn mirrored_chains_compare_equal(
        type_indices in prop::collection::vec(0usize..CallbackType::ALL.len(), 1..8),
        flip in 0usize..8,
    ) {
        let types: Vec<CallbackType> =
            type_indices.iter().map(|i| CallbackType::ALL[*i]).collect();

        let mut r1 = Registry::new();
        let leaf1 = chain(&mut r1, &types);
        let mut r2 = Registry::new();
        let leaf2 = chain(&mut r2, &types);
        prop_assert!(r1.structural_eq(Some(leaf1), &r2, Some(leaf2)));

        let flip = flip % types.len();
        let mut flipped = types.clone();
        let original = type_indices[flip];
        flipped[flip] = CallbackType::ALL[(original + 1) % CallbackType::ALL.len()];
        let mut r3 = Registry::new();
        let leaf3 = chain(&mut r3, &flipped);
        prop_assert!(!r1.structural_eq(Some(leaf1), &r3, Some(leaf3)));
    }
}
