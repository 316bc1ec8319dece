//! A refused operation leaves the counter as it was.
//!
//! Violations abort outside of tests; here they unwind so the state left behind
//! can be inspected.

use refcnt::{AtomicRef, LockedRef, MAX_COUNT};
use std::panic::{catch_unwind, AssertUnwindSafe};

fn violation<R>(f: impl FnOnce() -> R) -> String {
    refcnt::invariant::unwind_on_violation();
    let err = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(_) => panic!("operation was expected to be refused"),
        Err(err) => err,
    };
    err.downcast_ref::<String>().cloned().unwrap_or_default()
}

#[test]
fn double_release_leaves_dead_counter_dead() {
    let rc = AtomicRef::single(None);
    assert_eq!(rc.release(), 0);

    let msg = violation(|| rc.release());
    assert!(msg.contains("RELEASE_NO_UNDERFLOW"), "{msg}");
    assert_eq!(rc.get_count(), 0);
    assert!(!rc.retain_try());

    violation(|| rc.release_relaxed());
    assert_eq!(rc.get_count(), 0);
}

#[test]
fn retain_on_dead_counter_does_not_resurrect() {
    let rc = AtomicRef::single(None);
    assert_eq!(rc.release(), 0);

    let msg = violation(|| rc.retain());
    assert!(msg.contains("RETAIN_NOT_DEAD"), "{msg}");
    assert_eq!(rc.get_count(), 0);
    assert!(!rc.retain_try());
}

#[test]
fn release_live_keeps_the_final_reference() {
    let rc = AtomicRef::with_count(2, None);
    rc.release_live();

    let msg = violation(|| rc.release_live());
    assert!(msg.contains("RELEASE_LIVE_NOT_FINAL"), "{msg}");
    assert_eq!(rc.get_count(), 1);
    assert_eq!(rc.release(), 0);
}

#[test]
fn overflow_keeps_count_at_limit() {
    let rc = AtomicRef::with_count(MAX_COUNT, None);
    let msg = violation(|| rc.retain());
    assert!(msg.contains("RETAIN_NO_OVERFLOW"), "{msg}");
    assert_eq!(rc.get_count(), MAX_COUNT);
}

#[test]
fn locked_violations_leave_count_alone() {
    let mut rc = LockedRef::single(None);
    assert_eq!(rc.release_locked(), 0);

    violation(|| rc.release_locked());
    assert_eq!(rc.get_count(), 0);
    violation(|| rc.retain_locked());
    assert_eq!(rc.get_count(), 0);
}

#[cfg(feature = "refgrp")]
#[test]
fn group_totals_unchanged_by_refused_release() {
    use refcnt::{refgrp_decl, Atomic};

    refgrp_decl!(static REFUSED: Atomic = "violation.refused");

    let rc = AtomicRef::single(Some(&REFUSED));
    assert_eq!(rc.release(), 0);
    let before = REFUSED.snapshot();

    violation(|| rc.release());
    let after = REFUSED.snapshot();
    assert_eq!(after.refs, before.refs);
    assert_eq!(after.members, 0);
    assert_eq!(after.release_total, before.release_total);
}
