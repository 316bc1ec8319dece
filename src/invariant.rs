//! Contract checks for reference counts: fatal on violation, with coverage tracking.
//!
//! Every check has a numeric id. With the `refgrp` feature the ids of checks that
//! ran are recorded in a lock-free bitmask so tests can assert that a code path
//! actually enforced what it claims to.

#[cfg(feature = "refgrp")]
use std::sync::atomic::AtomicU64;
use std::sync::atomic::{AtomicBool, Ordering};

pub const INIT_NONZERO: u32 = 1;
pub const RETAIN_NOT_DEAD: u32 = 2;
pub const RETAIN_NO_OVERFLOW: u32 = 3;
pub const RELEASE_NO_UNDERFLOW: u32 = 4;
pub const RELEASE_LIVE_NOT_FINAL: u32 = 5;
pub const GROUP_REFS_NO_UNDERFLOW: u32 = 6;
pub const GROUP_MEMBERS_NO_UNDERFLOW: u32 = 7;
pub const INIT_NOT_LIVE: u32 = 8;

#[cfg(feature = "refgrp")]
static CHECKED: AtomicU64 = AtomicU64::new(0);

static UNWIND: AtomicBool = AtomicBool::new(cfg!(test));

/// Make violations panic instead of aborting the process, so a test harness
/// can observe them. Violations abort by default: a caller that catches the
/// unwind would otherwise keep using an object whose owners are already wrong.
#[doc(hidden)]
pub fn unwind_on_violation() {
    UNWIND.store(true, Ordering::Relaxed);
}

/// Maps an invariant id to its name (diagnostics only).
pub const fn invariant_name(id: u32) -> &'static str {
    match id {
        INIT_NONZERO => "INIT_NONZERO",
        RETAIN_NOT_DEAD => "RETAIN_NOT_DEAD",
        RETAIN_NO_OVERFLOW => "RETAIN_NO_OVERFLOW",
        RELEASE_NO_UNDERFLOW => "RELEASE_NO_UNDERFLOW",
        RELEASE_LIVE_NOT_FINAL => "RELEASE_LIVE_NOT_FINAL",
        GROUP_REFS_NO_UNDERFLOW => "GROUP_REFS_NO_UNDERFLOW",
        GROUP_MEMBERS_NO_UNDERFLOW => "GROUP_MEMBERS_NO_UNDERFLOW",
        INIT_NOT_LIVE => "INIT_NOT_LIVE",
        _ => "UNKNOWN",
    }
}

/// Assert an invariant: records it, and on failure logs and aborts (or panics,
/// see [`unwind_on_violation`]).
#[inline]
#[track_caller]
pub fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        invariant_failed(id, message, context);
    }
    #[cfg(feature = "refgrp")]
    {
        let bit = 1u64 << (id & 63);
        if CHECKED.load(Ordering::Relaxed) & bit == 0 {
            CHECKED.fetch_or(bit, Ordering::Relaxed);
        }
    }
}

#[cold]
#[inline(never)]
#[track_caller]
fn invariant_failed(id: u32, message: &str, context: Option<&str>) -> ! {
    let full_message = if let Some(ctx) = context {
        format!(
            "refcnt invariant {} ({}) failed: {} (group: {})",
            id,
            invariant_name(id),
            message,
            ctx
        )
    } else {
        format!(
            "refcnt invariant {} ({}) failed: {}",
            id,
            invariant_name(id),
            message
        )
    };
    tracing::error!(invariant = id, "{}", full_message);
    if UNWIND.load(Ordering::Relaxed) {
        panic!("{}", full_message);
    }
    eprintln!("{}", full_message);
    std::process::abort();
}

#[cfg(feature = "refgrp")]
/// Contract test: checks that the given invariants were asserted at least once.
pub fn contract_test(test_name: &str, required_invariants: &[u32]) {
    let checked = CHECKED.load(Ordering::Relaxed);
    let missing: Vec<&str> = required_invariants
        .iter()
        .filter(|&&id| checked & (1u64 << (id & 63)) == 0)
        .map(|&id| invariant_name(id))
        .collect();
    if !missing.is_empty() {
        panic!(
            "Contract test '{}' failed: invariants not enforced: {:?}",
            test_name, missing
        );
    }
}

#[cfg(not(feature = "refgrp"))]
/// Contract test: no-op when group accounting is compiled out.
pub fn contract_test(_test_name: &str, _required_invariants: &[u32]) {}
