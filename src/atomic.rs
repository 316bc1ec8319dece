//! Atomic reference counts, safe to use from any thread without external locking.

use crate::group::{AtomicGroup, GroupLink};
use crate::invariant::{
    assert_invariant, INIT_NONZERO, INIT_NOT_LIVE, RELEASE_LIVE_NOT_FINAL, RELEASE_NO_UNDERFLOW,
    RETAIN_NOT_DEAD, RETAIN_NO_OVERFLOW,
};
use crate::mode::Atomic;
use crate::MAX_COUNT;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{fence, AtomicU32, Ordering};

/// An atomically updated reference count embedded in a shared object.
///
/// The counter only reports the transition to zero; the embedding object's
/// owner finalizes the object when a release returns 0.
///
/// ```ignore
/// struct Socket { refs: AtomicRef, /* ... */ }
///
/// fn socket_release(sock: &Socket) {
///     if sock.refs.release() == 0 {
///         // last owner: free the socket
///     }
/// }
/// ```
pub struct AtomicRef {
    count: AtomicU32,
    group: GroupLink<Atomic>,
}

impl AtomicRef {
    /// A placeholder with no owners, for use between declaration and [`init`].
    /// Any operation other than `init` on it is a contract violation.
    ///
    /// [`init`]: AtomicRef::init
    pub const fn uninit() -> Self {
        Self {
            count: AtomicU32::new(0),
            group: GroupLink::DETACHED,
        }
    }

    /// Create a counter with `count` owners, attached to `group`.
    pub fn new(count: NonZeroU32, group: Option<&'static AtomicGroup>) -> Self {
        let count = count.get();
        check_init_count(count);
        Self {
            count: AtomicU32::new(count),
            group: GroupLink::attach(group, count),
        }
    }

    /// Create a counter with a single owner.
    pub fn single(group: Option<&'static AtomicGroup>) -> Self {
        Self::new(NonZeroU32::MIN, group)
    }

    /// Like [`new`](AtomicRef::new) for counts only known at runtime. Fatal on 0.
    #[track_caller]
    pub fn with_count(count: u32, group: Option<&'static AtomicGroup>) -> Self {
        check_nonzero(count);
        check_init_count(count);
        Self {
            count: AtomicU32::new(count),
            group: GroupLink::attach(group, count),
        }
    }

    /// Re-initialize a counter that is uninitialized or has reached zero.
    #[track_caller]
    pub fn init(&mut self, count: NonZeroU32, group: Option<&'static AtomicGroup>) {
        let current = *self.count.get_mut();
        assert_invariant(
            INIT_NOT_LIVE,
            current == 0,
            "init of a counter that still has owners",
            self.group.name(),
        );
        *self = Self::new(count, group);
    }

    /// [`init`](AtomicRef::init) with a runtime count. Fatal on 0.
    #[track_caller]
    pub fn init_count(&mut self, count: u32, group: Option<&'static AtomicGroup>) {
        check_nonzero(count);
        if let Some(count) = NonZeroU32::new(count) {
            self.init(count, group);
        }
    }

    /// Take a reference. Fatal if the object is already dead or the count
    /// would exceed [`MAX_COUNT`]; the count is left untouched in that case.
    #[inline]
    #[track_caller]
    pub fn retain(&self) {
        let prev = self
            .count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                (cur != 0 && cur < MAX_COUNT).then(|| cur + 1)
            })
            .unwrap_or_else(|cur| cur);
        self.check_retain(prev);
        self.group.retained(prev + 1);
    }

    /// Take a reference unless the object is already dead.
    ///
    /// For objects found through a collection that does not own them: the
    /// caller must keep the memory valid for every possible `retain_try`, usually
    /// with the lock that also covers removal from the collection.
    #[must_use]
    #[inline]
    #[track_caller]
    pub fn retain_try(&self) -> bool {
        let mut cur = self.count.load(Ordering::Relaxed);
        loop {
            if cur == 0 {
                return false;
            }
            assert_invariant(
                RETAIN_NO_OVERFLOW,
                cur < MAX_COUNT,
                "reference count overflow",
                self.group.name(),
            );
            match self
                .count
                .compare_exchange_weak(cur, cur + 1, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => {
                    self.group.retained(cur + 1);
                    return true;
                }
                Err(actual) => cur = actual,
            }
        }
    }

    /// Drop a reference and return the new count.
    ///
    /// When this returns 0, every write made by any thread before its own
    /// `release` of this object is visible to the caller, which may finalize.
    #[must_use]
    #[inline]
    #[track_caller]
    pub fn release(&self) -> u32 {
        let prev = self.decrement_above(0, Ordering::Release);
        let count = self.settle(prev);
        if count == 0 {
            fence(Ordering::Acquire);
        }
        count
    }

    /// [`release`](AtomicRef::release) without the ordering guarantee. Only for
    /// callers whose finalization path is already synchronized, e.g. by a lock.
    #[must_use]
    #[inline]
    #[track_caller]
    pub fn release_relaxed(&self) -> u32 {
        let prev = self.decrement_above(0, Ordering::Relaxed);
        self.settle(prev)
    }

    /// Drop a reference that is known not to be the last one. Fatal if it is,
    /// and the final reference is not dropped.
    #[inline]
    #[track_caller]
    pub fn release_live(&self) {
        let prev = self.decrement_above(1, Ordering::Release);
        assert_invariant(
            RELEASE_NO_UNDERFLOW,
            prev != 0,
            "reference count underflow (over-release)",
            self.group.name(),
        );
        assert_invariant(
            RELEASE_LIVE_NOT_FINAL,
            prev != 1,
            "release_live dropped the final reference",
            self.group.name(),
        );
        let _ = self.settle(prev);
    }

    /// Current count. Advisory only: it may be stale as soon as it is read.
    #[inline]
    pub fn get_count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    #[cfg(feature = "refgrp")]
    pub fn group(&self) -> Option<&'static AtomicGroup> {
        self.group.group()
    }

    /// Decrement only while the count is above `floor`. Returns the count seen
    /// before the step; a refused step leaves the counter untouched.
    #[inline]
    fn decrement_above(&self, floor: u32, order: Ordering) -> u32 {
        self.count
            .fetch_update(order, Ordering::Relaxed, |cur| (cur > floor).then(|| cur - 1))
            .unwrap_or_else(|cur| cur)
    }

    #[inline]
    #[track_caller]
    fn check_retain(&self, prev: u32) {
        assert_invariant(
            RETAIN_NOT_DEAD,
            prev != 0,
            "attempted resurrection of a released object",
            self.group.name(),
        );
        assert_invariant(
            RETAIN_NO_OVERFLOW,
            prev < MAX_COUNT,
            "reference count overflow",
            self.group.name(),
        );
    }

    #[inline]
    #[track_caller]
    fn settle(&self, prev: u32) -> u32 {
        assert_invariant(
            RELEASE_NO_UNDERFLOW,
            prev != 0,
            "reference count underflow (over-release)",
            self.group.name(),
        );
        let count = prev - 1;
        self.group.released(count);
        count
    }
}

#[track_caller]
fn check_nonzero(count: u32) {
    assert_invariant(
        INIT_NONZERO,
        count != 0,
        "reference count must be non-zero initialized",
        None,
    );
}

#[track_caller]
fn check_init_count(count: u32) {
    assert_invariant(
        RETAIN_NO_OVERFLOW,
        count <= MAX_COUNT,
        "initial reference count too large",
        None,
    );
}

impl Default for AtomicRef {
    fn default() -> Self {
        Self::uninit()
    }
}

impl fmt::Debug for AtomicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicRef")
            .field("count", &self.get_count())
            .field("group", &self.group.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn retain_release_round_trip() {
        let rc = AtomicRef::new(nz(3), None);
        rc.retain();
        assert_eq!(rc.get_count(), 4);
        assert_eq!(rc.release(), 3);
        assert_eq!(rc.release_relaxed(), 2);
        rc.release_live();
        assert_eq!(rc.get_count(), 1);
        assert_eq!(rc.release(), 0);
    }

    #[test]
    fn retain_try_fails_only_at_zero() {
        let rc = AtomicRef::single(None);
        assert!(rc.retain_try());
        assert_eq!(rc.get_count(), 2);
        assert_eq!(rc.release(), 1);
        assert_eq!(rc.release(), 0);
        assert!(!rc.retain_try());
        assert_eq!(rc.get_count(), 0);
    }

    #[test]
    fn reinit_after_zero() {
        let mut rc = AtomicRef::single(None);
        assert_eq!(rc.release(), 0);
        rc.init(nz(2), None);
        assert_eq!(rc.get_count(), 2);
    }

    #[test]
    fn uninit_then_init() {
        let mut rc = AtomicRef::default();
        assert_eq!(rc.get_count(), 0);
        assert!(!rc.retain_try());
        rc.init_count(5, None);
        assert_eq!(rc.get_count(), 5);
    }

    #[test]
    #[should_panic(expected = "INIT_NONZERO")]
    fn zero_runtime_count_is_fatal() {
        let _rc = AtomicRef::with_count(0, None);
    }

    #[test]
    #[should_panic(expected = "INIT_NOT_LIVE")]
    fn init_of_live_counter_is_fatal() {
        let mut rc = AtomicRef::single(None);
        rc.init(nz(1), None);
    }

    #[test]
    #[should_panic(expected = "RELEASE_NO_UNDERFLOW")]
    fn double_release_is_fatal() {
        let rc = AtomicRef::single(None);
        let _ = rc.release();
        let _ = rc.release();
    }

    #[test]
    #[should_panic(expected = "RETAIN_NOT_DEAD")]
    fn retain_on_dead_is_fatal() {
        let rc = AtomicRef::uninit();
        rc.retain();
    }

    #[test]
    #[should_panic(expected = "RELEASE_LIVE_NOT_FINAL")]
    fn release_live_of_last_reference_is_fatal() {
        let rc = AtomicRef::single(None);
        rc.release_live();
    }

    #[test]
    #[should_panic(expected = "RETAIN_NO_OVERFLOW")]
    fn overflow_is_fatal() {
        let rc = AtomicRef::with_count(MAX_COUNT, None);
        rc.retain();
    }
}
