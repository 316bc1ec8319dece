//! Lock-protected reference counts.
//!
//! `LockedRef` uses plain arithmetic. The lock that serializes retains and
//! releases belongs to the embedding object; holding it is what gives the caller
//! `&mut LockedRef`, so an unsynchronized access does not type-check.

use crate::group::{GroupLink, LockedGroup};
use crate::invariant::{
    assert_invariant, INIT_NONZERO, INIT_NOT_LIVE, RELEASE_NO_UNDERFLOW, RETAIN_NOT_DEAD,
    RETAIN_NO_OVERFLOW,
};
use crate::mode::Locked;
use crate::MAX_COUNT;
use std::fmt;
use std::num::NonZeroU32;

/// Reference count for an object whose retains and releases already happen
/// under the object's own lock.
///
/// ```ignore
/// let port = Mutex::new(Port { refs: LockedRef::single(Some(&PORTS)), .. });
/// port.lock().unwrap().refs.retain_locked();
/// if port.lock().unwrap().refs.release_locked() == 0 {
///     // last owner: finalize
/// }
/// ```
pub struct LockedRef {
    count: u32,
    group: GroupLink<Locked>,
}

impl LockedRef {
    /// Placeholder with a count of 0 and no group, for objects whose counter is
    /// set up later with [`init`](LockedRef::init).
    pub const fn uninit() -> Self {
        Self {
            count: 0,
            group: GroupLink::DETACHED,
        }
    }

    /// Counter starting at `count` owners, attached to `group` (or the global
    /// locked root).
    pub fn new(count: NonZeroU32, group: Option<&'static LockedGroup>) -> Self {
        let count = count.get();
        assert_invariant(
            RETAIN_NO_OVERFLOW,
            count <= MAX_COUNT,
            "initial reference count too large",
            None,
        );
        Self {
            count,
            group: GroupLink::attach(group, count),
        }
    }

    /// Counter with one owner.
    pub fn single(group: Option<&'static LockedGroup>) -> Self {
        Self::new(NonZeroU32::MIN, group)
    }

    /// Like [`new`](LockedRef::new) for counts only known at runtime. Fatal on 0.
    #[track_caller]
    pub fn with_count(count: u32, group: Option<&'static LockedGroup>) -> Self {
        check_nonzero(count);
        match NonZeroU32::new(count) {
            Some(count) => Self::new(count, group),
            None => Self::uninit(),
        }
    }

    /// Re-initialize a counter that is uninitialized or has reached zero.
    #[track_caller]
    pub fn init(&mut self, count: NonZeroU32, group: Option<&'static LockedGroup>) {
        assert_invariant(
            INIT_NOT_LIVE,
            self.count == 0,
            "init of a counter that still has owners",
            self.group.name(),
        );
        *self = Self::new(count, group);
    }

    /// [`init`](LockedRef::init) with a runtime count. Fatal on 0.
    #[track_caller]
    pub fn init_count(&mut self, count: u32, group: Option<&'static LockedGroup>) {
        check_nonzero(count);
        if let Some(count) = NonZeroU32::new(count) {
            self.init(count, group);
        }
    }

    /// Take a reference under the object's lock.
    #[inline]
    #[track_caller]
    pub fn retain_locked(&mut self) {
        assert_invariant(
            RETAIN_NOT_DEAD,
            self.count != 0,
            "attempted resurrection of a released object",
            self.group.name(),
        );
        assert_invariant(
            RETAIN_NO_OVERFLOW,
            self.count < MAX_COUNT,
            "reference count overflow",
            self.group.name(),
        );
        self.count += 1;
        self.group.retained(self.count);
    }

    /// Drop a reference under the object's lock and return the new count.
    #[must_use]
    #[inline]
    #[track_caller]
    pub fn release_locked(&mut self) -> u32 {
        assert_invariant(
            RELEASE_NO_UNDERFLOW,
            self.count != 0,
            "reference count underflow (over-release)",
            self.group.name(),
        );
        self.count -= 1;
        self.group.released(self.count);
        self.count
    }

    /// Current count. Exact while the caller holds the object's lock.
    #[inline]
    pub fn get_count(&self) -> u32 {
        self.count
    }

    #[cfg(feature = "refgrp")]
    pub fn group(&self) -> Option<&'static LockedGroup> {
        self.group.group()
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

impl Default for LockedRef {
    fn default() -> Self {
        Self::uninit()
    }
}

impl fmt::Debug for LockedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedRef")
            .field("count", &self.count)
            .field("group", &self.group.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn counts_under_a_mutex() {
        let port = Mutex::new(LockedRef::single(None));
        port.lock().unwrap().retain_locked();
        port.lock().unwrap().retain_locked();
        assert_eq!(port.lock().unwrap().get_count(), 3);
        assert_eq!(port.lock().unwrap().release_locked(), 2);
        assert_eq!(port.lock().unwrap().release_locked(), 1);
        assert_eq!(port.lock().unwrap().release_locked(), 0);
    }

    #[test]
    fn reinit_after_zero() {
        let mut rc = LockedRef::with_count(1, None);
        assert_eq!(rc.release_locked(), 0);
        rc.init_count(4, None);
        assert_eq!(rc.get_count(), 4);
    }

    #[test]
    #[should_panic(expected = "RELEASE_NO_UNDERFLOW")]
    fn over_release_is_fatal() {
        let mut rc = LockedRef::single(None);
        let _ = rc.release_locked();
        let _ = rc.release_locked();
    }

    #[test]
    #[should_panic(expected = "RETAIN_NOT_DEAD")]
    fn retain_on_dead_is_fatal() {
        let mut rc = LockedRef::uninit();
        rc.retain_locked();
    }

    #[test]
    #[should_panic(expected = "INIT_NONZERO")]
    fn zero_runtime_count_is_fatal() {
        let _rc = LockedRef::with_count(0, None);
    }
}
