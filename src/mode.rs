//! Counter modes. A group is typed by the mode of the counters it aggregates.

#[cfg(feature = "refgrp")]
use crate::group::RefGroup;

mod sealed {
    pub trait Sealed {}
}

/// Operating mode of a counter family.
pub trait Mode: sealed::Sealed + Send + Sync + Sized + 'static {
    /// Short label used in snapshots and logs.
    const NAME: &'static str;

    /// Root group every parentless group of this mode reports into.
    #[cfg(feature = "refgrp")]
    fn global() -> &'static RefGroup<Self>;
}

/// Counters updated with hardware atomics (`AtomicRef`).
#[derive(Debug)]
pub enum Atomic {}

/// Counters serialized by a caller-held lock (`LockedRef`).
#[derive(Debug)]
pub enum Locked {}

impl sealed::Sealed for Atomic {}
impl sealed::Sealed for Locked {}

impl Mode for Atomic {
    const NAME: &'static str = "atomic";

    #[cfg(feature = "refgrp")]
    fn global() -> &'static RefGroup<Self> {
        &crate::group::GLOBAL_ATOMIC
    }
}

impl Mode for Locked {
    const NAME: &'static str = "locked";

    #[cfg(feature = "refgrp")]
    fn global() -> &'static RefGroup<Self> {
        &crate::group::GLOBAL_LOCKED
    }
}
