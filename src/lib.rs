//! Reference counts for shared kernel-style objects.
//!
//! Two counter types, never interchangeable:
//! - [`AtomicRef`]: lock-free, usable from any thread.
//! - [`LockedRef`]: plain arithmetic behind the embedding object's own lock.
//!
//! With the `refgrp` feature (on by default) every counter reports into a
//! [`RefGroup`] so live objects and outstanding references can be audited per
//! subsystem, and [`rlog`] can record the events of selected groups. Without it
//! groups are zero-sized and all accounting compiles away.

pub mod atomic;
pub mod group;
#[doc(hidden)]
pub mod invariant;
pub mod locked;
pub mod mode;
#[cfg(feature = "refgrp")]
pub mod rlog;

pub use atomic::AtomicRef;
#[cfg(feature = "refgrp")]
pub use group::{registry, GroupSnapshot};
pub use group::{AtomicGroup, LockedGroup, RefGroup};
pub use locked::LockedRef;
pub use mode::{Atomic, Locked, Mode};

/// Largest count a counter may hold; retaining past it is fatal.
pub const MAX_COUNT: u32 = 0x0fff_ffff;
