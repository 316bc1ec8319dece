//! Debug accounting groups.
//!
//! Two implementations share one interface and are selected at build time:
//! - `tracking` (feature `refgrp`): named, hierarchical aggregates of live
//!   counters, a registry for leak reports and the rlog hook.
//! - `noop` (no `refgrp`): zero-sized groups whose hooks compile to nothing.
//!
//! Counters never branch on whether accounting is enabled; they call the hooks
//! of whichever `GroupLink` was compiled in.

use crate::mode::{Atomic, Locked};

#[cfg(feature = "refgrp")]
mod tracking;
#[cfg(feature = "refgrp")]
pub mod registry;
#[cfg(feature = "refgrp")]
pub use tracking::{GroupSnapshot, RefGroup};
#[cfg(feature = "refgrp")]
pub(crate) use tracking::{GroupLink, GLOBAL_ATOMIC, GLOBAL_LOCKED};

#[cfg(not(feature = "refgrp"))]
mod noop;
#[cfg(not(feature = "refgrp"))]
pub use noop::RefGroup;
#[cfg(not(feature = "refgrp"))]
pub(crate) use noop::GroupLink;

/// Group of `AtomicRef` counters.
pub type AtomicGroup = RefGroup<Atomic>;
/// Group of `LockedRef` counters.
pub type LockedGroup = RefGroup<Locked>;

/// Declares a static reference group.
///
/// ```ignore
/// refgrp_decl!(pub static TASKS: Atomic = "tasks");
/// refgrp_decl!(static TASK_THREADS: Atomic = "tasks.threads", parent = TASKS);
/// refgrp_decl!(static PORTS: Locked); // named after the enclosing module
/// ```
#[macro_export]
macro_rules! refgrp_decl {
    ($vis:vis static $var:ident: $mode:ty = $name:expr, parent = $parent:path) => {
        $vis static $var: $crate::RefGroup<$mode> = $crate::RefGroup::new($name, Some(&$parent));
    };
    ($vis:vis static $var:ident: $mode:ty = $name:expr) => {
        $vis static $var: $crate::RefGroup<$mode> = $crate::RefGroup::new($name, None);
    };
    ($vis:vis static $var:ident: $mode:ty) => {
        $vis static $var: $crate::RefGroup<$mode> = $crate::RefGroup::new(module_path!(), None);
    };
}
