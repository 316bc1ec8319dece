//! No-op group implementation, compiled when `refgrp` is disabled.
//!
//! Same constructors and hooks as the tracking groups; everything is zero-sized
//! and every hook is an empty inline function.

use crate::mode::Mode;
use std::fmt;
use std::marker::PhantomData;

/// Zero-sized stand-in for a tracking group.
pub struct RefGroup<M: Mode> {
    _mode: PhantomData<fn() -> M>,
}

impl<M: Mode> RefGroup<M> {
    pub const fn new(_name: &'static str, _parent: Option<&'static RefGroup<M>>) -> Self {
        Self { _mode: PhantomData }
    }
}

impl<M: Mode> fmt::Debug for RefGroup<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefGroup").field("mode", &M::NAME).finish_non_exhaustive()
    }
}

pub(crate) struct GroupLink<M: Mode>(PhantomData<fn() -> M>);

impl<M: Mode> GroupLink<M> {
    pub(crate) const DETACHED: Self = Self(PhantomData);

    #[inline(always)]
    pub(crate) fn attach(_group: Option<&'static RefGroup<M>>, _count: u32) -> Self {
        Self::DETACHED
    }

    #[inline(always)]
    pub(crate) fn retained(&self, _count: u32) {}

    #[inline(always)]
    pub(crate) fn released(&self, _count: u32) {}

    #[inline(always)]
    pub(crate) fn name(&self) -> Option<&'static str> {
        None
    }
}
