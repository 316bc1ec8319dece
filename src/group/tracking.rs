//! Tracking group implementation (feature `refgrp`).

use crate::group::registry;
use crate::invariant::{assert_invariant, GROUP_MEMBERS_NO_UNDERFLOW, GROUP_REFS_NO_UNDERFLOW};
use crate::mode::{Atomic, Locked, Mode};
use crate::rlog::{self, RefLogRecord, RefOp};
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

const REGISTERED: u8 = 1 << 0;
const LOG_RESOLVED: u8 = 1 << 1;
const LOG_ON: u8 = 1 << 2;

pub(crate) static GLOBAL_ATOMIC: RefGroup<Atomic> = RefGroup::root("global.atomic");
pub(crate) static GLOBAL_LOCKED: RefGroup<Locked> = RefGroup::root("global.locked");

/// A named, hierarchical aggregate of live counters.
///
/// Aggregates are relaxed atomics: they are diagnostic data and must never be
/// used to make lifetime decisions.
pub struct RefGroup<M: Mode> {
    name: &'static str,
    parent: Option<&'static RefGroup<M>>,
    is_root: bool,
    members: AtomicU64,
    refs: AtomicU64,
    retain_total: AtomicU64,
    release_total: AtomicU64,
    state: AtomicU8,
    log: Mutex<VecDeque<RefLogRecord>>,
    _mode: PhantomData<fn() -> M>,
}

/// Point-in-time copy of a group's aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSnapshot {
    pub name: &'static str,
    pub parent: Option<&'static str>,
    pub mode: &'static str,
    /// Live counters attached to this group or its descendants.
    pub members: u64,
    /// Sum of their counts.
    pub refs: u64,
    pub retain_total: u64,
    pub release_total: u64,
}

impl fmt::Display for GroupSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] members={} refs={} retained={} released={}",
            self.name, self.mode, self.members, self.refs, self.retain_total, self.release_total
        )?;
        if let Some(parent) = self.parent {
            write!(f, " parent={}", parent)?;
        }
        Ok(())
    }
}

impl<M: Mode> RefGroup<M> {
    /// Create a group. Without a parent it reports into the mode's global root.
    pub const fn new(name: &'static str, parent: Option<&'static RefGroup<M>>) -> Self {
        Self::build(name, parent, false)
    }

    const fn root(name: &'static str) -> Self {
        Self::build(name, None, true)
    }

    const fn build(
        name: &'static str,
        parent: Option<&'static RefGroup<M>>,
        is_root: bool,
    ) -> Self {
        Self {
            name,
            parent,
            is_root,
            members: AtomicU64::new(0),
            refs: AtomicU64::new(0),
            retain_total: AtomicU64::new(0),
            release_total: AtomicU64::new(0),
            state: AtomicU8::new(0),
            log: Mutex::new(VecDeque::new()),
            _mode: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The group this one reports into, if any. Only the global roots have none.
    pub fn parent(&self) -> Option<&'static RefGroup<M>> {
        if self.is_root {
            None
        } else {
            Some(self.parent.unwrap_or_else(M::global))
        }
    }

    pub fn member_count(&self) -> u64 {
        self.members.load(Ordering::Relaxed)
    }

    pub fn total_refs(&self) -> u64 {
        self.refs.load(Ordering::Relaxed)
    }

    pub fn retain_total(&self) -> u64 {
        self.retain_total.load(Ordering::Relaxed)
    }

    pub fn release_total(&self) -> u64 {
        self.release_total.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot {
            name: self.name,
            parent: self.parent().map(|p| p.name),
            mode: M::NAME,
            members: self.member_count(),
            refs: self.total_refs(),
            retain_total: self.retain_total(),
            release_total: self.release_total(),
        }
    }

    /// Whether rlog records events for this group. Resolved against the
    /// selector the first time it is asked after the selector is configured.
    pub fn is_logging(&self) -> bool {
        let state = self.state.load(Ordering::Relaxed);
        if state & LOG_RESOLVED != 0 {
            return state & LOG_ON != 0;
        }
        match rlog::selects(self.name) {
            Some(on) => {
                let bits = if on { LOG_RESOLVED | LOG_ON } else { LOG_RESOLVED };
                self.state.fetch_or(bits, Ordering::Relaxed);
                on
            }
            None => false,
        }
    }

    /// Copy of the recorded rlog events, oldest first.
    pub fn log_records(&self) -> Vec<RefLogRecord> {
        let log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.iter().cloned().collect()
    }

    fn chain(&'static self) -> impl Iterator<Item = &'static RefGroup<M>> {
        std::iter::successors(Some(self), |g| g.parent())
    }

    fn register(&'static self) {
        let prev = self.state.fetch_or(REGISTERED, Ordering::Relaxed);
        if prev & REGISTERED == 0 {
            tracing::debug!(group = self.name, mode = M::NAME, "refgrp first member attached");
            registry::register(self);
        }
    }

    fn attach(&'static self, count: u32) {
        let refs = u64::from(count);
        for group in self.chain() {
            if group.members.fetch_add(1, Ordering::Relaxed) == 0 {
                group.register();
            }
            group.refs.fetch_add(refs, Ordering::Relaxed);
            group.retain_total.fetch_add(refs, Ordering::Relaxed);
        }
        self.record(RefOp::Init, count);
    }

    fn retained(&'static self, count: u32) {
        for group in self.chain() {
            group.refs.fetch_add(1, Ordering::Relaxed);
            group.retain_total.fetch_add(1, Ordering::Relaxed);
        }
        self.record(RefOp::Retain, count);
    }

    fn released(&'static self, count: u32) {
        for group in self.chain() {
            let prev = group.refs.fetch_sub(1, Ordering::Relaxed);
            assert_invariant(
                GROUP_REFS_NO_UNDERFLOW,
                prev != 0,
                "group reference total underflow",
                Some(group.name),
            );
            group.release_total.fetch_add(1, Ordering::Relaxed);
            if count == 0 {
                let prev = group.members.fetch_sub(1, Ordering::Relaxed);
                assert_invariant(
                    GROUP_MEMBERS_NO_UNDERFLOW,
                    prev != 0,
                    "group member count underflow",
                    Some(group.name),
                );
            }
        }
        let op = if count == 0 { RefOp::Dealloc } else { RefOp::Release };
        self.record(op, count);
    }

    /// Records into the nearest group in the chain that rlog selects, so a
    /// selected parent also sees the events of its unselected children.
    fn record(&'static self, op: RefOp, count: u32) {
        let Some(target) = self.chain().find(|g| g.is_logging()) else {
            return;
        };
        let record = rlog::emit(self.name, op, count);
        let mut log = target.log.lock().unwrap_or_else(PoisonError::into_inner);
        if log.len() == rlog::RLOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(record);
    }
}

impl<M: Mode> fmt::Debug for RefGroup<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefGroup")
            .field("name", &self.name)
            .field("mode", &M::NAME)
            .field("members", &self.member_count())
            .field("refs", &self.total_refs())
            .finish()
    }
}

/// Snapshot access for the registry, which holds groups of both modes.
pub(crate) trait GroupStats: Sync {
    fn snapshot(&self) -> GroupSnapshot;
}

impl<M: Mode> GroupStats for RefGroup<M> {
    fn snapshot(&self) -> GroupSnapshot {
        RefGroup::snapshot(self)
    }
}

/// A counter's link to its group.
pub(crate) struct GroupLink<M: Mode>(Option<&'static RefGroup<M>>);

impl<M: Mode> GroupLink<M> {
    pub(crate) const DETACHED: Self = Self(None);

    pub(crate) fn attach(group: Option<&'static RefGroup<M>>, count: u32) -> Self {
        let group = group.unwrap_or_else(M::global);
        group.attach(count);
        Self(Some(group))
    }

    #[inline]
    pub(crate) fn retained(&self, count: u32) {
        if let Some(group) = self.0 {
            group.retained(count);
        }
    }

    #[inline]
    pub(crate) fn released(&self, count: u32) {
        if let Some(group) = self.0 {
            group.released(count);
        }
    }

    #[inline]
    pub(crate) fn name(&self) -> Option<&'static str> {
        self.0.map(|g| g.name)
    }

    pub(crate) fn group(&self) -> Option<&'static RefGroup<M>> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static NET: RefGroup<Atomic> = RefGroup::new("unit.net", None);
    static NET_SOCKETS: RefGroup<Atomic> = RefGroup::new("unit.net.sockets", Some(&NET));

    #[test]
    fn parentless_group_reports_into_global_root() {
        assert_eq!(NET.parent().map(|p| p.name()), Some("global.atomic"));
        assert!(GLOBAL_ATOMIC.parent().is_none());
    }

    #[test]
    fn hooks_propagate_up_the_chain() {
        let link = GroupLink::attach(Some(&NET_SOCKETS), 2);
        assert_eq!(NET_SOCKETS.member_count(), 1);
        assert_eq!(NET.total_refs(), 2);

        link.retained(3);
        assert_eq!(NET.total_refs(), 3);
        assert_eq!(NET.retain_total(), 3);

        link.released(2);
        link.released(1);
        link.released(0);
        assert_eq!(NET.member_count(), 0);
        assert_eq!(NET_SOCKETS.total_refs(), 0);
        assert_eq!(NET_SOCKETS.release_total(), 3);
    }

    #[test]
    fn snapshot_display() {
        static PIPES: RefGroup<Locked> = RefGroup::new("unit.pipes", None);
        let text = PIPES.snapshot().to_string();
        assert_eq!(
            text,
            "unit.pipes [locked] members=0 refs=0 retained=0 released=0 parent=global.locked"
        );
    }
}
