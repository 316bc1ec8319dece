//! Process-wide list of groups that have had at least one member.

use super::tracking::{GroupSnapshot, GroupStats};
use lazy_static::lazy_static;
use std::sync::{Mutex, PoisonError};

lazy_static! {
    static ref GROUPS: Mutex<Vec<&'static dyn GroupStats>> = Mutex::new(Vec::new());
}

pub(crate) fn register(group: &'static dyn GroupStats) {
    GROUPS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(group);
}

/// Snapshots of every registered group, sorted by name.
pub fn snapshots() -> Vec<GroupSnapshot> {
    let groups = GROUPS.lock().unwrap_or_else(PoisonError::into_inner);
    let mut out: Vec<GroupSnapshot> = groups.iter().map(|g| g.snapshot()).collect();
    drop(groups);
    out.sort_by(|a, b| a.name.cmp(&b.name).then(a.mode.cmp(&b.mode)));
    out
}

/// Snapshot of the first registered group with this name.
pub fn find(name: &str) -> Option<GroupSnapshot> {
    snapshots().into_iter().find(|s| s.name == name)
}

/// Groups that still have live members. Meaningful at teardown, when every
/// object should have been finalized.
pub fn leaks() -> Vec<GroupSnapshot> {
    snapshots().into_iter().filter(|s| s.members > 0).collect()
}
