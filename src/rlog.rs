//! rlog: per-group refcount event logging, selected by group name at startup.
//!
//! The selector is a comma-separated list of group names. An entry ending in
//! `*` matches every group whose name starts with the rest of the entry.
//!
//! ```ignore
//! rlog::configure("tasks,net.*")?;      // explicit
//! rlog::configure_from_env()?;          // REFCNT_RLOG=tasks,net.*
//! ```
//!
//! The selector is set once and never changes afterwards. Groups resolve
//! whether they are selected the first time an event reaches them after that.

use lazy_static::lazy_static;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::thread::{self, ThreadId};
use thiserror::Error;

/// Environment variable read by [`configure_from_env`].
pub const RLOG_ENV: &str = "REFCNT_RLOG";

/// Records kept per selected group; older records are dropped.
pub const RLOG_CAPACITY: usize = 256;

lazy_static! {
    static ref SELECTOR: RwLock<Option<LogSelector>> = RwLock::new(None);
}

static CONFIGURED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("rlog selector is empty")]
    Empty,
    #[error("rlog selector has a blank entry at position {0}")]
    BlankEntry(usize),
    #[error("rlog selector entry '{0}' has a '*' that is not trailing")]
    InnerWildcard(String),
    #[error("rlog selector already configured")]
    AlreadyConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Exact(String),
    Prefix(String),
}

/// Parsed list of group name patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSelector {
    patterns: Vec<Pattern>,
}

impl LogSelector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        if input.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut patterns = Vec::new();
        for (idx, entry) in input.split(',').enumerate() {
            let entry = entry.trim();
            if entry.is_empty() {
                return Err(SelectorError::BlankEntry(idx));
            }
            let pattern = match entry.strip_suffix('*') {
                Some(prefix) if prefix.contains('*') => {
                    return Err(SelectorError::InnerWildcard(entry.to_string()))
                }
                Some(prefix) => Pattern::Prefix(prefix.to_string()),
                None if entry.contains('*') => {
                    return Err(SelectorError::InnerWildcard(entry.to_string()))
                }
                None => Pattern::Exact(entry.to_string()),
            };
            patterns.push(pattern);
        }
        Ok(Self { patterns })
    }

    pub fn matches(&self, group: &str) -> bool {
        self.patterns.iter().any(|p| match p {
            Pattern::Exact(name) => name == group,
            Pattern::Prefix(prefix) => group.starts_with(prefix.as_str()),
        })
    }
}

/// Install the process-wide selector. Fails if one is already installed.
pub fn configure(input: &str) -> Result<(), SelectorError> {
    let selector = LogSelector::parse(input)?;
    let mut slot = SELECTOR.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(SelectorError::AlreadyConfigured);
    }
    tracing::info!(selector = input, "rlog enabled");
    *slot = Some(selector);
    CONFIGURED.store(true, Ordering::Release);
    Ok(())
}

/// Install the selector from `REFCNT_RLOG`. Returns `Ok(false)` when unset.
pub fn configure_from_env() -> Result<bool, SelectorError> {
    match std::env::var(RLOG_ENV) {
        Ok(input) => configure(&input).map(|()| true),
        Err(_) => Ok(false),
    }
}

/// `None` until a selector is configured.
pub(crate) fn selects(group: &str) -> Option<bool> {
    if !CONFIGURED.load(Ordering::Acquire) {
        return None;
    }
    let slot = SELECTOR.read().unwrap_or_else(PoisonError::into_inner);
    slot.as_ref().map(|s| s.matches(group))
}

/// Kind of event recorded for a selected group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefOp {
    Init,
    Retain,
    Release,
    /// The release that brought the count to zero.
    Dealloc,
}

impl fmt::Display for RefOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RefOp::Init => "init",
            RefOp::Retain => "retain",
            RefOp::Release => "release",
            RefOp::Dealloc => "dealloc",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefLogRecord {
    /// Group of the counter the event happened on. Differs from the group
    /// holding the record when only an ancestor is selected.
    pub group: &'static str,
    pub op: RefOp,
    /// Count after the operation.
    pub count: u32,
    pub thread: ThreadId,
}

pub(crate) fn emit(group: &'static str, op: RefOp, count: u32) -> RefLogRecord {
    tracing::trace!(target: "refcnt::rlog", group, %op, count, "refcount event");
    RefLogRecord {
        group,
        op,
        count,
        thread: thread::current().id(),
    }
}
