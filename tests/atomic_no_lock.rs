//! Atomic counters are lock-free in production builds.
//!
//! With `refgrp` the hooks lock the rlog ring of selected groups and read the
//! selector under an `RwLock`, so the scan only holds for builds without it.
#![cfg(not(feature = "refgrp"))]

use std::fs;
use std::path::Path;

/// Every source file on an `AtomicRef` path when groups are compiled out.
const ATOMIC_PATH: &[&str] = &["atomic.rs", "invariant.rs", "group/noop.rs", "group/mod.rs"];

#[test]
fn atomic_paths_take_no_locks() {
    let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    for file in ATOMIC_PATH {
        let src = fs::read_to_string(src_dir.join(file))
            .unwrap_or_else(|err| panic!("failed to read {}: {}", file, err));
        for needle in ["Mutex", "RwLock", ".lock()", ".read()", ".write()"] {
            assert!(
                !src.contains(needle),
                "atomic counter paths must not lock ({} contains `{}`)",
                file,
                needle
            );
        }
    }
}
