use criterion::{black_box, criterion_group, criterion_main, Criterion};
use refcnt::{refgrp_decl, Atomic, AtomicRef, Locked, LockedRef};
use std::thread;

refgrp_decl!(static BENCH_ATOMIC: Atomic = "bench.atomic");
refgrp_decl!(static BENCH_LOCKED: Locked = "bench.locked");

fn bench_atomic(c: &mut Criterion) {
    let rc = AtomicRef::single(Some(&BENCH_ATOMIC));

    c.bench_function("atomic_retain_release", |b| {
        b.iter(|| {
            rc.retain();
            black_box(rc.release());
        })
    });

    c.bench_function("atomic_retain_try_release_live", |b| {
        b.iter(|| {
            black_box(rc.retain_try());
            rc.release_live();
        })
    });
}

fn bench_locked(c: &mut Criterion) {
    let mut rc = LockedRef::single(Some(&BENCH_LOCKED));

    c.bench_function("locked_retain_release", |b| {
        b.iter(|| {
            rc.retain_locked();
            black_box(rc.release_locked());
        })
    });
}

fn bench_contended(c: &mut Criterion) {
    // Worst case: every thread hammers the same counter.
    let rc = AtomicRef::single(None);

    c.bench_function("atomic_contended_4_threads", |b| {
        b.iter(|| {
            thread::scope(|s| {
                for _ in 0..4 {
                    s.spawn(|| {
                        for _ in 0..1000 {
                            rc.retain();
                            rc.release_live();
                        }
                    });
                }
            });
            black_box(rc.get_count());
        })
    });
}

criterion_group!(benches, bench_atomic, bench_locked, bench_contended);
criterion_main!(benches);
