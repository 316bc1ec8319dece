//! A port name table that holds non-owning entries.
//!
//! Lookups take a reference with `retain_try`, so a port whose last owner is
//! releasing it concurrently is simply not found. The table lock covers both
//! lookups and removal, which keeps the memory valid for every `retain_try`.
//!
//! Run with `RUST_LOG=refcnt=trace REFCNT_RLOG=demo.ports` to see rlog events.

use refcnt::{refgrp_decl, Atomic, AtomicRef};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing_subscriber::EnvFilter;

refgrp_decl!(static PORTS: Atomic = "demo.ports");

struct Port {
    name: u32,
    refs: AtomicRef,
}

#[derive(Default)]
struct PortTable {
    ports: Mutex<HashMap<u32, Arc<Port>>>,
}

impl PortTable {
    fn create(&self, name: u32) -> Arc<Port> {
        let port = Arc::new(Port {
            name,
            refs: AtomicRef::single(Some(&PORTS)),
        });
        self.ports.lock().unwrap().insert(name, Arc::clone(&port));
        port
    }

    fn lookup(&self, name: u32) -> Option<Arc<Port>> {
        let ports = self.ports.lock().unwrap();
        let port = ports.get(&name)?;
        port.refs.retain_try().then(|| Arc::clone(port))
    }

    fn release(&self, port: &Port) {
        if port.refs.release() == 0 {
            self.ports.lock().unwrap().remove(&port.name);
            tracing::info!(port = port.name, "port destroyed");
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    if let Err(err) = refcnt::rlog::configure_from_env() {
        eprintln!("ignoring rlog selector: {}", err);
    }

    let table = PortTable::default();
    let ports: Vec<Arc<Port>> = (0..4).map(|name| table.create(name)).collect();

    thread::scope(|s| {
        for worker in 0..4u32 {
            let table = &table;
            s.spawn(move || {
                for round in 0..100u32 {
                    let name = (worker + round) % 4;
                    if let Some(port) = table.lookup(name) {
                        table.release(&port);
                    }
                }
            });
        }
        for port in &ports {
            table.release(port);
        }
    });

    println!("ports left in table: {}", table.ports.lock().unwrap().len());
    for snap in refcnt::registry::leaks() {
        println!("live: {}", snap);
    }
    println!("{}", PORTS.snapshot());
}
