//! Registry of live connection workers
//!
//! Each accepted connection gets a worker id (`worker-N`) which tags its log
//! lines and the transaction records it produces. The registry tracks which
//! workers are alive so the server can report them at shutdown.
//!
//! # Thread Safety
//!
//! Backed by `DashMap`; workers register and deregister concurrently without
//! a global lock. Deregistration happens when the returned [`WorkerGuard`]
//! is dropped, on every exit path of the connection task.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct WorkerRegistry {
    next_id: AtomicU64,
    active: DashMap<String, SocketAddr>,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        WorkerRegistry {
            next_id: AtomicU64::new(1),
            active: DashMap::new(),
        }
    }

    /// Allocate a worker id for `peer` and mark it active
    pub fn register(self: &Arc<Self>, peer: SocketAddr) -> WorkerGuard {
        let id = format!("worker-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.active.insert(id.clone(), peer);
        WorkerGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Number of live workers
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Snapshot of live workers and their peers, sorted by id
    pub fn active_workers(&self) -> Vec<(String, SocketAddr)> {
        let mut workers: Vec<(String, SocketAddr)> = self
            .active
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        workers.sort();
        workers
    }
}

/// Keeps a worker registered until dropped
#[derive(Debug)]
pub struct WorkerGuard {
    registry: Arc<WorkerRegistry>,
    id: String,
}

impl WorkerGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.registry.active.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_guard_deregisters_on_drop() {
        let registry = Arc::new(WorkerRegistry::new());
        let first = registry.register(peer(1000));
        let second = registry.register(peer(1001));
        assert_eq!(first.id(), "worker-1");
        assert_eq!(second.id(), "worker-2");
        assert_eq!(registry.active_count(), 2);

        drop(first);
        assert_eq!(
            registry.active_workers(),
            vec![("worker-2".to_string(), peer(1001))]
        );
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let registry = Arc::new(WorkerRegistry::new());

        let mut handles = vec![];
        for t in 0..8u16 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                (0..50u16)
                    .map(|i| registry.register(peer(t * 100 + i)))
                    .collect::<Vec<_>>()
            }));
        }

        let guards: Vec<WorkerGuard> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(registry.active_count(), 400);

        drop(guards);
        assert_eq!(registry.active_count(), 0);
    }
}
