use core::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;
use std::thread;

use core_affinity::{get_core_ids, set_for_current};
use crossbeam_channel::{unbounded, Receiver, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Worker {
    handle: Option<thread::JoinHandle<()>>,
    sender: Option<Sender<Job>>,
}

/// A pool of core-pinned worker threads with affinity-based dispatch: a job
/// submitted under a key always lands on the same worker. The parallel
/// exchange relies on this to keep every protocol instance on the one
/// thread that owns it, so per-instance message handling needs no locks.
///
pub struct WorkerPool {
    workers: Vec<Worker>,
}

impl WorkerPool {
    /// Create a pool with at most the given number of threads. If the
    /// system has fewer physical CPU cores than the requested number of
    /// threads, the number of cores is used instead.
    ///
    pub fn new(num_threads: usize) -> Self {
        let workers = get_core_ids()
            .unwrap()
            .into_iter()
            .take(num_threads)
            .map(|core_id| {
                let (sender, receiver): (Sender<Job>, Receiver<Job>) = unbounded();
                let handle = thread::spawn(move || {
                    set_for_current(core_id);
                    for job in receiver {
                        job()
                    }
                });
                Worker {
                    handle: Some(handle),
                    sender: Some(sender),
                }
            })
            .collect();

        WorkerPool { workers }
    }

    /// Return the number of worker threads in the pool.
    ///
    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    /// Spawn a job onto the worker with the given index, modulo the pool
    /// size.
    ///
    pub fn spawn_on<F>(&self, worker_id: usize, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.workers[worker_id % self.num_threads()]
            .sender
            .as_ref()
            .unwrap()
            .send(Box::new(job))
            .unwrap()
    }

    /// Spawn a job onto the worker that owns the given key. Equal keys go
    /// to equal workers for the lifetime of the pool.
    ///
    pub fn spawn_keyed<K, F>(&self, key: &K, job: F)
    where
        K: Hash,
        F: FnOnce() + Send + 'static,
    {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        self.spawn_on(hasher.finish() as usize, job)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.sender.take().unwrap();
        self.handle.take().unwrap().join().unwrap();
    }
}
