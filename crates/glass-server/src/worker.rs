//! Named worker-thread pools (spec.md §5): nucleation, hypo-evolve, and
//! web-build, each a fixed set of threads pulling jobs off a shared
//! bounded queue. Follows a lazy-SMP thread-pool design: a pull-model
//! `crossbeam_channel` queue feeding a fixed worker count, a `Worker`
//! handle holding a control sender plus a joinable thread, and a
//! heartbeat timestamp per worker so a health check can notice a stuck
//! one.
//!
//! A travel-time provider is not `Sync` (spec.md §5), so each worker
//! clones its own instance from a master at spawn time; likewise each
//! worker owns a seeded `Xoshiro256PlusPlus` for the simulated-annealing
//! relocator, derived from a master seed so a run is reproducible.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use glass_core::travel_time::TravelTimeProvider;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// How long a worker blocks waiting for a job before checking the stop
/// flag and refreshing its heartbeat (spec.md §5: "bounded blocking
/// queue pops with heartbeats").
const POP_TIMEOUT: Duration = Duration::from_millis(250);

/// A unit of work handed to a named pool. `F` runs with the worker's own
/// cloned travel-time provider and seeded RNG.
pub type Job = Box<dyn FnOnce(&mut dyn TravelTimeProvider, &mut Xoshiro256PlusPlus) + Send>;

struct Worker {
    heartbeat_epoch_sec: Arc<AtomicI64>,
    handle: Option<JoinHandle<()>>,
}

/// A named pool of worker threads pulling `Job`s off a shared queue.
/// `size == 0` means synchronous: jobs run inline on the submitting
/// thread instead of spawning any workers (spec.md §5's "web-build
/// default 0").
pub struct WorkerPool {
    name: String,
    tx: Option<Sender<Job>>,
    workers: Vec<Worker>,
    sync_travel_time: Option<Box<dyn TravelTimeProvider>>,
    sync_rng: Option<Xoshiro256PlusPlus>,
}

impl WorkerPool {
    pub fn new(
        name: impl Into<String>,
        size: u32,
        queue_capacity: usize,
        travel_time: &dyn TravelTimeProvider,
        seed: u64,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let name = name.into();
        if size == 0 {
            return Self {
                name,
                tx: None,
                workers: Vec::new(),
                sync_travel_time: Some(travel_time.clone_box()),
                sync_rng: Some(Xoshiro256PlusPlus::seed_from_u64(seed)),
            };
        }

        let (tx, rx) = bounded::<Job>(queue_capacity);
        let mut workers = Vec::with_capacity(size as usize);
        for worker_id in 0..size {
            let rx = rx.clone();
            let mut worker_tt = travel_time.clone_box();
            let mut worker_rng = Xoshiro256PlusPlus::seed_from_u64(seed.wrapping_add(worker_id as u64 + 1));
            let stop = stop.clone();
            let heartbeat = Arc::new(AtomicI64::new(0));
            let heartbeat_for_thread = heartbeat.clone();
            let thread_name = format!("{name}-{worker_id}");

            let handle = std::thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || worker_loop(&rx, worker_tt.as_mut(), &mut worker_rng, &stop, &heartbeat_for_thread))
                .unwrap_or_else(|e| panic!("failed to spawn worker thread {thread_name}: {e}"));

            workers.push(Worker { heartbeat_epoch_sec: heartbeat, handle: Some(handle) });
        }

        Self { name, tx: Some(tx), workers, sync_travel_time: None, sync_rng: None }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_synchronous(&self) -> bool {
        self.tx.is_none()
    }

    /// Submits `job`. On a synchronous pool it runs immediately on the
    /// caller's thread; otherwise it's enqueued for a worker to pick up.
    pub fn submit(&mut self, job: Job) {
        match &self.tx {
            Some(tx) => {
                if let Err(e) = tx.send(job) {
                    log::error!("{}: failed to enqueue job, pool is shut down: {e}", self.name);
                }
            }
            None => {
                let tt = self.sync_travel_time.as_deref_mut().expect("synchronous pool missing travel-time provider");
                let rng = self.sync_rng.as_mut().expect("synchronous pool missing rng");
                job(tt, rng);
            }
        }
    }

    /// The oldest heartbeat age across all workers, in seconds, or `None`
    /// for a synchronous (zero-thread) pool. Used by the health check to
    /// flag a pool with a stuck worker (spec.md §5).
    pub fn max_heartbeat_age_sec(&self, now_sec: i64) -> Option<i64> {
        self.workers.iter().map(|w| now_sec - w.heartbeat_epoch_sec.load(Ordering::Relaxed)).max()
    }

    pub fn shutdown(&mut self) {
        drop(self.tx.take());
        for worker in self.workers.iter_mut() {
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    rx: &Receiver<Job>,
    travel_time: &mut dyn TravelTimeProvider,
    rng: &mut Xoshiro256PlusPlus,
    stop: &AtomicBool,
    heartbeat: &AtomicI64,
) {
    while !stop.load(Ordering::Relaxed) {
        heartbeat.store(now_epoch_sec(), Ordering::Relaxed);
        match rx.recv_timeout(POP_TIMEOUT) {
            Ok(job) => {
                job(travel_time, rng);
                heartbeat.store(now_epoch_sec(), Ordering::Relaxed);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn now_epoch_sec() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}
