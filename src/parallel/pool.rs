use crossbeam::channel::{Receiver, Sender, unbounded};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::JoinHandle;

use crate::error::MapError;

/// Unit of work submitted to an executor
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that runs jobs on other threads
///
/// The mapper only needs fire-and-forget submission: results come back over
/// the mapper's own channel.
pub trait Executor: Send + Sync {
    /// Queue a job; fails once the executor has been shut down
    fn execute(&self, job: Job) -> Result<(), MapError>;

    /// Make room for `workers` more jobs to run alongside those already in
    /// flight, where supported
    fn ensure_capacity(&self, workers: usize) -> Result<(), MapError>;

    /// Number of threads currently able to run jobs
    fn capacity(&self) -> usize;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_guarded(job: Job, thread: &str) {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        tracing::warn!("job panicked on {}", thread);
    }
}

/// Long-lived pool of worker threads fed from one shared queue
///
/// The pool starts with however many threads it is asked for and grows when a
/// caller needs more concurrent slots than are idle. Threads live until
/// [`WorkerPool::shutdown`] or drop.
pub struct WorkerPool {
    queue: Mutex<Option<Sender<Job>>>,
    work_rx: Receiver<Job>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    spawned: AtomicUsize,
    /// Jobs queued or running
    busy: Arc<AtomicUsize>,
    /// Slots promised by `ensure_capacity` whose jobs are not submitted yet
    reserved: AtomicUsize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool {
    /// Pool with no threads yet; they are spawned on first demand
    pub fn new() -> Self {
        let (work_tx, work_rx) = unbounded();
        Self {
            queue: Mutex::new(Some(work_tx)),
            work_rx,
            workers: Mutex::new(Vec::new()),
            spawned: AtomicUsize::new(0),
            busy: Arc::new(AtomicUsize::new(0)),
            reserved: AtomicUsize::new(0),
        }
    }

    /// Pool with `threads` workers started up front
    pub fn with_threads(threads: usize) -> Result<Self, MapError> {
        let pool = Self::new();
        pool.grow_to(&mut lock(&pool.workers), threads)?;
        Ok(pool)
    }

    fn grow_to(&self, handles: &mut Vec<JoinHandle<()>>, threads: usize) -> Result<(), MapError> {
        while handles.len() < threads {
            let worker_id = self.spawned.fetch_add(1, Ordering::Relaxed);
            handles.push(self.spawn_worker(worker_id)?);
        }
        Ok(())
    }

    fn spawn_worker(&self, worker_id: usize) -> Result<JoinHandle<()>, MapError> {
        let work_rx = self.work_rx.clone();
        let busy = self.busy.clone();
        let name = format!("bandwise-worker-{worker_id}");

        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                tracing::trace!("{} started", name);
                while let Ok(job) = work_rx.recv() {
                    run_guarded(job, &name);
                    busy.fetch_sub(1, Ordering::AcqRel);
                }
                tracing::trace!("{} exiting", name);
            })
            .map_err(|e| MapError::SpawnFailed(e.to_string()))
    }

    /// Jobs submitted and not yet finished
    pub fn busy(&self) -> usize {
        self.busy.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        lock(&self.queue).is_none()
    }

    /// Stop accepting work, let queued jobs drain and join every thread
    pub fn shutdown(&self) {
        // Dropping the sender disconnects the queue once it is empty
        lock(&self.queue).take();

        let handles: Vec<_> = lock(&self.workers).drain(..).collect();
        let current = std::thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::warn!("worker thread exited abnormally");
            }
        }
    }
}

impl Executor for WorkerPool {
    fn execute(&self, job: Job) -> Result<(), MapError> {
        let queue = lock(&self.queue);
        let work_tx = queue.as_ref().ok_or(MapError::PoolClosed)?;
        self.busy.fetch_add(1, Ordering::AcqRel);
        let _ = self
            .reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        work_tx.send(job).map_err(|_| {
            self.busy.fetch_sub(1, Ordering::AcqRel);
            MapError::PoolClosed
        })
    }

    fn ensure_capacity(&self, workers: usize) -> Result<(), MapError> {
        if self.is_shut_down() {
            return Err(MapError::PoolClosed);
        }

        // Busy threads include the caller's own band when a transform maps on
        // the pool it runs on
        let mut handles = lock(&self.workers);
        let busy = self.busy();
        let claimed = busy.saturating_add(self.reserved.fetch_add(workers, Ordering::AcqRel));
        self.grow_to(&mut handles, claimed.saturating_add(workers))?;
        tracing::trace!(
            "pool capacity {} ({} busy, requested {})",
            handles.len(),
            busy,
            workers
        );
        Ok(())
    }

    fn capacity(&self) -> usize {
        lock(&self.workers).len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Executor backed by a fixed-size rayon thread pool
///
/// Rayon pools cannot grow, so bands beyond the thread count wait their turn.
pub struct RayonExecutor {
    pool: rayon::ThreadPool,
}

impl RayonExecutor {
    pub fn new(threads: usize) -> Result<Self, MapError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("bandwise-rayon-{i}"))
            .build()
            .map_err(|e| MapError::SpawnFailed(e.to_string()))?;
        Ok(Self { pool })
    }
}

impl Executor for RayonExecutor {
    fn execute(&self, job: Job) -> Result<(), MapError> {
        // Rayon aborts the process on an unhandled panic in a spawned job
        self.pool.spawn(move || run_guarded(job, "rayon worker"));
        Ok(())
    }

    fn ensure_capacity(&self, workers: usize) -> Result<(), MapError> {
        if workers > self.pool.current_num_threads() {
            tracing::debug!(
                "rayon pool has {} threads, {} bands will queue",
                self.pool.current_num_threads(),
                workers
            );
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.pool.current_num_threads()
    }
}

/// Process-wide pool used by the free-standing convenience functions
pub fn shared_pool() -> Arc<WorkerPool> {
    static SHARED: OnceLock<Arc<WorkerPool>> = OnceLock::new();
    SHARED.get_or_init(|| Arc::new(WorkerPool::new())).clone()
}
