use crossbeam::channel::{at, never, select, unbounded};
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::interrupt::Interrupter;
use super::pool::{Executor, shared_pool};
use crate::band::{Band, partition};
use crate::counter::{AtomicCell, ShardedCounter};
use crate::error::{MapError, TransformError, TransformPanic};
use crate::grid::Grid;

/// Safety ceiling on how long a call waits for its bands
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Progress callback: `(completed_bands, total_bands, band_index)`
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize, usize) + 'a);

/// How many bands a call is split into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    /// A percentage of the detected cores, at least one
    Auto { thread_percentage: u8 },
    /// Exactly this many bands (zero is treated as one)
    Fixed(usize),
}

impl Default for Parallelism {
    fn default() -> Self {
        Parallelism::Auto {
            thread_percentage: 100,
        }
    }
}

impl Parallelism {
    /// `workers == 0` means auto-detect
    pub fn from_settings(workers: usize, thread_percentage: u8) -> Self {
        if workers > 0 {
            Parallelism::Fixed(workers)
        } else {
            Parallelism::Auto { thread_percentage }
        }
    }

    pub fn resolve(&self) -> usize {
        match *self {
            Parallelism::Fixed(n) => n.max(1),
            Parallelism::Auto { thread_percentage } => {
                ExecutionStrategy::calculate_optimal_workers(0, thread_percentage)
            }
        }
    }
}

/// Execution strategy enum for choosing between parallel and sequential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    Parallel { workers: usize },
}

impl ExecutionStrategy {
    /// Parallel once the grid has at least `min_cells_for_parallel` cells
    ///
    /// ```rust
    /// use bandwise::parallel::ExecutionStrategy;
    ///
    /// let strategy = ExecutionStrategy::auto(36, 50, 4);
    /// assert!(matches!(strategy, ExecutionStrategy::Sequential));
    ///
    /// let strategy = ExecutionStrategy::auto(100, 50, 4);
    /// assert!(matches!(strategy, ExecutionStrategy::Parallel { workers: 4 }));
    /// ```
    pub fn auto(cell_count: usize, min_cells_for_parallel: usize, workers: usize) -> Self {
        if cell_count >= min_cells_for_parallel {
            ExecutionStrategy::Parallel { workers }
        } else {
            ExecutionStrategy::Sequential
        }
    }

    /// Workers available under the configured limits
    ///
    /// ```text
    /// 1. Detect available CPU cores: num_cpus::get()
    /// 2. Apply percentage: cores * thread_percentage / 100
    /// 3. Apply config limit: min(max_threads, result) if max_threads > 0
    /// 4. Ensure minimum: max(1, result)
    /// ```
    pub fn calculate_optimal_workers(max_threads: usize, thread_percentage: u8) -> usize {
        let available_cores = num_cpus::get();
        let by_percentage = std::cmp::max(1, (available_cores * thread_percentage as usize) / 100);

        if max_threads > 0 {
            std::cmp::min(max_threads, by_percentage)
        } else {
            by_percentage
        }
    }
}

/// Cumulative counters for one mapper, updated from worker threads
#[derive(Debug, Default)]
pub struct MapStats {
    calls: ShardedCounter,
    cells: ShardedCounter,
    bands: ShardedCounter,
    failures: ShardedCounter,
    tallest_band: AtomicCell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub calls: i64,
    pub cells: i64,
    pub bands: i64,
    pub failures: i64,
    pub tallest_band: i64,
}

impl MapStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            calls: self.calls.sum(),
            cells: self.cells.sum(),
            bands: self.bands.sum(),
            failures: self.failures.sum(),
            tallest_band: self.tallest_band.get(),
        }
    }

    fn record_band(&self, band: &Band, width: usize) {
        self.bands.increment();
        self.cells.add((band.len() * width) as i64);
        self.tallest_band.max_and_get(band.len() as i64);
    }
}

/// Stop signal seen by every band of one call
#[derive(Clone)]
struct Halt {
    cancelled: Arc<AtomicBool>,
    interrupter: Interrupter,
}

impl Halt {
    fn should_stop(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || self.interrupter.is_interrupted()
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// Map every cell of `band`, stopping between rows if the call was abandoned
fn run_band<T, U, E, F>(band: Band, grid: &Grid<T>, f: &F, halt: &Halt) -> Result<Vec<U>, MapError>
where
    E: Into<TransformError>,
    F: Fn(&T) -> Result<U, E>,
{
    let mut out = Vec::with_capacity(band.len() * grid.width());

    for y in band.rows() {
        if halt.should_stop() {
            return Err(MapError::Interrupted);
        }
        for (x, cell) in grid.rows_range(y, y + 1).iter().enumerate() {
            let source: TransformError = match catch_unwind(AssertUnwindSafe(|| f(cell))) {
                Ok(Ok(value)) => {
                    out.push(value);
                    continue;
                }
                Ok(Err(e)) => e.into(),
                Err(payload) => Box::new(TransformPanic::from_payload(payload)),
            };
            return Err(MapError::TransformFailed {
                band: band.index,
                x,
                y,
                source,
            });
        }
    }

    Ok(out)
}

/// Partitioned parallel mapper
///
/// Splits a grid into contiguous row bands, maps each band on the injected
/// executor and blocks until every band has reported. The executor outlives
/// the call and can be shared between mappers.
///
/// ```rust
/// use bandwise::{BandMapper, Grid, Parallelism};
///
/// let grid = Grid::from_rows(vec![vec![1, 2], vec![3, 4], vec![5, 6], vec![7, 8]])?;
/// let mapper = BandMapper::shared().with_parallelism(Parallelism::Fixed(2));
/// let out = mapper.map(grid, |x| x * 10)?;
/// assert_eq!(out.into_rows(), vec![vec![10, 20], vec![30, 40], vec![50, 60], vec![70, 80]]);
/// # Ok::<(), bandwise::MapError>(())
/// ```
#[derive(Clone)]
pub struct BandMapper {
    executor: Arc<dyn Executor>,
    parallelism: Parallelism,
    min_cells_for_parallel: usize,
    timeout: Duration,
    stats: Arc<MapStats>,
}

impl std::fmt::Debug for BandMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandMapper")
            .field("parallelism", &self.parallelism)
            .field("min_cells_for_parallel", &self.min_cells_for_parallel)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl BandMapper {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            parallelism: Parallelism::default(),
            min_cells_for_parallel: 0,
            timeout: DEFAULT_TIMEOUT,
            stats: Arc::new(MapStats::default()),
        }
    }

    /// Mapper on the process-wide worker pool
    pub fn shared() -> Self {
        Self::new(shared_pool())
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Grids smaller than this are mapped on the calling thread
    pub fn with_min_cells_for_parallel(mut self, cells: usize) -> Self {
        self.min_cells_for_parallel = cells;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Strategy this mapper would use for a grid of `cell_count` cells
    pub fn strategy_for(&self, cell_count: usize) -> ExecutionStrategy {
        ExecutionStrategy::auto(
            cell_count,
            self.min_cells_for_parallel,
            self.parallelism.resolve(),
        )
    }

    /// Apply an infallible transform to every cell
    pub fn map<T, U, F>(&self, grid: impl Into<Arc<Grid<T>>>, f: F) -> Result<Grid<U>, MapError>
    where
        T: Send + Sync + 'static,
        U: Send + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.try_map(grid, move |cell| Ok::<U, std::convert::Infallible>(f(cell)))
    }

    /// Apply a fallible transform to every cell
    pub fn try_map<T, U, E, F>(
        &self,
        grid: impl Into<Arc<Grid<T>>>,
        f: F,
    ) -> Result<Grid<U>, MapError>
    where
        T: Send + Sync + 'static,
        U: Send + 'static,
        E: Into<TransformError> + 'static,
        F: Fn(&T) -> Result<U, E> + Send + Sync + 'static,
    {
        self.try_map_with(grid, f, &Interrupter::new(), None)
    }

    /// Full form: the call can be interrupted and reports band progress
    pub fn try_map_with<T, U, E, F>(
        &self,
        grid: impl Into<Arc<Grid<T>>>,
        f: F,
        interrupter: &Interrupter,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Grid<U>, MapError>
    where
        T: Send + Sync + 'static,
        U: Send + 'static,
        E: Into<TransformError> + 'static,
        F: Fn(&T) -> Result<U, E> + Send + Sync + 'static,
    {
        let grid = grid.into();
        let (width, height) = (grid.width(), grid.height());
        self.stats.calls.increment();

        if height == 0 {
            tracing::debug!("empty grid of width {}, nothing to map", width);
            return Ok(Grid::empty(width));
        }

        let result = match self.strategy_for(grid.len()) {
            ExecutionStrategy::Sequential => self.map_sequential(&grid, &f, interrupter, progress),
            ExecutionStrategy::Parallel { workers } => {
                self.map_bands(grid, f, workers, interrupter, progress)
            }
        };

        if let Err(ref e) = result {
            self.stats.failures.increment();
            tracing::warn!("map of {}x{} grid failed: {}", width, height, e);
        }
        result
    }

    fn map_sequential<T, U, E, F>(
        &self,
        grid: &Grid<T>,
        f: &F,
        interrupter: &Interrupter,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Grid<U>, MapError>
    where
        E: Into<TransformError>,
        F: Fn(&T) -> Result<U, E>,
    {
        tracing::debug!("mapping {}x{} grid sequentially", grid.width(), grid.height());
        let band = Band {
            index: 0,
            from_y: 0,
            to_y: grid.height(),
        };
        let halt = Halt {
            cancelled: Arc::new(AtomicBool::new(false)),
            interrupter: interrupter.clone(),
        };

        let cells = run_band(band, grid, f, &halt)?;
        self.stats.record_band(&band, grid.width());
        if let Some(report) = progress {
            report(1, 1, 0);
        }
        Ok(Grid::from_row_blocks(grid.width(), grid.height(), vec![cells]))
    }

    fn map_bands<T, U, E, F>(
        &self,
        grid: Arc<Grid<T>>,
        f: F,
        workers: usize,
        interrupter: &Interrupter,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Grid<U>, MapError>
    where
        T: Send + Sync + 'static,
        U: Send + 'static,
        E: Into<TransformError> + 'static,
        F: Fn(&T) -> Result<U, E> + Send + Sync + 'static,
    {
        let (width, height) = (grid.width(), grid.height());
        let bands = partition(height, workers);
        let active: Vec<Band> = bands.iter().copied().filter(|b| !b.is_empty()).collect();
        tracing::debug!(
            "mapping {}x{} grid in {} bands ({} non-empty)",
            width,
            height,
            bands.len(),
            active.len()
        );

        if interrupter.is_interrupted() {
            return Err(MapError::Interrupted);
        }
        self.executor.ensure_capacity(active.len())?;

        let halt = Halt {
            cancelled: Arc::new(AtomicBool::new(false)),
            interrupter: interrupter.clone(),
        };
        let f = Arc::new(f);
        let (result_tx, result_rx) = unbounded::<(usize, Result<Vec<U>, MapError>)>();

        for band in &active {
            let band = *band;
            let grid = grid.clone();
            let f = f.clone();
            let band_halt = halt.clone();
            let stats = self.stats.clone();
            let result_tx = result_tx.clone();

            let submitted = self.executor.execute(Box::new(move || {
                tracing::trace!("{} started", band);
                let outcome = run_band(band, &grid, &*f, &band_halt);
                if outcome.is_ok() {
                    stats.record_band(&band, width);
                }
                // The caller may have given up already
                let _ = result_tx.send((band.index, outcome));
            }));

            if let Err(e) = submitted {
                halt.cancel();
                return Err(e);
            }
        }
        // Only band tasks hold senders now, so disconnect means a task was lost
        drop(result_tx);

        let interrupt_rx = interrupter.receiver();
        // A ceiling past the end of representable time never fires
        let deadline = Instant::now()
            .checked_add(self.timeout)
            .map_or_else(never, at);
        let mut blocks: Vec<Option<Vec<U>>> = bands.iter().map(|_| None).collect();
        let mut completed = 0;

        while completed < active.len() {
            select! {
                recv(result_rx) -> message => match message {
                    Ok((index, Ok(cells))) => {
                        blocks[index] = Some(cells);
                        completed += 1;
                        if let Some(report) = progress {
                            report(completed, active.len(), index);
                        }
                    }
                    Ok((_, Err(e))) => {
                        halt.cancel();
                        return Err(e);
                    }
                    Err(_) => {
                        halt.cancel();
                        let band = active
                            .iter()
                            .find(|b| blocks[b.index].is_none())
                            .map_or(0, |b| b.index);
                        return Err(MapError::WorkerLost { band });
                    }
                },
                recv(interrupt_rx) -> _ => {
                    halt.cancel();
                    return Err(MapError::Interrupted);
                },
                recv(deadline) -> _ => {
                    halt.cancel();
                    return Err(MapError::TimedOut { after: self.timeout });
                },
            }
        }

        Ok(Grid::from_row_blocks(
            width,
            height,
            blocks.into_iter().flatten().collect(),
        ))
    }
}

/// Map `grid` with `f` on the shared pool using every available core
pub fn map_parallel<T, U, F>(grid: impl Into<Arc<Grid<T>>>, f: F) -> Result<Grid<U>, MapError>
where
    T: Send + Sync + 'static,
    U: Send + 'static,
    F: Fn(&T) -> U + Send + Sync + 'static,
{
    BandMapper::shared().map(grid, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::pool::{Job, RayonExecutor, WorkerPool};
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn sample() -> Grid<i32> {
        Grid::from_rows(vec![vec![1, 2], vec![3, 4], vec![5, 6], vec![7, 8]]).unwrap()
    }

    fn mapper(workers: usize) -> BandMapper {
        BandMapper::new(Arc::new(WorkerPool::new())).with_parallelism(Parallelism::Fixed(workers))
    }

    /// Executor that counts submissions and runs jobs on fresh threads
    #[derive(Default)]
    struct CountingExecutor {
        submitted: AtomicUsize,
    }

    impl Executor for CountingExecutor {
        fn execute(&self, job: Job) -> Result<(), MapError> {
            self.submitted.fetch_add(1, Ordering::SeqCst);
            thread::spawn(job);
            Ok(())
        }

        fn ensure_capacity(&self, _workers: usize) -> Result<(), MapError> {
            Ok(())
        }

        fn capacity(&self) -> usize {
            usize::MAX
        }
    }

    /// Executor that silently drops every job
    struct BlackHole;

    impl Executor for BlackHole {
        fn execute(&self, job: Job) -> Result<(), MapError> {
            drop(job);
            Ok(())
        }

        fn ensure_capacity(&self, _workers: usize) -> Result<(), MapError> {
            Ok(())
        }

        fn capacity(&self) -> usize {
            0
        }
    }

    #[test]
    fn test_concrete_scenario_two_bands() {
        let out = mapper(2).map(sample(), |x| x * 10).unwrap();
        assert_eq!(
            out.into_rows(),
            vec![vec![10, 20], vec![30, 40], vec![50, 60], vec![70, 80]]
        );
    }

    #[test]
    fn test_every_cell_is_transformed() {
        let rows: Vec<Vec<i64>> = (0..37)
            .map(|y| (0..13).map(|x| (y * 13 + x) as i64).collect())
            .collect();
        let grid = Arc::new(Grid::from_rows(rows).unwrap());

        for workers in [1, 2, 3, 8, 64] {
            let out = mapper(workers).map(grid.clone(), |v| v * v - 1).unwrap();
            assert_eq!((out.width(), out.height()), (13, 37));
            for (x, y, v) in grid.cells() {
                assert_eq!(out.get(x, y), Some(&(v * v - 1)));
            }
        }
    }

    #[test]
    fn test_band_count_does_not_change_output() {
        let grid = Arc::new(sample());
        let one = mapper(1).map(grid.clone(), |x| x + 3).unwrap();
        let per_row = mapper(grid.height()).map(grid.clone(), |x| x + 3).unwrap();
        assert_eq!(one, per_row);
    }

    #[test]
    fn test_more_bands_than_rows() {
        let grid = Grid::from_rows(vec![vec![1], vec![2], vec![3]]).unwrap();
        let executor = Arc::new(CountingExecutor::default());
        let mapper = BandMapper::new(executor.clone()).with_parallelism(Parallelism::Fixed(4));

        let out = mapper.map(grid, |x| x * 2).unwrap();
        assert_eq!(out.into_vec(), vec![2, 4, 6]);
        // the leading empty band never reaches the executor
        assert_eq!(executor.submitted.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_empty_grid_spawns_nothing() {
        let executor = Arc::new(CountingExecutor::default());
        let mapper = BandMapper::new(executor.clone()).with_parallelism(Parallelism::Fixed(4));

        let out = mapper.map(Grid::<u8>::empty(5), |x| *x).unwrap();
        assert_eq!(out.width(), 5);
        assert_eq!(out.height(), 0);
        assert_eq!(executor.submitted.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_transform_error_reports_coordinates() {
        let grid = Grid::from_rows(vec![vec![0, 1], vec![2, 3]]).unwrap();
        let err = mapper(2)
            .try_map(grid, |v: &i32| {
                if *v == 3 {
                    Err(format!("cannot map {v}"))
                } else {
                    Ok(*v)
                }
            })
            .unwrap_err();

        match err {
            MapError::TransformFailed { band, x, y, source } => {
                assert_eq!((band, x, y), (1, 1, 1));
                assert_eq!(source.to_string(), "cannot map 3");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_transform_panic_is_reported() {
        let grid = Grid::from_rows(vec![vec![0, 1], vec![2, 3]]).unwrap();
        let err = mapper(2)
            .map(grid, |v: &i32| {
                if *v == 3 {
                    panic!("bad cell");
                }
                *v
            })
            .unwrap_err();
        assert_eq!(err.coordinates(), Some((1, 1)));
        assert!(err.to_string().contains("bad cell"));
    }

    #[test]
    fn test_pre_interrupted_call_fails() {
        let interrupter = Interrupter::new();
        interrupter.interrupt();
        let err = mapper(2)
            .try_map_with(
                sample(),
                |x| Ok::<_, std::convert::Infallible>(*x),
                &interrupter,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, MapError::Interrupted));
    }

    #[test]
    fn test_interrupt_during_wait() {
        let interrupter = Interrupter::new();
        let remote = interrupter.clone();
        let waker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.interrupt();
        });

        // keep the pool alive past the assertion; dropping it joins the sleepers
        let mapper = mapper(2);
        let grid = Grid::filled(1, 4, 0u8);
        let started = Instant::now();
        let err = mapper
            .try_map_with(
                grid,
                |x| {
                    thread::sleep(Duration::from_millis(400));
                    Ok::<_, std::convert::Infallible>(*x)
                },
                &interrupter,
                None,
            )
            .unwrap_err();
        waker.join().unwrap();

        assert!(matches!(err, MapError::Interrupted));
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[test]
    fn test_timeout_is_reported() {
        let grid = Grid::filled(1, 2, 0u8);
        let err = mapper(2)
            .with_timeout(Duration::from_millis(20))
            .map(grid, |x| {
                thread::sleep(Duration::from_millis(300));
                *x
            })
            .unwrap_err();
        assert!(matches!(err, MapError::TimedOut { .. }));
    }

    #[test]
    fn test_lost_band_is_reported() {
        let mapper = BandMapper::new(Arc::new(BlackHole)).with_parallelism(Parallelism::Fixed(2));
        let err = mapper.map(sample(), |x| *x).unwrap_err();
        assert!(matches!(err, MapError::WorkerLost { band: 0 }));
    }

    #[test]
    fn test_closed_pool_is_reported() {
        let pool = Arc::new(WorkerPool::new());
        pool.shutdown();
        let mapper = BandMapper::new(pool).with_parallelism(Parallelism::Fixed(2));
        assert!(matches!(
            mapper.map(sample(), |x| *x),
            Err(MapError::PoolClosed)
        ));
    }

    #[test]
    fn test_pool_is_reused_across_calls() {
        let pool = Arc::new(WorkerPool::new());
        let mapper = BandMapper::new(pool.clone()).with_parallelism(Parallelism::Fixed(3));
        for _ in 0..5 {
            mapper.map(sample(), |x| x + 1).unwrap();
            // bands report before their job returns to the pool
            while pool.busy() > 0 {
                thread::yield_now();
            }
        }
        assert_eq!(pool.capacity(), 3);
    }

    #[test]
    fn test_nested_map_on_same_pool() {
        let pool = Arc::new(WorkerPool::new());
        let outer = BandMapper::new(pool.clone()).with_parallelism(Parallelism::Fixed(2));
        let inner = BandMapper::new(pool.clone())
            .with_parallelism(Parallelism::Fixed(2))
            .with_timeout(Duration::from_secs(5));

        let out = outer
            .try_map(Grid::filled(1, 2, 3i32), move |x| {
                let row = Grid::filled(2, 2, *x);
                inner
                    .map(row, |v| v * 2)
                    .map(|g| g.as_slice().iter().sum::<i32>())
            })
            .unwrap();

        assert_eq!(out.into_rows(), vec![vec![24], vec![24]]);
        assert!(pool.capacity() >= 4);
    }

    #[test]
    fn test_concurrent_calls_share_a_pool() {
        let mapper = BandMapper::new(Arc::new(WorkerPool::new()))
            .with_parallelism(Parallelism::Fixed(2))
            .with_timeout(Duration::from_secs(5));
        // all four bands of the two calls must run at once to pass the barrier
        let gate = Arc::new(std::sync::Barrier::new(4));

        thread::scope(|s| {
            let calls: Vec<_> = (0..2)
                .map(|_| {
                    let mapper = mapper.clone();
                    let gate = gate.clone();
                    s.spawn(move || {
                        mapper.map(Grid::filled(1, 2, 1u8), move |x| {
                            gate.wait();
                            *x
                        })
                    })
                })
                .collect();
            for call in calls {
                assert_eq!(call.join().unwrap().unwrap().len(), 2);
            }
        });
    }

    #[test]
    fn test_unbounded_timeout_does_not_overflow() {
        let out = mapper(2)
            .with_timeout(Duration::MAX)
            .map(Grid::filled(1, 2, 1u8), |x| x * 2)
            .unwrap();
        assert_eq!(out.into_rows(), vec![vec![2], vec![2]]);
    }

    #[test]
    fn test_rayon_backend_matches_native() {
        let rayon = BandMapper::new(Arc::new(RayonExecutor::new(2).unwrap()))
            .with_parallelism(Parallelism::Fixed(4));
        let out = rayon.map(sample(), |x| x * 10).unwrap();
        assert_eq!(out, mapper(4).map(sample(), |x| x * 10).unwrap());
    }

    #[test]
    fn test_sequential_strategy_below_threshold() {
        let executor = Arc::new(CountingExecutor::default());
        let mapper = BandMapper::new(executor.clone())
            .with_parallelism(Parallelism::Fixed(4))
            .with_min_cells_for_parallel(100);

        assert_eq!(mapper.strategy_for(8), ExecutionStrategy::Sequential);
        let out = mapper.map(sample(), |x| x * 10).unwrap();
        assert_eq!(out, self::mapper(2).map(sample(), |x| x * 10).unwrap());
        assert_eq!(executor.submitted.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_progress_reports_each_band() {
        let seen = std::sync::Mutex::new(Vec::new());
        let report = |done: usize, total: usize, _band: usize| {
            seen.lock().unwrap().push((done, total));
        };
        mapper(4)
            .try_map_with(
                sample(),
                |x| Ok::<_, std::convert::Infallible>(*x),
                &Interrupter::new(),
                Some(&report as ProgressFn),
            )
            .unwrap();
        assert_eq!(seen.into_inner().unwrap(), vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[test]
    fn test_stats_accumulate() {
        let mapper = mapper(2);
        mapper.map(sample(), |x| *x).unwrap();
        mapper.map(Grid::<i32>::empty(3), |x| *x).unwrap();
        let _ = mapper.try_map(sample(), |_: &i32| Err::<i32, _>("nope"));

        let stats = mapper.stats();
        assert_eq!(stats.calls, 3);
        assert_eq!(stats.cells, 8);
        assert_eq!(stats.bands, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.tallest_band, 2);
    }

    #[test]
    fn test_parallelism_resolution() {
        assert_eq!(Parallelism::Fixed(0).resolve(), 1);
        assert_eq!(Parallelism::Fixed(6).resolve(), 6);
        assert_eq!(Parallelism::from_settings(3, 50), Parallelism::Fixed(3));
        assert!(Parallelism::from_settings(0, 50).resolve() >= 1);
        assert!(ExecutionStrategy::calculate_optimal_workers(2, 100) <= 2);
    }

    #[test]
    fn test_map_parallel_convenience() {
        let out = map_parallel(sample(), |x| x.to_string()).unwrap();
        assert_eq!(out.get(1, 3).map(String::as_str), Some("8"));
    }
}
