//! Parallel execution for grid mapping
//!
//! # Responsibilities
//!
//! - **Resource discovery**: detects available cores with `num_cpus::get()` and
//!   applies the configured thread percentage ([`Parallelism`]).
//! - **Execution strategy**: sequential on the calling thread for small grids,
//!   banded fan-out otherwise ([`ExecutionStrategy`]).
//! - **Worker management**: long-lived pools behind the [`Executor`] trait,
//!   either the native [`WorkerPool`] or a rayon pool ([`RayonExecutor`]).
//! - **Join**: the caller waits on a crossbeam `select!` over band results, an
//!   [`Interrupter`] and a deadline.
//!
//! ```text
//! ┌──────────────┐   bands    ┌──────────────┐   jobs    ┌──────────────┐
//! │  BandMapper  │──────────▶│   Executor   │─────────▶│   Workers    │
//! │              │◀──────────────────────────────────────│              │
//! │ partition    │      (band index, rows) over channel  │ run_band     │
//! └──────────────┘                                       └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use bandwise::parallel::{BandMapper, Parallelism, WorkerPool};
//! use bandwise::Grid;
//! use std::sync::Arc;
//!
//! let pool = Arc::new(WorkerPool::new());
//! let mapper = BandMapper::new(pool).with_parallelism(Parallelism::Fixed(3));
//!
//! let grid = Grid::filled(4, 9, 1u32);
//! let doubled = mapper.map(grid, |v| v * 2)?;
//! assert!(doubled.as_slice().iter().all(|v| *v == 2));
//! # Ok::<(), bandwise::MapError>(())
//! ```

pub mod core;
pub mod interrupt;
pub mod pool;
pub mod progress;

pub use self::core::{
    BandMapper, DEFAULT_TIMEOUT, ExecutionStrategy, MapStats, Parallelism, ProgressFn,
    StatsSnapshot, map_parallel,
};
pub use interrupt::Interrupter;
pub use pool::{Executor, Job, RayonExecutor, WorkerPool, shared_pool};
pub use progress::BandProgress;
