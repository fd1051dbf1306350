//! # Bandwise - row-band parallel grid mapping
//!
//! Bandwise applies a pure per-cell transform to a 2D grid by cutting the grid
//! into contiguous row bands, one per worker, and joining once every band has
//! reported:
//!
//! - **Band partitioning**: `[0, H)` split as `i*H/n .. (i+1)*H/n`, see [`partition`]
//! - **Reusable pools**: mappers borrow a long-lived [`WorkerPool`] (or a rayon
//!   pool) instead of spawning threads per call
//! - **Cancellation and deadlines**: an [`Interrupter`] and a wait timeout bound
//!   every call
//! - **Lock-free statistics**: CAS update loops and sharded adders in [`counter`]
//! - **Lazy pipelines**: [`LatentGrid`] fuses queued transforms into one pass
//!
//! ## Quick Start
//!
//! ```bash
//! # Multiply every cell by ten on four bands
//! echo '[[1,2],[3,4],[5,6]]' | bandwise map --input - --op mul=10 --workers 4
//!
//! # Show how a height of 3 splits across 4 workers
//! bandwise bands --height 3 --workers 4
//! ```
//!
//! ## Library Usage
//!
//! ```rust
//! use bandwise::{Grid, map_parallel};
//!
//! let grid = Grid::from_rows(vec![vec![1, 2], vec![3, 4], vec![5, 6]])?;
//! let out = map_parallel(grid, |v| v * 10)?;
//! assert_eq!(out.into_rows(), vec![vec![10, 20], vec![30, 40], vec![50, 60]]);
//! # Ok::<(), bandwise::MapError>(())
//! ```
//!
//! ## Configuration
//!
//! Settings are layered with figment: embedded defaults, then
//! `~/.config/bandwise/config.{toml,json,yaml}`, then `bandwise.{toml,json,yaml}`
//! in the working directory, then `--config`, then `BANDWISE_*` environment
//! variables, then command-line flags.
//!
//! ```toml
//! [parallel]
//! workers = 0              # 0 = detect from available cores
//! thread_percentage = 75
//! timeout_secs = 3600
//! backend = "native"       # or "rayon"
//! ```

pub mod band;
pub mod cli;
pub mod color;
pub mod config;
pub mod counter;
pub mod error;
pub mod grid;
pub mod ops;
pub mod parallel;
pub mod transform;

pub use band::{Band, partition};
pub use color::Color;
pub use config::BandwiseConfig;
pub use error::MapError;
pub use grid::Grid;
pub use parallel::{BandMapper, Interrupter, Parallelism, WorkerPool, map_parallel};
pub use transform::{LatentGrid, compose};

/// Result type alias for command-level operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
