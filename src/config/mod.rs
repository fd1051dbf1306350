//! Configuration management for bandwise
//!
//! Settings are layered with figment from an embedded `default-config.toml`,
//! user and repository files, an explicit `--config` file, `BANDWISE_`
//! environment variables and finally CLI flags.

pub mod core;
pub mod formats;

// Re-export main types for easier access
pub use self::core::{Backend, BandwiseConfig, OutputSettings, ParallelSettings};
pub use formats::ConfigFormat;
