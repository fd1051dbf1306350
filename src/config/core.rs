use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::parallel::{BandMapper, Executor, Parallelism, RayonExecutor, WorkerPool};

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Which thread pool runs the bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Growable crossbeam-fed worker pool
    Native,
    /// Fixed-size rayon thread pool
    Rayon,
}

/// `[parallel]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelSettings {
    /// Bands per call (0 = auto-detect)
    pub workers: usize,
    /// Percentage of detected cores used when auto-detecting
    pub thread_percentage: u8,
    /// Wait ceiling for one call
    pub timeout_secs: u64,
    pub backend: Backend,
    /// Grids below this many cells run on the calling thread
    #[serde(default)]
    pub min_cells_for_parallel: usize,
}

impl ParallelSettings {
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.thread_percentage) {
            bail!(
                "parallel.thread_percentage must be between 1 and 100, got {}",
                self.thread_percentage
            );
        }
        if self.timeout_secs == 0 {
            bail!("parallel.timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn parallelism(&self) -> Parallelism {
        Parallelism::from_settings(self.workers, self.thread_percentage)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Mapper on a fresh pool of the configured backend
    pub fn build_mapper(&self) -> Result<BandMapper> {
        self.validate()?;
        let parallelism = self.parallelism();

        let executor: Arc<dyn Executor> = match self.backend {
            Backend::Native => Arc::new(WorkerPool::new()),
            Backend::Rayon => Arc::new(
                RayonExecutor::new(parallelism.resolve()).context("Failed to build rayon pool")?,
            ),
        };
        tracing::debug!(
            "building {:?} mapper with {:?}, timeout {:?}",
            self.backend,
            parallelism,
            self.timeout()
        );

        Ok(BandMapper::new(executor)
            .with_parallelism(parallelism)
            .with_min_cells_for_parallel(self.min_cells_for_parallel)
            .with_timeout(self.timeout()))
    }
}

/// `[output]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub pretty: bool,
}

pub struct BandwiseConfig {
    figment: Figment,
}

impl BandwiseConfig {
    /// Load the layered configuration
    ///
    /// Priority from lowest to highest: embedded defaults, user config, repo
    /// config, `custom_config`, `BANDWISE_` environment variables, CLI overrides.
    pub fn load<T: Serialize>(custom_config: Option<&str>, cli_overrides: Option<T>) -> Result<Self> {
        tracing::trace!("CONFIG LOAD: Starting");
        let user_base = Self::user_config_base_path();

        let mut figment = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG))
            .merge(Toml::file(format!("{user_base}.toml")))
            .merge(Json::file(format!("{user_base}.json")))
            .merge(Yaml::file(format!("{user_base}.yaml")))
            .merge(Toml::file("bandwise.toml"))
            .merge(Json::file("bandwise.json"))
            .merge(Yaml::file("bandwise.yaml"))
            .merge(Yaml::file("bandwise.yml"));

        if let Some(path) = custom_config {
            tracing::trace!("CONFIG LOAD: Custom config {}", path);
            figment = match Path::new(path).extension().and_then(|e| e.to_str()) {
                Some("json") => figment.merge(Json::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }

        // Environment variables: BANDWISE_PARALLEL__WORKERS=4
        figment = figment.merge(Env::prefixed("BANDWISE_").split("__"));

        if let Some(cli) = cli_overrides {
            tracing::trace!("CONFIG LOAD: Applying CLI overrides");
            figment = figment.merge(Serialized::defaults(cli));
        }

        Ok(BandwiseConfig { figment })
    }

    /// Get a nested object/section as JSON
    pub fn get_section(&self, path: &str) -> Result<serde_json::Value> {
        let value = self
            .figment
            .extract_inner(path)
            .with_context(|| format!("Missing configuration key '{path}'"))?;
        Ok(value)
    }

    /// Get the full merged configuration as a structured value
    pub fn get_full_config(&self) -> Result<serde_json::Value> {
        let value = self.figment.extract()?;
        Ok(value)
    }

    /// Extract a typed value at `path`
    pub fn get<V: DeserializeOwned>(&self, path: &str) -> Result<V> {
        self.figment
            .extract_inner(path)
            .with_context(|| format!("Invalid configuration at '{path}'"))
    }

    pub fn parallel(&self) -> Result<ParallelSettings> {
        let settings: ParallelSettings = self.get("parallel")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn output(&self) -> Result<OutputSettings> {
        self.get("output")
    }

    fn user_config_base_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{home}/.config/bandwise/config"),
            Err(_) => "~/.config/bandwise/config".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_loads_defaults() {
        let config = BandwiseConfig::load(None, None::<&()>).expect("Should load default config");

        let full_config = config.get_full_config().unwrap();
        assert!(full_config.get("parallel").is_some());
        assert!(full_config.get("output").is_some());

        let parallel = config.get_section("parallel").unwrap();
        assert!(parallel.get("backend").is_some());
    }

    #[test]
    fn test_typed_sections() {
        let config = BandwiseConfig::load(None, None::<&()>).unwrap();
        let parallel = config.parallel().unwrap();
        assert_eq!(parallel.timeout(), Duration::from_secs(3600));
        assert!((1..=100).contains(&parallel.thread_percentage));
        assert!(config.output().is_ok());
    }

    #[test]
    fn test_custom_config_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[parallel]\nworkers = 3\nbackend = \"rayon\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = BandwiseConfig::load(Some(&path), None::<&()>).unwrap();
        let parallel = config.parallel().unwrap();
        assert_eq!(parallel.workers, 3);
        assert_eq!(parallel.backend, Backend::Rayon);
        assert_eq!(parallel.parallelism(), Parallelism::Fixed(3));
    }

    #[test]
    fn test_json_custom_config() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"parallel": {{"timeout_secs": 5}}}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = BandwiseConfig::load(Some(&path), None::<&()>).unwrap();
        assert_eq!(config.parallel().unwrap().timeout_secs, 5);
    }

    #[test]
    fn test_cli_overrides_win() {
        let overrides = serde_json::json!({ "parallel": { "workers": 7 } });
        let config = BandwiseConfig::load(None, Some(overrides)).unwrap();
        assert_eq!(config.parallel().unwrap().workers, 7);
    }

    #[test]
    fn test_custom_config_loading() {
        // Missing files are skipped, not fatal
        let config = BandwiseConfig::load(Some("non_existent.toml"), None::<&()>);
        assert!(config.is_ok(), "Should handle missing custom config gracefully");
    }

    #[test]
    fn test_invalid_percentage_rejected() {
        let overrides = serde_json::json!({ "parallel": { "thread_percentage": 0 } });
        let config = BandwiseConfig::load(None, Some(overrides)).unwrap();
        assert!(config.parallel().is_err());
    }

    #[test]
    fn test_build_mapper_for_each_backend() {
        for backend in [Backend::Native, Backend::Rayon] {
            let settings = ParallelSettings {
                workers: 2,
                thread_percentage: 100,
                timeout_secs: 10,
                backend,
                min_cells_for_parallel: 0,
            };
            let mapper = settings.build_mapper().unwrap();
            assert_eq!(mapper.parallelism(), Parallelism::Fixed(2));
            assert_eq!(mapper.timeout(), Duration::from_secs(10));
        }
    }
}
