use anyhow::{Result, bail};
use std::str::FromStr;

use super::core::BandwiseConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl FromStr for ConfigFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => bail!("Unsupported format: {}. Use json, toml, or yaml", s),
        }
    }
}

impl BandwiseConfig {
    /// Export configuration in specified format
    pub fn export_config(&self, format: ConfigFormat) -> Result<String> {
        let config: serde_json::Value = self.get_full_config()?;

        let output = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
            ConfigFormat::Toml => toml::to_string_pretty(&config)?,
            ConfigFormat::Yaml => serde_yml::to_string(&config)?,
        };

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_export_formats() {
        let config = BandwiseConfig::load(None, None::<&()>).unwrap();

        let json_output = config.export_config(ConfigFormat::Json).unwrap();
        assert!(json_output.contains("\"parallel\""));

        let toml_output = config.export_config(ConfigFormat::Toml).unwrap();
        assert!(toml_output.contains("[parallel]"));

        let yaml_output = config.export_config(ConfigFormat::Yaml).unwrap();
        assert!(yaml_output.contains("parallel:"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ConfigFormat>().unwrap(), ConfigFormat::Json);
        assert_eq!("yml".parse::<ConfigFormat>().unwrap(), ConfigFormat::Yaml);
        assert!("xml".parse::<ConfigFormat>().is_err());
    }
}
