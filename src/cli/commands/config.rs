use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};

use crate::config::{BandwiseConfig, ConfigFormat};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Display current merged configuration
    Show {
        /// Output format: json, toml, yaml
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
    /// Get configuration value
    Get { key: String },
    /// Validate the merged configuration
    Validate,
}

pub async fn execute(args: ConfigArgs, custom_config: Option<&str>) -> Result<()> {
    let config = BandwiseConfig::load(custom_config, None::<&()>)?;

    match args.command {
        ConfigCommand::Show { format } => {
            let format: ConfigFormat = format.parse()?;
            println!("{}", config.export_config(format)?);
        }
        ConfigCommand::Get { key } => {
            let value = config
                .get_section(&key)
                .map_err(|_| anyhow!("Configuration key '{}' not found", key))?;
            match value {
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    println!("{}", serde_json::to_string_pretty(&value)?)
                }
                serde_json::Value::String(s) => println!("{s}"),
                other => println!("{other}"),
            }
        }
        ConfigCommand::Validate => {
            let parallel = config.parallel()?;
            config.output()?;
            println!(
                "Configuration is valid ({:?} backend, {:?})",
                parallel.backend,
                parallel.parallelism()
            );
        }
    }

    Ok(())
}
