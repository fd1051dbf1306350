use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use crate::cli::Output;

pub mod bands;
pub mod config;
pub mod map;
pub mod version;

#[derive(Parser)]
#[command(
    name = "bandwise",
    version = env!("CARGO_PKG_VERSION"),
    about = "Row-band parallel mapping over 2D grids",
    long_about = "Bandwise splits a grid into contiguous row bands, maps every band on a \
                  reusable worker pool and stitches the results back in order."
)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a chain of cell operations to a JSON grid in parallel
    Map(map::MapArgs),
    /// Show how a grid height is split into row bands
    Bands(bands::BandsArgs),
    /// Configuration management
    Config(config::ConfigArgs),
    /// Show version information
    Version(version::VersionArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        setup_logging(self.verbose, self.quiet);
        let output = Output::new(self.verbose > 0, self.quiet);

        match self.command {
            Some(Commands::Map(args)) => map::execute(args, &output, self.config.as_deref()).await,
            Some(Commands::Bands(args)) => {
                bands::execute(args, &output, self.config.as_deref()).await
            }
            Some(Commands::Config(args)) => config::execute(args, self.config.as_deref()).await,
            Some(Commands::Version(args)) => version::execute(args).await,
            None => {
                Cli::command().print_help()?;
                Ok(())
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    // try_init: a second subscriber in the same process is not an error
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_detailed_does_not_clash_with_global_verbose() {
        let cli = Cli::try_parse_from(["bandwise", "-v", "version", "--detailed"]).unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Some(Commands::Version(args)) => assert!(args.detailed),
            _ => panic!("expected the version subcommand"),
        }
    }
}
