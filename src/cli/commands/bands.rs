use anyhow::Result;
use clap::Args;

use crate::band::partition;
use crate::cli::Output;
use crate::config::BandwiseConfig;
use crate::parallel::Parallelism;

#[derive(Args)]
pub struct BandsArgs {
    /// Grid height to partition
    #[arg(long)]
    pub height: usize,

    /// Number of bands (defaults to the configured degree of parallelism)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Print the partition as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: BandsArgs, output: &Output, custom_config: Option<&str>) -> Result<()> {
    let workers = match args.workers {
        Some(n) => Parallelism::Fixed(n).resolve(),
        None => {
            let config = BandwiseConfig::load(custom_config, None::<&()>)?;
            config.parallel()?.parallelism().resolve()
        }
    };

    let bands = partition(args.height, workers);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&bands)?);
        return Ok(());
    }

    output.verbose(&format!("height {} over {} workers", args.height, workers));
    for band in &bands {
        if band.is_empty() {
            println!("{band} (empty, no task)");
        } else {
            println!("{band} {} rows", band.len());
        }
    }
    Ok(())
}
