use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::io::Read;
use std::path::PathBuf;

use crate::cli::Output;
use crate::color::Color;
use crate::config::{Backend, BandwiseConfig};
use crate::grid::Grid;
use crate::ops::{color_op, number_op};
use crate::parallel::{BandMapper, BandProgress, Interrupter, ProgressFn};
use crate::transform::{CellOp, LatentGrid};

/// How cells of the input grid are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CellKind {
    /// JSON numbers
    Number,
    /// Hex colour strings such as "#ff8000"
    Color,
}

#[derive(Args)]
pub struct MapArgs {
    /// Grid file (JSON array of rows), or '-' for stdin
    #[arg(short, long, value_name = "FILE")]
    pub input: String,

    /// Write the mapped grid here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Cell type of the grid
    #[arg(long, value_enum, default_value = "number")]
    pub kind: CellKind,

    /// Operation to apply, in order (e.g. mul=10, clamp=0:255, grayscale)
    #[arg(long = "op", value_name = "OP")]
    pub ops: Vec<String>,

    /// Number of bands (0 = auto-detect)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Give up waiting after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Thread pool backend
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Show a band progress bar
    #[arg(long)]
    pub progress: bool,

    /// Print mapper statistics after the run
    #[arg(long)]
    pub stats: bool,

    /// Pretty-print the output JSON
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Debug, Default, Serialize)]
struct ParallelOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend: Option<Backend>,
}

#[derive(Debug, Default, Serialize)]
struct OutputOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pretty: Option<bool>,
}

/// Flags that take precedence over every configuration layer
#[derive(Debug, Default, Serialize)]
struct MapOverrides {
    parallel: ParallelOverrides,
    output: OutputOverrides,
}

impl From<&MapArgs> for MapOverrides {
    fn from(args: &MapArgs) -> Self {
        MapOverrides {
            parallel: ParallelOverrides {
                workers: args.workers,
                timeout_secs: args.timeout,
                backend: args.backend,
            },
            output: OutputOverrides {
                pretty: args.pretty.then_some(true),
            },
        }
    }
}

pub async fn execute(args: MapArgs, output: &Output, custom_config: Option<&str>) -> Result<()> {
    let config = BandwiseConfig::load(custom_config, Some(MapOverrides::from(&args)))?;
    let settings = config.parallel()?;
    let pretty = config.output()?.pretty;
    let mapper = settings.build_mapper()?;

    let text = read_input(&args.input)?;
    output.verbose(&format!(
        "{:?} backend, {:?}, timeout {}s",
        settings.backend,
        settings.parallelism(),
        settings.timeout_secs
    ));

    let progress = (args.progress && !output.is_quiet()).then(|| BandProgress::new("mapping"));

    let (rendered, mapper) = match args.kind {
        CellKind::Number => {
            let ops = parse_ops(&args.ops, number_op)?;
            let grid = exact_numbers(parse_grid(&text)?)?;
            let (grid, mapper) = run_latent(grid, ops, mapper, progress, output, ctrl_c()).await?;
            let rows: Vec<Vec<serde_json::Value>> = grid
                .rows()
                .map(|row| row.iter().copied().map(number_value).collect())
                .collect();
            (render(&rows, pretty)?, mapper)
        }
        CellKind::Color => {
            let ops = parse_ops(&args.ops, color_op)?;
            let grid: Grid<Color> = parse_grid(&text)?;
            let (grid, mapper) = run_latent(grid, ops, mapper, progress, output, ctrl_c()).await?;
            (render(&grid, pretty)?, mapper)
        }
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{rendered}\n"))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            output.success(&format!("Wrote {}", path.display()));
        }
        None => println!("{rendered}"),
    }

    if args.stats {
        let stats = mapper.stats();
        output.section_header("Mapper statistics");
        output.key_value("calls", &stats.calls.to_string(), false);
        output.key_value("cells", &stats.cells.to_string(), true);
        output.key_value("bands", &stats.bands.to_string(), false);
        output.key_value("failures", &stats.failures.to_string(), stats.failures > 0);
        output.key_value("tallest band", &stats.tallest_band.to_string(), false);
    }

    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read grid from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read grid file {input}"))
    }
}

fn parse_grid<T: DeserializeOwned>(text: &str) -> Result<Grid<T>> {
    serde_json::from_str(text).context("Input is not a valid grid (expected a JSON array of equal-length rows)")
}

/// Largest magnitude below which every integer has an exact `f64`
const EXACT_INTEGER: u64 = 1 << 53;

/// Number cells are mapped as `f64`; integers it cannot hold exactly are rejected
fn exact_numbers(grid: Grid<serde_json::Number>) -> Result<Grid<f64>> {
    let width = grid.width();
    let cells = grid
        .cells()
        .map(|(x, y, number)| {
            let magnitude = number
                .as_u64()
                .or_else(|| number.as_i64().map(i64::unsigned_abs));
            if magnitude.is_some_and(|m| m > EXACT_INTEGER) {
                bail!("Cell ({x}, {y}) holds {number}, which is outside the exact integer range of ±2^53");
            }
            number
                .as_f64()
                .with_context(|| format!("Cell ({x}, {y}) holds {number}, which is not a finite number"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Grid::from_vec(width, cells)?)
}

fn parse_ops<T, E>(specs: &[String], parse: fn(&str) -> Result<CellOp<T>, E>) -> Result<Vec<CellOp<T>>>
where
    E: std::error::Error + Send + Sync + 'static,
{
    specs
        .iter()
        .map(|spec| parse(spec).with_context(|| format!("Invalid --op '{spec}'")))
        .collect()
}

/// Whole numbers print without a trailing `.0`
fn number_value(value: f64) -> serde_json::Value {
    if value.fract() == 0.0 && value.abs() <= EXACT_INTEGER as f64 {
        serde_json::Value::from(value as i64)
    } else {
        serde_json::Value::from(value)
    }
}

fn render<S: Serialize + ?Sized>(value: &S, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(text)
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {}
        Err(e) => {
            tracing::warn!("Cannot listen for Ctrl-C, interrupts are disabled: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Run the queued operations off the async runtime; `stop` resolving interrupts the wait
async fn run_latent<T>(
    grid: Grid<T>,
    ops: Vec<CellOp<T>>,
    mapper: BandMapper,
    progress: Option<BandProgress>,
    output: &Output,
    stop: impl Future<Output = ()>,
) -> Result<(Grid<T>, BandMapper)>
where
    T: Clone + Send + Sync + 'static,
{
    output.verbose(&format!(
        "{}x{} grid, {} operation(s)",
        grid.width(),
        grid.height(),
        ops.len()
    ));
    let latent = ops.into_iter().fold(LatentGrid::new(grid), LatentGrid::transform_shared);

    let interrupter = Interrupter::new();
    let band_interrupter = interrupter.clone();
    let mut task = tokio::task::spawn_blocking(move || {
        let result = match &progress {
            Some(bar) => {
                let report = |done: usize, total: usize, band: usize| bar.update(done, total, band);
                let result = latent.to_grid_with(&mapper, &band_interrupter, Some(&report as ProgressFn));
                bar.finish();
                result
            }
            None => latent.to_grid_with(&mapper, &band_interrupter, None),
        };
        (result, mapper)
    });

    let (result, mapper) = tokio::select! {
        joined = &mut task => joined.context("Map task panicked")?,
        () = stop => {
            output.warning("Interrupted, stopping bands");
            interrupter.interrupt();
            task.await.context("Map task panicked")?
        }
    };

    let grid = result.context("Parallel map failed")?;
    Ok((grid, mapper))
}
