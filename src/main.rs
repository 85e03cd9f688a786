//! CLI entry point for methmatrix.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use methmatrix::config::{AggregationMode, Config, MatrixLayout, ValueScale};
use methmatrix::output::{write_aggregated_track, write_matrix_layout, write_summary};
use methmatrix::parser::{load_region_set, parse_manifest};
use methmatrix::pipeline::{process_track, run_manifest, RunReport, TrackSource};
use methmatrix::render::{CommandRenderer, HeatmapRenderer};

/// Region-level DNA methylation matrix builder.
///
/// Aggregates per-sample bedGraph tracks over a BED region set and assembles
/// a region x sample methylation matrix.
#[derive(Parser, Debug)]
#[command(name = "methmatrix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate one sample track over the region set
    Aggregate(AggregateArgs),
    /// Aggregate every manifest sample and assemble the matrix
    Run(RunArgs),
    /// Assemble the matrix from already aggregated per-sample tracks
    Assemble(AssembleArgs),
}

#[derive(Args, Debug)]
struct AggregationArgs {
    /// Aggregation mode: rate (coverage weighted) or mean
    #[arg(short = 'm', long = "mode", default_value = "rate")]
    mode: String,

    /// Value scale of the input tracks: auto, fraction, or percent
    #[arg(long = "scale", default_value = "auto")]
    scale: String,
}

#[derive(Args, Debug)]
struct AggregateArgs {
    /// Region BED file (required)
    #[arg(short = 'r', long = "regions")]
    regions: PathBuf,

    /// Sample bedGraph track (required)
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Sample identifier (defaults to the track file name)
    #[arg(short = 's', long = "sample")]
    sample: Option<String>,

    /// Output aggregated track (required)
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    #[command(flatten)]
    aggregation: AggregationArgs,
}

#[derive(Args, Debug)]
struct FanInArgs {
    /// Region BED file (required)
    #[arg(short = 'r', long = "regions")]
    regions: PathBuf,

    /// Sample manifest CSV with 'sample' and 'bedgraph_file_path' columns (required)
    #[arg(short = 'l', long = "manifest")]
    manifest: PathBuf,

    /// Output matrix file (required)
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Per-sample summary file with the completeness flag
    #[arg(long = "summary")]
    summary: Option<PathBuf>,

    /// Seconds to wait for all samples before writing a partial matrix (0 = no limit)
    #[arg(short = 't', long = "timeout", default_value = "0")]
    timeout: u64,

    /// Number of worker threads (0 = auto-detect)
    #[arg(long = "threads", short = 'j', default_value = "0")]
    threads: usize,

    /// Matrix layout: region (one id column) or coords (chr, start, end).
    /// Defaults to coords when a heatmap is requested, region otherwise
    #[arg(long = "layout")]
    layout: Option<String>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    fan_in: FanInArgs,

    #[command(flatten)]
    aggregation: AggregationArgs,

    /// Directory for per-sample aggregated tracks
    #[arg(short = 'd', long = "aggregated-dir")]
    aggregated_dir: Option<PathBuf>,

    /// External heatmap command, called with --input <matrix> --output-plot <image>.
    /// The matrix is written in the coords layout the plotting script reads
    #[arg(long = "heatmap-cmd", requires = "heatmap_out")]
    heatmap_cmd: Option<String>,

    /// Heatmap image path
    #[arg(long = "heatmap-out", requires = "heatmap_cmd")]
    heatmap_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct AssembleArgs {
    #[command(flatten)]
    fan_in: FanInArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .parse_default_env()
        .init();

    let started = Instant::now();
    match cli.command {
        Command::Aggregate(args) => run_aggregate(&args)?,
        Command::Run(args) => run_pipeline(&args)?,
        Command::Assemble(args) => run_assemble(&args)?,
    }

    info!("Done in {:.2}s", started.elapsed().as_secs_f64());
    Ok(())
}

/// Apply the aggregation flags to a configuration.
fn apply_aggregation(config: &mut Config, args: &AggregationArgs) -> Result<()> {
    config.mode = args
        .mode
        .parse::<AggregationMode>()
        .context("Mode can only be one of the following: rate or mean")?;
    config.scale = args
        .scale
        .parse::<ValueScale>()
        .context("Scale can only be one of the following: auto, fraction or percent")?;
    Ok(())
}

/// Build the shared configuration for the fan-in subcommands.
fn fan_in_config(args: &FanInArgs, heatmap: bool) -> Result<Config> {
    if !args.regions.exists() {
        bail!("Region file not found: {}", args.regions.display());
    }
    if !args.manifest.exists() {
        bail!("Manifest file not found: {}", args.manifest.display());
    }

    let mut config = Config::new();
    config.threads = if args.threads == 0 {
        num_cpus::get()
    } else {
        args.threads
    };
    config.set_timeout_secs(args.timeout);
    config.layout = match &args.layout {
        Some(layout) => layout
            .parse::<MatrixLayout>()
            .context("Layout can only be one of the following: region or coords")?,
        None if heatmap => MatrixLayout::Coordinates,
        None => MatrixLayout::Region,
    };
    if heatmap && config.layout != MatrixLayout::Coordinates {
        bail!("The heatmap command reads the coords layout; use --layout coords");
    }
    Ok(config)
}

fn run_aggregate(args: &AggregateArgs) -> Result<()> {
    if !args.regions.exists() {
        bail!("Region file not found: {}", args.regions.display());
    }
    if !args.input.exists() {
        bail!("Track file not found: {}", args.input.display());
    }

    let mut config = Config::new();
    apply_aggregation(&mut config, &args.aggregation)?;

    let sample_id = match &args.sample {
        Some(sample) => sample.clone(),
        None => default_sample_id(&args.input),
    };

    let regions = load_region_set(&args.regions)?;
    let result = process_track(&sample_id, &args.input, &regions, &config)?;

    info!("Writing aggregated track to: {}", args.output.display());
    let file = File::create(&args.output).context("Failed to create output file")?;
    let mut writer = BufWriter::new(file);
    write_aggregated_track(&mut writer, &regions, &result.column)?;
    writer.flush()?;
    Ok(())
}

fn run_pipeline(args: &RunArgs) -> Result<()> {
    let mut config = fan_in_config(&args.fan_in, args.heatmap_cmd.is_some())?;
    apply_aggregation(&mut config, &args.aggregation)?;
    config.aggregated_dir = args.aggregated_dir.clone();

    let report = fan_in(&args.fan_in, &config, TrackSource::Raw)?;

    if let (Some(cmd), Some(image)) = (&args.heatmap_cmd, &args.heatmap_out) {
        let renderer = CommandRenderer::from_command_line(cmd)?;
        renderer.render(&args.fan_in.output, image)?;
    }

    finish(&report)
}

fn run_assemble(args: &AssembleArgs) -> Result<()> {
    let config = fan_in_config(&args.fan_in, false)?;
    let report = fan_in(&args.fan_in, &config, TrackSource::Aggregated)?;
    finish(&report)
}

/// Load inputs, run the sample pool and write the matrix and summary.
fn fan_in(args: &FanInArgs, config: &Config, source: TrackSource) -> Result<RunReport> {
    let regions = Arc::new(load_region_set(&args.regions)?);
    let manifest = parse_manifest(&args.manifest)?;

    let report = run_manifest(&manifest, Arc::clone(&regions), config, source)?;

    info!("Writing matrix to: {}", args.output.display());
    let file = File::create(&args.output).context("Failed to create output file")?;
    let mut writer = BufWriter::new(file);
    write_matrix_layout(&mut writer, &report.matrix, &regions, config.layout)?;
    writer.flush()?;

    if let Some(path) = &args.summary {
        let file = File::create(path).context("Failed to create summary file")?;
        let mut writer = BufWriter::new(file);
        write_summary(&mut writer, &report.matrix, &regions, &report.outcomes)?;
        writer.flush()?;
    }

    Ok(report)
}

/// Report the completeness flag; a partial matrix is not a failure.
fn finish(report: &RunReport) -> Result<()> {
    let reported = report
        .outcomes
        .iter()
        .filter(|o| o.status() == "reported")
        .count();
    eprintln!(
        "Matrix: {} regions x {} samples, {} reported, complete: {}",
        report.matrix.num_rows(),
        report.matrix.num_cols(),
        reported,
        report.matrix.is_complete()
    );
    Ok(())
}

/// Sample identifier derived from a track path: the file name without
/// compression and track extensions.
fn default_sample_id(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    [".bedGraph", ".bedgraph", ".bg", ".bed", ".txt"]
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name)
        .to_string()
}
