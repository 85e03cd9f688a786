//! Parallel per-sample pipeline with a bounded fan-in.
//!
//! Sample jobs are queued on a crossbeam channel and drained by a rayon
//! pool. Workers submit columns straight to the shared `MatrixAssembler` and
//! report an outcome per job on a result channel. The calling thread only
//! waits on the assembler, and once the deadline has passed it leaves any
//! still-running workers behind instead of joining them, so a stalled track
//! cannot hold up the run.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{error, info, warn};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::AssemblyError;
use crate::output::write_aggregated_track;
use crate::parser::manifest::Manifest;
use crate::pipeline::assemble::{MatrixAssembler, MethylationMatrix};
use crate::pipeline::sample::{load_aggregated, process_track, SampleResult, SampleSummary};
use crate::regions::RegionSet;

/// What the manifest's track paths point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    /// Raw bedGraph tracks to be joined and aggregated.
    Raw,
    /// Aggregated tracks already in master region order.
    Aggregated,
}

/// Work item for the sample pool.
struct SampleJob {
    sample_id: String,
    path: PathBuf,
}

/// What happened to one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// Column accepted by the assembler.
    Reported(SampleSummary),
    /// The track could not be read or written.
    Failed { sample_id: String, error: String },
    /// The assembler refused the column.
    Rejected {
        sample_id: String,
        error: AssemblyError,
    },
    /// Not finished when the matrix was finalized: skipped after the
    /// fan-in deadline, or still running and abandoned.
    Cancelled { sample_id: String },
}

impl SampleOutcome {
    pub fn sample_id(&self) -> &str {
        match self {
            SampleOutcome::Reported(summary) => &summary.sample_id,
            SampleOutcome::Failed { sample_id, .. }
            | SampleOutcome::Rejected { sample_id, .. }
            | SampleOutcome::Cancelled { sample_id } => sample_id,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            SampleOutcome::Reported(_) => "reported",
            SampleOutcome::Failed { .. } => "failed",
            SampleOutcome::Rejected { .. } => "rejected",
            SampleOutcome::Cancelled { .. } => "cancelled",
        }
    }
}

/// Matrix plus per-sample outcomes, in manifest order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub matrix: MethylationMatrix,
    /// One entry per manifest sample.
    pub outcomes: Vec<SampleOutcome>,
}

/// Process every manifest sample and assemble the matrix.
pub fn run_manifest(
    manifest: &Manifest,
    regions: Arc<RegionSet>,
    config: &Config,
    source: TrackSource,
) -> Result<RunReport> {
    let num_threads = config.threads.max(1);
    info!(
        "Processing {} samples against {} regions with {} threads",
        manifest.len(),
        regions.len(),
        num_threads
    );

    if let Some(dir) = &config.aggregated_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let assembler = Arc::new(MatrixAssembler::new(
        Arc::clone(&regions),
        manifest.sample_ids(),
    ));
    let cancelled = Arc::new(AtomicBool::new(false));
    let config = Arc::new(config.clone());

    // Both channels hold every job, so neither side ever blocks on a send
    let capacity = manifest.len().max(1);
    let (work_tx, work_rx): (Sender<SampleJob>, Receiver<SampleJob>) = bounded(capacity);
    let (result_tx, result_rx): (Sender<SampleOutcome>, Receiver<SampleOutcome>) =
        bounded(capacity);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .context("Failed to create thread pool")?;

    let workers_handle = thread::spawn({
        let assembler = Arc::clone(&assembler);
        let cancelled = Arc::clone(&cancelled);
        let regions = Arc::clone(&regions);
        let config = Arc::clone(&config);
        move || {
            pool.scope(|s| {
                for _ in 0..num_threads {
                    let work_rx = work_rx.clone();
                    let result_tx = result_tx.clone();
                    let assembler = Arc::clone(&assembler);
                    let cancelled = Arc::clone(&cancelled);
                    let regions = Arc::clone(&regions);
                    let config = Arc::clone(&config);

                    s.spawn(move |_| {
                        worker_loop(
                            work_rx, result_tx, &regions, &config, &assembler, &cancelled, source,
                        );
                    });
                }
            });
            // Every job has been handled: nothing more can arrive
            assembler.close();
        }
    });

    for entry in &manifest.entries {
        let job = SampleJob {
            sample_id: entry.sample_id.clone(),
            path: entry.track_path.clone(),
        };
        if work_tx.send(job).is_err() {
            break;
        }
    }
    drop(work_tx);

    let matrix = assembler.wait(config.timeout);

    let mut outcomes: Vec<SampleOutcome> = if matrix.is_complete() || config.timeout.is_none() {
        // Every column is in, or the pool already drained: joining is quick
        workers_handle
            .join()
            .map_err(|_| anyhow::anyhow!("Worker thread panicked"))?;
        result_rx.try_iter().collect()
    } else {
        cancelled.store(true, Ordering::Relaxed);
        // Workers blocked on a track are detached; they exit on their own
        drop(workers_handle);
        settled_outcomes(&result_rx, &matrix, SETTLE_GRACE)
    };

    let order = manifest.sample_ids();
    for sample_id in &order {
        if !outcomes.iter().any(|o| o.sample_id() == sample_id) {
            outcomes.push(SampleOutcome::Cancelled {
                sample_id: sample_id.clone(),
            });
        }
    }
    outcomes.sort_by_key(|o| order.iter().position(|s| s == o.sample_id()));

    if matrix.is_complete() {
        info!(
            "Matrix complete: {} regions x {} samples",
            matrix.num_rows(),
            matrix.num_cols()
        );
    } else {
        warn!(
            "Matrix incomplete: {} of {} samples missing ({})",
            matrix.missing_samples.len(),
            matrix.num_cols(),
            matrix.missing_samples.join(", ")
        );
    }

    Ok(RunReport { matrix, outcomes })
}

/// How long to wait for the outcome of a sample whose column already made
/// it into a partial matrix.
const SETTLE_GRACE: Duration = Duration::from_millis(500);

/// Outcomes available after a deadline, without joining the workers.
///
/// A worker sends its outcome right after submitting, so samples present in
/// the matrix get a short grace period for that message to arrive.
fn settled_outcomes(
    result_rx: &Receiver<SampleOutcome>,
    matrix: &MethylationMatrix,
    grace: Duration,
) -> Vec<SampleOutcome> {
    let mut outcomes: Vec<SampleOutcome> = result_rx.try_iter().collect();
    let deadline = Instant::now() + grace;

    loop {
        let pending = matrix
            .samples
            .iter()
            .filter(|s| !matrix.missing_samples.contains(s))
            .any(|s| !outcomes.iter().any(|o| o.sample_id() == s.as_str()));
        if !pending {
            break;
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        match result_rx.recv_timeout(deadline - now) {
            Ok(outcome) => outcomes.push(outcome),
            Err(_) => break,
        }
    }

    outcomes
}

/// Worker loop: receives sample jobs and reports their outcome.
fn worker_loop(
    work_rx: Receiver<SampleJob>,
    result_tx: Sender<SampleOutcome>,
    regions: &RegionSet,
    config: &Config,
    assembler: &MatrixAssembler,
    cancelled: &AtomicBool,
    source: TrackSource,
) {
    while let Ok(job) = work_rx.recv() {
        let outcome = if cancelled.load(Ordering::Relaxed) {
            SampleOutcome::Cancelled {
                sample_id: job.sample_id,
            }
        } else {
            process_job(job, regions, config, assembler, source)
        };

        if result_tx.send(outcome).is_err() {
            break;
        }
    }
}

/// Process a single sample job end to end.
fn process_job(
    job: SampleJob,
    regions: &RegionSet,
    config: &Config,
    assembler: &MatrixAssembler,
    source: TrackSource,
) -> SampleOutcome {
    let result = match source {
        TrackSource::Raw => process_track(&job.sample_id, &job.path, regions, config),
        TrackSource::Aggregated => load_aggregated(&job.sample_id, &job.path, regions),
    }
    .and_then(|result| {
        if let Some(dir) = &config.aggregated_dir {
            write_sample_track(dir, &result, regions)?;
        }
        Ok(result)
    });

    let SampleResult { column, summary } = match result {
        Ok(result) => result,
        Err(err) => {
            warn!("Skipping sample {}: {:#}", job.sample_id, err);
            return SampleOutcome::Failed {
                sample_id: job.sample_id,
                error: format!("{:#}", err),
            };
        }
    };

    match assembler.submit(column) {
        Ok(()) => SampleOutcome::Reported(summary),
        Err(err) => {
            error!("Rejected result for sample {}: {}", job.sample_id, err);
            SampleOutcome::Rejected {
                sample_id: job.sample_id,
                error: err,
            }
        }
    }
}

/// Path of a sample's aggregated track inside `dir`.
pub fn sample_track_path(dir: &Path, sample_id: &str) -> PathBuf {
    dir.join(format!("{}.dmr.bedGraph", sample_id))
}

fn write_sample_track(dir: &Path, result: &SampleResult, regions: &RegionSet) -> Result<()> {
    let path = sample_track_path(dir, &result.column.sample_id);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_aggregated_track(&mut writer, regions, &result.column)?;
    writer.flush()?;
    Ok(())
}
