//! Per-sample processing: parse, screen, join and aggregate one track.
//!
//! Everything here is a pure function of the track contents, the region set
//! and the configuration, so a retried sample yields an identical column.

use anyhow::Result;
use log::{info, warn};
use std::path::Path;

use crate::config::{Config, ValueScale};
use crate::parser::bedgraph::{parse_aggregated, parse_track, TrackData};
use crate::pipeline::aggregate::{aggregate_regions, screen_sites, EffectiveMode};
use crate::pipeline::join::join_sites;
use crate::regions::RegionSet;
use crate::types::SampleColumn;

/// Record counts reported for one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSummary {
    pub sample_id: String,
    /// Record lines read from the track.
    pub records: usize,
    /// Lines skipped as malformed.
    pub malformed: usize,
    /// Sites excluded for an implausible value.
    pub out_of_range: usize,
    /// (region, site) pairs produced by the join.
    pub joined: usize,
    /// Valid sites overlapping no region.
    pub unjoined_sites: usize,
    /// Regions with a value.
    pub regions_observed: usize,
    pub mode: EffectiveMode,
    pub scale: ValueScale,
}

/// Column and summary of one processed sample.
#[derive(Debug, Clone)]
pub struct SampleResult {
    pub column: SampleColumn,
    pub summary: SampleSummary,
}

/// Aggregate an already parsed track.
pub fn process_sites(
    sample_id: &str,
    track: TrackData,
    regions: &RegionSet,
    config: &Config,
) -> SampleResult {
    let TrackData {
        sites,
        records,
        malformed,
        first_error,
    } = track;

    if let Some((line, err)) = &first_error {
        warn!(
            "Sample {}: skipped {} malformed record(s); first at line {}: {}",
            sample_id, malformed, line, err
        );
    }

    let screened = screen_sites(sites, config.scale);
    if let Some(value) = screened.first_excluded {
        warn!(
            "Sample {}: excluded {} value(s) outside the {} range (first: {})",
            sample_id, screened.out_of_range, screened.scale, value
        );
    }

    let mode = EffectiveMode::select(config.mode, &screened.sites);
    if mode == EffectiveMode::RateFromRatios {
        warn!(
            "Sample {}: track has no read counts; using the mean of per-site ratios",
            sample_id
        );
    }

    let joined = join_sites(sample_id, &screened.sites, regions);
    let values = aggregate_regions(&joined.records, regions.len(), mode);
    let column = SampleColumn::new(sample_id.to_string(), values);

    let summary = SampleSummary {
        sample_id: sample_id.to_string(),
        records,
        malformed,
        out_of_range: screened.out_of_range,
        joined: joined.records.len(),
        unjoined_sites: joined.unjoined_sites,
        regions_observed: column.observed(),
        mode,
        scale: screened.scale,
    };

    info!(
        "Sample {}: {} records, {} joined pairs, {}/{} regions observed ({})",
        sample_id,
        summary.records,
        summary.joined,
        summary.regions_observed,
        regions.len(),
        summary.mode
    );

    SampleResult { column, summary }
}

/// Read and aggregate a raw bedGraph track.
pub fn process_track(
    sample_id: &str,
    path: &Path,
    regions: &RegionSet,
    config: &Config,
) -> Result<SampleResult> {
    let track = parse_track(path)?;
    Ok(process_sites(sample_id, track, regions, config))
}

/// Load a track that was aggregated earlier against the same region set.
pub fn load_aggregated(sample_id: &str, path: &Path, regions: &RegionSet) -> Result<SampleResult> {
    let values = parse_aggregated(path, regions)?;
    let column = SampleColumn::new(sample_id.to_string(), values);

    let summary = SampleSummary {
        sample_id: sample_id.to_string(),
        records: regions.len(),
        malformed: 0,
        out_of_range: 0,
        joined: 0,
        unjoined_sites: 0,
        regions_observed: column.observed(),
        mode: EffectiveMode::Preaggregated,
        scale: ValueScale::Fraction,
    };

    Ok(SampleResult { column, summary })
}
