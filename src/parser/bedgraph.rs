//! bedGraph track parser with gzip support.
//!
//! Reads raw per-sample methylation tracks (`chrom start end value
//! [methylated unmethylated]`) and the aggregated per-sample tracks written
//! by this crate, which must follow master region order exactly.

use anyhow::{bail, Context, Result};
use std::io::BufRead;
use std::path::Path;

use crate::config::MISSING_SENTINEL;
use crate::error::RecordError;
use crate::parser::util::{is_directive, open_text, split_fields};
use crate::regions::RegionSet;
use crate::types::{Coverage, GenomicInterval, MethylationSite};

/// Sites of one sample track plus its parse bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct TrackData {
    /// Sites in file order.
    pub sites: Vec<MethylationSite>,
    /// Record lines seen (directives and blank lines excluded).
    pub records: usize,
    /// Record lines rejected as malformed.
    pub malformed: usize,
    /// First rejected line, for the warning summary.
    pub first_error: Option<(usize, RecordError)>,
}

/// Parse a bedGraph track from a file.
pub fn parse_track(path: &Path) -> Result<TrackData> {
    let reader = open_text(path, "bedGraph")?;
    parse_track_reader(reader)
}

/// Parse a bedGraph track from a reader.
///
/// Malformed lines are skipped and counted; only I/O failures are errors.
pub fn parse_track_reader<R: BufRead>(reader: R) -> Result<TrackData> {
    let mut data = TrackData::default();

    for (line_no, line_result) in reader.lines().enumerate() {
        let line = line_result.context("Failed to read bedGraph line")?;

        if is_directive(&line) {
            continue;
        }

        data.records += 1;
        match parse_site(&line) {
            Ok(site) => data.sites.push(site),
            Err(err) => {
                data.malformed += 1;
                if data.first_error.is_none() {
                    data.first_error = Some((line_no + 1, err));
                }
            }
        }
    }

    Ok(data)
}

/// Parse a single bedGraph line into a MethylationSite.
///
/// Columns five and six, when both present, are the methylated and
/// unmethylated read counts.
pub fn parse_site(line: &str) -> Result<MethylationSite, RecordError> {
    let fields = split_fields(line);

    if fields.len() < 4 {
        return Err(RecordError::TooFewFields {
            expected: 4,
            found: fields.len(),
        });
    }

    let start = parse_coordinate(fields[1])?;
    let end = parse_coordinate(fields[2])?;
    let interval = GenomicInterval::new(fields[0].to_string(), start, end)?;

    let value: f64 = fields[3]
        .parse()
        .map_err(|_| RecordError::BadValue(fields[3].to_string()))?;

    let coverage = if fields.len() >= 6 {
        Some(Coverage::new(
            parse_count(fields[4])?,
            parse_count(fields[5])?,
        ))
    } else {
        None
    };

    Ok(MethylationSite::new(interval, value, coverage))
}

fn parse_coordinate(field: &str) -> Result<u64, RecordError> {
    field
        .parse()
        .map_err(|_| RecordError::BadCoordinate(field.to_string()))
}

fn parse_count(field: &str) -> Result<u32, RecordError> {
    field
        .parse()
        .map_err(|_| RecordError::BadCount(field.to_string()))
}

/// Read an aggregated per-sample track back into a column of values.
pub fn parse_aggregated(path: &Path, regions: &RegionSet) -> Result<Vec<Option<f64>>> {
    let reader = open_text(path, "aggregated track")?;
    parse_aggregated_reader(reader, regions)
        .with_context(|| format!("Invalid aggregated track {}", path.display()))
}

/// Read an aggregated track from a reader.
///
/// Row `i` must carry the coordinates of master region `i`; any deviation
/// means the track was produced against a different region set and the
/// whole sample is rejected.
pub fn parse_aggregated_reader<R: BufRead>(
    reader: R,
    regions: &RegionSet,
) -> Result<Vec<Option<f64>>> {
    let mut values = Vec::with_capacity(regions.len());

    for (line_no, line_result) in reader.lines().enumerate() {
        let line = line_result.context("Failed to read aggregated track line")?;

        if is_directive(&line) {
            continue;
        }

        let fields = split_fields(&line);
        if fields.len() < 4 {
            bail!(
                "line {}: expected 4 fields, found {}",
                line_no + 1,
                fields.len()
            );
        }

        let row = values.len();
        let Some(region) = regions.get(row) else {
            bail!(
                "line {}: more rows than the {} master regions",
                line_no + 1,
                regions.len()
            );
        };

        let start = parse_coordinate(fields[1])?;
        let end = parse_coordinate(fields[2])?;
        let expected = &region.interval;
        if fields[0] != expected.chrom || start != expected.start || end != expected.end {
            bail!(
                "line {}: row {}:{}-{} does not match master region {}",
                line_no + 1,
                fields[0],
                start,
                end,
                expected
            );
        }

        let value = if fields[3] == MISSING_SENTINEL {
            None
        } else {
            let v: f64 = fields[3]
                .parse()
                .map_err(|_| RecordError::BadValue(fields[3].to_string()))?;
            Some(v)
        };
        values.push(value);
    }

    if values.len() != regions.len() {
        bail!(
            "found {} rows, expected {} master regions",
            values.len(),
            regions.len()
        );
    }

    Ok(values)
}
