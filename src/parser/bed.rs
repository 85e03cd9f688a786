//! BED region parser with gzip support.
//!
//! Parses the master region file (`chrom start end [name ...]`) that defines
//! the row universe of the matrix.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::io::BufRead;
use std::path::Path;

use crate::error::RecordError;
use crate::parser::util::{is_directive, open_text, split_fields};
use crate::regions::RegionSet;
use crate::types::{GenomicInterval, Region};

/// Result of parsing a BED file.
pub struct BedData {
    /// Regions in file order.
    pub regions: Vec<Region>,
    /// Lines that could not be parsed as a region.
    pub skipped: usize,
}

/// Parse a BED file and return its regions in file order.
///
/// Supports both plain text and gzip-compressed BED files.
pub fn parse_bed(path: &Path) -> Result<BedData> {
    let reader = open_text(path, "BED")?;
    parse_bed_reader(reader)
}

/// Parse a BED file and build the shared region universe from it.
pub fn load_region_set(path: &Path) -> Result<RegionSet> {
    let data = parse_bed(path)?;
    if data.skipped > 0 {
        warn!(
            "Skipped {} malformed line(s) in region file {}",
            data.skipped,
            path.display()
        );
    }
    let set = RegionSet::new(data.regions)
        .with_context(|| format!("No usable regions in {}", path.display()))?;
    info!("Loaded {} regions from {}", set.len(), path.display());
    Ok(set)
}

/// Parse BED data from a reader.
pub fn parse_bed_reader<R: BufRead>(reader: R) -> Result<BedData> {
    let mut regions = Vec::new();
    let mut skipped = 0;
    let mut first_record = true;

    for (line_no, line_result) in reader.lines().enumerate() {
        let line = line_result.context("Failed to read BED line")?;

        if is_directive(&line) {
            continue;
        }

        let is_first = std::mem::replace(&mut first_record, false);
        match parse_line(&line) {
            Ok(region) => regions.push(region),
            Err(err) => {
                // A non-numeric start on the first record is a column header
                if is_first && matches!(err, RecordError::BadCoordinate(_)) {
                    continue;
                }
                debug!("BED line {}: {}", line_no + 1, err);
                skipped += 1;
            }
        }
    }

    Ok(BedData { regions, skipped })
}

/// Parse a single BED line into a Region.
pub fn parse_line(line: &str) -> Result<Region, RecordError> {
    let fields = split_fields(line);

    // Need at least 3 columns: chrom, start, end
    if fields.len() < 3 {
        return Err(RecordError::TooFewFields {
            expected: 3,
            found: fields.len(),
        });
    }

    let start: u64 = fields[1]
        .parse()
        .map_err(|_| RecordError::BadCoordinate(fields[1].to_string()))?;
    let end: u64 = fields[2]
        .parse()
        .map_err(|_| RecordError::BadCoordinate(fields[2].to_string()))?;

    let interval = GenomicInterval::new(fields[0].to_string(), start, end)?;
    let name = fields.get(3).map(|s| s.to_string());

    Ok(Region::new(interval, name))
}
