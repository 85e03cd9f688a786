//! Core data structures for methmatrix.
//!
//! This module contains the value types that flow between the pipeline
//! stages: parsed intervals and sites, master regions, join records and
//! per-sample aggregated columns.

use std::fmt;

use crate::error::RecordError;

/// A half-open genomic interval `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenomicInterval {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl GenomicInterval {
    /// Create a new interval, rejecting empty or inverted coordinates.
    pub fn new(chrom: String, start: u64, end: u64) -> Result<Self, RecordError> {
        if end <= start {
            return Err(RecordError::EmptyInterval { start, end });
        }
        Ok(GenomicInterval { chrom, start, end })
    }

    /// Get the interval length (end - start).
    pub fn length(&self) -> u64 {
        self.end - self.start
    }

    /// Whether two intervals share at least one base.
    pub fn overlaps(&self, other: &GenomicInterval) -> bool {
        self.chrom == other.chrom && self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// Methylated and unmethylated read counts backing a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coverage {
    pub methylated: u32,
    pub unmethylated: u32,
}

impl Coverage {
    pub fn new(methylated: u32, unmethylated: u32) -> Self {
        Coverage {
            methylated,
            unmethylated,
        }
    }

    /// Total read depth at the site.
    pub fn total(&self) -> u64 {
        self.methylated as u64 + self.unmethylated as u64
    }
}

/// One record of a sample's bedGraph track.
#[derive(Debug, Clone, PartialEq)]
pub struct MethylationSite {
    pub interval: GenomicInterval,
    pub value: f64,
    /// Read counts, present only when the track carries count columns.
    pub coverage: Option<Coverage>,
}

impl MethylationSite {
    pub fn new(interval: GenomicInterval, value: f64, coverage: Option<Coverage>) -> Self {
        MethylationSite {
            interval,
            value,
            coverage,
        }
    }
}

/// A region of the master BED file.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub interval: GenomicInterval,
    pub name: Option<String>,
}

impl Region {
    /// Create a new region.
    pub fn new(interval: GenomicInterval, name: Option<String>) -> Self {
        Region { interval, name }
    }

    /// Get the region identifier: its name, or `chrom-start-end` when unnamed.
    pub fn id(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!(
                "{}-{}-{}",
                self.interval.chrom, self.interval.start, self.interval.end
            ),
        }
    }
}

/// A (region, site) pair produced by the interval join for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinedRecord<'a> {
    /// Index of the region in master order.
    pub region: usize,
    pub sample_id: &'a str,
    pub site: &'a MethylationSite,
}

/// One region's collapsed value for a sample; `None` means no usable data.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedValue<'a> {
    pub region: usize,
    pub sample_id: &'a str,
    pub value: Option<f64>,
}

/// All aggregated values of one sample, indexed by master region order.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleColumn {
    pub sample_id: String,
    pub values: Vec<Option<f64>>,
}

impl SampleColumn {
    pub fn new(sample_id: String, values: Vec<Option<f64>>) -> Self {
        SampleColumn { sample_id, values }
    }

    /// Iterate the column as per-region aggregated values.
    pub fn iter(&self) -> impl Iterator<Item = AggregatedValue<'_>> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(region, value)| AggregatedValue {
                region,
                sample_id: &self.sample_id,
                value: *value,
            })
    }

    /// Number of regions with a value.
    pub fn observed(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}
