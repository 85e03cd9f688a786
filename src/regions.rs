//! The master region universe.
//!
//! Regions keep their file order (the matrix row order). A per-chromosome
//! index sorted by start position, together with the longest region length,
//! lets the interval join locate candidates with a binary search.

use ahash::{AHashMap, AHashSet};
use anyhow::{bail, Result};
use log::warn;

use crate::types::Region;

/// Regions of one chromosome, sorted by `(start, end)`.
#[derive(Debug, Clone)]
pub struct ChromIndex {
    /// Indices into the master region list.
    pub order: Vec<usize>,
    /// Longest region on this chromosome.
    pub max_len: u64,
}

/// Read-only set of master regions shared by every sample.
#[derive(Debug, Clone)]
pub struct RegionSet {
    regions: Vec<Region>,
    ids: Vec<String>,
    by_chrom: AHashMap<String, ChromIndex>,
    duplicates_dropped: usize,
}

impl RegionSet {
    /// Build the universe from regions in file order.
    ///
    /// Regions sharing an identifier with an earlier one are dropped (first
    /// wins). An empty universe is an error: no matrix can be built from it.
    pub fn new(regions: Vec<Region>) -> Result<Self> {
        let mut seen: AHashSet<String> = AHashSet::with_capacity(regions.len());
        let mut kept = Vec::with_capacity(regions.len());
        let mut ids = Vec::with_capacity(regions.len());
        let mut duplicates_dropped = 0;

        for region in regions {
            let id = region.id();
            if !seen.insert(id.clone()) {
                warn!("Duplicate region '{}' ignored ({})", id, region.interval);
                duplicates_dropped += 1;
                continue;
            }
            ids.push(id);
            kept.push(region);
        }

        if kept.is_empty() {
            bail!("Region set is empty");
        }

        let mut by_chrom: AHashMap<String, ChromIndex> = AHashMap::new();
        for (idx, region) in kept.iter().enumerate() {
            let entry = by_chrom
                .entry(region.interval.chrom.clone())
                .or_insert_with(|| ChromIndex {
                    order: Vec::new(),
                    max_len: 0,
                });
            entry.order.push(idx);
            entry.max_len = entry.max_len.max(region.interval.length());
        }

        for index in by_chrom.values_mut() {
            index.order.sort_by(|&a, &b| {
                let (ra, rb) = (&kept[a].interval, &kept[b].interval);
                ra.start.cmp(&rb.start).then(ra.end.cmp(&rb.end)).then(a.cmp(&b))
            });
        }

        Ok(RegionSet {
            regions: kept,
            ids,
            by_chrom,
            duplicates_dropped,
        })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Regions in master order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn get(&self, idx: usize) -> Option<&Region> {
        self.regions.get(idx)
    }

    /// Region identifiers in master order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn chrom_index(&self, chrom: &str) -> Option<&ChromIndex> {
        self.by_chrom.get(chrom)
    }

    /// Number of input regions dropped as duplicates.
    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }
}
