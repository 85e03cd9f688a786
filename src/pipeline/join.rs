//! Site-to-region interval join.
//!
//! Every site is matched against the regions of its chromosome with
//! half-open overlap semantics. Neither input needs to be sorted: candidates
//! are located by binary search in the per-chromosome index of the region
//! set, looking back by the longest region length so that regions starting
//! before the site but extending into it are not missed.

use crate::regions::{ChromIndex, RegionSet};
use crate::types::{JoinedRecord, MethylationSite, Region};

/// Result of joining one sample's sites against the region set.
#[derive(Debug, Clone, Default)]
pub struct JoinOutput<'a> {
    /// Joined pairs sorted by region, then site position.
    pub records: Vec<JoinedRecord<'a>>,
    /// Sites that overlap no region.
    pub unjoined_sites: usize,
}

/// Find the position in `index.order` of the first region that can overlap
/// an interval starting at `site_start`.
pub fn find_search_start_index(regions: &[Region], index: &ChromIndex, site_start: u64) -> usize {
    let search_start = site_start.saturating_sub(index.max_len);
    index
        .order
        .partition_point(|&i| regions[i].interval.start < search_start)
}

/// Join a sample's sites against all regions.
///
/// A site overlapping several regions yields one record per region. The
/// output order depends only on the set of sites, not on their input order.
pub fn join_sites<'a>(
    sample_id: &'a str,
    sites: &'a [MethylationSite],
    regions: &RegionSet,
) -> JoinOutput<'a> {
    let all_regions = regions.regions();
    let mut records = Vec::new();
    let mut unjoined_sites = 0;

    for site in sites {
        let Some(index) = regions.chrom_index(&site.interval.chrom) else {
            unjoined_sites += 1;
            continue;
        };

        let before = records.len();
        let first = find_search_start_index(all_regions, index, site.interval.start);

        for &region_idx in &index.order[first..] {
            let region = &all_regions[region_idx].interval;
            // Regions are sorted by start: nothing further can overlap
            if region.start >= site.interval.end {
                break;
            }
            if region.overlaps(&site.interval) {
                records.push(JoinedRecord {
                    region: region_idx,
                    sample_id,
                    site,
                });
            }
        }

        if records.len() == before {
            unjoined_sites += 1;
        }
    }

    records.sort_by(|a, b| {
        a.region
            .cmp(&b.region)
            .then(a.site.interval.start.cmp(&b.site.interval.start))
            .then(a.site.interval.end.cmp(&b.site.interval.end))
            .then(a.site.value.total_cmp(&b.site.value))
    });

    JoinOutput {
        records,
        unjoined_sites,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenomicInterval;

    fn region(chrom: &str, start: u64, end: u64) -> Region {
        Region::new(
            GenomicInterval::new(chrom.to_string(), start, end).unwrap(),
            None,
        )
    }

    fn site(chrom: &str, start: u64, end: u64, value: f64) -> MethylationSite {
        MethylationSite::new(
            GenomicInterval::new(chrom.to_string(), start, end).unwrap(),
            value,
            None,
        )
    }

    fn pairs(output: &JoinOutput<'_>) -> Vec<(usize, u64)> {
        output
            .records
            .iter()
            .map(|r| (r.region, r.site.interval.start))
            .collect()
    }

    #[test]
    fn test_basic_overlap() {
        let regions = RegionSet::new(vec![region("chr1", 100, 200), region("chr1", 300, 400)]).unwrap();
        let sites = vec![site("chr1", 150, 180, 0.5)];

        let output = join_sites("s1", &sites, &regions);
        assert_eq!(pairs(&output), vec![(0, 150)]);
        assert_eq!(output.unjoined_sites, 0);
        assert_eq!(output.records[0].sample_id, "s1");
    }

    #[test]
    fn test_half_open_boundaries() {
        let regions = RegionSet::new(vec![region("chr1", 100, 200)]).unwrap();
        let sites = vec![
            site("chr1", 99, 100, 0.1),  // ends at region start
            site("chr1", 200, 201, 0.2), // starts at region end
            site("chr1", 100, 101, 0.3), // first base
            site("chr1", 199, 200, 0.4), // last base
        ];

        let output = join_sites("s1", &sites, &regions);
        assert_eq!(pairs(&output), vec![(0, 100), (0, 199)]);
        assert_eq!(output.unjoined_sites, 2);
    }

    #[test]
    fn test_site_spanning_multiple_regions() {
        let regions = RegionSet::new(vec![
            region("chr1", 100, 200),
            region("chr1", 150, 250),
            region("chr1", 240, 300),
        ])
        .unwrap();
        let sites = vec![site("chr1", 180, 245, 0.5)];

        let output = join_sites("s1", &sites, &regions);
        assert_eq!(pairs(&output), vec![(0, 180), (1, 180), (2, 180)]);
    }

    #[test]
    fn test_long_region_found_by_lookback() {
        // The long region starts well before a short one that sorts after it
        let regions = RegionSet::new(vec![
            region("chr1", 1000, 1010),
            region("chr1", 0, 5000),
            region("chr1", 4000, 4100),
        ])
        .unwrap();
        let sites = vec![site("chr1", 4050, 4051, 0.5)];

        let output = join_sites("s1", &sites, &regions);
        assert_eq!(pairs(&output), vec![(1, 4050), (2, 4050)]);
    }

    #[test]
    fn test_unknown_chromosome_and_empty_track() {
        let regions = RegionSet::new(vec![region("chr1", 100, 200)]).unwrap();
        let sites = vec![site("chrUn", 150, 151, 0.5)];

        let output = join_sites("s1", &sites, &regions);
        assert!(output.records.is_empty());
        assert_eq!(output.unjoined_sites, 1);

        let output = join_sites("s1", &[], &regions);
        assert!(output.records.is_empty());
        assert_eq!(output.unjoined_sites, 0);
    }

    #[test]
    fn test_output_independent_of_input_order() {
        let regions = RegionSet::new(vec![
            region("chr2", 0, 100),
            region("chr1", 100, 200),
            region("chr1", 150, 300),
        ])
        .unwrap();
        let sites = vec![
            site("chr1", 160, 161, 0.1),
            site("chr2", 10, 11, 0.2),
            site("chr1", 120, 121, 0.3),
            site("chr1", 250, 251, 0.4),
        ];
        let mut reversed = sites.clone();
        reversed.reverse();

        let forward = join_sites("s1", &sites, &regions);
        let backward = join_sites("s1", &reversed, &regions);
        assert_eq!(pairs(&forward), pairs(&backward));
        assert_eq!(
            pairs(&forward),
            vec![(0, 10), (1, 120), (1, 160), (2, 160), (2, 250)]
        );
    }
}
