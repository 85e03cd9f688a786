//! Per-region aggregation of joined methylation sites.
//!
//! Every region of the universe receives exactly one value per sample, in
//! master order. Regions without a usable overlapping site are `None`, which
//! is distinct from a measured methylation of zero. Every value leaving this
//! module is a fraction in [0, 1], whatever the scale of the input track.

use std::fmt;

use crate::config::{AggregationMode, ValueScale};
use crate::types::{JoinedRecord, MethylationSite};

/// The aggregation actually applied to a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectiveMode {
    /// Summed methylated reads over summed coverage.
    CoverageWeighted,
    /// `rate` requested but the track has no read counts: arithmetic mean of
    /// the per-site ratios.
    RateFromRatios,
    /// Arithmetic mean of site values.
    Mean,
    /// Values read from an already aggregated track.
    Preaggregated,
}

impl EffectiveMode {
    /// Pick the aggregation for a sample's validated sites.
    pub fn select(mode: AggregationMode, sites: &[MethylationSite]) -> Self {
        match mode {
            AggregationMode::Mean => EffectiveMode::Mean,
            AggregationMode::Rate => {
                if sites.iter().all(|s| s.coverage.is_some()) {
                    EffectiveMode::CoverageWeighted
                } else {
                    EffectiveMode::RateFromRatios
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveMode::CoverageWeighted => "rate",
            EffectiveMode::RateFromRatios => "rate-from-ratios",
            EffectiveMode::Mean => "mean",
            EffectiveMode::Preaggregated => "preaggregated",
        }
    }
}

impl fmt::Display for EffectiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sites that passed the value-range check, with values rescaled to
/// fractions.
#[derive(Debug, Clone)]
pub struct ScreenedSites {
    pub sites: Vec<MethylationSite>,
    /// Scale the input track was read in (never `Auto`).
    pub scale: ValueScale,
    /// Sites excluded for an implausible value.
    pub out_of_range: usize,
    /// First excluded value, for the warning summary.
    pub first_excluded: Option<f64>,
}

/// Resolve the sample's value scale, drop sites outside its domain and
/// rescale the rest to fractions.
///
/// Out-of-range values are excluded rather than clamped; a clamped value
/// would be indistinguishable from a real measurement at the bound.
pub fn screen_sites(sites: Vec<MethylationSite>, scale: ValueScale) -> ScreenedSites {
    let scale = scale.resolve(sites.iter().map(|s| s.value));
    let factor = scale.factor();
    let mut kept = Vec::with_capacity(sites.len());
    let mut out_of_range = 0;
    let mut first_excluded = None;

    for mut site in sites {
        if scale.contains(site.value) {
            site.value /= factor;
            kept.push(site);
        } else {
            out_of_range += 1;
            first_excluded.get_or_insert(site.value);
        }
    }

    ScreenedSites {
        sites: kept,
        scale,
        out_of_range,
        first_excluded,
    }
}

/// Collapse joined records into one value per region.
///
/// `records` must be grouped by region, as produced by the interval join.
pub fn aggregate_regions(
    records: &[JoinedRecord<'_>],
    num_regions: usize,
    mode: EffectiveMode,
) -> Vec<Option<f64>> {
    debug_assert!(records.windows(2).all(|w| w[0].region <= w[1].region));

    let mut values = vec![None; num_regions];
    let mut group_start = 0;

    while group_start < records.len() {
        let region = records[group_start].region;
        let mut group_end = group_start + 1;
        while group_end < records.len() && records[group_end].region == region {
            group_end += 1;
        }

        if let Some(slot) = values.get_mut(region) {
            *slot = collapse(&records[group_start..group_end], mode);
        }
        group_start = group_end;
    }

    values
}

/// Aggregate the records of a single region.
fn collapse(group: &[JoinedRecord<'_>], mode: EffectiveMode) -> Option<f64> {
    match group {
        [] => None,
        // A lone site is reported as measured
        [only] => Some(only.site.value),
        _ => match mode {
            EffectiveMode::CoverageWeighted => {
                let (methylated, total) = group
                    .iter()
                    .filter_map(|r| r.site.coverage)
                    .fold((0u64, 0u64), |(m, t), cov| {
                        (m + cov.methylated as u64, t + cov.total())
                    });
                if total == 0 {
                    None
                } else {
                    Some(methylated as f64 / total as f64)
                }
            }
            EffectiveMode::RateFromRatios | EffectiveMode::Mean | EffectiveMode::Preaggregated => {
                let sum = compensated_sum(group.iter().map(|r| r.site.value));
                Some(sum / group.len() as f64)
            }
        },
    }
}

/// Neumaier summation; keeps means stable for regions with many sites.
fn compensated_sum<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut sum = 0.0f64;
    let mut compensation = 0.0f64;
    for v in values {
        let t = sum + v;
        if sum.abs() >= v.abs() {
            compensation += (sum - t) + v;
        } else {
            compensation += (v - t) + sum;
        }
        sum = t;
    }
    sum + compensation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coverage, GenomicInterval};

    fn site(start: u64, value: f64, coverage: Option<(u32, u32)>) -> MethylationSite {
        MethylationSite::new(
            GenomicInterval::new("chr1".to_string(), start, start + 1).unwrap(),
            value,
            coverage.map(|(m, u)| Coverage::new(m, u)),
        )
    }

    fn records<'a>(pairs: &[(usize, &'a MethylationSite)]) -> Vec<JoinedRecord<'a>> {
        pairs
            .iter()
            .map(|&(region, site)| JoinedRecord {
                region,
                sample_id: "s1",
                site,
            })
            .collect()
    }

    #[test]
    fn test_select_mode() {
        let counted = vec![site(1, 0.5, Some((1, 1)))];
        let ratios = vec![site(1, 0.5, Some((1, 1))), site(2, 0.5, None)];

        assert_eq!(
            EffectiveMode::select(AggregationMode::Rate, &counted),
            EffectiveMode::CoverageWeighted
        );
        assert_eq!(
            EffectiveMode::select(AggregationMode::Rate, &ratios),
            EffectiveMode::RateFromRatios
        );
        assert_eq!(
            EffectiveMode::select(AggregationMode::Mean, &counted),
            EffectiveMode::Mean
        );
    }

    #[test]
    fn test_screen_sites_fraction() {
        let sites = vec![
            site(1, 0.0, None),
            site(2, 1.0, None),
            site(3, -0.2, None),
            site(4, f64::NAN, None),
        ];
        let screened = screen_sites(sites);
        assert_eq!(screened.sites.len(), 2);
        assert_eq!(screened.out_of_range, 2);
        assert_eq!(screened.first_excluded, Some(-0.2));
        assert_eq!(screened.scale);
    }

    #[test]
    fn test_screen_sites_auto_percent() {
        let sites = vec![site(1, 80.0, None), site(2, 0.5, None), site(3, 140.0, None)];
        let screened = screen_sites(sites, ValueScale::Auto);
        assert_eq!(screened.scale, ValueScale::Percent);
        assert_eq!(screened.sites.len(), 2);
        assert_eq!(screened.out_of_range, 1);
        assert_eq!(screened.sites[0].value, 0.8);
        assert_eq!(screened.sites[1].value, 0.005);
    }

    #[test]
    fn test_screen_sites_stray_value_excluded() {
        let sites = vec![site(1, 0.5, None), site(2, 0.5, None), site(3, 1.5, None)];
        let screened = screen_sites(sites, ValueScale::Auto);
        assert_eq!(screened.scale, ValueScale::Fraction);
        assert_eq!(screened.sites.len(), 2);
        assert_eq!(screened.out_of_range, 1);
        assert_eq!(screened.first_excluded, Some(1.5));
    }

    #[test]
    fn test_missing_not_zero() {
        let a = site(150, 0.0, None);
        let recs = records(&[(0, &a)]);
        let values = aggregate_regions(&recs, 2, EffectiveMode::Mean);
        assert_eq!(values, vec![Some(0.0), None]);
    }

    #[test]
    fn test_single_site_unchanged() {
        // Counts would give 1/3; the lone site's own value wins
        let a = site(150, 0.3, Some((1, 2)));
        let recs = records(&[(0, &a)]);
        let values =
            aggregate_regions(&recs, 1, EffectiveMode::CoverageWeighted);
        assert_eq!(values, vec![Some(0.3)]);
    }

    #[test]
    fn test_coverage_weighted_not_diluted() {
        let deep = site(150, 0.9, Some((90, 10)));
        let shallow = site(160, 0.0, Some((0, 1)));
        let recs = records(&[(0, &deep), (0, &shallow)]);

        let weighted =
            aggregate_regions(&recs, 1, EffectiveMode::CoverageWeighted);
        assert_eq!(weighted, vec![Some(90.0 / 101.0)]);

        let mean = aggregate_regions(&recs, 1, EffectiveMode::Mean);
        assert_eq!(mean, vec![Some(0.45)]);
    }

    #[test]
    fn test_percent_track_yields_fractions() {
        let screened = screen_sites(
            vec![site(150, 75.0, Some((3, 1))), site(160, 25.0, Some((1, 3))), site(300, 80.0, None)],
            ValueScale::Percent,
        );
        let recs = records(&[
            (0, &screened.sites[0]),
            (0, &screened.sites[1]),
            (1, &screened.sites[2]),
        ]);

        let weighted = aggregate_regions(&recs, 2, EffectiveMode::CoverageWeighted);
        assert_eq!(weighted, vec![Some(0.5), Some(0.8)]);

        let mean = aggregate_regions(&recs, 2, EffectiveMode::Mean);
        assert_eq!(mean, vec![Some(0.5), Some(0.8)]);
    }

    #[test]
    fn test_zero_coverage_region_is_missing() {
        let a = site(150, 0.0, Some((0, 0)));
        let b = site(160, 0.0, Some((0, 0)));
        let recs = records(&[(0, &a), (0, &b)]);
        let values =
            aggregate_regions(&recs, 1, EffectiveMode::CoverageWeighted);
        assert_eq!(values, vec![None]);
    }

    #[test]
    fn test_weighted_fold_order_invariant() {
        let sites: Vec<MethylationSite> = (0..50)
            .map(|i| site(i, 0.5, Some((i as u32 * 7 % 13, i as u32 * 3 % 11 + 1))))
            .collect();
        let forward: Vec<(usize, &MethylationSite)> = sites.iter().map(|s| (0, s)).collect();
        let mut backward = forward.clone();
        backward.reverse();

        let a = aggregate_regions(&records(&forward), 1, EffectiveMode::CoverageWeighted);
        let b = aggregate_regions(&records(&backward), 1, EffectiveMode::CoverageWeighted);
        assert_eq!(a, b);
    }

    #[test]
    fn test_compensated_sum() {
        let values = vec![1e16, 1.0, -1e16];
        assert_eq!(compensated_sum(values), 1.0);
    }
}
