//! Output formatting for methmatrix results.
//!
//! This module writes the per-sample aggregated tracks, the methylation
//! matrix handed to the heatmap renderer, and the run summary. Missing
//! values are always written as `MISSING_SENTINEL`.

use anyhow::{bail, Result};
use std::borrow::Cow;
use std::io::Write;

use crate::config::{MatrixLayout, MISSING_SENTINEL};
use crate::pipeline::assemble::MethylationMatrix;
use crate::pipeline::runner::SampleOutcome;
use crate::regions::RegionSet;
use crate::types::SampleColumn;

/// Format a cell value; floats use the shortest representation that reads
/// back to the same number.
pub fn format_value(value: Option<f64>) -> Cow<'static, str> {
    match value {
        Some(v) => Cow::Owned(v.to_string()),
        None => Cow::Borrowed(MISSING_SENTINEL),
    }
}

/// Write one sample's values as a four-column track in master region order.
pub fn write_aggregated_track<W: Write>(
    writer: &mut W,
    regions: &RegionSet,
    column: &SampleColumn,
) -> Result<()> {
    if column.values.len() != regions.len() {
        bail!(
            "Sample {} has {} values for {} regions",
            column.sample_id,
            column.values.len(),
            regions.len()
        );
    }
    for aggregated in column.iter() {
        let Some(region) = regions.get(aggregated.region) else {
            continue;
        };
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            region.interval.chrom,
            region.interval.start,
            region.interval.end,
            format_value(aggregated.value)
        )?;
    }
    Ok(())
}

/// Write the matrix: a `region` column followed by one column per sample.
pub fn write_matrix<W: Write>(writer: &mut W, matrix: &MethylationMatrix) -> Result<()> {
    write!(writer, "region")?;
    for sample in &matrix.samples {
        write!(writer, "\t{}", sample)?;
    }
    writeln!(writer)?;

    for (row, region_id) in matrix.region_ids.iter().enumerate() {
        write!(writer, "{}", region_id)?;
        for column in &matrix.columns {
            write!(writer, "\t{}", format_value(column[row]))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

/// Write the matrix with coordinate columns: `chr start end` followed by one
/// column per sample.
pub fn write_coordinate_matrix<W: Write>(
    writer: &mut W,
    matrix: &MethylationMatrix,
    regions: &RegionSet,
) -> Result<()> {
    if regions.len() != matrix.num_rows() {
        bail!(
            "Matrix has {} rows but the region set has {}",
            matrix.num_rows(),
            regions.len()
        );
    }

    write!(writer, "chr\tstart\tend")?;
    for sample in &matrix.samples {
        write!(writer, "\t{}", sample)?;
    }
    writeln!(writer)?;

    for (row, region) in regions.regions().iter().enumerate() {
        let interval = &region.interval;
        write!(writer, "{}\t{}\t{}", interval.chrom, interval.start, interval.end)?;
        for column in &matrix.columns {
            write!(writer, "\t{}", format_value(column[row]))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

/// Write the matrix in the requested layout.
pub fn write_matrix_layout<W: Write>(
    writer: &mut W,
    matrix: &MethylationMatrix,
    regions: &RegionSet,
    layout: MatrixLayout,
) -> Result<()> {
    match layout {
        MatrixLayout::Region => write_matrix(writer, matrix),
        MatrixLayout::Coordinates => write_coordinate_matrix(writer, matrix, regions),
    }
}

const SUMMARY_HEADER: &str = "sample\tstatus\trecords\tmalformed\tout_of_range\tjoined\tunjoined_sites\tregions_observed\tmode\tscale\tdetail";

/// Write the per-sample summary with the matrix completeness flag.
pub fn write_summary<W: Write>(
    writer: &mut W,
    matrix: &MethylationMatrix,
    regions: &RegionSet,
    outcomes: &[SampleOutcome],
) -> Result<()> {
    writeln!(writer, "#complete\t{}", matrix.is_complete())?;
    writeln!(
        writer,
        "#missing_samples\t{}",
        if matrix.missing_samples.is_empty() {
            "-".to_string()
        } else {
            matrix.missing_samples.join(",")
        }
    )?;
    writeln!(writer, "#duplicate_regions\t{}", regions.duplicates_dropped())?;
    writeln!(writer, "{}", SUMMARY_HEADER)?;

    for outcome in outcomes {
        writeln!(writer, "{}", format_summary_line(outcome))?;
    }

    Ok(())
}

/// Format a single summary line for a sample outcome.
pub fn format_summary_line(outcome: &SampleOutcome) -> String {
    match outcome {
        SampleOutcome::Reported(s) => format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t-",
            s.sample_id,
            outcome.status(),
            s.records,
            s.malformed,
            s.out_of_range,
            s.joined,
            s.unjoined_sites,
            s.regions_observed,
            s.mode,
            s.scale
        ),
        SampleOutcome::Failed { error, .. } => failed_line(outcome, error),
        SampleOutcome::Rejected { error, .. } => failed_line(outcome, &error.to_string()),
        SampleOutcome::Cancelled { .. } => failed_line(outcome, "fan-in deadline passed"),
    }
}

fn failed_line(outcome: &SampleOutcome, detail: &str) -> String {
    // Keep the detail on one line and inside its column
    let detail = detail.replace(['\t', '\n'], " ");
    format!(
        "{}\t{}\t-\t-\t-\t-\t-\t-\t-\t-\t{}",
        outcome.sample_id(),
        outcome.status(),
        detail
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValueScale;
    use crate::error::AssemblyError;
    use crate::pipeline::aggregate::EffectiveMode;
    use crate::pipeline::sample::SampleSummary;
    use crate::types::{GenomicInterval, Region};

    fn region(chrom: &str, start: u64, end: u64, name: Option<&str>) -> Region {
        Region::new(
            GenomicInterval::new(chrom.to_string(), start, end).unwrap(),
            name.map(|n| n.to_string()),
        )
    }

    /// The region set behind `matrix()`, with one duplicate dropped.
    fn regions() -> RegionSet {
        RegionSet::new(vec![
            region("chr1", 100, 200, Some("A")),
            region("chr1", 300, 400, None),
            region("chr1", 500, 600, Some("A")),
        ])
        .unwrap()
    }

    fn matrix() -> MethylationMatrix {
        MethylationMatrix {
            region_ids: vec!["A".to_string(), "chr1-300-400".to_string()],
            samples: vec!["s1".to_string(), "s2".to_string()],
            columns: vec![vec![Some(0.5), None], vec![Some(0.0), Some(0.125)]],
            missing_samples: Vec::new(),
        }
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(None), "NA");
        assert_eq!(format_value(Some(0.0)), "0");
        assert_eq!(format_value(Some(0.1)), "0.1");
        assert_eq!(format_value(Some(0.875)), "0.875");
        assert_eq!(format_value(Some(1.0 / 3.0)), "0.3333333333333333");
    }

    #[test]
    fn test_write_matrix() {
        let mut output = Vec::new();
        write_matrix(&mut output, &matrix()).unwrap();
        let text = String::from_utf8(output).unwrap();

        assert_eq!(
            text,
            "region\ts1\ts2\nA\t0.5\t0\nchr1-300-400\tNA\t0.125\n"
        );
    }

    #[test]
    fn test_write_coordinate_matrix() {
        let mut output = Vec::new();
        write_matrix_layout(&mut output, &matrix(), &regions(), MatrixLayout::Coordinates)
            .unwrap();
        let text = String::from_utf8(output).unwrap();

        assert_eq!(
            text,
            "chr\tstart\tend\ts1\ts2\nchr1\t100\t200\t0.5\t0\nchr1\t300\t400\tNA\t0.125\n"
        );
    }

    #[test]
    fn test_write_coordinate_matrix_rejects_other_region_set() {
        let other = RegionSet::new(vec![region("chr1", 100, 200, None)]).unwrap();
        let mut output = Vec::new();
        assert!(write_coordinate_matrix(&mut output, &matrix(), &other).is_err());
    }

    #[test]
    fn test_write_aggregated_track() {
        let regions = RegionSet::new(vec![
            region("chr1", 100, 200, Some("A")),
            region("chr2", 5, 10, None),
        ])
        .unwrap();

        let column = SampleColumn::new("s1".to_string(), vec![None, Some(0.75)]);
        let mut output = Vec::new();
        write_aggregated_track(&mut output, &regions, &column).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "chr1\t100\t200\tNA\nchr2\t5\t10\t0.75\n"
        );

        let short = SampleColumn::new("s1".to_string(), vec![None]);
        assert!(write_aggregated_track(&mut Vec::<u8>::new(), &regions, &short).is_err());
    }

    #[test]
    fn test_write_summary() {
        let mut m = matrix();
        m.missing_samples = vec!["s2".to_string()];
        let outcomes = vec![
            SampleOutcome::Reported(SampleSummary {
                sample_id: "s1".to_string(),
                records: 10,
                malformed: 1,
                out_of_range: 2,
                joined: 6,
                unjoined_sites: 1,
                regions_observed: 1,
                mode: EffectiveMode::CoverageWeighted,
                scale: ValueScale::Percent,
            }),
            SampleOutcome::Rejected {
                sample_id: "s2".to_string(),
                error: AssemblyError::Closed("s2".to_string()),
            },
        ];

        let mut output = Vec::new();
        write_summary(&mut output, &m, &regions(), &outcomes).unwrap();
        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "#complete\tfalse");
        assert_eq!(lines[1], "#missing_samples\ts2");
        assert_eq!(lines[2], "#duplicate_regions\t1");
        assert!(lines[3].starts_with("sample\tstatus"));
        assert_eq!(lines[4], "s1\treported\t10\t1\t2\t6\t1\t1\trate\tpercent\t-");
        assert!(lines[5].starts_with("s2\trejected\t-"));
        assert!(lines[5].contains("too late"));
        assert_eq!(lines[5].split('\t').count(), 11);
    }
}
