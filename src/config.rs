//! Configuration and defaults for methmatrix.
//!
//! This module contains the run-wide settings shared read-only by every
//! sample worker, and the single missing-value sentinel of the output
//! formats.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Text written for a region without data, in per-sample tracks and in the
/// matrix. This is the only missing-value representation handed to the
/// heatmap renderer; it must be read back as NaN/NA there.
pub const MISSING_SENTINEL: &str = "NA";

/// How overlapping site values are collapsed into one value per region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationMode {
    /// Coverage-weighted methylation rate (summed counts).
    Rate,
    /// Unweighted arithmetic mean of site values.
    Mean,
}

/// Error type for parsing aggregation mode from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAggregationModeError;

impl fmt::Display for ParseAggregationModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid aggregation mode: expected 'rate' or 'mean'")
    }
}

impl std::error::Error for ParseAggregationModeError {}

impl FromStr for AggregationMode {
    type Err = ParseAggregationModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rate" => Ok(AggregationMode::Rate),
            "mean" => Ok(AggregationMode::Mean),
            _ => Err(ParseAggregationModeError),
        }
    }
}

impl AggregationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMode::Rate => "rate",
            AggregationMode::Mean => "mean",
        }
    }
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Numeric domain of the methylation values in a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueScale {
    /// Decide per sample from the bulk of the values.
    Auto,
    /// Values in [0, 1].
    Fraction,
    /// Values in [0, 100].
    Percent,
}

/// Error type for parsing value scale from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseValueScaleError;

impl fmt::Display for ParseValueScaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid value scale: expected 'auto', 'fraction', or 'percent'"
        )
    }
}

impl std::error::Error for ParseValueScaleError {}

impl FromStr for ValueScale {
    type Err = ParseValueScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ValueScale::Auto),
            "fraction" => Ok(ValueScale::Fraction),
            "percent" => Ok(ValueScale::Percent),
            _ => Err(ParseValueScaleError),
        }
    }
}

impl ValueScale {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueScale::Auto => "auto",
            ValueScale::Fraction => "fraction",
            ValueScale::Percent => "percent",
        }
    }

    /// Resolve `Auto` against a sample's values; explicit scales pass through.
    ///
    /// Values of exactly 0 or 1 fit both scales and do not vote. A track is
    /// read as percent only when values above 1 outnumber values strictly
    /// between 0 and 1, so a few stray values cannot flip a fraction track.
    pub fn resolve<I>(self, values: I) -> ValueScale
    where
        I: IntoIterator<Item = f64>,
    {
        match self {
            ValueScale::Auto => {
                let (mut above, mut between) = (0usize, 0usize);
                for v in values.into_iter().filter(|v| v.is_finite()) {
                    if v > 1.0 {
                        above += 1;
                    } else if v > 0.0 && v < 1.0 {
                        between += 1;
                    }
                }
                if above > between {
                    ValueScale::Percent
                } else {
                    ValueScale::Fraction
                }
            }
            scale => scale,
        }
    }

    /// Multiplier from a [0, 1] rate to this scale.
    pub fn factor(&self) -> f64 {
        match self {
            ValueScale::Percent => 100.0,
            ValueScale::Fraction | ValueScale::Auto => 1.0,
        }
    }

    /// Whether a value lies inside the plausible domain of this scale.
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && (0.0..=self.factor()).contains(&value)
    }
}

impl fmt::Display for ValueScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Leading columns of the matrix file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixLayout {
    /// One `region` column holding the region identifier.
    Region,
    /// `chr`, `start` and `end` columns, the layout read by the heatmap
    /// plotting script.
    Coordinates,
}

/// Error type for parsing matrix layout from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMatrixLayoutError;

impl fmt::Display for ParseMatrixLayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid matrix layout: expected 'region' or 'coords'")
    }
}

impl std::error::Error for ParseMatrixLayoutError {}

impl FromStr for MatrixLayout {
    type Err = ParseMatrixLayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "region" => Ok(MatrixLayout::Region),
            "coords" | "coordinates" => Ok(MatrixLayout::Coordinates),
            _ => Err(ParseMatrixLayoutError),
        }
    }
}

/// Configuration for a methmatrix run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Aggregation mode applied to every region of every sample.
    pub mode: AggregationMode,
    /// Value scale of the input tracks.
    pub scale: ValueScale,
    /// Number of sample workers.
    pub threads: usize,
    /// Upper bound on waiting for all samples to report. `None` waits until
    /// every sample worker has finished.
    pub timeout: Option<Duration>,
    /// Directory receiving one aggregated track per sample, if set.
    pub aggregated_dir: Option<PathBuf>,
    /// Leading columns of the matrix file.
    pub layout: MatrixLayout,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mode: AggregationMode::Rate,
            scale: ValueScale::Auto,
            threads: 1,
            timeout: None,
            aggregated_dir: None,
            layout: MatrixLayout::Region,
        }
    }
}

impl Config {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fan-in timeout in seconds (0 disables it).
    pub fn set_timeout_secs(&mut self, secs: u64) {
        self.timeout = if secs == 0 {
            None
        } else {
            Some(Duration::from_secs(secs))
        };
    }
}
