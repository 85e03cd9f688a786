//! Parsers for the input file formats.

pub mod bed;
pub mod bedgraph;
pub mod manifest;
pub mod util;

pub use bed::{load_region_set, parse_bed};
pub use bedgraph::{parse_aggregated, parse_track, TrackData};
pub use manifest::{parse_manifest, Manifest, ManifestEntry};
