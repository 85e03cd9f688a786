//! methmatrix - Region-level DNA methylation matrix library.
//!
//! This library aggregates per-sample methylation tracks (bedGraph) over a
//! shared set of genomic regions (BED) and assembles the per-sample results
//! into one region × sample matrix.
//!
//! # Features
//!
//! - Parse bedGraph tracks and BED region sets (with gzip support)
//! - Join sites to regions with half-open overlap semantics, in any input order
//! - Collapse overlapping sites by coverage-weighted rate or arithmetic mean
//! - Assemble columns produced concurrently, with duplicate rejection and a
//!   bounded wait that degrades to a partial matrix
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use methmatrix::config::Config;
//! use methmatrix::parser::{load_region_set, parse_manifest};
//! use methmatrix::pipeline::{run_manifest, TrackSource};
//! use methmatrix::output::write_matrix;
//! use std::path::Path;
//!
//! let regions = Arc::new(load_region_set(Path::new("dmrs.bed"))?);
//! let manifest = parse_manifest(Path::new("samples.csv"))?;
//! let report = run_manifest(&manifest, regions, &Config::default(), TrackSource::Raw)?;
//! write_matrix(&mut std::io::stdout(), &report.matrix)?;
//! ```

pub mod config;
pub mod error;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod regions;
pub mod render;
pub mod types;

pub use config::Config;
pub use parser::Manifest;
pub use pipeline::{MatrixAssembler, MethylationMatrix};
pub use regions::RegionSet;
