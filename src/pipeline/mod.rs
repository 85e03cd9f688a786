//! The aggregation pipeline: join, aggregate, assemble.

pub mod aggregate;
pub mod assemble;
pub mod join;
pub mod runner;
pub mod sample;

pub use aggregate::{aggregate_regions, screen_sites, EffectiveMode};
pub use assemble::{MatrixAssembler, MethylationMatrix};
pub use join::join_sites;
pub use runner::{run_manifest, RunReport, SampleOutcome, TrackSource};
pub use sample::{process_sites, process_track, SampleResult, SampleSummary};
