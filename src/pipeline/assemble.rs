//! Fan-in of per-sample columns into the methylation matrix.
//!
//! The assembler is the only state shared between sample workers. Each
//! submission is an atomic append under a mutex; the expected sample set
//! comes from the manifest, so the assembler never has to discover how many
//! samples exist. Waiting is bounded by an optional deadline and by the
//! explicit `close` signal.

use indexmap::IndexMap;
use log::{debug, warn};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::AssemblyError;
use crate::regions::RegionSet;
use crate::types::SampleColumn;

/// Rectangular region × sample table.
#[derive(Debug, Clone, PartialEq)]
pub struct MethylationMatrix {
    /// Row identifiers in master region order.
    pub region_ids: Vec<String>,
    /// Column identifiers in manifest order.
    pub samples: Vec<String>,
    /// One column per sample, each with one cell per region.
    pub columns: Vec<Vec<Option<f64>>>,
    /// Expected samples that never reported; their columns are all `None`.
    pub missing_samples: Vec<String>,
}

impl MethylationMatrix {
    pub fn num_rows(&self) -> usize {
        self.region_ids.len()
    }

    pub fn num_cols(&self) -> usize {
        self.samples.len()
    }

    /// Whether every expected sample contributed its column.
    pub fn is_complete(&self) -> bool {
        self.missing_samples.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.columns.get(col).and_then(|c| c.get(row)).copied().flatten()
    }

    pub fn column(&self, sample_id: &str) -> Option<&[Option<f64>]> {
        self.samples
            .iter()
            .position(|s| s == sample_id)
            .map(|i| self.columns[i].as_slice())
    }
}

struct State {
    /// Manifest order; `None` until the sample reports.
    columns: IndexMap<String, Option<Vec<Option<f64>>>>,
    reported: usize,
    closed: bool,
    finalized: bool,
}

impl State {
    fn all_reported(&self) -> bool {
        self.reported == self.columns.len()
    }
}

/// Thread-safe accumulator for per-sample columns.
pub struct MatrixAssembler {
    regions: Arc<RegionSet>,
    state: Mutex<State>,
    ready: Condvar,
}

impl MatrixAssembler {
    /// Create an assembler expecting exactly `samples`, in column order.
    pub fn new<I>(regions: Arc<RegionSet>, samples: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let columns = samples.into_iter().map(|s| (s, None)).collect();
        MatrixAssembler {
            regions,
            state: Mutex::new(State {
                columns,
                reported: 0,
                closed: false,
                finalized: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add one sample's column.
    ///
    /// A rejected submission leaves the accumulator untouched; in particular
    /// a duplicate never replaces the value stored first.
    pub fn submit(&self, column: SampleColumn) -> Result<(), AssemblyError> {
        let expected = self.regions.len();
        let mut state = self.lock();

        if state.finalized {
            return Err(AssemblyError::Closed(column.sample_id));
        }
        if column.values.len() != expected {
            return Err(AssemblyError::RowCountMismatch {
                sample: column.sample_id,
                found: column.values.len(),
                expected,
            });
        }

        let Some(slot) = state.columns.get_mut(&column.sample_id) else {
            return Err(AssemblyError::UnknownSample(column.sample_id));
        };
        if let Some(previous) = slot {
            let divergent = *previous != column.values;
            return Err(AssemblyError::DuplicateSample {
                sample: column.sample_id,
                divergent,
            });
        }

        *slot = Some(column.values);
        state.reported += 1;
        debug!(
            "Sample {} assembled ({}/{})",
            column.sample_id,
            state.reported,
            state.columns.len()
        );

        if state.all_reported() {
            self.ready.notify_all();
        }
        Ok(())
    }

    /// Signal that no further submissions will be made.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.ready.notify_all();
    }

    /// Number of samples that have reported so far.
    pub fn reported(&self) -> usize {
        self.lock().reported
    }

    /// Wait until every sample reported, `close` was called, or `timeout`
    /// elapsed, then finalize.
    ///
    /// With `timeout == None` the caller must guarantee that `close` is
    /// eventually called.
    pub fn wait(&self, timeout: Option<Duration>) -> MethylationMatrix {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();

        while !state.all_reported() && !state.closed {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(
                            "Timed out waiting for samples: {}/{} reported",
                            state.reported,
                            state.columns.len()
                        );
                        break;
                    }
                    state = self
                        .ready
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
                None => {
                    state = self
                        .ready
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }

        self.build(&mut state)
    }

    /// Finalize immediately with whatever has been submitted.
    pub fn finalize(&self) -> MethylationMatrix {
        let mut state = self.lock();
        self.build(&mut state)
    }

    fn build(&self, state: &mut State) -> MethylationMatrix {
        state.finalized = true;
        let num_rows = self.regions.len();

        let mut samples = Vec::with_capacity(state.columns.len());
        let mut columns = Vec::with_capacity(state.columns.len());
        let mut missing_samples = Vec::new();

        for (sample, column) in &state.columns {
            samples.push(sample.clone());
            match column {
                Some(values) => columns.push(values.clone()),
                None => {
                    missing_samples.push(sample.clone());
                    columns.push(vec![None; num_rows]);
                }
            }
        }

        MethylationMatrix {
            region_ids: self.regions.ids().to_vec(),
            samples,
            columns,
            missing_samples,
        }
    }
}
