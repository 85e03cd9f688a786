//! Error types that callers branch on.
//!
//! Line-level failures are recovered by the parsers (skip and count), so they
//! carry just enough detail for a warning. Assembly failures are surfaced to
//! the worker that submitted the column.

use thiserror::Error;

/// Why a single input line could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("expected at least {expected} fields, found {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("invalid coordinate '{0}'")]
    BadCoordinate(String),

    #[error("interval end {end} must be greater than start {start}")]
    EmptyInterval { start: u64, end: u64 },

    #[error("invalid methylation value '{0}'")]
    BadValue(String),

    #[error("invalid read count '{0}'")]
    BadCount(String),
}

/// Rejections raised by the matrix assembler.
///
/// A rejected submission never modifies the accumulator: whatever was stored
/// for the sample before the call is what ends up in the matrix.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssemblyError {
    #[error("sample '{0}' is not listed in the manifest")]
    UnknownSample(String),

    #[error("sample '{sample}' already reported (divergent values: {divergent})")]
    DuplicateSample { sample: String, divergent: bool },

    #[error("sample '{sample}' has {found} rows, expected {expected}")]
    RowCountMismatch {
        sample: String,
        found: usize,
        expected: usize,
    },

    #[error("matrix already finalized; result for sample '{0}' arrived too late")]
    Closed(String),
}
