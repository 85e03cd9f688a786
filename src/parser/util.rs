//! Utility functions for file parsing.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Creates a buffered reader that automatically handles gzip-compressed files.
///
/// This function checks if the file path ends with ".gz" and wraps the file
/// in a GzDecoder if so. Otherwise, it returns a plain buffered reader.
pub fn create_buffered_reader(file: File, path: &Path) -> Box<dyn BufRead + Send> {
    if path.to_string_lossy().ends_with(".gz") {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    }
}

/// Open a possibly gzip-compressed text file.
pub fn open_text(path: &Path, what: &str) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", what, path.display()))?;
    Ok(create_buffered_reader(file, path))
}

/// Whether a line carries no record: blank, comment, or a UCSC
/// `track`/`browser` directive. The keyword must stand alone, so contigs
/// such as `track_1` still parse as records.
pub fn is_directive(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return true;
    }
    matches!(
        trimmed.split_whitespace().next(),
        Some("track") | Some("browser")
    )
}

/// Split a positional record on tabs or runs of spaces.
pub fn split_fields(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}
