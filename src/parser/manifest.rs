//! Sample manifest parser.
//!
//! The manifest is a CSV file with a header row holding at least a `sample`
//! column and a `bedgraph_file_path` (or `track_path`) column. Its row order
//! is the column order of the matrix.

use anyhow::{bail, Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

use ahash::AHashSet;

/// One expected sample and where its track lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub sample_id: String,
    pub track_path: PathBuf,
}

/// The expected column universe of a run.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sample identifiers in manifest order.
    pub fn sample_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.sample_id.clone()).collect()
    }
}

const SAMPLE_COLUMN: &str = "sample";
const PATH_COLUMNS: [&str; 2] = ["bedgraph_file_path", "track_path"];

/// Parse a manifest file.
pub fn parse_manifest(path: &Path) -> Result<Manifest> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open manifest file: {}", path.display()))?;
    parse_manifest_reader(file)
        .with_context(|| format!("Invalid manifest {}", path.display()))
}

/// Parse a manifest from a reader.
///
/// Duplicate or empty sample identifiers are fatal: the manifest defines the
/// fan-in closure condition and must name every column exactly once.
pub fn parse_manifest_reader<R: Read>(reader: R) -> Result<Manifest> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .context("Failed to read manifest header")?
        .clone();

    let sample_idx = headers
        .iter()
        .position(|h| h == SAMPLE_COLUMN)
        .context("Manifest must have a 'sample' column")?;
    let path_idx = headers
        .iter()
        .position(|h| PATH_COLUMNS.contains(&h))
        .context("Manifest must have a 'bedgraph_file_path' column")?;

    let mut entries = Vec::new();
    let mut seen: AHashSet<String> = AHashSet::new();

    for (row, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read manifest row {}", row + 1))?;

        let sample_id = record.get(sample_idx).unwrap_or("").to_string();
        let track_path = record.get(path_idx).unwrap_or("");

        if sample_id.is_empty() {
            bail!("Manifest row {} has an empty sample id", row + 1);
        }
        if track_path.is_empty() {
            bail!("Manifest row {} has an empty track path", row + 1);
        }
        if !seen.insert(sample_id.clone()) {
            bail!("Sample '{}' is listed more than once", sample_id);
        }

        entries.push(ManifestEntry {
            sample_id,
            track_path: PathBuf::from(track_path),
        });
    }

    if entries.is_empty() {
        bail!("Manifest lists no samples");
    }

    Ok(Manifest { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest_basic() {
        let content = "sample,bedgraph_file_path\nliver_1,/data/liver_1.bedGraph\nplacenta_2, /data/p2.bedGraph.gz\n";
        let manifest = parse_manifest_reader(content.as_bytes()).unwrap();

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.sample_ids(), vec!["liver_1", "placenta_2"]);
        assert_eq!(
            manifest.entries[1].track_path,
            PathBuf::from("/data/p2.bedGraph.gz")
        );
    }

    #[test]
    fn test_parse_manifest_column_order_and_extra_columns() {
        let content = "tissue,track_path,sample\nliver,a.bg,s1\n";
        let manifest = parse_manifest_reader(content.as_bytes()).unwrap();

        assert_eq!(manifest.entries[0].sample_id, "s1");
        assert_eq!(manifest.entries[0].track_path, PathBuf::from("a.bg"));
    }

    #[test]
    fn test_parse_manifest_missing_columns() {
        assert!(parse_manifest_reader("name,path\ns1,a.bg\n".as_bytes()).is_err());
        assert!(parse_manifest_reader("sample\ns1\n".as_bytes()).is_err());
    }

    #[test]
    fn test_parse_manifest_duplicate_sample() {
        let content = "sample,bedgraph_file_path\ns1,a.bg\ns1,b.bg\n";
        let err = parse_manifest_reader(content.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_parse_manifest_empty() {
        assert!(parse_manifest_reader("sample,bedgraph_file_path\n".as_bytes()).is_err());
    }
}
