//! Record sources for the migration pipeline.
//!
//! A source yields a finite, ordered sequence of raw header → value rows.
//! Every call to [`RecordSource::records`] starts from the beginning again.

use crate::error::{MigratorError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One source row as a mapping from column name to raw string value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a column, or the empty string when the column is absent
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn get_opt(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Rows kept by a transform plus how many rows were read in total
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub items: Vec<T>,
    pub read: usize,
}

impl<T> Parsed<T> {
    pub fn rejected(&self) -> usize {
        self.read - self.items.len()
    }
}

/// Producer of raw rows
pub trait RecordSource: Send + Sync {
    /// Human-readable origin, used in log lines
    fn describe(&self) -> String;

    /// Fail early when the source cannot be read at all
    fn open(&self) -> Result<()>;

    /// Lazy sequence of rows, restarted on every call
    fn records(&self) -> Result<Box<dyn Iterator<Item = RawRecord> + Send + '_>>;
}

impl<'s> dyn RecordSource + 's {
    /// Stream all rows through `transform`, keeping the `Some` results
    pub fn parse_with<T, F>(&self, mut transform: F) -> Result<Parsed<T>>
    where
        F: FnMut(RawRecord) -> Option<T>,
    {
        let mut items = Vec::new();
        let mut read = 0usize;

        for record in self.records()? {
            read += 1;
            if let Some(item) = transform(record) {
                items.push(item);
            }
        }

        info!(
            "Parsing complete: {}, {} records read, {} kept",
            self.describe(),
            read,
            items.len()
        );
        Ok(Parsed { items, read })
    }
}

/// Comma-separated file with a header row
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_file(&self) -> Result<File> {
        File::open(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => MigratorError::file_not_found(&self.path),
            _ => MigratorError::Io(e),
        })
    }
}

impl RecordSource for CsvSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&self) -> Result<()> {
        if !self.path.is_file() {
            return Err(MigratorError::file_not_found(&self.path));
        }
        Ok(())
    }

    fn records(&self) -> Result<Box<dyn Iterator<Item = RawRecord> + Send + '_>> {
        let file = self.open_file()?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let headers = reader.headers()?.clone();
        debug!(
            "Reading {} with columns: {:?}",
            self.path.display(),
            headers.iter().collect::<Vec<_>>()
        );

        let path = self.path.clone();
        let rows = reader
            .into_records()
            .enumerate()
            .filter_map(move |(index, result)| match result {
                Ok(row) => Some(headers.iter().zip(row.iter()).collect::<RawRecord>()),
                Err(e) => {
                    // +2: header line, then 1-based numbering
                    warn!(
                        "Skipping unreadable row {} in {}: {}",
                        index + 2,
                        path.display(),
                        e
                    );
                    None
                }
            });

        Ok(Box::new(rows))
    }
}

/// Rows held in memory; used for fixtures and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    rows: Vec<RawRecord>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, rows: Vec<RawRecord>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

impl RecordSource for MemorySource {
    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn open(&self) -> Result<()> {
        Ok(())
    }

    fn records(&self) -> Result<Box<dyn Iterator<Item = RawRecord> + Send + '_>> {
        Ok(Box::new(self.rows.iter().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_reported_before_parsing() {
        let dir = TempDir::new().unwrap();
        let source = CsvSource::new(dir.path().join("absent.csv"));

        match source.open() {
            Err(MigratorError::FileNotFound { path }) => {
                assert!(path.ends_with("absent.csv"));
            }
            other => panic!("Expected FileNotFound, got {other:?}"),
        }
        assert!(matches!(
            source.records().map(|_| ()),
            Err(MigratorError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_rows_map_headers_to_values() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "vendors.csv",
            "VENDOR_ID,VENDOR_NAME\nV1,Acme\nV2,\"Bolt, Inc\"\n",
        );
        let source = CsvSource::new(path);

        let rows: Vec<RawRecord> = source.records().unwrap().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("VENDOR_ID"), "V1");
        assert_eq!(rows[1].get("VENDOR_NAME"), "Bolt, Inc");
        assert_eq!(rows[1].get("NOT_A_COLUMN"), "");
    }

    #[test]
    fn test_short_rows_leave_missing_columns_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "c.csv", "A,B,C\n1,2\n3,4,5\n");
        let source = CsvSource::new(path);

        let rows: Vec<RawRecord> = source.records().unwrap().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_opt("C"), None);
        assert_eq!(rows[1].get("C"), "5");
    }

    #[test]
    fn test_parse_with_filters_and_restarts() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "n.csv", "N\n1\n2\n3\n4\n");
        let source: Box<dyn RecordSource> = Box::new(CsvSource::new(path));

        let evens = source
            .parse_with(|r| r.get("N").parse::<u32>().ok().filter(|n| n % 2 == 0))
            .unwrap();
        assert_eq!(evens.items, vec![2, 4]);
        assert_eq!(evens.read, 4);
        assert_eq!(evens.rejected(), 2);

        // a second pass reads the file again from the top
        let all = source.parse_with(|r| Some(r.get("N").to_string())).unwrap();
        assert_eq!(all.items, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new(
            "fixture",
            vec![RawRecord::new().with("SKU", "A"), RawRecord::new().with("SKU", "B")],
        );
        assert_eq!(source.describe(), "memory:fixture");
        assert_eq!(source.records().unwrap().count(), 2);
    }
}
