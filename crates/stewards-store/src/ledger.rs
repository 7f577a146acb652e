//! Which documents already have rows in the store.

use std::collections::HashSet;

use arrow::array::{Array, StringArray};
use stewards_core::incidents::SOURCE_DOCUMENT;
use tracing::{debug, info, warn};

use crate::StoreError;
use crate::csv::{CsvStore, string_at};

/// Column name written by earlier versions of the annotator.
pub const LEGACY_SOURCE_COLUMN: &str = "source_file";

const SCAN_BATCH_ROWS: usize = 1024;

/// Set of document identifiers with at least one durable row.
///
/// Recomputed from the store at the start of every run and never persisted on
/// its own, so it cannot drift from what was actually written.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    processed: HashSet<String>,
}

impl Ledger {
    /// Derive the ledger from the store's current contents.
    ///
    /// Never fails: a missing store is an empty ledger, and an unreadable one
    /// is reported and treated as empty so the run reprocesses on top of it.
    pub fn load(store: &CsvStore) -> Self {
        if !store.exists() {
            debug!(path = %store.path().display(), "no annotation store yet");
            return Self::default();
        }

        match Self::scan(store) {
            Ok(ledger) => {
                info!(
                    path = %store.path().display(),
                    documents = ledger.len(),
                    "loaded processed-document ledger"
                );
                ledger
            }
            Err(e) => {
                warn!(
                    path = %store.path().display(),
                    error = %e,
                    "annotation store is corrupt, treating it as holding no processed documents"
                );
                Self::default()
            }
        }
    }

    fn scan(store: &CsvStore) -> Result<Self, StoreError> {
        let header = store.read_header()?;
        let column = [SOURCE_DOCUMENT, LEGACY_SOURCE_COLUMN]
            .into_iter()
            .find(|c| header.iter().any(|h| h == c))
            .ok_or_else(|| StoreError::MissingColumn(SOURCE_DOCUMENT.to_string()))?;

        let mut processed = HashSet::new();
        if let Err(e) = collect_ids(store, column, SCAN_BATCH_ROWS, &mut processed) {
            // The failing batch may hold good rows ahead of the bad one.
            // Re-read one row at a time to keep every row before it.
            let _ = collect_ids(store, column, 1, &mut processed);
            warn!(
                path = %store.path().display(),
                error = %e,
                kept = processed.len(),
                "stopped reading annotation store early"
            );
        }
        Ok(Self { processed })
    }

    pub fn already_processed(&self) -> &HashSet<String> {
        &self.processed
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}

/// Insert every id from `column` into `ids`, stopping at the first batch
/// that fails to decode.
fn collect_ids(
    store: &CsvStore,
    column: &str,
    batch_size: usize,
    ids: &mut HashSet<String>,
) -> Result<(), StoreError> {
    for batch in store.scan_column(column, batch_size)? {
        let batch = batch?;
        let Some(values) = batch.column(0).as_any().downcast_ref::<StringArray>() else {
            continue;
        };
        for row in 0..values.len() {
            if let Some(id) = string_at(values, row) {
                ids.insert(id.to_string());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use stewards_core::AnnotationRecord;

    fn tagged(source: &str) -> AnnotationRecord {
        let mut record = AnnotationRecord::from_value(json!({"year": 2023})).unwrap();
        record.tag_source(source);
        record
    }

    #[test]
    fn missing_store_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().join("annotations.csv"));
        assert!(Ledger::load(&store).is_empty());
    }

    #[test]
    fn collects_distinct_sources() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().join("annotations.csv"));
        store.append(&[tagged("a.txt"), tagged("a.txt")]).unwrap();
        store.append(&[tagged("b.txt")]).unwrap();

        let ledger = Ledger::load(&store);
        assert_eq!(ledger.len(), 2);
        let mut ids: Vec<_> = ledger.already_processed().iter().cloned().collect();
        ids.sort();
        assert_eq!(ids, ["a.txt", "b.txt"]);
        assert!(!ledger.is_processed("c.txt"));
    }

    #[test]
    fn honours_legacy_source_column() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("annotations.csv");
        fs::write(
            &path,
            "type_of_document,year,source_file\nstewards decision,2022,old.txt\n",
        )
        .unwrap();

        let ledger = Ledger::load(&CsvStore::new(path));
        assert!(ledger.is_processed("old.txt"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn store_without_source_column_is_treated_as_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("annotations.csv");
        fs::write(&path, "year,grand_prix\n2023,Monaco\n").unwrap();

        assert!(Ledger::load(&CsvStore::new(path)).is_empty());
    }

    #[test]
    fn non_utf8_header_is_treated_as_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("annotations.csv");
        fs::write(&path, b"\xff\xfe\x00garbage\x80\n\x81,\x82\n").unwrap();

        assert!(Ledger::load(&CsvStore::new(path)).is_empty());
    }

    #[test]
    fn torn_final_row_keeps_complete_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().join("annotations.csv"));
        store.append(&[tagged("a.txt"), tagged("b.txt")]).unwrap();

        let mut text = fs::read_to_string(store.path()).unwrap();
        text.push_str("Stewards decision,2024,Bahr");
        fs::write(store.path(), text).unwrap();

        let ledger = Ledger::load(&store);
        assert_eq!(ledger.len(), 2);
        assert!(ledger.is_processed("a.txt"));
    }

    #[test]
    fn unterminated_quote_keeps_rows_before_it() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().join("annotations.csv"));
        store.append(&[tagged("a.txt"), tagged("b.txt")]).unwrap();

        let mut text = fs::read_to_string(store.path()).unwrap();
        text.push_str("Stewards decision,2023,Monaco,\"Car 1, then car");
        fs::write(store.path(), text).unwrap();

        let ledger = Ledger::load(&store);
        assert!(ledger.is_processed("a.txt"));
        assert!(ledger.is_processed("b.txt"));
    }

    #[test]
    fn append_after_tear_inside_quoted_field() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().join("annotations.csv"));
        store.append(&[tagged("a.txt")]).unwrap();

        let mut text = fs::read_to_string(store.path()).unwrap();
        text.push_str("Stewards decision,2023,Monaco,\"Car 1, then car");
        fs::write(store.path(), text).unwrap();

        store.append(&[tagged("b.txt")]).unwrap();
        store.append(&[tagged("c.txt")]).unwrap();

        let ledger = Ledger::load(&store);
        assert_eq!(ledger.len(), 3);
        for id in ["a.txt", "b.txt", "c.txt"] {
            assert!(ledger.is_processed(id), "{id} missing");
        }
    }
}
