//! Append-only CSV store for annotation records.
//!
//! One file, UTF-8, header row in [`incidents::column_names`] order, one row
//! per record. Rows are only ever appended; nothing is rewritten in place.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use stewards_core::AnnotationRecord;
use stewards_core::incidents;
use tracing::debug;

use crate::StoreError;

/// CSV file holding every annotation recorded so far.
///
/// The store is the single source of truth for what has been processed: the
/// [`Ledger`](crate::Ledger) is derived from it at the start of each run.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the store holds any bytes. A zero-length file counts as absent
    /// so the next append still writes a header.
    pub fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    // ── Write path ──

    /// Append records as complete rows and flush them to disk.
    ///
    /// Every row carries the full column set: fields the record lacks are
    /// written as null, fields outside the schema are dropped. Records must
    /// already be tagged with their source document.
    ///
    /// The rows are serialized in memory first and written with a single
    /// `write_all`, then synced, so a successful return means the rows are
    /// durable and an interrupted call leaves earlier rows untouched.
    pub fn append(&self, records: &[AnnotationRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        if records.iter().any(|r| r.source_document().is_none()) {
            return Err(StoreError::Untagged);
        }

        let write_header = !self.exists();
        let batch = records_to_batch(records)?;

        let mut writer = WriterBuilder::new()
            .with_header(write_header)
            .build(Vec::new());
        writer.write(&batch)?;
        let rows = writer.into_inner();

        let mut buf = Vec::with_capacity(rows.len() + 2);
        // A torn final row from an interrupted run must not absorb our first row.
        if !write_header {
            buf.extend_from_slice(self.tail_repair()?);
        }
        buf.extend_from_slice(&rows);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&buf)?;
        file.sync_data()?;

        debug!(
            path = %self.path.display(),
            rows = records.len(),
            header = write_header,
            "appended annotation rows"
        );
        Ok(records.len())
    }

    /// Bytes that terminate a torn final row.
    ///
    /// Complete CSV always holds an even number of `"` bytes because quotes
    /// inside fields are doubled. An odd count means the last row stopped
    /// inside a quoted field, which must be closed before the row is ended.
    fn tail_repair(&self) -> Result<&'static [u8], StoreError> {
        let mut file = File::open(&self.path)?;
        let mut chunk = [0u8; 8192];
        let mut quotes = 0usize;
        let mut last = None;
        loop {
            let n = file.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            quotes += chunk[..n].iter().filter(|&&b| b == b'"').count();
            last = Some(chunk[n - 1]);
        }

        let open_quote = quotes % 2 == 1;
        let ends_with_newline = last.is_none_or(|b| b == b'\n');
        Ok(match (open_quote, ends_with_newline) {
            (true, _) => &b"\"\n"[..],
            (false, false) => &b"\n"[..],
            (false, true) => &b""[..],
        })
    }

    // ── Read path ──

    /// Column names from the store's header row.
    pub fn read_header(&self) -> Result<Vec<String>, StoreError> {
        if !self.exists() {
            return Err(StoreError::NotFound(self.path.clone()));
        }
        let file = File::open(&self.path)?;
        let (schema, _) = Format::default()
            .with_header(true)
            .infer_schema(file, Some(0))
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let names: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        if names.is_empty() {
            return Err(StoreError::Corrupt("empty header row".into()));
        }
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(StoreError::Corrupt("blank column name in header".into()));
        }
        Ok(names)
    }

    /// Stream a single column as one-column `Utf8` batches of up to
    /// `batch_size` rows.
    ///
    /// Rows with fewer fields than the header (a torn final row) read as
    /// nulls for the missing trailing cells.
    pub fn scan_column(
        &self,
        name: &str,
        batch_size: usize,
    ) -> Result<arrow::csv::Reader<File>, StoreError> {
        let header = self.read_header()?;
        let idx = header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| StoreError::MissingColumn(name.to_string()))?;
        let file = File::open(&self.path)?;
        let reader = ReaderBuilder::new(text_schema(&header))
            .with_header(true)
            .with_truncated_rows(true)
            .with_projection(vec![idx])
            .with_batch_size(batch_size.max(1))
            .build(file)?;
        Ok(reader)
    }

    /// Read every row back as `Utf8` batches, using the store's own header.
    pub fn read_batches(&self) -> Result<Vec<RecordBatch>, StoreError> {
        let header = self.read_header()?;
        let file = File::open(&self.path)?;
        let reader = ReaderBuilder::new(text_schema(&header))
            .with_header(true)
            .with_truncated_rows(true)
            .build(file)?;
        Ok(reader.collect::<Result<Vec<_>, _>>()?)
    }

    /// Read every row back as a record of text cells. Null and empty cells
    /// are omitted from the record.
    pub fn read_records(&self) -> Result<Vec<AnnotationRecord>, StoreError> {
        let mut records = Vec::new();
        for batch in self.read_batches()? {
            let schema = batch.schema();
            let columns: Vec<(&str, &StringArray)> = schema
                .fields()
                .iter()
                .zip(batch.columns())
                .filter_map(|(field, col)| {
                    col.as_any()
                        .downcast_ref::<StringArray>()
                        .map(|arr| (field.name().as_str(), arr))
                })
                .collect();

            for row in 0..batch.num_rows() {
                let mut record = AnnotationRecord::new();
                for (name, arr) in &columns {
                    if let Some(value) = string_at(arr, row) {
                        record.insert(*name, value);
                    }
                }
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// Non-null, non-empty string at `row`.
pub(crate) fn string_at(arr: &StringArray, row: usize) -> Option<&str> {
    if arr.is_null(row) {
        return None;
    }
    let value = arr.value(row);
    (!value.is_empty()).then_some(value)
}

/// All-`Utf8`, all-nullable schema over whatever header the file carries.
fn text_schema(header: &[String]) -> SchemaRef {
    Arc::new(Schema::new(
        header
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ))
}

/// Lay records out in store column order.
fn records_to_batch(records: &[AnnotationRecord]) -> Result<RecordBatch, StoreError> {
    let schema = Arc::new(incidents::incident_schema());
    let columns: Vec<ArrayRef> = incidents::column_names()
        .into_iter()
        .map(|name| {
            let values: StringArray = records.iter().map(|r| r.cell(name)).collect();
            Arc::new(values) as ArrayRef
        })
        .collect();
    Ok(RecordBatch::try_new(schema, columns)?)
}
