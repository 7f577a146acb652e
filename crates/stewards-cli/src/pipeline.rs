//! Annotation pipeline: input directory → model → CSV store.
//!
//! Documents are handled one at a time:
//!
//! ```text
//! Pending ─► InProgress ─┬─► Recorded      rows appended; skipped by later runs
//!                        ├─► SkippedEmpty  no rows; eligible again next run
//!                        └─► Deferred      unreadable or unwritable; eligible again next run
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use stewards_ai::{Annotator, Extractor};
use stewards_core::Document;
use stewards_store::{CsvStore, Ledger};
use tracing::{debug, error, info, warn};

pub const DEFAULT_INTER_DOCUMENT_COOLDOWN: Duration = Duration::from_secs(20);

const DOCUMENT_EXTENSION: &str = "txt";

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Fixed pause between consecutive model-invoking documents.
    pub inter_document_cooldown: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inter_document_cooldown: DEFAULT_INTER_DOCUMENT_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Pending,
    InProgress,
    Recorded,
    SkippedEmpty,
    Deferred,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Recorded => "recorded",
            Self::SkippedEmpty => "skipped_empty",
            Self::Deferred => "deferred",
        }
    }
}

/// Counts for one run, plus the final state of every document it touched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub candidates: usize,
    pub already_processed: usize,
    pub recorded: usize,
    pub skipped_empty: usize,
    pub deferred: usize,
    pub rows_written: usize,
    pub states: Vec<(String, DocumentState)>,
}

impl RunSummary {
    fn finish(&mut self, id: String, state: DocumentState) {
        match state {
            DocumentState::Recorded => self.recorded += 1,
            DocumentState::SkippedEmpty => self.skipped_empty += 1,
            DocumentState::Deferred => self.deferred += 1,
            DocumentState::Pending | DocumentState::InProgress => {}
        }
        self.states.push((id, state));
    }

    #[cfg(test)]
    pub fn state_of(&self, id: &str) -> Option<DocumentState> {
        self.states
            .iter()
            .find(|(doc, _)| doc == id)
            .map(|(_, state)| *state)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Candidates:        {}", self.candidates)?;
        writeln!(f, "Already recorded:  {}", self.already_processed)?;
        writeln!(f, "Recorded:          {} ({} rows)", self.recorded, self.rows_written)?;
        writeln!(f, "Skipped (empty):   {}", self.skipped_empty)?;
        write!(f, "Deferred (errors): {}", self.deferred)
    }
}

/// Candidate documents split by what the store already holds.
#[derive(Debug)]
pub struct Plan {
    pub candidates: usize,
    pub already_processed: usize,
    pub pending: Vec<PathBuf>,
}

/// Every `.txt` file directly inside `dir`, sorted by file name.
pub fn discover_documents(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_document = entry.file_type()?.is_file()
            && path.extension().is_some_and(|ext| ext == DOCUMENT_EXTENSION);
        if is_document {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// A document's identifier: its file name.
pub fn document_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Enumerate candidates and drop those the ledger already holds.
///
/// The ledger is read once here; nothing during the run updates it.
pub fn plan(store: &CsvStore, input_dir: &Path) -> anyhow::Result<Plan> {
    let candidates = discover_documents(input_dir)
        .with_context(|| format!("listing documents in {}", input_dir.display()))?;
    let ledger = Ledger::load(store);
    debug!(
        recorded = ledger.already_processed().len(),
        "documents with rows in the store"
    );

    let total = candidates.len();
    let pending: Vec<PathBuf> = candidates
        .into_iter()
        .filter(|path| !ledger.is_processed(&document_id(path)))
        .collect();

    Ok(Plan {
        candidates: total,
        already_processed: total - pending.len(),
        pending,
    })
}

/// Annotate every pending document under `input_dir` and append the results.
///
/// Only failing to list `input_dir` is an error. Per-document failures are
/// logged and leave that document eligible for the next run.
pub async fn run<E: Extractor>(
    store: &CsvStore,
    annotator: &Annotator<E>,
    input_dir: &Path,
    config: &PipelineConfig,
) -> anyhow::Result<RunSummary> {
    let plan = plan(store, input_dir)?;
    let mut summary = RunSummary {
        candidates: plan.candidates,
        already_processed: plan.already_processed,
        ..Default::default()
    };

    if plan.pending.is_empty() {
        info!(candidates = plan.candidates, "no new documents to annotate");
        return Ok(summary);
    }

    let total = plan.pending.len();
    info!(
        pending = total,
        already_processed = plan.already_processed,
        model = %annotator.extractor().model(),
        "starting annotation run"
    );

    for path in &plan.pending {
        debug!(document = %document_id(path), state = DocumentState::Pending.as_str(), "queued");
    }

    let mut model_called = false;
    for (i, path) in plan.pending.iter().enumerate() {
        let id = document_id(path);
        info!(document = %id, index = i + 1, total, "processing document");

        let text = match fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(document = %id, error = %e, "could not read document, deferring");
                summary.finish(id, DocumentState::Deferred);
                continue;
            }
        };

        if model_called && !config.inter_document_cooldown.is_zero() {
            debug!(secs = config.inter_document_cooldown.as_secs_f64(), "cooling down");
            tokio::time::sleep(config.inter_document_cooldown).await;
        }
        model_called = true;

        let document = Document::new(id, text);
        debug!(document = %document.id, state = DocumentState::InProgress.as_str(), "annotating");
        let state = process_one(store, annotator, &document, &mut summary.rows_written).await;
        summary.finish(document.id, state);
    }

    info!(
        recorded = summary.recorded,
        skipped_empty = summary.skipped_empty,
        deferred = summary.deferred,
        rows = summary.rows_written,
        candidates = summary.candidates,
        "annotation run complete"
    );
    Ok(summary)
}

async fn process_one<E: Extractor>(
    store: &CsvStore,
    annotator: &Annotator<E>,
    document: &Document,
    rows_written: &mut usize,
) -> DocumentState {
    let mut records = annotator.annotate(document).await.into_records();
    if records.is_empty() {
        warn!(
            document = %document.id,
            "no annotations produced, document stays pending"
        );
        return DocumentState::SkippedEmpty;
    }

    for record in &mut records {
        record.tag_source(&document.id);
    }

    match store.append(&records) {
        Ok(rows) => {
            *rows_written += rows;
            info!(document = %document.id, rows, "saved annotations");
            DocumentState::Recorded
        }
        Err(e) => {
            error!(
                document = %document.id,
                path = %store.path().display(),
                error = %e,
                "failed to write annotations, deferring document"
            );
            DocumentState::Deferred
        }
    }
}
