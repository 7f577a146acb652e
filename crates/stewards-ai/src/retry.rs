//! Bounded retry around one extract-then-normalize attempt.

use std::time::Duration;

use stewards_core::{AnnotationRecord, Document};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::extractor::{Extractor, ExtractorError};
use crate::normalize::{MalformedOutput, normalize};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_COOLDOWN: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per document, first one included. Never below 1.
    pub max_attempts: u32,
    /// Wait between a failed attempt and the next one.
    pub cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cooldown: DEFAULT_RETRY_COOLDOWN,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            cooldown,
        }
    }
}

/// Why a single attempt failed. Both kinds are retried.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("extractor unavailable: {0}")]
    Unavailable(#[from] ExtractorError),
    #[error(transparent)]
    Malformed(#[from] MalformedOutput),
}

/// Result of annotating one document.
#[derive(Debug)]
pub enum Outcome {
    /// An attempt produced parseable output (possibly zero records).
    Succeeded {
        records: Vec<AnnotationRecord>,
        attempts: u32,
    },
    /// Every attempt failed; the document should be retried on a later run.
    Exhausted {
        attempts: u32,
        last_error: AttemptError,
    },
}

impl Outcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Records from a successful attempt; empty when exhausted.
    pub fn into_records(self) -> Vec<AnnotationRecord> {
        match self {
            Self::Succeeded { records, .. } => records,
            Self::Exhausted { .. } => Vec::new(),
        }
    }
}

/// Runs documents through an [`Extractor`] and [`normalize`] under a
/// [`RetryPolicy`].
///
/// Failures never escape [`annotate`](Self::annotate): they end in
/// [`Outcome::Exhausted`] so one bad document cannot stop a batch.
pub struct Annotator<E> {
    extractor: E,
    policy: RetryPolicy,
}

impl<E: Extractor> Annotator<E> {
    pub fn new(extractor: E, policy: RetryPolicy) -> Self {
        Self { extractor, policy }
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// One extractor call followed by normalisation, no retry.
    pub async fn attempt(&self, document: &Document) -> Result<Vec<AnnotationRecord>, AttemptError> {
        let raw = self.extractor.extract(&document.text).await?;
        Ok(normalize(&raw)?)
    }

    pub async fn annotate(&self, document: &Document) -> Outcome {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match self.attempt(document).await {
                Ok(records) => {
                    debug!(
                        document = %document.id,
                        attempt,
                        records = records.len(),
                        "annotation attempt succeeded"
                    );
                    return Outcome::Succeeded {
                        records,
                        attempts: attempt,
                    };
                }
                Err(err) => err,
            };

            match &err {
                AttemptError::Malformed(malformed) => warn!(
                    document = %document.id,
                    attempt,
                    max_attempts,
                    reason = %malformed.reason,
                    preview = %malformed.preview,
                    "model output was not valid incident JSON"
                ),
                AttemptError::Unavailable(e) => warn!(
                    document = %document.id,
                    attempt,
                    max_attempts,
                    error = %e,
                    model = %self.extractor.model(),
                    "extractor call failed"
                ),
            }

            if attempt >= max_attempts {
                error!(
                    document = %document.id,
                    attempts = attempt,
                    error = %err,
                    "all annotation attempts failed"
                );
                return Outcome::Exhausted {
                    attempts: attempt,
                    last_error: err,
                };
            }

            tokio::time::sleep(self.policy.cooldown).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    enum Step {
        Down,
        Reply(&'static str),
    }

    /// Plays back a fixed script of replies, then keeps failing.
    struct ScriptedExtractor {
        script: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
    }

    impl ScriptedExtractor {
        fn new(script: Vec<Step>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Extractor for ScriptedExtractor {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn extract(&self, _document_text: &str) -> Result<String, ExtractorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop_front() {
                Some(Step::Reply(text)) => Ok(text.to_string()),
                Some(Step::Down) | None => Err(ExtractorError::Backend {
                    status: 503,
                    body: "unavailable".into(),
                }),
            }
        }
    }

    fn annotator(script: Vec<Step>, max_attempts: u32) -> Annotator<ScriptedExtractor> {
        Annotator::new(
            ScriptedExtractor::new(script),
            RetryPolicy::new(max_attempts, Duration::ZERO),
        )
    }

    fn doc() -> Document {
        Document::new("abc.txt", "Car 1 and Car 11 collided at Turn 1.")
    }

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.cooldown, Duration::from_secs(10));
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn first_attempt_succeeds() {
        let annotator = annotator(vec![Step::Reply(r#"{"grand_prix":"Monaco","year":2023}"#)], 3);
        let outcome = annotator.annotate(&doc()).await;
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(annotator.extractor().calls(), 1);
        let records = outcome.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cell("grand_prix").as_deref(), Some("Monaco"));
    }

    #[tokio::test]
    async fn two_failures_then_success() {
        let annotator = annotator(
            vec![Step::Down, Step::Down, Step::Reply(r#"[{"year":2023},{"year":2023}]"#)],
            3,
        );
        let outcome = annotator.annotate(&doc()).await;
        assert!(!outcome.is_exhausted());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(outcome.into_records().len(), 2);
    }

    #[tokio::test]
    async fn all_attempts_fail() {
        let annotator = annotator(vec![Step::Down, Step::Down, Step::Down], 3);
        let outcome = annotator.annotate(&doc()).await;
        assert!(matches!(
            outcome,
            Outcome::Exhausted {
                attempts: 3,
                last_error: AttemptError::Unavailable(_)
            }
        ));
        assert_eq!(annotator.extractor().calls(), 3);
        assert!(outcome.into_records().is_empty());
    }

    #[tokio::test]
    async fn malformed_output_is_retried_up_to_limit() {
        let annotator = annotator(
            vec![
                Step::Reply("not json"),
                Step::Reply("[{\"year\": 20"),
                Step::Reply("Sorry, I cannot help with that."),
                Step::Reply(r#"{"year":2023}"#),
            ],
            3,
        );
        let outcome = annotator.annotate(&doc()).await;
        assert!(matches!(
            outcome,
            Outcome::Exhausted {
                last_error: AttemptError::Malformed(_),
                ..
            }
        ));
        assert_eq!(annotator.extractor().calls(), 3);
    }

    #[tokio::test]
    async fn malformed_then_valid() {
        let annotator = annotator(
            vec![Step::Reply("```json\n[{\"year\":"), Step::Reply("```json\n[{\"year\":2022}]\n```")],
            3,
        );
        let outcome = annotator.annotate(&doc()).await;
        assert_eq!(outcome.attempts(), 2);
        assert_eq!(outcome.into_records()[0].cell("year").as_deref(), Some("2022"));
    }

    #[tokio::test]
    async fn empty_array_is_success_without_retry() {
        let annotator = annotator(vec![Step::Reply("[]"), Step::Reply(r#"{"year":1}"#)], 3);
        let outcome = annotator.annotate(&doc()).await;
        assert!(!outcome.is_exhausted());
        assert_eq!(annotator.extractor().calls(), 1);
        assert!(outcome.into_records().is_empty());
    }

    #[tokio::test]
    async fn single_attempt_policy_calls_once() {
        let annotator = annotator(vec![Step::Down, Step::Reply("{}")], 1);
        let outcome = annotator.annotate(&doc()).await;
        assert!(outcome.is_exhausted());
        assert_eq!(annotator.extractor().calls(), 1);
    }

    #[tokio::test]
    async fn cooldown_between_attempts_only() {
        let cooldown = Duration::from_millis(30);
        let annotator = Annotator::new(
            ScriptedExtractor::new(vec![Step::Down, Step::Down, Step::Down]),
            RetryPolicy::new(3, cooldown),
        );
        let start = Instant::now();
        annotator.annotate(&doc()).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= cooldown * 2, "slept {elapsed:?}");
        assert!(elapsed < cooldown * 3, "slept after the last attempt: {elapsed:?}");
    }
}
