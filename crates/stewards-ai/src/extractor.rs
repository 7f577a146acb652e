//! The model-call boundary.

use async_trait::async_trait;
use thiserror::Error;

/// Backend or network failure. Every variant is worth retrying.
#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Backend { status: u16, body: String },
    #[error("backend returned no text")]
    EmptyResponse,
    #[error("no API key configured")]
    MissingApiKey,
}

/// One outbound call to a generative model per [`extract`](Extractor::extract).
///
/// Implementations never retry; [`Annotator`](crate::Annotator) owns that.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Model identifier, for logs.
    fn model(&self) -> &str;

    /// Send the instruction template filled with `document_text` and return
    /// the model's raw answer.
    async fn extract(&self, document_text: &str) -> Result<String, ExtractorError>;
}

#[async_trait]
impl<E: Extractor + ?Sized> Extractor for Box<E> {
    fn model(&self) -> &str {
        (**self).model()
    }

    async fn extract(&self, document_text: &str) -> Result<String, ExtractorError> {
        (**self).extract(document_text).await
    }
}

/// Trim a base URL the way users type it (`http://host:port/`).
pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Read an error body without masking the status if the body is unreadable.
pub(crate) async fn backend_error(resp: reqwest::Response) -> ExtractorError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ExtractorError::Backend { status, body }
}
