//! Content backend seam

use async_trait::async_trait;

use crate::http::HttpError;

/// A content request that did not produce usable data
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("{0}")]
    Backend(String),
}

/// Generates questions, explanations and follow-ups for a transcript
#[async_trait]
pub trait ContentBackend: Send + Sync {
    async fn questions(&self, prompt: &str) -> Result<Vec<String>, FetchError>;

    async fn explanation(&self, prompt: &str, question: &str) -> Result<String, FetchError>;

    async fn followups(
        &self,
        prompt: &str,
        question: &str,
        explanation: &str,
    ) -> Result<Vec<String>, FetchError>;
}
