//! In-memory content backend for tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::backend::{ContentBackend, FetchError};

#[derive(Debug, Default)]
pub struct FakeContent {
    pub questions: Vec<String>,
    /// Defaults to two canned follow-ups derived from the question
    pub followups: Option<Vec<String>>,
    pub fail_questions: Option<String>,
    pub fail_explanation: Option<String>,
    pub fail_followups: Option<String>,
    /// When set, explanations wait for a permit before answering
    pub release: Option<Arc<Notify>>,
    pub explanation_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ContentBackend for FakeContent {
    async fn questions(&self, _prompt: &str) -> Result<Vec<String>, FetchError> {
        if let Some(msg) = &self.fail_questions {
            return Err(FetchError::Backend(msg.clone()));
        }
        Ok(self.questions.clone())
    }

    async fn explanation(&self, _prompt: &str, question: &str) -> Result<String, FetchError> {
        self.explanation_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(release) = &self.release {
            release.notified().await;
        }
        if let Some(msg) = &self.fail_explanation {
            return Err(FetchError::Backend(msg.clone()));
        }
        Ok(format!("Explained: {question}"))
    }

    async fn followups(
        &self,
        _prompt: &str,
        question: &str,
        _explanation: &str,
    ) -> Result<Vec<String>, FetchError> {
        if let Some(msg) = &self.fail_followups {
            return Err(FetchError::Backend(msg.clone()));
        }
        Ok(self
            .followups
            .clone()
            .unwrap_or_else(|| vec![format!("Why {question}?"), format!("Example of {question}?")]))
    }
}
