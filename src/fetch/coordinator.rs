//! External fetch coordinator
//!
//! Spawns content requests off the tick loop and reports back through an
//! unbounded channel. Every request carries a [`RequestId`]; the engine only
//! applies outcomes whose id is still current.
//!
//! An explanation request runs as one task:
//!
//! 1. explanation (blocking overlay while outstanding)
//! 2. follow-ups, only if the explanation succeeded (non-blocking)
//! 3. `Settled`, always, from a drop guard
//!
//! Step 3 is what guarantees loading flags clear even if the task dies.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::backend::{ContentBackend, FetchError};

/// Identity of one content request
pub type RequestId = u64;

/// Questions kept from a questions response
pub const MAX_QUESTIONS: usize = 5;
/// Follow-ups kept from a follow-up response
pub const MAX_FOLLOWUPS: usize = 2;

/// Messages sent from request tasks back to the engine
#[derive(Debug)]
pub enum FetchOutcome {
    Questions {
        id: RequestId,
        result: Result<Vec<String>, FetchError>,
    },
    Explanation {
        id: RequestId,
        question: String,
        result: Result<String, FetchError>,
    },
    FollowUps {
        id: RequestId,
        result: Result<Vec<String>, FetchError>,
    },
    /// The request task finished, whatever happened
    Settled { id: RequestId },
}

/// Sends `Settled` when the owning task ends, including by panic or abort
struct SettleGuard {
    id: RequestId,
    tx: mpsc::UnboundedSender<FetchOutcome>,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(FetchOutcome::Settled { id: self.id });
    }
}

/// Issues content requests with at most one explanation in flight
pub struct FetchCoordinator {
    backend: Arc<dyn ContentBackend>,
    tx: mpsc::UnboundedSender<FetchOutcome>,
    next_id: RequestId,
    explain_in_flight: Option<RequestId>,
    questions_in_flight: Option<RequestId>,
}

impl FetchCoordinator {
    pub fn new(backend: Arc<dyn ContentBackend>, tx: mpsc::UnboundedSender<FetchOutcome>) -> Self {
        Self {
            backend,
            tx,
            next_id: 1,
            explain_in_flight: None,
            questions_in_flight: None,
        }
    }

    fn allocate_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn explanation_in_flight(&self) -> Option<RequestId> {
        self.explain_in_flight
    }

    pub fn questions_in_flight(&self) -> Option<RequestId> {
        self.questions_in_flight
    }

    /// Fetch questions for a new prompt
    ///
    /// A newer prompt supersedes an older one, so this never refuses.
    pub fn request_questions(&mut self, prompt: String) -> RequestId {
        let id = self.allocate_id();
        self.questions_in_flight = Some(id);
        info!(id, prompt_len = prompt.len(), "requesting questions");

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _guard = SettleGuard { id, tx: tx.clone() };
            let result = backend
                .questions(&prompt)
                .await
                .map(|qs| tidy(qs, MAX_QUESTIONS));
            let _ = tx.send(FetchOutcome::Questions { id, result });
        });

        id
    }

    /// Fetch an explanation, then follow-ups, for `question`
    ///
    /// Returns `None` without doing anything if an explanation is already in
    /// flight; rapid re-triggers collapse onto the first request.
    pub fn request_explanation(&mut self, prompt: String, question: String) -> Option<RequestId> {
        if let Some(current) = self.explain_in_flight {
            warn!(current, "explanation already in flight, ignoring trigger");
            return None;
        }

        let id = self.allocate_id();
        self.explain_in_flight = Some(id);
        info!(id, %question, "requesting explanation");

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _guard = SettleGuard { id, tx: tx.clone() };

            let result = backend
                .explanation(&prompt, &question)
                .await
                .map(|text| text.trim().to_string());
            let explanation = result.as_ref().ok().cloned();
            let _ = tx.send(FetchOutcome::Explanation {
                id,
                question: question.clone(),
                result,
            });

            let Some(explanation) = explanation else {
                return;
            };

            let result = backend
                .followups(&prompt, &question, &explanation)
                .await
                .map(|fs| tidy(fs, MAX_FOLLOWUPS));
            let _ = tx.send(FetchOutcome::FollowUps { id, result });
        });

        Some(id)
    }

    /// Release the explanation guard once its blocking phase is over
    pub fn explanation_done(&mut self, id: RequestId) {
        if self.explain_in_flight == Some(id) {
            self.explain_in_flight = None;
        }
    }

    /// A request task finished
    pub fn settle(&mut self, id: RequestId) {
        self.explanation_done(id);
        if self.questions_in_flight == Some(id) {
            self.questions_in_flight = None;
        }
    }

    /// Forget outstanding requests; their late outcomes will not match
    pub fn invalidate(&mut self) {
        if self.explain_in_flight.is_some() || self.questions_in_flight.is_some() {
            debug!("dropping outstanding content requests");
        }
        self.explain_in_flight = None;
        self.questions_in_flight = None;
    }
}

/// Trim, drop blanks, and cap the length of a backend list
fn tidy(items: Vec<String>, max: usize) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::FakeContent;

    fn coordinator(fake: FakeContent) -> (FetchCoordinator, mpsc::UnboundedReceiver<FetchOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (FetchCoordinator::new(Arc::new(fake), tx), rx)
    }

    #[test]
    fn test_tidy_caps_and_cleans() {
        let raw = vec![" a ".into(), "".into(), "b".into(), "   ".into(), "c".into()];
        assert_eq!(tidy(raw, 2), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_explanation_then_followups_then_settled() {
        let (mut coord, mut rx) = coordinator(FakeContent::default());
        let id = coord
            .request_explanation("ctx".into(), "What is a vector?".into())
            .unwrap();

        match rx.recv().await.unwrap() {
            FetchOutcome::Explanation { id: got, question, result } => {
                assert_eq!(got, id);
                assert_eq!(question, "What is a vector?");
                assert_eq!(result.unwrap(), "Explained: What is a vector?");
            }
            other => panic!("unexpected {other:?}"),
        }
        match rx.recv().await.unwrap() {
            FetchOutcome::FollowUps { result, .. } => assert_eq!(result.unwrap().len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(rx.recv().await.unwrap(), FetchOutcome::Settled { id: got } if got == id));
    }

    #[tokio::test]
    async fn test_second_trigger_while_in_flight_is_ignored() {
        let (mut coord, _rx) = coordinator(FakeContent::default());
        let first = coord.request_explanation("ctx".into(), "q1".into());
        assert!(first.is_some());
        assert!(coord.request_explanation("ctx".into(), "q2".into()).is_none());

        coord.explanation_done(first.unwrap());
        assert!(coord.request_explanation("ctx".into(), "q3".into()).is_some());
    }

    #[tokio::test]
    async fn test_failed_explanation_skips_followups() {
        let fake = FakeContent {
            fail_explanation: Some("model offline".into()),
            ..FakeContent::default()
        };
        let (mut coord, mut rx) = coordinator(fake);
        let id = coord.request_explanation("ctx".into(), "q".into()).unwrap();

        match rx.recv().await.unwrap() {
            FetchOutcome::Explanation { result, .. } => {
                assert_eq!(result.unwrap_err().to_string(), "model offline");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(rx.recv().await.unwrap(), FetchOutcome::Settled { id: got } if got == id));
    }

    #[tokio::test]
    async fn test_questions_are_capped() {
        let fake = FakeContent {
            questions: (0..8).map(|i| format!("q{i}")).collect(),
            ..FakeContent::default()
        };
        let (mut coord, mut rx) = coordinator(fake);
        let id = coord.request_questions("ctx".into());
        assert_eq!(coord.questions_in_flight(), Some(id));

        match rx.recv().await.unwrap() {
            FetchOutcome::Questions { result, .. } => {
                assert_eq!(result.unwrap().len(), MAX_QUESTIONS)
            }
            other => panic!("unexpected {other:?}"),
        }
        coord.settle(id);
        assert_eq!(coord.questions_in_flight(), None);
    }

    #[tokio::test]
    async fn test_invalidate_allows_new_trigger() {
        let (mut coord, _rx) = coordinator(FakeContent::default());
        let first = coord.request_explanation("ctx".into(), "q1".into()).unwrap();
        coord.invalidate();
        let second = coord.request_explanation("ctx".into(), "q2".into()).unwrap();
        assert!(second > first);

        // a late settle for the stale id must not release the new guard
        coord.settle(first);
        assert_eq!(coord.explanation_in_flight(), Some(second));
    }
}
