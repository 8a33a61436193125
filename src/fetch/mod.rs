//! Content fetching
//!
//! The backend trait, and the coordinator that keeps requests off the tick
//! loop and guards against duplicates and stale answers.

mod backend;
mod coordinator;
#[cfg(test)]
pub(crate) mod testing;

pub use backend::{ContentBackend, FetchError};
pub use coordinator::{FetchCoordinator, FetchOutcome, RequestId, MAX_FOLLOWUPS, MAX_QUESTIONS};
