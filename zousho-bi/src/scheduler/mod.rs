//! Per-provider lookup scheduling
//!
//! Each provider gets its own [`LookupScheduler`]: a [`QueueState`] of pending
//! keys plus settled results, drained in small spaced batches by a ticker
//! task. Schedulers never coordinate with one another.

pub mod queue;
pub mod ticker;

pub use queue::{EnqueueMode, QueueState, Settlement};
pub use ticker::{LookupScheduler, SchedulerConfig};

use async_trait::async_trait;

/// What a provider said about one key
///
/// Providers fold every failure into this type; nothing is raised past a
/// [`Fetcher`].
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<V> {
    /// Provider returned data
    Success(V),
    /// Provider confirmed it has no data
    Empty,
    /// Provider asked us to slow down; the key must be retried
    RateLimited,
    /// Network failure or malformed response; settles as no data
    Error(String),
}

impl<V> FetchOutcome<V> {
    /// Queue settlement for this outcome
    ///
    /// Errors are not retried: they settle exactly like `Empty`.
    pub fn into_settlement(self) -> Settlement<V> {
        match self {
            Self::Success(value) => Settlement::Found(value),
            Self::Empty | Self::Error(_) => Settlement::NotFound,
            Self::RateLimited => Settlement::RetryPending,
        }
    }
}

/// Provider lookup function driven by a scheduler
#[async_trait]
pub trait Fetcher<K: Sync, V>: Send + Sync {
    /// Look up a single key
    async fn fetch(&self, key: &K) -> FetchOutcome<V>;
}
