//! Per-source lookup queue
//!
//! Tracks which keys are waiting for a provider and what each settled key
//! resolved to.
//!
//! Queue layout:
//! - index 0: next key to dispatch (possibly already in flight)
//! - index 1: where retry and priority keys are inserted, so they never
//!   displace an in-flight head
//! - rest: FIFO
//!
//! The queue never holds a key twice. Settled keys stay in `results` until
//! [`QueueState::forget`] drops them, so repeated `New` enqueues are no-ops.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use zousho_common::events::SettledAs;

/// How `enqueue` places keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueMode {
    /// Append keys that are neither queued nor settled
    #[default]
    New,
    /// Re-queue keys whose settlement is `RetryPending`
    Retry,
    /// Move unsettled keys right behind the head
    Priority,
}

/// Settled value for a key
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement<V> {
    Found(V),
    NotFound,
    /// Provider rate-limited the lookup; a retry is on its way
    RetryPending,
}

impl<V> Settlement<V> {
    pub fn is_retry_pending(&self) -> bool {
        matches!(self, Self::RetryPending)
    }

    pub fn found(&self) -> Option<&V> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn settled_as(&self) -> SettledAs {
        match self {
            Self::Found(_) => SettledAs::Found,
            Self::NotFound => SettledAs::NotFound,
            Self::RetryPending => SettledAs::RetryPending,
        }
    }
}

/// Pending keys and settled results for one provider
#[derive(Debug, Clone)]
pub struct QueueState<K, V> {
    queue: Vec<K>,
    results: HashMap<K, Settlement<V>>,
}

impl<K, V> Default for QueueState<K, V> {
    fn default() -> Self {
        Self {
            queue: Vec::new(),
            results: HashMap::new(),
        }
    }
}

impl<K, V> QueueState<K, V>
where
    K: Clone + Eq + Hash,
{
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Add keys according to `mode`
    ///
    /// Returns the keys whose position changed (appended, inserted or moved).
    pub fn enqueue<I>(&mut self, keys: I, mode: EnqueueMode) -> Vec<K>
    where
        I: IntoIterator<Item = K>,
    {
        let mut placed = Vec::new();

        for key in keys {
            let changed = match mode {
                EnqueueMode::New => self.enqueue_new(&key),
                EnqueueMode::Retry => self.enqueue_retry(&key),
                EnqueueMode::Priority => self.enqueue_priority(&key),
            };
            if changed {
                placed.push(key);
            }
        }

        placed
    }

    fn enqueue_new(&mut self, key: &K) -> bool {
        if self.is_queued(key) || self.results.contains_key(key) {
            return false;
        }
        self.queue.push(key.clone());
        true
    }

    fn enqueue_retry(&mut self, key: &K) -> bool {
        let retry_pending = self
            .results
            .get(key)
            .is_some_and(Settlement::is_retry_pending);
        if !retry_pending || self.is_queued(key) {
            return false;
        }
        self.insert_behind_head(key.clone());
        true
    }

    fn enqueue_priority(&mut self, key: &K) -> bool {
        if self.results.contains_key(key) || self.queue.first() == Some(key) {
            return false;
        }
        self.queue.retain(|k| k != key);
        self.insert_behind_head(key.clone());
        true
    }

    fn insert_behind_head(&mut self, key: K) {
        let index = self.queue.len().min(1);
        self.queue.insert(index, key);
    }

    /// Commit outcomes for keys that are still queued
    ///
    /// Each committed key is removed from every queue position. Outcomes for
    /// keys no longer queued are dropped, which discards completions that
    /// arrive after a [`forget`](Self::forget).
    ///
    /// Returns the committed keys in outcome order.
    pub fn dequeue<I>(&mut self, outcomes: I) -> Vec<K>
    where
        I: IntoIterator<Item = (K, Settlement<V>)>,
    {
        let mut committed = Vec::new();

        for (key, settlement) in outcomes {
            if !self.is_queued(&key) {
                continue;
            }
            self.results.insert(key.clone(), settlement);
            self.queue.retain(|k| k != &key);
            committed.push(key);
        }

        committed
    }

    /// Drop keys from both the queue and the results
    pub fn forget(&mut self, keys: &[K]) {
        self.queue.retain(|k| !keys.contains(k));
        for key in keys {
            self.results.remove(key);
        }
    }

    /// First `n` queued keys
    pub fn head(&self, n: usize) -> &[K] {
        &self.queue[..self.queue.len().min(n)]
    }

    /// All queued keys in dispatch order
    pub fn queued(&self) -> &[K] {
        &self.queue
    }

    pub fn results(&self) -> &HashMap<K, Settlement<V>> {
        &self.results
    }

    pub fn settlement(&self, key: &K) -> Option<&Settlement<V>> {
        self.results.get(key)
    }

    pub fn is_queued(&self, key: &K) -> bool {
        self.queue.contains(key)
    }

    /// Number of queued keys
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type State = QueueState<&'static str, u32>;

    fn state_with(keys: &[&'static str]) -> State {
        let mut state = State::new();
        state.enqueue(keys.iter().copied(), EnqueueMode::New);
        state
    }

    #[test]
    fn test_new_is_idempotent() {
        let mut state = state_with(&["a", "b"]);
        let placed = state.enqueue(["a", "b", "c", "c"], EnqueueMode::New);

        assert_eq!(placed, vec!["c"]);
        assert_eq!(state.queued(), &["a", "b", "c"]);
    }

    #[test]
    fn test_new_skips_settled_keys() {
        let mut state = state_with(&["a"]);
        state.dequeue([("a", Settlement::Found(1))]);

        assert!(state.enqueue(["a"], EnqueueMode::New).is_empty());
        assert!(state.is_empty());
    }

    #[test]
    fn test_new_skips_retry_pending_keys() {
        let mut state = state_with(&["a"]);
        state.dequeue([("a", Settlement::RetryPending)]);

        assert!(state.enqueue(["a"], EnqueueMode::New).is_empty());
    }

    #[test]
    fn test_dequeue_commits_and_removes() {
        let mut state = state_with(&["a", "b", "c"]);
        let committed = state.dequeue([("b", Settlement::Found(2)), ("c", Settlement::NotFound)]);

        assert_eq!(committed, vec!["b", "c"]);
        assert_eq!(state.queued(), &["a"]);
        assert_eq!(state.settlement(&"b"), Some(&Settlement::Found(2)));
        assert_eq!(state.settlement(&"c"), Some(&Settlement::NotFound));
    }

    #[test]
    fn test_dequeue_drops_unqueued_keys() {
        let mut state = state_with(&["a"]);
        let committed = state.dequeue([("z", Settlement::Found(9))]);

        assert!(committed.is_empty());
        assert!(state.settlement(&"z").is_none());
        assert_eq!(state.queued(), &["a"]);
    }

    #[test]
    fn test_forget_discards_late_completion() {
        let mut state = state_with(&["a", "b"]);
        state.forget(&["a"]);

        assert!(state.dequeue([("a", Settlement::Found(1))]).is_empty());
        assert!(state.settlement(&"a").is_none());
        assert_eq!(state.queued(), &["b"]);
    }

    #[test]
    fn test_retry_inserts_at_index_one() {
        let mut state = state_with(&["r"]);
        state.dequeue([("r", Settlement::RetryPending)]);
        state.enqueue(["a", "b", "c"], EnqueueMode::New);

        let placed = state.enqueue(["r"], EnqueueMode::Retry);

        assert_eq!(placed, vec!["r"]);
        assert_eq!(state.queued(), &["a", "r", "b", "c"]);
    }

    #[test]
    fn test_retry_on_empty_queue_becomes_head() {
        let mut state = state_with(&["r"]);
        state.dequeue([("r", Settlement::RetryPending)]);

        state.enqueue(["r"], EnqueueMode::Retry);
        assert_eq!(state.queued(), &["r"]);
    }

    #[test]
    fn test_retry_ignores_resolved_and_queued_keys() {
        let mut state = state_with(&["done", "r"]);
        state.dequeue([("done", Settlement::Found(1)), ("r", Settlement::RetryPending)]);
        state.enqueue(["x"], EnqueueMode::New);

        assert!(state.enqueue(["done"], EnqueueMode::Retry).is_empty());
        assert!(state.enqueue(["never-seen"], EnqueueMode::Retry).is_empty());

        state.enqueue(["r"], EnqueueMode::Retry);
        assert!(state.enqueue(["r"], EnqueueMode::Retry).is_empty());
        assert_eq!(state.queued(), &["x", "r"]);
    }

    #[test]
    fn test_priority_moves_key_behind_head() {
        let mut state = state_with(&["a", "b", "c", "d"]);
        let placed = state.enqueue(["d", "e"], EnqueueMode::Priority);

        assert_eq!(placed, vec!["d", "e"]);
        assert_eq!(state.queued(), &["a", "e", "d", "b", "c"]);
    }

    #[test]
    fn test_priority_leaves_head_and_settled_alone() {
        let mut state = state_with(&["a", "b", "s"]);
        state.dequeue([("s", Settlement::NotFound)]);

        assert!(state.enqueue(["a", "s"], EnqueueMode::Priority).is_empty());
        assert_eq!(state.queued(), &["a", "b"]);
    }

    #[test]
    fn test_committed_value_replaces_retry_sentinel() {
        let mut state = state_with(&["r"]);
        state.dequeue([("r", Settlement::RetryPending)]);
        state.enqueue(["r"], EnqueueMode::Retry);
        state.dequeue([("r", Settlement::Found(7))]);

        assert_eq!(state.settlement(&"r"), Some(&Settlement::Found(7)));
        assert!(state.is_empty());
    }

    #[test]
    fn test_head_is_bounded() {
        let state = state_with(&["a", "b", "c"]);
        assert_eq!(state.head(2), &["a", "b"]);
        assert_eq!(state.head(10).len(), 3);
        assert!(State::new().head(2).is_empty());
    }
}
