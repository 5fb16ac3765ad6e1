//! Shared test fixtures: scripted in-memory fetchers and record builders
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use zousho_bi::scheduler::{FetchOutcome, Fetcher};
use zousho_common::{BookRecord, Isbn};

/// Fetcher answering from a per-key script; falls back to `Empty`
pub struct ScriptedFetcher<K, V> {
    script: Mutex<HashMap<K, VecDeque<FetchOutcome<V>>>>,
    calls: Mutex<Vec<K>>,
}

impl<K, V> ScriptedFetcher<K, V>
where
    K: Clone + Eq + std::hash::Hash,
{
    pub fn new() -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer the next fetches of `key` with `outcomes`, in order
    pub fn script(self, key: K, outcomes: Vec<FetchOutcome<V>>) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(key, outcomes.into_iter().collect());
        self
    }

    pub fn calls(&self) -> Vec<K> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, key: &K) -> usize {
        self.calls.lock().unwrap().iter().filter(|k| *k == key).count()
    }
}

#[async_trait]
impl<K, V> Fetcher<K, V> for ScriptedFetcher<K, V>
where
    K: Clone + Eq + std::hash::Hash + Send + Sync,
    V: Send + Sync,
{
    async fn fetch(&self, key: &K) -> FetchOutcome<V> {
        self.calls.lock().unwrap().push(key.clone());
        self.script
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(VecDeque::pop_front)
            .unwrap_or(FetchOutcome::Empty)
    }
}

pub fn isbn(raw: &str) -> Isbn {
    Isbn::parse(raw).unwrap()
}

pub fn titled(isbn_raw: &str, title: &str) -> BookRecord {
    BookRecord {
        isbn: Some(isbn(isbn_raw)),
        title: Some(title.to_string()),
        ..BookRecord::new(isbn_raw)
    }
}

pub fn volume(title: &str, volume: &str) -> BookRecord {
    BookRecord {
        title: Some(title.to_string()),
        volume: Some(volume.to_string()),
        ..BookRecord::new(format!("{}-{}", title, volume))
    }
}

/// Poll `check` every 10ms until it holds or `timeout` passes
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}
