//! Rate-limited ticker
//!
//! Drains one provider's queue in batches of `batch_size` keys, keeping at
//! least `spacing` between the completion of one batch and the start of the
//! next. Rate-limited keys settle as `RetryPending` and are re-queued (at index
//! 1) after `retry_delay`.
//!
//! Queue state is only touched through the scheduler, and the lock is never
//! held across a fetch or a sleep. An in-flight batch always runs to
//! completion and commits; cancellation is observed between batches.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use zousho_common::config::{SourceSettings, MAX_BATCH_SIZE};
use zousho_common::events::{EventBus, SettledAs, ZoushoEvent};

use super::{EnqueueMode, FetchOutcome, Fetcher, QueueState, Settlement};

/// Ticker configuration for one provider
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Provider name used in logs and events
    pub name: String,
    /// Keys fetched concurrently per batch (1..=2)
    pub batch_size: usize,
    /// Minimum gap between a batch completing and the next one starting
    pub spacing: Duration,
    /// Delay before a rate-limited key goes back into the queue
    pub retry_delay: Duration,
}

impl SchedulerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            batch_size: 1,
            spacing: Duration::from_millis(100),
            retry_delay: Duration::from_millis(500),
        }
    }

    pub fn from_settings(name: impl Into<String>, settings: &SourceSettings) -> Self {
        Self {
            name: name.into(),
            batch_size: settings.batch_size.clamp(1, MAX_BATCH_SIZE),
            spacing: settings.spacing,
            retry_delay: settings.retry_delay,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

/// Enforces the minimum gap between batches
struct BatchSpacer {
    last_completion: Mutex<Option<Instant>>,
    spacing: Duration,
}

impl BatchSpacer {
    fn new(spacing: Duration) -> Self {
        Self {
            last_completion: Mutex::new(None),
            spacing,
        }
    }

    /// Wait out whatever is left of the spacing since the last completion
    async fn wait(&self, source: &str) {
        let last = *self.last_completion.lock().await;

        if let Some(last_time) = last {
            let elapsed = last_time.elapsed();
            if elapsed < self.spacing {
                let wait_time = self.spacing - elapsed;
                trace!(source = %source, "Batch spacing: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }
    }

    async fn mark_complete(&self) {
        *self.last_completion.lock().await = Some(Instant::now());
    }
}

/// Queue plus ticker for one provider
pub struct LookupScheduler<K, V> {
    config: SchedulerConfig,
    state: Mutex<QueueState<K, V>>,
    fetcher: Arc<dyn Fetcher<K, V>>,
    spacer: BatchSpacer,
    wake: Notify,
    cancel: CancellationToken,
    events: Option<EventBus>,
}

impl<K, V> LookupScheduler<K, V>
where
    K: Clone + Eq + Hash + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: SchedulerConfig, fetcher: Arc<dyn Fetcher<K, V>>) -> Self {
        let spacer = BatchSpacer::new(config.spacing);
        Self {
            config,
            state: Mutex::new(QueueState::new()),
            fetcher,
            spacer,
            wake: Notify::new(),
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Publish queue activity on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Stop when `parent` is cancelled (in addition to [`shutdown`](Self::shutdown))
    pub fn with_parent_token(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Add keys to the queue and wake the ticker
    ///
    /// Returns the keys whose queue position changed.
    pub async fn enqueue(&self, keys: Vec<K>, mode: EnqueueMode) -> Vec<K> {
        let placed = self.state.lock().await.enqueue(keys, mode);

        if !placed.is_empty() {
            debug!(
                source = %self.config.name,
                mode = ?mode,
                count = placed.len(),
                "Lookups queued"
            );
            self.emit(ZoushoEvent::LookupQueued {
                source: self.config.name.clone(),
                keys: placed.iter().map(ToString::to_string).collect(),
                timestamp: chrono::Utc::now(),
            });
            self.wake.notify_one();
        }

        placed
    }

    /// Drop keys from queue and results so they can be looked up afresh
    pub async fn forget(&self, keys: &[K]) {
        self.state.lock().await.forget(keys);
    }

    /// Keys the next batch will dispatch
    pub async fn head(&self) -> Vec<K> {
        self.state.lock().await.head(self.config.batch_size).to_vec()
    }

    pub async fn queued(&self) -> Vec<K> {
        self.state.lock().await.queued().to_vec()
    }

    /// Snapshot of every settled key
    pub async fn results(&self) -> HashMap<K, Settlement<V>> {
        self.state.lock().await.results().clone()
    }

    /// Queue length and number of settled keys
    pub async fn counts(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.len(), state.results().len())
    }

    pub async fn settlement(&self, key: &K) -> Option<Settlement<V>> {
        self.state.lock().await.settlement(key).cloned()
    }

    /// True when the key is queued or settled
    pub async fn knows(&self, key: &K) -> bool {
        let state = self.state.lock().await;
        state.is_queued(key) || state.settlement(key).is_some()
    }

    /// Run one batch: fetch the head keys, commit, schedule retries
    ///
    /// Returns how many keys were dispatched (0 when the queue was empty).
    pub async fn run_batch(self: &Arc<Self>) -> usize {
        let batch = self.head().await;
        if batch.is_empty() {
            return 0;
        }

        self.spacer.wait(&self.config.name).await;

        debug!(
            source = %self.config.name,
            keys = %join_keys(&batch),
            "Dispatching batch"
        );

        let outcomes = join_all(batch.iter().map(|key| self.fetcher.fetch(key))).await;
        self.spacer.mark_complete().await;

        let mut settlements = Vec::with_capacity(batch.len());
        let mut kinds = HashMap::with_capacity(batch.len());
        for (key, outcome) in batch.iter().zip(outcomes) {
            if let FetchOutcome::Error(reason) = &outcome {
                warn!(
                    source = %self.config.name,
                    key = %key,
                    error = %reason,
                    "Lookup failed; settling as not found"
                );
            }
            let settlement = outcome.into_settlement();
            kinds.insert(key.clone(), settlement.settled_as());
            settlements.push((key.clone(), settlement));
        }

        let committed = self.state.lock().await.dequeue(settlements);
        if committed.len() < batch.len() {
            debug!(
                source = %self.config.name,
                dropped = batch.len() - committed.len(),
                "Dropped outcomes for keys no longer queued"
            );
        }

        for key in committed {
            let outcome = kinds.get(&key).copied().unwrap_or(SettledAs::NotFound);
            self.emit(ZoushoEvent::LookupSettled {
                source: self.config.name.clone(),
                key: key.to_string(),
                outcome,
                timestamp: chrono::Utc::now(),
            });
            if outcome == SettledAs::RetryPending {
                self.schedule_retry(key);
            }
        }

        batch.len()
    }

    fn schedule_retry(self: &Arc<Self>, key: K) {
        let delay = self.config.retry_delay;
        info!(
            source = %self.config.name,
            key = %key,
            "Rate limited; retrying in {:?}",
            delay
        );
        self.emit(ZoushoEvent::RetryScheduled {
            source: self.config.name.clone(),
            key: key.to_string(),
            delay_ms: delay.as_millis() as u64,
            timestamp: chrono::Utc::now(),
        });

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = scheduler.cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    scheduler.enqueue(vec![key], EnqueueMode::Retry).await;
                }
            }
        });
    }

    /// Start the ticker task
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run().await })
    }

    async fn run(self: Arc<Self>) {
        info!(
            source = %self.config.name,
            batch_size = self.config.batch_size,
            spacing_ms = self.config.spacing.as_millis() as u64,
            "Lookup ticker started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if self.run_batch().await > 0 {
                continue;
            }

            // Queue empty: park until an enqueue or shutdown
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.wake.notified() => {}
            }
        }

        info!(source = %self.config.name, "Lookup ticker stopped");
    }

    /// Stop the ticker after the current batch
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn emit(&self, event: ZoushoEvent) {
        if let Some(events) = &self.events {
            events.emit_lossy(event);
        }
    }
}

fn join_keys<K: Display>(keys: &[K]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
