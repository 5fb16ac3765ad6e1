//! Book lookup service
//!
//! Owns one [`LookupScheduler`] per enabled provider plus an optional series
//! search scheduler. ISBNs are fanned out to every provider; reads merge the
//! per-provider settlements on demand.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use zousho_common::events::EventBus;
use zousho_common::{BookRecord, Isbn};

use super::metadata_merger::{resolve_lookup, LookupState};
use crate::config::ResolvedSources;
use crate::scheduler::{EnqueueMode, Fetcher, LookupScheduler, SchedulerConfig, Settlement};
use crate::series::{group_by_volume, SeriesGroup};
use crate::sources::{GoogleBooksClient, OpenBdClient, RakutenBooksClient, SourceError, SourceId};

type IsbnScheduler = LookupScheduler<Isbn, BookRecord>;
type SeriesScheduler = LookupScheduler<String, Vec<BookRecord>>;

/// Queue summary for one provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub source: String,
    /// Keys the next batch will dispatch
    pub head: Vec<String>,
    pub queued: usize,
    pub settled: usize,
}

/// Where a series search stands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SeriesSearchState {
    Pending { retrying: bool },
    Grouped { groups: Vec<SeriesGroup> },
}

/// Per-provider schedulers behind one lookup surface
pub struct BookLookupService {
    sources: Vec<(SourceId, Arc<IsbnScheduler>)>,
    series: Option<Arc<SeriesScheduler>>,
    events: EventBus,
    cancel: CancellationToken,
}

impl BookLookupService {
    /// Service with no providers; add them with [`with_source`](Self::with_source)
    pub fn new(events: EventBus) -> Self {
        Self {
            sources: Vec::new(),
            series: None,
            events,
            cancel: CancellationToken::new(),
        }
    }

    /// Register a provider; providers are consulted in registration order
    pub fn with_source(
        mut self,
        source: SourceId,
        config: SchedulerConfig,
        fetcher: Arc<dyn Fetcher<Isbn, BookRecord>>,
    ) -> Self {
        let scheduler = LookupScheduler::new(config, fetcher)
            .with_events(self.events.clone())
            .with_parent_token(&self.cancel);
        self.sources.push((source, Arc::new(scheduler)));
        self
    }

    /// Register the series title search provider
    pub fn with_series_search(
        mut self,
        config: SchedulerConfig,
        fetcher: Arc<dyn Fetcher<String, Vec<BookRecord>>>,
    ) -> Self {
        let scheduler = LookupScheduler::new(config, fetcher)
            .with_events(self.events.clone())
            .with_parent_token(&self.cancel);
        self.series = Some(Arc::new(scheduler));
        self
    }

    /// Build HTTP clients for every enabled provider
    pub fn from_settings(sources: &ResolvedSources, events: EventBus) -> Result<Self, SourceError> {
        let mut service = Self::new(events);

        for source in sources.enabled() {
            let settings = sources.get(source);
            let config = SchedulerConfig::from_settings(source.name(), settings);
            service = match source {
                SourceId::OpenBd => {
                    service.with_source(source, config, Arc::new(OpenBdClient::new(settings)?))
                }
                SourceId::Rakuten => {
                    // enabled() only yields Rakuten when a key resolved
                    let Some(app_id) = settings.api_key.clone() else {
                        continue;
                    };
                    let client = RakutenBooksClient::new(settings, app_id)?;
                    service.with_source(source, config, Arc::new(client))
                }
                SourceId::GoogleBooks => {
                    let client = Arc::new(GoogleBooksClient::new(settings)?);
                    let series_config = SchedulerConfig::from_settings("google_books_series", settings)
                        .with_batch_size(1);
                    service
                        .with_source(source, config, client.clone())
                        .with_series_search(series_config, client)
                }
            };
        }

        info!(
            providers = %service.source_names().join(","),
            series_search = service.series.is_some(),
            "Lookup service configured"
        );
        Ok(service)
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|(_, s)| s.name()).collect()
    }

    /// Spawn every ticker
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let mut handles: Vec<JoinHandle<()>> =
            self.sources.iter().map(|(_, s)| s.spawn()).collect();
        if let Some(series) = &self.series {
            handles.push(series.spawn());
        }
        handles
    }

    /// Stop every ticker after its current batch
    pub fn shutdown(&self) {
        info!("Stopping lookup tickers");
        self.cancel.cancel();
    }

    /// Queue ISBNs with every provider
    ///
    /// Returns the ISBNs that changed position in at least one provider queue,
    /// in input order.
    pub async fn enqueue(&self, isbns: &[Isbn], mode: EnqueueMode) -> Vec<Isbn> {
        let mut placed: HashSet<Isbn> = HashSet::new();
        for (_, scheduler) in &self.sources {
            placed.extend(scheduler.enqueue(isbns.to_vec(), mode).await);
        }
        isbns
            .iter()
            .filter(|isbn| placed.contains(*isbn))
            .cloned()
            .collect()
    }

    /// Merged state; `None` when no provider has seen the ISBN
    pub async fn lookup_state(&self, isbn: &Isbn) -> Option<LookupState> {
        let mut settlements: Vec<(SourceId, Option<Settlement<BookRecord>>)> = Vec::new();
        for (source, scheduler) in &self.sources {
            if scheduler.knows(isbn).await {
                settlements.push((*source, scheduler.settlement(isbn).await));
            }
        }
        if settlements.is_empty() {
            return None;
        }
        Some(resolve_lookup(isbn, &settlements))
    }

    pub async fn queue_snapshots(&self) -> Vec<QueueSnapshot> {
        let mut snapshots = Vec::with_capacity(self.sources.len() + 1);
        for (_, scheduler) in &self.sources {
            snapshots.push(snapshot(scheduler).await);
        }
        if let Some(series) = &self.series {
            snapshots.push(snapshot(series).await);
        }
        snapshots
    }

    /// Queue a series title search; false when no provider supports it
    pub async fn search_series(&self, query: &str) -> bool {
        let Some(series) = &self.series else {
            return false;
        };
        series
            .enqueue(vec![query.trim().to_string()], EnqueueMode::New)
            .await;
        true
    }

    /// Grouped volumes for a search; `None` when the query was never submitted
    pub async fn series_groups(&self, query: &str) -> Option<SeriesSearchState> {
        let series = self.series.as_ref()?;
        let key = query.trim().to_string();
        if !series.knows(&key).await {
            return None;
        }
        let state = match series.settlement(&key).await {
            None => SeriesSearchState::Pending { retrying: false },
            Some(Settlement::RetryPending) => SeriesSearchState::Pending { retrying: true },
            Some(Settlement::NotFound) => SeriesSearchState::Grouped { groups: Vec::new() },
            Some(Settlement::Found(records)) => SeriesSearchState::Grouped {
                groups: group_by_volume(&records),
            },
        };
        Some(state)
    }
}

async fn snapshot<K, V>(scheduler: &LookupScheduler<K, V>) -> QueueSnapshot
where
    K: Clone + Eq + std::hash::Hash + std::fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let (queued, settled) = scheduler.counts().await;
    QueueSnapshot {
        source: scheduler.name().to_string(),
        head: scheduler.head().await.iter().map(ToString::to_string).collect(),
        queued,
        settled,
    }
}
