//! Queue and ticker scenarios driven by scripted fetchers

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{isbn, titled, wait_until, ScriptedFetcher};
use zousho_bi::scheduler::{
    EnqueueMode, FetchOutcome, LookupScheduler, QueueState, SchedulerConfig, Settlement,
};
use zousho_common::events::{EventBus, SettledAs, ZoushoEvent};
use zousho_common::{BookRecord, Isbn};

fn config(retry_ms: u64) -> SchedulerConfig {
    SchedulerConfig::new("scripted")
        .with_batch_size(1)
        .with_spacing(Duration::ZERO)
        .with_retry_delay(Duration::from_millis(retry_ms))
}

// ============================================================================
// QueueState properties
// ============================================================================

#[test]
fn test_new_enqueue_is_idempotent() {
    let mut state: QueueState<&str, u32> = QueueState::new();
    state.enqueue(["a", "b"], EnqueueMode::New);
    state.enqueue(["b", "a", "c"], EnqueueMode::New);
    assert_eq!(state.queued(), &["a", "b", "c"]);

    state.dequeue([("a", Settlement::Found(1))]);
    let placed = state.enqueue(["a"], EnqueueMode::New);
    assert!(placed.is_empty());
    assert_eq!(state.queued(), &["b", "c"]);
}

#[test]
fn test_dequeue_ignores_unqueued_keys() {
    let mut state: QueueState<&str, u32> = QueueState::new();
    state.enqueue(["a"], EnqueueMode::New);

    let committed = state.dequeue([("zzz", Settlement::Found(9)), ("a", Settlement::NotFound)]);

    assert_eq!(committed, vec!["a"]);
    assert!(state.settlement(&"zzz").is_none());
    assert_eq!(state.settlement(&"a"), Some(&Settlement::NotFound));
}

#[test]
fn test_retry_lands_at_index_one() {
    let mut state: QueueState<&str, u32> = QueueState::new();
    state.enqueue(["limited"], EnqueueMode::New);
    state.dequeue([("limited", Settlement::RetryPending)]);
    state.enqueue(["x", "y", "z"], EnqueueMode::New);

    state.enqueue(["limited"], EnqueueMode::Retry);

    assert_eq!(state.queued(), &["x", "limited", "y", "z"]);
}

#[test]
fn test_priority_never_displaces_head() {
    let mut state: QueueState<&str, u32> = QueueState::new();
    state.enqueue(["head", "b", "c", "urgent"], EnqueueMode::New);

    state.enqueue(["urgent"], EnqueueMode::Priority);
    assert_eq!(state.queued(), &["head", "urgent", "b", "c"]);

    state.enqueue(["head"], EnqueueMode::Priority);
    assert_eq!(state.queued(), &["head", "urgent", "b", "c"]);
}

// ============================================================================
// Ticker scenarios
// ============================================================================

#[tokio::test]
async fn test_rate_limited_key_retries_once_then_settles() {
    let key = isbn("4873113946");
    let record = titled("4873113946", "プログラミングRust");
    let fetcher = Arc::new(
        ScriptedFetcher::new().script(
            key.clone(),
            vec![FetchOutcome::RateLimited, FetchOutcome::Success(record.clone())],
        ),
    );
    let scheduler: Arc<LookupScheduler<Isbn, BookRecord>> =
        Arc::new(LookupScheduler::new(config(50), fetcher.clone()));

    scheduler.enqueue(vec![key.clone()], EnqueueMode::New).await;

    // First attempt is rate limited: sentinel committed, key leaves the queue
    assert_eq!(scheduler.run_batch().await, 1);
    assert_eq!(scheduler.settlement(&key).await, Some(Settlement::RetryPending));
    assert!(scheduler.queued().await.is_empty());

    // The delayed retry puts it back
    let (s, k) = (&scheduler, &key);
    let requeued = wait_until(Duration::from_secs(2), move || async move {
        s.queued().await == vec![k.clone()]
    })
    .await;
    assert!(requeued, "rate-limited key was not re-queued");

    assert_eq!(scheduler.run_batch().await, 1);
    assert_eq!(scheduler.settlement(&key).await, Some(Settlement::Found(record)));
    assert!(scheduler.queued().await.is_empty());
    assert_eq!(fetcher.call_count(&key), 2);

    // A found key is never retried again
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(scheduler.queued().await.is_empty());
}

#[tokio::test]
async fn test_errors_settle_as_not_found_without_retry() {
    let fetcher = Arc::new(
        ScriptedFetcher::<String, u32>::new()
            .script("broken".to_string(), vec![FetchOutcome::Error("timeout".into())]),
    );
    let scheduler: Arc<LookupScheduler<String, u32>> =
        Arc::new(LookupScheduler::new(config(10), fetcher.clone()));
    scheduler
        .enqueue(vec!["broken".to_string()], EnqueueMode::New)
        .await;

    scheduler.run_batch().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        scheduler.settlement(&"broken".to_string()).await,
        Some(Settlement::NotFound)
    );
    assert!(scheduler.queued().await.is_empty());
    assert_eq!(fetcher.calls().len(), 1);
}

#[tokio::test]
async fn test_forgotten_key_drops_stale_outcome() {
    let fetcher = Arc::new(ScriptedFetcher::<String, u32>::new().script(
        "k".to_string(),
        vec![FetchOutcome::RateLimited, FetchOutcome::Success(7)],
    ));
    let scheduler: Arc<LookupScheduler<String, u32>> =
        Arc::new(LookupScheduler::new(config(30), fetcher));
    scheduler.enqueue(vec!["k".to_string()], EnqueueMode::New).await;
    scheduler.run_batch().await;

    // Reset before the retry fires: the retry enqueue becomes a no-op
    scheduler.forget(&["k".to_string()]).await;
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(scheduler.queued().await.is_empty());
    assert!(!scheduler.knows(&"k".to_string()).await);
}

#[tokio::test]
async fn test_spawned_ticker_emits_events() {
    let key = isbn("9784088725093");
    let fetcher = Arc::new(ScriptedFetcher::new().script(
        key.clone(),
        vec![
            FetchOutcome::RateLimited,
            FetchOutcome::Success(titled("9784088725093", "ONE PIECE")),
        ],
    ));
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let scheduler: Arc<LookupScheduler<Isbn, BookRecord>> =
        Arc::new(LookupScheduler::new(config(20), fetcher).with_events(bus));
    let handle = scheduler.spawn();

    scheduler.enqueue(vec![key.clone()], EnqueueMode::New).await;

    let (s, k) = (&scheduler, &key);
    let settled = wait_until(Duration::from_secs(2), move || async move {
        matches!(s.settlement(k).await, Some(Settlement::Found(_)))
    })
    .await;
    assert!(settled);

    scheduler.shutdown();
    handle.await.unwrap();

    let mut retries = 0;
    let mut outcomes = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            ZoushoEvent::RetryScheduled { .. } => retries += 1,
            ZoushoEvent::LookupSettled { outcome, .. } => outcomes.push(outcome),
            ZoushoEvent::LookupQueued { .. } => {}
        }
    }
    assert_eq!(retries, 1);
    assert_eq!(outcomes, vec![SettledAs::RetryPending, SettledAs::Found]);
}

#[tokio::test]
async fn test_tickers_run_independently() {
    let slow = Arc::new(ScriptedFetcher::<String, u32>::new());
    let fast = Arc::new(ScriptedFetcher::<String, u32>::new());

    let slow_scheduler: Arc<LookupScheduler<String, u32>> = Arc::new(LookupScheduler::new(
        SchedulerConfig::new("slow").with_spacing(Duration::from_millis(500)),
        slow.clone(),
    ));
    let fast_scheduler: Arc<LookupScheduler<String, u32>> = Arc::new(LookupScheduler::new(
        SchedulerConfig::new("fast")
            .with_batch_size(2)
            .with_spacing(Duration::from_millis(1)),
        fast.clone(),
    ));
    let handles = vec![slow_scheduler.spawn(), fast_scheduler.spawn()];

    let keys: Vec<String> = (0..6).map(|i| format!("k{}", i)).collect();
    slow_scheduler.enqueue(keys.clone(), EnqueueMode::New).await;
    fast_scheduler.enqueue(keys, EnqueueMode::New).await;

    let f = &fast_scheduler;
    let fast_done =
        wait_until(Duration::from_secs(1), move || async move { f.queued().await.is_empty() })
            .await;
    assert!(fast_done);
    // The slow provider is still spacing its batches
    assert!(slow.calls().len() < 6);

    slow_scheduler.shutdown();
    fast_scheduler.shutdown();
    for handle in handles {
        handle.await.unwrap();
    }
}
