use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, Once};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use harvester_core::{Item, PaginationConfig, RetryPolicy, Termination};
use harvester_engine::{
    harvest_into, AdvanceError, BoundedStore, ChannelProgressSink, ExtractError, Extractor,
    HarvestEvent, MeasureError, MemoryBackend, PaginationDriver, PersistError, ProgressGauge,
    StoreBackend, StoreDocument, StoreError, ViewportAdvancer,
};
use pretty_assertions::assert_eq;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn item(url: &str) -> Item {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    Item::new(format!("text of {url}"), url, at).unwrap()
}

fn batch(urls: &[&str]) -> Result<Vec<Item>, ExtractError> {
    Ok(urls.iter().map(|url| item(url)).collect())
}

fn urls(items: &[Item]) -> Vec<String> {
    items.iter().map(|i| i.url.clone()).collect()
}

fn config() -> PaginationConfig {
    PaginationConfig {
        settle_delay: Duration::from_secs(5),
        max_iterations: 20,
        patience_threshold: 5,
        cooldown_every: 3,
        cooldown_delay: Duration::from_secs(8),
        retry: RetryPolicy {
            max_attempts: 3,
            fallback_delay: Duration::from_secs(15),
        },
    }
}

/// A scripted feed. Exhausted extraction scripts yield empty batches;
/// exhausted height scripts repeat the last height.
#[derive(Default)]
struct ScriptedFeed {
    extractions: Mutex<VecDeque<Result<Vec<Item>, ExtractError>>>,
    heights: Mutex<VecDeque<Result<u64, MeasureError>>>,
    last_height: Mutex<u64>,
    failing_advances: AtomicUsize,
    advances: AtomicUsize,
    extract_calls: AtomicUsize,
    measure_calls: AtomicUsize,
    cancel_after_extracts: Option<(usize, CancellationToken)>,
}

impl ScriptedFeed {
    fn new(
        extractions: Vec<Result<Vec<Item>, ExtractError>>,
        heights: Vec<Result<u64, MeasureError>>,
    ) -> Self {
        Self {
            extractions: Mutex::new(extractions.into()),
            heights: Mutex::new(heights.into()),
            ..Self::default()
        }
    }

    fn with_heights(heights: &[u64]) -> Self {
        Self::new(Vec::new(), heights.iter().copied().map(Ok).collect())
    }
}

#[async_trait::async_trait]
impl Extractor for ScriptedFeed {
    async fn extract(&self) -> Result<Vec<Item>, ExtractError> {
        let calls = self.extract_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, token)) = &self.cancel_after_extracts {
            if calls >= *after {
                token.cancel();
            }
        }
        self.extractions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[async_trait::async_trait]
impl ViewportAdvancer for ScriptedFeed {
    async fn advance(&self) -> Result<(), AdvanceError> {
        self.advances.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_advances.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_advances.store(failing - 1, Ordering::SeqCst);
            return Err(AdvanceError("scroll script threw".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProgressGauge for ScriptedFeed {
    async fn measure(&self) -> Result<u64, MeasureError> {
        self.measure_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.heights.lock().unwrap().pop_front();
        let mut last = self.last_height.lock().unwrap();
        match next {
            Some(Ok(height)) => {
                *last = height;
                Ok(height)
            }
            Some(Err(err)) => Err(err),
            None => Ok(*last),
        }
    }
}

fn driver(config: PaginationConfig, feed: &Arc<ScriptedFeed>) -> PaginationDriver {
    PaginationDriver::new(config, feed.clone(), feed.clone(), feed.clone())
}

#[tokio::test(start_paused = true)]
async fn plateaued_feed_converges_and_lands_in_store() {
    init_logging();
    let feed = Arc::new(ScriptedFeed::new(
        vec![batch(&["a", "b", "c"]), batch(&["c", "d"])],
        [100, 150, 150, 150, 150, 150, 150]
            .into_iter()
            .map(Ok)
            .collect(),
    ));
    let store = BoundedStore::new(MemoryBackend::new());

    let (outcome, merged) = harvest_into(&driver(config(), &feed), &store, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::Converged);
    assert_eq!(outcome.iterations, 7);
    assert_eq!(urls(&outcome.items), vec!["a", "b", "c", "d"]);
    assert_eq!((merged.added, merged.total, merged.evicted), (4, 4, 0));
    assert_eq!(urls(&store.items().unwrap()), vec!["a", "b", "c", "d"]);
    assert_eq!(feed.measure_calls.load(Ordering::SeqCst), 7);
}

#[tokio::test(start_paused = true)]
async fn run_waits_for_settle_and_cooldowns() {
    init_logging();
    let feed = Arc::new(ScriptedFeed::with_heights(&[100, 150, 150, 150, 150, 150, 150]));
    let started = Instant::now();

    let outcome = driver(config(), &feed).run(&CancellationToken::new()).await;

    assert_eq!(outcome.iterations, 7);
    // Seven settles plus cooldowns after iterations 3 and 6.
    assert_eq!(started.elapsed(), Duration::from_secs(7 * 5 + 2 * 8));
}

#[tokio::test(start_paused = true)]
async fn growing_feed_stops_at_iteration_ceiling() {
    init_logging();
    let heights: Vec<u64> = (1..=50).map(|i| i * 100).collect();
    let feed = Arc::new(ScriptedFeed::with_heights(&heights));
    let config = PaginationConfig {
        max_iterations: 4,
        ..config()
    };

    let outcome = driver(config, &feed).run(&CancellationToken::new()).await;

    assert_eq!(outcome.termination, Termination::Exhausted);
    assert_eq!(outcome.iterations, 4);
    assert_eq!(feed.advances.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn collaborator_failures_do_not_abort_the_run() {
    init_logging();
    let feed = ScriptedFeed::new(
        vec![
            batch(&["a"]),
            Err(ExtractError::Unavailable("page crashed".into())),
            batch(&["b"]),
        ],
        vec![
            Ok(100),
            Err(MeasureError("height script threw".into())),
            Ok(200),
        ],
    );
    feed.failing_advances.store(2, Ordering::SeqCst);
    let feed = Arc::new(feed);
    let config = PaginationConfig {
        patience_threshold: 2,
        ..config()
    };

    let outcome = driver(config, &feed).run(&CancellationToken::new()).await;

    assert_eq!(outcome.termination, Termination::Converged);
    assert_eq!(urls(&outcome.items), vec!["a", "b"]);
    // 100, failed, 200, 200, 200: patience resets on 200 then reaches 2.
    assert_eq!(outcome.iterations, 5);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_extraction_is_retried_after_the_hint() {
    init_logging();
    let feed = Arc::new(ScriptedFeed::new(
        vec![
            Err(ExtractError::RateLimited {
                retry_after: Some(Duration::from_secs(2)),
            }),
            batch(&["a"]),
        ],
        Vec::new(),
    ));
    let config = PaginationConfig {
        patience_threshold: 1,
        ..config()
    };
    let started = Instant::now();

    let outcome = driver(config, &feed).run(&CancellationToken::new()).await;

    assert_eq!(urls(&outcome.items), vec!["a"]);
    assert_eq!(feed.extract_calls.load(Ordering::SeqCst), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(5 + 2));
}

#[tokio::test(start_paused = true)]
async fn persistent_rate_limit_skips_the_iteration() {
    init_logging();
    let limited = || Err(ExtractError::RateLimited { retry_after: None });
    let feed = Arc::new(ScriptedFeed::new(
        vec![limited(), limited(), limited(), batch(&["late"])],
        vec![Ok(100)],
    ));
    let config = PaginationConfig {
        patience_threshold: 1,
        ..config()
    };

    let outcome = driver(config, &feed).run(&CancellationToken::new()).await;

    // Three attempts are spent on iteration one; iteration two extracts normally.
    assert_eq!(feed.extract_calls.load(Ordering::SeqCst), 4);
    assert_eq!(urls(&outcome.items), vec!["late"]);
    assert_eq!(outcome.termination, Termination::Converged);
}

#[tokio::test(start_paused = true)]
async fn cancellation_keeps_the_partial_working_set() {
    init_logging();
    let cancel = CancellationToken::new();
    let feed = Arc::new(ScriptedFeed {
        cancel_after_extracts: Some((2, cancel.clone())),
        ..ScriptedFeed::new(
            vec![batch(&["a", "b"]), batch(&["c"]), batch(&["never"])],
            vec![Ok(100), Ok(200), Ok(300)],
        )
    });
    let store = BoundedStore::new(MemoryBackend::new());

    let (outcome, merged) = harvest_into(&driver(config(), &feed), &store, &cancel)
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(urls(&outcome.items), vec!["a", "b", "c"]);
    assert_eq!(merged.added, 3);
    assert_eq!(feed.extract_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_long_settle() {
    init_logging();
    let feed = Arc::new(ScriptedFeed::with_heights(&[100]));
    let config = PaginationConfig {
        settle_delay: Duration::from_secs(3600),
        ..config()
    };
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        trigger.cancel();
    });
    let started = Instant::now();

    let outcome = driver(config, &feed).run(&cancel).await;

    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(outcome.iterations, 0);
    assert!(started.elapsed() < Duration::from_secs(3600));
    assert_eq!(feed.extract_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn sink_sees_every_iteration_and_the_finish() {
    init_logging();
    let (tx, rx) = mpsc::channel();
    let feed = Arc::new(ScriptedFeed::with_heights(&[100, 100]));
    let config = PaginationConfig {
        patience_threshold: 1,
        ..config()
    };

    let outcome = driver(config, &feed)
        .with_sink(Arc::new(ChannelProgressSink::new(tx)))
        .run(&CancellationToken::new())
        .await;

    let events: Vec<HarvestEvent> = rx.try_iter().collect();
    assert_eq!(outcome.iterations, 2);
    assert_eq!(events.len(), 3);
    match &events[0] {
        HarvestEvent::IterationCompleted(snapshot) => {
            assert_eq!((snapshot.iteration, snapshot.previous_height), (1, 100));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(matches!(
        events[2],
        HarvestEvent::Finished {
            termination: Termination::Converged,
            iterations: 2,
            items: 0,
        }
    ));
}

struct BrokenBackend;

impl StoreBackend for BrokenBackend {
    fn load(&self) -> Result<StoreDocument, PersistError> {
        Ok(StoreDocument::default())
    }

    fn store(&self, _document: &StoreDocument) -> Result<(), PersistError> {
        Err(PersistError::StorageDir("read-only filesystem".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn failed_persist_hands_the_harvest_back() {
    init_logging();
    let feed = Arc::new(ScriptedFeed::new(vec![batch(&["a", "b"])], vec![Ok(100)]));
    let config = PaginationConfig {
        patience_threshold: 1,
        ..config()
    };
    let store = BoundedStore::new(BrokenBackend);

    let err = harvest_into(&driver(config, &feed), &store, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(urls(&err.outcome.items), vec!["a", "b"]);
    assert!(matches!(err.source, StoreError::Persist(_)));
    assert!(err.to_string().starts_with("harvested 2 items"));
}
