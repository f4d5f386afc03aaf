use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use travel_overlay_lib::overlay::{OverlayController, OverlayPhase};
use travel_overlay_lib::poi::PoiQuery;
use travel_overlay_lib::{
    FetchError, OverlaySettings, PoiCategory, PoiLayer, PoiSource, TaggedPointFeature, Viewport,
};

/// In-memory POI service: answers from a script (success once it runs
/// dry) and records every query it sees.
#[derive(Default)]
struct ScriptedSource {
    delay: Duration,
    script: Mutex<VecDeque<Result<(), FetchError>>>,
    queries: Mutex<Vec<PoiQuery>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    fn new(delay: Duration, script: Vec<Result<(), FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            delay,
            script: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn query(&self, index: usize) -> PoiQuery {
        self.queries.lock().unwrap()[index].clone()
    }
}

impl PoiSource for ScriptedSource {
    fn fetch(
        &self,
        query: PoiQuery,
        _cancel: CancellationToken,
    ) -> impl Future<Output = Result<Vec<TaggedPointFeature>, FetchError>> + Send {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.queries.lock().unwrap().push(query);
        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let delay = self.delay;

        async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            outcome.map(|()| vec![museum(call)])
        }
    }
}

fn museum(call: usize) -> TaggedPointFeature {
    TaggedPointFeature {
        id: format!("call-{call}"),
        lat: 52.23,
        lng: 21.01,
        tags: BTreeMap::from([("tourism".to_string(), "museum".to_string())]),
        title: format!("Museum {call}"),
        source_url: None,
    }
}

/// A ~45 km² box around Warsaw, moved north-east by `shift` degrees.
fn viewport(shift: f64) -> Viewport {
    Viewport::new(
        52.20 + shift,
        20.95 + shift,
        52.26 + shift,
        21.05 + shift,
        14.0,
    )
}

fn attach(source: &Arc<ScriptedSource>) -> OverlayController<Arc<ScriptedSource>> {
    OverlayController::attach(
        source.clone(),
        PoiLayer::new(),
        OverlaySettings::default(),
        None,
    )
}

async fn wait_for_calls(source: &ScriptedSource, expected: usize) {
    for _ in 0..20_000 {
        if source.calls() >= expected {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("source saw {} calls, expected {expected}", source.calls());
}

#[tokio::test(start_paused = true)]
async fn burst_of_viewport_changes_issues_one_query() {
    let source = ScriptedSource::new(Duration::ZERO, vec![]);
    let overlay = attach(&source);

    for step in 0..5 {
        overlay.on_viewport_changed(viewport(step as f64 * 0.01)).await;
        sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(source.calls(), 0);
    assert_eq!(overlay.status().await.phase, OverlayPhase::Debouncing);

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(source.calls(), 1);
    assert!((source.query(0).bbox.south - 52.24).abs() < 1e-9);
    assert_eq!(overlay.layer().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn identical_viewport_is_not_refetched() {
    let source = ScriptedSource::new(Duration::ZERO, vec![]);
    let overlay = attach(&source);

    overlay.on_viewport_changed(viewport(0.0)).await;
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(source.calls(), 1);

    overlay.on_viewport_changed(viewport(0.0)).await;
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(overlay.status().await.phase, OverlayPhase::Idle);

    overlay.on_viewport_changed(viewport(0.05)).await;
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn rate_limits_back_off_exponentially_up_to_the_cap() {
    let mut script = vec![Ok(())];
    script.extend((0..6).map(|_| Err(FetchError::RateLimited { status: Some(429) })));
    let source = ScriptedSource::new(Duration::ZERO, script);
    let overlay = attach(&source);

    overlay.on_viewport_changed(viewport(0.0)).await;
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(overlay.layer().len(), 1);

    let mut previous = 0_u64;
    for (step, expected) in [2000_u64, 4000, 8000, 16_000, 30_000, 30_000].into_iter().enumerate() {
        overlay.on_viewport_changed(viewport((step + 1) as f64 * 0.05)).await;
        wait_for_calls(&source, step + 2).await;

        let status = overlay.status().await;
        assert_eq!(status.backoff_ms, expected);
        assert!(status.backoff_ms >= (previous * 2).min(30_000));
        assert!(status.cooldown_remaining_ms <= expected);
        assert!(status.cooldown_remaining_ms + 10 >= expected);
        assert!(status.last_error.is_some());
        assert!(overlay.layer().is_empty());
        previous = expected;
    }
}

#[tokio::test(start_paused = true)]
async fn plain_failure_uses_fixed_cooldown_without_backoff() {
    let source = ScriptedSource::new(
        Duration::ZERO,
        vec![Ok(()), Err(FetchError::Transport("connection reset".into()))],
    );
    let overlay = attach(&source);

    overlay.on_viewport_changed(viewport(0.0)).await;
    sleep(Duration::from_millis(1000)).await;
    overlay.on_viewport_changed(viewport(0.05)).await;
    wait_for_calls(&source, 2).await;

    let status = overlay.status().await;
    assert_eq!(status.backoff_ms, 0);
    assert!(status.cooldown_remaining_ms <= 1500 && status.cooldown_remaining_ms + 10 >= 1500);
    assert!(overlay.layer().is_empty());
}

#[tokio::test(start_paused = true)]
async fn requests_never_overlap_and_missed_changes_rerun() {
    let source = ScriptedSource::new(Duration::from_secs(5), vec![]);
    let overlay = attach(&source);

    overlay.on_viewport_changed(viewport(0.0)).await;
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(overlay.status().await.phase, OverlayPhase::Requesting);

    // Fires at 1.65 s while the first request runs until 5.65 s.
    overlay.on_viewport_changed(viewport(0.05)).await;
    sleep(Duration::from_millis(3000)).await;
    assert_eq!(source.calls(), 1);

    sleep(Duration::from_millis(4000)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    assert!((source.query(1).bbox.south - 52.25).abs() < 1e-9);
    assert_eq!(overlay.layer().markers()[0].feature_id, "call-1");
}

#[tokio::test(start_paused = true)]
async fn category_change_refetches_after_cooldown() {
    let source = ScriptedSource::new(Duration::ZERO, vec![]);
    let overlay = attach(&source);

    overlay.on_viewport_changed(viewport(0.0)).await;
    sleep(Duration::from_millis(700)).await;
    assert_eq!(source.calls(), 1);

    // Success at 650 ms holds the next request until 1450 ms.
    overlay.set_categories(Some(vec![PoiCategory::Culture])).await;
    sleep(Duration::from_millis(700)).await;
    assert_eq!(source.calls(), 1);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(source.query(1).categories, Some(vec![PoiCategory::Culture]));
    assert_eq!(
        overlay.status().await.selected_categories,
        Some(vec![PoiCategory::Culture])
    );
}

#[tokio::test(start_paused = true)]
async fn superseded_response_is_discarded() {
    let source = ScriptedSource::new(Duration::from_secs(2), vec![]);
    let overlay = attach(&source);

    overlay.on_viewport_changed(viewport(0.0)).await;
    sleep(Duration::from_millis(1000)).await;
    overlay.set_categories(Some(vec![PoiCategory::History])).await;

    sleep(Duration::from_millis(5000)).await;
    assert_eq!(source.calls(), 2);

    let markers = overlay.layer().markers();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].feature_id, "call-2");
    assert_eq!(overlay.status().await.requests_issued, 2);
}

#[tokio::test(start_paused = true)]
async fn detach_clears_layer_and_stops_timers() {
    let source = ScriptedSource::new(Duration::ZERO, vec![]);
    let overlay = attach(&source);
    let layer = overlay.layer().clone();

    overlay.on_viewport_changed(viewport(0.0)).await;
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(layer.len(), 1);

    overlay.on_viewport_changed(viewport(0.05)).await;
    overlay.detach().await;
    assert!(layer.is_empty());
    assert_eq!(overlay.status().await.phase, OverlayPhase::Detached);

    sleep(Duration::from_secs(5)).await;
    overlay.on_viewport_changed(viewport(0.1)).await;
    sleep(Duration::from_secs(5)).await;
    assert_eq!(source.calls(), 1);
    assert!(layer.is_empty());
}

#[tokio::test(start_paused = true)]
async fn invalid_features_are_dropped_from_the_layer() {
    struct OddSource;

    impl PoiSource for OddSource {
        fn fetch(
            &self,
            _query: PoiQuery,
            _cancel: CancellationToken,
        ) -> impl Future<Output = Result<Vec<TaggedPointFeature>, FetchError>> + Send {
            let mut broken = museum(2);
            broken.lat = 181.0;
            async move { Ok(vec![museum(1), broken]) }
        }
    }

    let overlay = OverlayController::attach(OddSource, PoiLayer::new(), OverlaySettings::default(), None);
    overlay.on_viewport_changed(viewport(0.0)).await;
    sleep(Duration::from_millis(1000)).await;

    let markers = overlay.layer().markers();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].feature_id, "call-1");
}
