use std::{future::Future, pin::Pin, sync::Arc};

use tokio::{
    sync::Mutex,
    time::{self, Duration, Instant},
};

use crate::{
    geo::{clamp, resolve, Viewport, ViewportQueryKey},
    poi::{FetchError, PoiCategory, PoiLayer, PoiQuery, PoiRenderer, PoiSource, TaggedPointFeature},
    settings::OverlaySettings,
};

use super::state::{OverlayRuntimeState, OverlayStatus};

const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_info, log_warn};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Keeps one map's POI layer in sync with its viewport while shielding the
/// query service from bursts: debounce, de-duplication by query key, a single
/// in-flight request, and cooldown/backoff after every answer.
pub struct OverlayController<S: PoiSource> {
    state: Arc<Mutex<OverlayRuntimeState>>,
    source: Arc<S>,
    layer: PoiLayer,
    renderer: Arc<PoiRenderer>,
    settings: Arc<OverlaySettings>,
}

impl<S: PoiSource> Clone for OverlayController<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            source: self.source.clone(),
            layer: self.layer.clone(),
            renderer: self.renderer.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: PoiSource> OverlayController<S> {
    /// Binds a fresh overlay to `layer`. Nothing is fetched until the host
    /// reports a viewport.
    pub fn attach(
        source: S,
        layer: PoiLayer,
        settings: OverlaySettings,
        categories: Option<Vec<PoiCategory>>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(OverlayRuntimeState::new(normalize(categories)))),
            source: Arc::new(source),
            layer,
            renderer: Arc::new(PoiRenderer::new(settings.description_lang.clone())),
            settings: Arc::new(settings),
        }
    }

    pub fn layer(&self) -> &PoiLayer {
        &self.layer
    }

    pub async fn status(&self) -> OverlayStatus {
        self.state.lock().await.status(Instant::now())
    }

    /// Called on every move/zoom end. Restarts the debounce timer.
    pub async fn on_viewport_changed(&self, viewport: Viewport) {
        let mut state = self.state.lock().await;
        if state.detached {
            return;
        }
        state.viewport = Some(viewport);
        self.schedule_locked(&mut state, self.settings.debounce());
    }

    /// Switches the category filter and forces a refetch on the next cycle.
    /// An active cooldown still applies.
    pub async fn set_categories(&self, categories: Option<Vec<PoiCategory>>) {
        let mut state = self.state.lock().await;
        if state.detached {
            return;
        }
        state.selected_categories = normalize(categories);
        state.last_served_key = None;
        if state.is_request_in_flight() {
            state.supersede_request();
            state.rerun_requested = false;
        }
        self.schedule_locked(&mut state, self.settings.debounce());
    }

    /// Stops timers, drops any in-flight result and empties the layer.
    /// Terminal: later calls are ignored.
    pub async fn detach(&self) {
        let mut state = self.state.lock().await;
        if state.detached {
            return;
        }
        state.detach();
        self.layer.clear();
        log_info!("POI overlay detached after {} requests", state.requests_issued);
    }

    fn schedule_locked(&self, state: &mut OverlayRuntimeState, delay: Duration) {
        if state.detached {
            return;
        }
        let seq = state.next_timer_seq();
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            controller.on_timer(seq).await;
        });
        state.set_timer(handle);
    }

    // Boxed so the timer task spawned from inside it has a nameable type.
    fn on_timer(&self, seq: u64) -> BoxFuture<()> {
        let this = self.clone();
        Box::pin(async move {
            let (generation, query, cancel) = {
                let mut state = this.state.lock().await;
                if state.detached || state.timer_seq != seq {
                    return;
                }
                state.release_timer();

                if state.is_request_in_flight() {
                    log_debug!("POI timer fired mid-request; will rerun when it settles");
                    state.rerun_requested = true;
                    return;
                }

                if let Some(remaining) = state.cooldown_remaining(Instant::now()) {
                    log_debug!("POI fetch held for {}ms of cooldown", remaining.as_millis());
                    this.schedule_locked(&mut state, remaining);
                    return;
                }

                let Some(viewport) = state.viewport else {
                    return;
                };
                let bbox = clamp(resolve(&viewport), this.settings.max_area_km2);
                let key = ViewportQueryKey::from(&bbox);
                if state.last_served_key.as_ref() == Some(&key) {
                    log_debug!("POI viewport {key} already served");
                    return;
                }

                let query = PoiQuery {
                    bbox,
                    categories: state.selected_categories.clone(),
                };
                let (generation, cancel) = state.begin_request(key);
                (generation, query, cancel)
            };

            let result = tokio::select! {
                result = this.source.fetch(query, cancel.clone()) => result,
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
            };

            this.complete(generation, result).await;
        })
    }

    async fn complete(
        &self,
        generation: u64,
        result: Result<Vec<TaggedPointFeature>, FetchError>,
    ) {
        let mut state = self.state.lock().await;
        if !state.is_current(generation) {
            log_debug!("discarding superseded POI response #{generation}");
            return;
        }
        state.finish_request();

        let now = Instant::now();
        match result {
            Ok(features) => {
                state.record_success(now, self.settings.success_cooldown());
                let zoom = state.viewport.map(|v| v.zoom).unwrap_or(f64::NAN);
                let report = self.renderer.render(&features, zoom, &self.layer);
                log_debug!(
                    "POI layer refreshed: {} markers, {} skipped",
                    report.rendered,
                    report.skipped
                );
            }
            Err(FetchError::Cancelled) => {}
            Err(err) if err.is_backoff_worthy() => {
                let backoff_ms = state.record_rate_limited(
                    now,
                    self.settings.backoff_floor_ms,
                    self.settings.backoff_ceiling_ms,
                    err.to_string(),
                );
                self.layer.clear();
                log_warn!("POI service is busy, backing off {backoff_ms}ms: {err}");
            }
            Err(err) => {
                state.record_failure(now, self.settings.failure_cooldown(), err.to_string());
                self.layer.clear();
                log_warn!("POI load failed: {err}");
            }
        }

        if state.rerun_requested {
            state.rerun_requested = false;
            self.schedule_locked(&mut state, self.settings.debounce());
        }
    }
}

/// An empty selection means no filtering.
fn normalize(categories: Option<Vec<PoiCategory>>) -> Option<Vec<PoiCategory>> {
    categories.filter(|selected| !selected.is_empty())
}
