use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::geo::{Viewport, ViewportQueryKey};
use crate::poi::PoiCategory;

/// Stand-in deadline for cooldowns too long to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OverlayPhase {
    Idle,
    Debouncing,
    Requesting,
    Detached,
}

/// The request currently allowed to touch the layer.
#[derive(Debug)]
pub struct ActiveRequest {
    pub generation: u64,
    pub cancel: CancellationToken,
}

/// Everything one attached overlay knows. Only the controller mutates it.
#[derive(Debug, Default)]
pub struct OverlayRuntimeState {
    pub viewport: Option<Viewport>,
    pub last_served_key: Option<ViewportQueryKey>,
    pub selected_categories: Option<Vec<PoiCategory>>,
    pub pending_timer: Option<JoinHandle<()>>,
    /// Identifies the most recently scheduled timer; older ones stand down.
    pub timer_seq: u64,
    pub active_request: Option<ActiveRequest>,
    pub generation: u64,
    pub backoff_ms: u64,
    pub next_allowed_at: Option<Instant>,
    /// A timer fired mid-request; run another cycle once it settles.
    pub rerun_requested: bool,
    pub detached: bool,
    pub requests_issued: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl OverlayRuntimeState {
    pub fn new(selected_categories: Option<Vec<PoiCategory>>) -> Self {
        Self {
            selected_categories,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> OverlayPhase {
        if self.detached {
            OverlayPhase::Detached
        } else if self.active_request.is_some() {
            OverlayPhase::Requesting
        } else if self.pending_timer.is_some() {
            OverlayPhase::Debouncing
        } else {
            OverlayPhase::Idle
        }
    }

    pub fn is_request_in_flight(&self) -> bool {
        self.active_request.is_some()
    }

    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.next_allowed_at
            .filter(|at| *at > now)
            .map(|at| at - now)
    }

    /// Replaces the pending timer, aborting the one it supersedes.
    pub fn set_timer(&mut self, handle: JoinHandle<()>) {
        self.cancel_timer();
        self.pending_timer = Some(handle);
    }

    /// Forgets the pending handle without aborting it; used by the timer
    /// task itself once it starts running.
    pub fn release_timer(&mut self) {
        self.pending_timer = None;
    }

    pub fn next_timer_seq(&mut self) -> u64 {
        self.timer_seq = self.timer_seq.wrapping_add(1);
        self.timer_seq
    }

    pub fn cancel_timer(&mut self) {
        if let Some(handle) = self.pending_timer.take() {
            handle.abort();
        }
    }

    /// Marks a new request in flight and returns its generation and token.
    /// Any previous token is cancelled.
    pub fn begin_request(&mut self, key: ViewportQueryKey) -> (u64, CancellationToken) {
        self.supersede_request();
        self.last_served_key = Some(key);
        self.generation = self.generation.wrapping_add(1);
        self.requests_issued += 1;

        let cancel = CancellationToken::new();
        self.active_request = Some(ActiveRequest {
            generation: self.generation,
            cancel: cancel.clone(),
        });
        (self.generation, cancel)
    }

    /// Invalidates the in-flight request so its response is ignored.
    pub fn supersede_request(&mut self) {
        if let Some(active) = self.active_request.take() {
            active.cancel.cancel();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn is_current(&self, generation: u64) -> bool {
        !self.detached
            && self
                .active_request
                .as_ref()
                .is_some_and(|active| active.generation == generation)
    }

    pub fn finish_request(&mut self) {
        self.active_request = None;
    }

    pub fn record_success(&mut self, now: Instant, cooldown: Duration) {
        self.backoff_ms = 0;
        self.next_allowed_at = Some(deadline(now, cooldown));
        self.last_success_at = Some(Utc::now());
        self.last_error = None;
    }

    /// Doubles the backoff (starting at `floor_ms`, capped at `ceiling_ms`)
    /// and returns the new value.
    pub fn record_rate_limited(
        &mut self,
        now: Instant,
        floor_ms: u64,
        ceiling_ms: u64,
        error: String,
    ) -> u64 {
        self.backoff_ms = if self.backoff_ms == 0 {
            floor_ms.min(ceiling_ms)
        } else {
            self.backoff_ms.saturating_mul(2).min(ceiling_ms)
        };
        self.next_allowed_at = Some(deadline(now, Duration::from_millis(self.backoff_ms)));
        self.last_error = Some(error);
        self.backoff_ms
    }

    pub fn record_failure(&mut self, now: Instant, cooldown: Duration, error: String) {
        self.next_allowed_at = Some(deadline(now, cooldown));
        self.last_error = Some(error);
    }

    pub fn detach(&mut self) {
        self.cancel_timer();
        self.supersede_request();
        self.last_served_key = None;
        self.rerun_requested = false;
        self.detached = true;
    }

    pub fn status(&self, now: Instant) -> OverlayStatus {
        OverlayStatus {
            phase: self.phase(),
            last_served_key: self.last_served_key.as_ref().map(|k| k.to_string()),
            selected_categories: self.selected_categories.clone(),
            backoff_ms: self.backoff_ms,
            cooldown_remaining_ms: self
                .cooldown_remaining(now)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            requests_issued: self.requests_issued,
            last_success_at: self.last_success_at,
            last_error: self.last_error.clone(),
        }
    }
}

/// `now + delay`, saturating at a far-future instant instead of overflowing.
fn deadline(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Read-only view for the host (and tests).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverlayStatus {
    pub phase: OverlayPhase,
    pub last_served_key: Option<String>,
    pub selected_categories: Option<Vec<PoiCategory>>,
    pub backoff_ms: u64,
    pub cooldown_remaining_ms: u64,
    pub requests_issued: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}
