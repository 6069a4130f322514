//! Caption polling loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use soniclens_types::{OverlayText, PollCounters, PollOutcome};

use crate::api::{CaptionFetch, CaptionSource};
use crate::error::OverlayError;
use crate::surface::TextSurface;

#[derive(Default)]
struct PollStats {
    requests: AtomicU64,
    updated: AtomicU64,
    failed: AtomicU64,
    unchanged: AtomicU64,
    skipped: AtomicU64,
}

impl PollStats {
    fn record(&self, outcome: &PollOutcome) {
        let counter = match outcome {
            PollOutcome::Updated {
                text: OverlayText::BackendDown,
            } => &self.failed,
            PollOutcome::Updated { .. } => &self.updated,
            PollOutcome::Unchanged { .. } => &self.unchanged,
            PollOutcome::Skipped => &self.skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PollCounters {
        PollCounters {
            requests: self.requests.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Fetches the latest caption on a fixed cadence and writes it to a text surface.
pub struct CaptionPoller {
    source: Arc<dyn CaptionSource>,
    interval: Duration,
    stats: PollStats,
}

impl CaptionPoller {
    pub fn new(source: Arc<dyn CaptionSource>, interval: Duration) -> Result<Self, OverlayError> {
        if interval.is_zero() {
            return Err(OverlayError::ZeroInterval);
        }
        Ok(Self {
            source,
            interval,
            stats: PollStats::default(),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn counters(&self) -> PollCounters {
        self.stats.snapshot()
    }

    /// Run one fetch-and-display cycle.
    ///
    /// * non-empty caption: shown verbatim
    /// * caption absent or empty: "No caption yet"
    /// * request or decode failure: "Backend not running"
    /// * non-2xx status: surface left untouched
    pub async fn tick(&self, surface: &dyn TextSurface) -> PollOutcome {
        self.stats.requests.fetch_add(1, Ordering::Relaxed);

        let outcome = match self.source.fetch_caption().await {
            Ok(CaptionFetch::Caption(resp)) => PollOutcome::Updated {
                text: resp.overlay_text(),
            },
            Ok(CaptionFetch::Status(status)) => {
                debug!(
                    endpoint = self.source.endpoint(),
                    status, "Caption server returned non-success status, keeping overlay"
                );
                PollOutcome::Unchanged { status }
            }
            Err(e) => {
                debug!(endpoint = self.source.endpoint(), "Caption poll failed: {e}");
                PollOutcome::Updated {
                    text: OverlayText::BackendDown,
                }
            }
        };

        if let PollOutcome::Updated { text } = &outcome {
            surface.set_text(text);
        }
        self.stats.record(&outcome);
        outcome
    }

    /// Poll until `cancel` fires.
    ///
    /// The first tick fires one full interval after the call, not immediately.
    /// A tick that comes due while the previous request is still in flight is
    /// skipped. Cancelling also aborts an in-flight request; this future
    /// resolves once it has been dropped.
    pub async fn run(
        self: Arc<Self>,
        surface: Arc<dyn TextSurface>,
        cancel: CancellationToken,
    ) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let in_flight = Arc::new(AtomicBool::new(false));
        let tracker = TaskTracker::new();

        info!(
            endpoint = self.source.endpoint(),
            interval_ms = self.interval.as_millis() as u64,
            "Caption poller started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if in_flight.swap(true, Ordering::AcqRel) {
                debug!("Previous caption request still in flight, skipping tick");
                self.stats.record(&PollOutcome::Skipped);
                continue;
            }

            let poller = self.clone();
            let surface = surface.clone();
            let in_flight = in_flight.clone();
            let cancel = cancel.clone();
            tracker.spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    outcome = poller.tick(surface.as_ref()) => {
                        debug!(?outcome, "Caption tick finished");
                    }
                }
                in_flight.store(false, Ordering::Release);
            });
        }

        tracker.close();
        tracker.wait().await;

        info!(endpoint = self.source.endpoint(), "Caption poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CaptionApi;
    use crate::surface::TextOverlay;
    use crate::testing::*;

    fn http_poller(addr: std::net::SocketAddr) -> CaptionPoller {
        let api = CaptionApi::new(&endpoint(addr), Duration::from_secs(5)).unwrap();
        CaptionPoller::new(Arc::new(api), Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn test_tick_shows_caption() {
        let addr = spawn_server(caption_router("a red car")).await;
        let poller = http_poller(addr);
        let overlay = TextOverlay::new();

        let outcome = poller.tick(&overlay).await;

        assert_eq!(
            outcome,
            PollOutcome::Updated {
                text: OverlayText::Caption("a red car".into())
            }
        );
        assert_eq!(overlay.current().unwrap().as_str(), "a red car");
    }

    #[tokio::test]
    async fn test_tick_empty_object_shows_placeholder() {
        let addr = spawn_server(empty_router()).await;
        let overlay = TextOverlay::new();

        http_poller(addr).tick(&overlay).await;

        assert_eq!(overlay.current().unwrap().as_str(), "No caption yet");
    }

    #[tokio::test]
    async fn test_tick_unreachable_shows_fallback() {
        let addr = refused_addr().await;
        let poller = http_poller(addr);
        let overlay = TextOverlay::new();

        poller.tick(&overlay).await;

        assert_eq!(overlay.current().unwrap().as_str(), "Backend not running");
        assert_eq!(poller.counters().failed, 1);
    }

    #[tokio::test]
    async fn test_tick_malformed_json_shows_fallback() {
        let addr = spawn_server(malformed_router()).await;
        let overlay = TextOverlay::new();

        http_poller(addr).tick(&overlay).await;

        assert_eq!(overlay.current(), Some(OverlayText::BackendDown));
    }

    #[tokio::test]
    async fn test_tick_server_error_keeps_stale_text() {
        let addr = spawn_server(failing_router()).await;
        let poller = http_poller(addr);
        let overlay = TextOverlay::new();
        overlay.set_text(&OverlayText::Caption("previous caption".into()));

        let outcome = poller.tick(&overlay).await;

        assert_eq!(outcome, PollOutcome::Unchanged { status: 500 });
        assert_eq!(overlay.current().unwrap().as_str(), "previous caption");
        assert_eq!(poller.counters().unchanged, 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_affect_next_tick() {
        let source = Arc::new(ScriptedSource::new(
            vec![
                Err(()),
                Ok(CaptionFetch::Caption(soniclens_types::CaptionResponse {
                    caption: Some("back again".into()),
                })),
            ],
            Duration::ZERO,
        ));
        let poller = CaptionPoller::new(source, Duration::from_secs(1)).unwrap();
        let overlay = TextOverlay::new();

        poller.tick(&overlay).await;
        assert_eq!(overlay.current(), Some(OverlayText::BackendDown));

        poller.tick(&overlay).await;
        assert_eq!(overlay.current().unwrap().as_str(), "back again");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_once_per_interval() {
        let source = Arc::new(ScriptedSource::constant("tick", Duration::ZERO));
        let poller = Arc::new(
            CaptionPoller::new(source.clone(), Duration::from_millis(1000)).unwrap(),
        );
        let overlay = Arc::new(TextOverlay::new());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(poller.clone().run(overlay.clone(), cancel.clone()));

        // Nothing is fetched before the first full interval has elapsed.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(source.calls(), 0);
        assert!(overlay.current().is_none());

        // Ticks at 1000, 2000 and 3000 ms.
        tokio::time::sleep(Duration::from_millis(3000)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(source.calls(), 3);
        let counters = poller.counters();
        assert_eq!(counters.requests, 3);
        assert_eq!(counters.updated, 3);
        assert_eq!(counters.skipped, 0);
        assert_eq!(overlay.current().unwrap().as_str(), "tick");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_skips_ticks_while_request_in_flight() {
        let source = Arc::new(ScriptedSource::constant("slow", Duration::from_millis(2500)));
        let poller = Arc::new(
            CaptionPoller::new(source.clone(), Duration::from_millis(1000)).unwrap(),
        );
        let overlay = Arc::new(TextOverlay::new());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(poller.clone().run(overlay.clone(), cancel.clone()));

        // Request at 1000 ms finishes at 3500 ms; ticks at 2000 and 3000 ms
        // are skipped; the tick at 4000 ms starts a second request.
        tokio::time::sleep(Duration::from_millis(4500)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(source.calls(), 2);
        let counters = poller.counters();
        assert_eq!(counters.skipped, 2);
        assert_eq!(counters.updated, 1);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let source = Arc::new(ScriptedSource::constant("never", Duration::ZERO));
        let result = CaptionPoller::new(source, Duration::ZERO);
        assert!(matches!(result, Err(OverlayError::ZeroInterval)));
    }

    #[tokio::test]
    async fn test_tick_numeric_caption_shows_fallback() {
        let addr = spawn_server(json_router(serde_json::json!({ "caption": 42 }))).await;
        let overlay = TextOverlay::new();

        http_poller(addr).tick(&overlay).await;

        assert_eq!(overlay.current(), Some(OverlayText::BackendDown));
    }

    #[tokio::test]
    async fn test_run_stops_promptly_on_cancel() {
        let source = Arc::new(ScriptedSource::constant("never", Duration::from_secs(60)));
        let poller = Arc::new(CaptionPoller::new(source, Duration::from_secs(1)).unwrap());
        let overlay = Arc::new(TextOverlay::new());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(poller.run(overlay.clone(), cancel.clone()));
        tokio::task::yield_now().await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("poller should exit promptly on cancel")
            .unwrap();
        assert!(overlay.current().is_none());
    }
}
