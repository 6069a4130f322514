//! Overlay session: one camera attach alongside a cancellable caption poller.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use soniclens_config::SonicLensConfig;
use soniclens_types::{CaptureStatus, OverlaySnapshot, PollCounters};

use crate::api::{CaptionApi, CaptionSource};
use crate::camera::{CameraAttacher, CaptureDevice};
use crate::error::OverlayError;
use crate::poller::CaptionPoller;
use crate::surface::{TextOverlay, VideoPane};

/// A running overlay: video pane, text overlay, the camera request and the
/// polling task that feeds the overlay.
///
/// Dropping the session cancels both tasks; [`OverlaySession::stop`] also
/// waits for them to finish and releases the camera.
pub struct OverlaySession {
    video: Arc<VideoPane>,
    text: Arc<TextOverlay>,
    poller: Arc<CaptionPoller>,
    cancel: CancellationToken,
    attach: Option<JoinHandle<()>>,
    handle: Option<JoinHandle<()>>,
}

impl OverlaySession {
    /// Start a session against the caption server named in `config`.
    ///
    /// `device` is ignored when the camera is disabled in `config`.
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: &SonicLensConfig,
        device: Option<Arc<dyn CaptureDevice>>,
    ) -> Result<Self, OverlayError> {
        config.validate()?;
        let api = CaptionApi::from_config(&config.caption)?;
        let device = device.filter(|_| config.camera.enabled);
        Self::start_with(Arc::new(api), config.caption.interval(), device)
    }

    /// Start a session with an explicit caption source.
    ///
    /// The capture request is issued on its own task before the poller is
    /// spawned, and the first tick fires one interval later. Polling never
    /// waits on the camera: a slow, hung or failed capture request leaves
    /// the video pane `Pending` or in its fallback state while captions keep
    /// flowing.
    pub fn start_with(
        source: Arc<dyn CaptionSource>,
        interval: Duration,
        device: Option<Arc<dyn CaptureDevice>>,
    ) -> Result<Self, OverlayError> {
        let poller = Arc::new(CaptionPoller::new(source, interval)?);
        let video = Arc::new(VideoPane::new());
        let text = Arc::new(TextOverlay::new());
        let cancel = CancellationToken::new();

        let attach = match device {
            Some(device) => Some(tokio::spawn(attach_camera(
                device,
                video.clone(),
                cancel.child_token(),
            ))),
            None => {
                video.set_disabled();
                None
            }
        };

        let handle = tokio::spawn(
            poller
                .clone()
                .run(text.clone(), cancel.child_token()),
        );

        Ok(Self {
            video,
            text,
            poller,
            cancel,
            attach,
            handle: Some(handle),
        })
    }

    pub fn video(&self) -> &Arc<VideoPane> {
        &self.video
    }

    pub fn text(&self) -> &Arc<TextOverlay> {
        &self.text
    }

    pub fn capture_status(&self) -> CaptureStatus {
        self.video.status()
    }

    pub fn counters(&self) -> PollCounters {
        self.poller.counters()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        let line = self.text.line();
        OverlaySnapshot {
            text: line.as_ref().map(|l| l.text.clone()),
            updated_at: line.map(|l| l.updated_at),
            capture: self.video.status(),
            counters: self.poller.counters(),
        }
    }

    /// Cancel polling and any pending capture request, wait for both tasks,
    /// and release the camera.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(attach) = self.attach.take() {
            let _ = attach.await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        self.video.release();
        info!("Overlay session stopped");
    }
}

impl Drop for OverlaySession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn attach_camera(
    device: Arc<dyn CaptureDevice>,
    video: Arc<VideoPane>,
    cancel: CancellationToken,
) {
    let attacher = CameraAttacher::new(device);
    tokio::select! {
        _ = cancel.cancelled() => {
            debug!("Capture request abandoned on shutdown");
        }
        result = attacher.attach(video.as_ref()) => {
            if result.is_err() {
                info!("Continuing without camera");
            }
        }
    }
}
