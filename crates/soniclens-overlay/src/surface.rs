//! Display surfaces written by the camera attacher and the caption poller.
//!
//! Each surface is owned by exactly one writer. Readers observe the latest
//! value through a `watch` channel; the last write wins.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info};

use soniclens_types::{CaptureStatus, OverlayText};

use crate::camera::{MediaStream, VideoFrame};

/// A surface that renders a single line of overlay text.
pub trait TextSurface: Send + Sync {
    fn set_text(&self, text: &OverlayText);
}

/// A surface that renders a live video stream.
pub trait VideoSurface: Send + Sync {
    /// Bind `stream` as the surface's source.
    fn attach(&self, stream: MediaStream);
    /// Switch to the fallback state after a failed capture request.
    fn show_unavailable(&self, reason: &str);
}

/// Text written to a [`TextOverlay`], stamped with the write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayLine {
    pub text: OverlayText,
    pub updated_at: DateTime<Utc>,
}

/// In-process text overlay backed by a `watch` channel.
pub struct TextOverlay {
    tx: watch::Sender<Option<OverlayLine>>,
}

impl TextOverlay {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Current overlay text, or `None` before the first write.
    pub fn current(&self) -> Option<OverlayText> {
        self.tx.borrow().as_ref().map(|line| line.text.clone())
    }

    /// Current overlay line including its timestamp.
    pub fn line(&self) -> Option<OverlayLine> {
        self.tx.borrow().clone()
    }

    /// Receive every subsequent write.
    pub fn subscribe(&self) -> watch::Receiver<Option<OverlayLine>> {
        self.tx.subscribe()
    }
}

impl Default for TextOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSurface for TextOverlay {
    fn set_text(&self, text: &OverlayText) {
        self.tx.send_replace(Some(OverlayLine {
            text: text.clone(),
            updated_at: Utc::now(),
        }));
    }
}

/// In-process video pane holding the bound capture stream.
pub struct VideoPane {
    status: watch::Sender<CaptureStatus>,
    stream: Mutex<Option<MediaStream>>,
}

impl VideoPane {
    pub fn new() -> Self {
        let (status, _rx) = watch::channel(CaptureStatus::Pending);
        Self {
            status,
            stream: Mutex::new(None),
        }
    }

    pub fn status(&self) -> CaptureStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureStatus> {
        self.status.subscribe()
    }

    /// Latest frame delivered by the bound stream, if any.
    pub fn latest_frame(&self) -> Option<VideoFrame> {
        let slot = self.stream.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().and_then(MediaStream::latest_frame)
    }

    /// Mark the pane as intentionally empty.
    pub fn set_disabled(&self) {
        self.status.send_replace(CaptureStatus::Disabled);
    }

    /// Stop and drop the bound stream, if any.
    pub fn release(&self) {
        let stream = self
            .stream
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut stream) = stream {
            info!(stream_id = %stream.id(), "Releasing capture stream");
            stream.stop();
            self.status.send_replace(CaptureStatus::Disabled);
        }
    }
}

impl Default for VideoPane {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSurface for VideoPane {
    fn attach(&self, stream: MediaStream) {
        let device = stream.device().to_string();
        debug!(stream_id = %stream.id(), device, "Binding capture stream to video pane");
        let previous = self
            .stream
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(stream);
        if let Some(mut previous) = previous {
            previous.stop();
        }
        self.status.send_replace(CaptureStatus::Attached { device });
    }

    fn show_unavailable(&self, reason: &str) {
        self.status
            .send_replace(CaptureStatus::Unavailable(reason.to_string()));
    }
}
