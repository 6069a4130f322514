//! Camera capture: device trait, stream handle, and the attacher that binds a
//! stream to a video surface.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::surface::VideoSurface;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture permission denied: {0}")]
    PermissionDenied(String),
    #[error("no capture device available")]
    NoDevice,
    #[error("audio capture is not supported")]
    AudioUnsupported,
    #[error("capture backend error: {0}")]
    Backend(String),
}

/// Which tracks a capture request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub video: bool,
    pub audio: bool,
}

impl CaptureRequest {
    pub const fn video_only() -> Self {
        Self {
            video: true,
            audio: false,
        }
    }
}

/// A decoded RGB frame delivered by a live stream.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
    pub rgb: Bytes,
}

type StopFn = Box<dyn FnOnce() + Send>;

/// Handle to a live capture session.
///
/// The backend keeps producing frames until [`MediaStream::stop`] is called
/// or the handle is dropped.
pub struct MediaStream {
    id: Uuid,
    device: String,
    frames: watch::Receiver<Option<VideoFrame>>,
    on_stop: Option<StopFn>,
}

impl MediaStream {
    pub fn new<F>(
        device: impl Into<String>,
        frames: watch::Receiver<Option<VideoFrame>>,
        on_stop: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            device: device.into(),
            frames,
            on_stop: Some(Box::new(on_stop)),
        }
    }

    /// A stream with no frame source, for backends that render elsewhere.
    pub fn detached(device: impl Into<String>) -> Self {
        let (_tx, frames) = watch::channel(None);
        Self {
            id: Uuid::new_v4(),
            device: device.into(),
            frames,
            on_stop: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn latest_frame(&self) -> Option<VideoFrame> {
        self.frames.borrow().clone()
    }

    pub fn frames(&self) -> watch::Receiver<Option<VideoFrame>> {
        self.frames.clone()
    }

    pub fn stop(&mut self) {
        if let Some(stop) = self.on_stop.take() {
            stop();
        }
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("live", &self.on_stop.is_some())
            .finish()
    }
}

/// A source of capture streams.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Human-readable device label.
    fn label(&self) -> &str;
    /// Ask the host for a capture stream.
    async fn request_stream(&self, request: CaptureRequest) -> Result<MediaStream, CaptureError>;
}

/// Capture device with a fixed answer: always grants a detached stream or
/// always fails with the same error.
pub struct StaticCapture {
    label: String,
    denial: Option<CaptureError>,
    requests: AtomicUsize,
}

impl StaticCapture {
    pub fn granting(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            denial: None,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn denying(error: CaptureError) -> Self {
        Self {
            label: "unavailable".into(),
            denial: Some(error),
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of capture requests received so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for StaticCapture {
    fn label(&self) -> &str {
        &self.label
    }

    async fn request_stream(&self, request: CaptureRequest) -> Result<MediaStream, CaptureError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if request.audio {
            return Err(CaptureError::AudioUnsupported);
        }
        match &self.denial {
            Some(error) => Err(error.clone()),
            None => Ok(MediaStream::detached(self.label.clone())),
        }
    }
}

/// Requests a video-only stream and binds it to a video surface.
pub struct CameraAttacher {
    device: Arc<dyn CaptureDevice>,
}

impl CameraAttacher {
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self { device }
    }

    /// Request the stream and bind it. On failure the surface is switched to
    /// its fallback state and the error is returned.
    ///
    /// Returns the label of the device that was bound.
    pub async fn attach(&self, surface: &dyn VideoSurface) -> Result<String, CaptureError> {
        info!(device = self.device.label(), "Requesting video-only capture stream");

        match self
            .device
            .request_stream(CaptureRequest::video_only())
            .await
        {
            Ok(stream) => {
                let device = stream.device().to_string();
                info!(device, stream_id = %stream.id(), "Capture stream attached");
                surface.attach(stream);
                Ok(device)
            }
            Err(e) => {
                warn!(device = self.device.label(), "Capture unavailable: {e}");
                surface.show_unavailable(&e.to_string());
                Err(e)
            }
        }
    }
}
