//! Webcam capture through `nokhwa`.
//!
//! The camera handle lives on a dedicated thread for the whole stream; the
//! returned [`MediaStream`] receives decoded frames over a `watch` channel and
//! stops the thread when it is stopped or dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use async_trait::async_trait;
use bytes::Bytes;
use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::camera::{CaptureDevice, CaptureError, CaptureRequest, MediaStream, VideoFrame};

/// Native webcam selected by index.
pub struct WebcamCapture {
    index: u32,
    label: String,
}

impl WebcamCapture {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            label: format!("camera #{index}"),
        }
    }

    /// Names of the capture devices the native backend can see.
    pub fn list_devices() -> Result<Vec<String>, CaptureError> {
        let devices = nokhwa::query(ApiBackend::Auto).map_err(backend_error)?;
        Ok(devices.iter().map(|d| d.human_name()).collect())
    }
}

#[async_trait]
impl CaptureDevice for WebcamCapture {
    fn label(&self) -> &str {
        &self.label
    }

    async fn request_stream(&self, request: CaptureRequest) -> Result<MediaStream, CaptureError> {
        if request.audio {
            return Err(CaptureError::AudioUnsupported);
        }

        let index = self.index;
        let (ready_tx, ready_rx) = oneshot::channel();
        let (frame_tx, frame_rx) = watch::channel(None);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        thread::Builder::new()
            .name(format!("webcam-{index}"))
            .spawn(move || run_camera(index, ready_tx, frame_tx, stop_flag))
            .map_err(|e| CaptureError::Backend(format!("failed to spawn capture thread: {e}")))?;

        let device = ready_rx
            .await
            .map_err(|_| CaptureError::Backend("capture thread exited before opening".into()))??;

        Ok(MediaStream::new(device, frame_rx, move || {
            stop.store(true, Ordering::Release);
        }))
    }
}

fn run_camera(
    index: u32,
    ready: oneshot::Sender<Result<String, CaptureError>>,
    frames: watch::Sender<Option<VideoFrame>>,
    stop: Arc<AtomicBool>,
) {
    let mut camera = match open_camera(index) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let device = camera.info().human_name();
    if ready.send(Ok(device.clone())).is_err() {
        let _ = camera.stop_stream();
        return;
    }
    info!(device, index, "Webcam stream running");

    let mut sequence = 0u64;
    while !stop.load(Ordering::Acquire) {
        let buffer = match camera.frame() {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!(device, "Webcam frame read failed: {e}");
                break;
            }
        };
        match buffer.decode_image::<RgbFormat>() {
            Ok(image) => {
                sequence += 1;
                let (width, height) = image.dimensions();
                frames.send_replace(Some(VideoFrame {
                    width,
                    height,
                    sequence,
                    rgb: Bytes::from(image.into_raw()),
                }));
            }
            Err(e) => debug!(device, "Dropping undecodable frame: {e}"),
        }
    }

    if let Err(e) = camera.stop_stream() {
        warn!(device, "Failed to stop webcam stream: {e}");
    }
    info!(device, frames = sequence, "Webcam stream stopped");
}

// TODO: call nokhwa::nokhwa_initialize on macOS so the OS permission prompt
// resolves before the device is opened.
fn open_camera(index: u32) -> Result<Camera, CaptureError> {
    let devices = nokhwa::query(ApiBackend::Auto).map_err(backend_error)?;
    if devices.is_empty() {
        return Err(CaptureError::NoDevice);
    }

    let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
    let mut camera = Camera::new(CameraIndex::Index(index), format).map_err(backend_error)?;
    camera.open_stream().map_err(backend_error)?;
    Ok(camera)
}

fn backend_error(e: nokhwa::NokhwaError) -> CaptureError {
    CaptureError::Backend(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_webcam_rejects_audio() {
        let err = WebcamCapture::new(0)
            .request_stream(CaptureRequest {
                video: true,
                audio: true,
            })
            .await
            .unwrap_err();
        assert_eq!(err, CaptureError::AudioUnsupported);
    }

    #[test]
    fn test_label() {
        assert_eq!(WebcamCapture::new(2).label(), "camera #2");
    }
}
