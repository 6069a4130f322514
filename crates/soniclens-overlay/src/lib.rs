//! soniclens-overlay: live camera view with a polled caption overlay.
//!
//! Two independent procedures feed two display surfaces:
//!
//! ```text
//! CaptureDevice ──request_stream()──► CameraAttacher ──attach()──► VideoPane
//! caption server ◄──GET /latest_caption── CaptionPoller ──set_text()──► TextOverlay
//! ```
//!
//! [`OverlaySession`] runs the attacher once, then owns the polling task.

pub mod api;
pub mod camera;
pub mod error;
pub mod poller;
pub mod session;
pub mod surface;
#[cfg(test)]
mod testing;
#[cfg(feature = "webcam")]
pub mod webcam;

pub use api::{CaptionApi, CaptionFetch, CaptionSource};
pub use camera::{
    CameraAttacher, CaptureDevice, CaptureError, CaptureRequest, MediaStream, StaticCapture,
    VideoFrame,
};
pub use error::{OverlayError, PollError};
pub use poller::CaptionPoller;
pub use session::OverlaySession;
pub use surface::{OverlayLine, TextOverlay, TextSurface, VideoPane, VideoSurface};
#[cfg(feature = "webcam")]
pub use webcam::WebcamCapture;
