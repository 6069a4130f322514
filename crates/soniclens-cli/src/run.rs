use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use soniclens_config::SonicLensConfig;
use soniclens_overlay::{CaptureDevice, OverlaySession};
use soniclens_types::CaptureStatus;

#[cfg(feature = "webcam")]
pub const WEBCAM_SUPPORT: &str = "enabled";
#[cfg(not(feature = "webcam"))]
pub const WEBCAM_SUPPORT: &str = "not compiled in (build with --features webcam)";

#[cfg(feature = "webcam")]
fn capture_device(config: &SonicLensConfig) -> Arc<dyn CaptureDevice> {
    Arc::new(soniclens_overlay::WebcamCapture::new(config.camera.device_index))
}

#[cfg(not(feature = "webcam"))]
fn capture_device(_config: &SonicLensConfig) -> Arc<dyn CaptureDevice> {
    Arc::new(soniclens_overlay::StaticCapture::denying(
        soniclens_overlay::CaptureError::Backend("webcam support not compiled in".into()),
    ))
}

/// Run an overlay session, echoing overlay changes to the terminal until Ctrl-C.
pub async fn run_overlay(config: SonicLensConfig) -> Result<()> {
    let device = config.camera.enabled.then(|| capture_device(&config));
    let session = OverlaySession::start(&config, device)?;

    let mut camera = session.video().subscribe();
    print_capture_status(&camera.borrow_and_update());

    let mut overlay = session.text().subscribe();
    let mut shown: Option<String> = None;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {e}");
                }
                break;
            }
            changed = camera.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = camera.borrow_and_update().clone();
                print_capture_status(&status);
            }
            changed = overlay.changed() => {
                if changed.is_err() {
                    break;
                }
                let text = overlay
                    .borrow_and_update()
                    .as_ref()
                    .map(|line| line.text.to_string());
                if let Some(text) = text {
                    if shown.as_deref() != Some(text.as_str()) {
                        println!("[caption] {text}");
                        shown = Some(text);
                    }
                }
            }
        }
    }

    let counters = session.counters();
    info!(
        requests = counters.requests,
        failed = counters.failed,
        unchanged = counters.unchanged,
        skipped = counters.skipped,
        "Shutting down overlay"
    );
    session.stop().await;
    Ok(())
}

fn print_capture_status(status: &CaptureStatus) {
    match status {
        CaptureStatus::Attached { device } => println!("[camera] {device}"),
        CaptureStatus::Unavailable(reason) => println!("[camera] unavailable: {reason}"),
        CaptureStatus::Disabled => println!("[camera] disabled"),
        CaptureStatus::Pending => println!("[camera] waiting for capture grant"),
    }
}
