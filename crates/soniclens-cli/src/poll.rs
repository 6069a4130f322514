use std::sync::Arc;

use anyhow::{Context, Result};

use soniclens_config::SonicLensConfig;
use soniclens_overlay::{CaptionApi, CaptionPoller, TextOverlay};
use soniclens_types::PollOutcome;

/// Run a single poll tick and print the result.
pub async fn run_poll_once(config: SonicLensConfig, json: bool) -> Result<()> {
    let api = CaptionApi::from_config(&config.caption)?;
    let poller = CaptionPoller::new(Arc::new(api), config.caption.interval())?;
    let overlay = TextOverlay::new();

    let outcome = poller.tick(&overlay).await;

    if json {
        let out = serde_json::to_string_pretty(&outcome).context("Failed to encode outcome")?;
        println!("{out}");
        return Ok(());
    }

    match outcome {
        PollOutcome::Updated { text } => println!("{text}"),
        PollOutcome::Unchanged { status } => {
            println!("(overlay unchanged: server answered HTTP {status})")
        }
        PollOutcome::Skipped => println!("(tick skipped)"),
    }
    Ok(())
}

/// Probe the caption server root and print its banner.
pub async fn run_health(config: SonicLensConfig) -> Result<()> {
    let api = CaptionApi::from_config(&config.caption)?;
    match api.backend_info().await {
        Ok(info) => println!("  backend: {} ({})", info.message, api.base_url()),
        Err(e) => println!("  backend: not reachable at {} ({e})", api.base_url()),
    }
    Ok(())
}
