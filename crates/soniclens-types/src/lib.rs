use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overlay text shown when the server answered but has no caption.
pub const NO_CAPTION_YET: &str = "No caption yet";

/// Overlay text shown when the caption request or its decoding failed.
pub const BACKEND_NOT_RUNNING: &str = "Backend not running";

// ──────────────────── Caption Types ────────────────────

/// Body of a successful `GET /latest_caption` response.
///
/// Unknown fields are ignored; `caption` may be absent, null or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionResponse {
    /// Most recent caption produced by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl CaptionResponse {
    /// Map the payload onto what the text overlay should show.
    pub fn overlay_text(&self) -> OverlayText {
        match self.caption.as_deref() {
            Some(caption) if !caption.is_empty() => OverlayText::Caption(caption.to_string()),
            _ => OverlayText::NoCaptionYet,
        }
    }
}

/// Text written into the overlay surface by a poll tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum OverlayText {
    /// A caption, displayed verbatim.
    Caption(String),
    /// The server responded without a caption.
    NoCaptionYet,
    /// The server could not be reached or returned an undecodable body.
    BackendDown,
}

impl OverlayText {
    pub fn as_str(&self) -> &str {
        match self {
            OverlayText::Caption(text) => text,
            OverlayText::NoCaptionYet => NO_CAPTION_YET,
            OverlayText::BackendDown => BACKEND_NOT_RUNNING,
        }
    }
}

impl fmt::Display for OverlayText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single poll tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    /// The overlay was overwritten with new text.
    Updated { text: OverlayText },
    /// The server answered with a non-2xx status; the overlay keeps its old text.
    Unchanged { status: u16 },
    /// The previous request was still in flight, so this tick did nothing.
    Skipped,
}

/// Counters accumulated by a running caption poller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollCounters {
    /// Requests issued.
    pub requests: u64,
    /// Ticks that overwrote the overlay with a caption or placeholder.
    pub updated: u64,
    /// Ticks that fell back to the "backend not running" text.
    pub failed: u64,
    /// Ticks answered with a non-2xx status.
    pub unchanged: u64,
    /// Ticks skipped because a request was still in flight.
    pub skipped: u64,
}

// ──────────────────── Capture Types ────────────────────

/// State of the video surface's source binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum CaptureStatus {
    /// The capture request has not completed yet.
    Pending,
    /// No stream is bound: camera turned off in configuration, or released.
    Disabled,
    /// A stream from the named device is bound to the surface.
    Attached { device: String },
    /// The capture request failed; the surface shows a fallback state.
    Unavailable(String),
}

impl CaptureStatus {
    pub fn is_attached(&self) -> bool {
        matches!(self, CaptureStatus::Attached { .. })
    }
}

// ──────────────────── Backend Types ────────────────────

/// Body of the caption server's root endpoint (`GET /`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub message: String,
}

// ──────────────────── Session Types ────────────────────

/// Point-in-time view of an overlay session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlaySnapshot {
    /// Current overlay text; `None` until the first tick updates it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<OverlayText>,
    /// When the overlay text was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Video surface binding.
    pub capture: CaptureStatus,
    /// Poller counters.
    pub counters: PollCounters,
}
