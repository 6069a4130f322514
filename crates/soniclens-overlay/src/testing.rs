//! Stub caption server and fake caption sources shared by unit tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::http::{StatusCode, header};
use axum::routing::get;
use serde_json::json;
use tokio::sync::Mutex;

use soniclens_types::CaptionResponse;

use crate::api::{CaptionFetch, CaptionSource};
use crate::error::PollError;

/// Serve `app` on an ephemeral loopback port.
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A loopback address with nothing listening on it.
pub async fn refused_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn caption_router(caption: &'static str) -> Router {
    Router::new()
        .route(
            "/latest_caption",
            get(move || async move { axum::Json(json!({ "caption": caption })) }),
        )
        .route(
            "/",
            get(|| async { axum::Json(json!({ "message": "SonicLens Backend Running" })) }),
        )
}

pub fn json_router(body: serde_json::Value) -> Router {
    Router::new().route(
        "/latest_caption",
        get(move || async move { axum::Json(body) }),
    )
}

pub fn empty_router() -> Router {
    Router::new().route("/latest_caption", get(|| async { axum::Json(json!({})) }))
}

pub fn failing_router() -> Router {
    Router::new().route(
        "/latest_caption",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    )
}

pub fn malformed_router() -> Router {
    Router::new().route(
        "/latest_caption",
        get(|| async { ([(header::CONTENT_TYPE, "application/json")], "{\"caption\": ") }),
    )
}

pub fn endpoint(addr: SocketAddr) -> String {
    format!("http://{addr}/latest_caption")
}

/// Caption source that replays scripted answers and counts calls.
pub struct ScriptedSource {
    answers: Mutex<Vec<Result<CaptionFetch, ()>>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedSource {
    /// Always answers with `caption` after `delay`.
    pub fn constant(caption: &str, delay: Duration) -> Self {
        Self::new(
            vec![Ok(CaptionFetch::Caption(CaptionResponse {
                caption: Some(caption.to_string()),
            }))],
            delay,
        )
    }

    /// Answers in order; the last answer repeats once the script runs out.
    pub fn new(answers: Vec<Result<CaptionFetch, ()>>, delay: Duration) -> Self {
        let mut answers = answers;
        answers.reverse();
        Self {
            answers: Mutex::new(answers),
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptionSource for ScriptedSource {
    fn endpoint(&self) -> &str {
        "scripted://latest_caption"
    }

    async fn fetch_caption(&self) -> Result<CaptionFetch, PollError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let answer = {
            let mut answers = self.answers.lock().await;
            if answers.len() > 1 {
                answers.pop()
            } else {
                answers.last().cloned()
            }
        };
        match answer {
            Some(Ok(fetch)) => Ok(fetch),
            _ => Err(PollError::Decode(
                serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
            )),
        }
    }
}

