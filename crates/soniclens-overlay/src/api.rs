//! HTTP client for the caption server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::{Host, Url};

use soniclens_config::CaptionConfig;
use soniclens_types::{BackendInfo, CaptionResponse};

use crate::error::{OverlayError, PollError};

/// What a caption request produced, short of a transport or decode failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionFetch {
    /// 2xx response with a decoded body.
    Caption(CaptionResponse),
    /// Non-2xx response; the body is not read.
    Status(u16),
}

/// Anything the poller can ask for the latest caption.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Where requests go, for logging.
    fn endpoint(&self) -> &str;
    /// Fetch the latest caption once.
    async fn fetch_caption(&self) -> Result<CaptionFetch, PollError>;
}

/// Caption server client over `reqwest`.
pub struct CaptionApi {
    client: Client,
    endpoint: Url,
}

impl CaptionApi {
    /// Create a client for `endpoint`, bounding every request by `timeout`.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, OverlayError> {
        let endpoint = Url::parse(endpoint)?;

        let mut builder = Client::builder().timeout(timeout);
        // Loopback requests bypass any system proxy.
        if is_loopback(&endpoint) {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(OverlayError::Client)?;

        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &CaptionConfig) -> Result<Self, OverlayError> {
        Self::new(&config.endpoint, config.request_timeout())
    }

    /// Root URL of the caption server (`scheme://host:port/`).
    pub fn base_url(&self) -> Url {
        let mut base = self.endpoint.clone();
        base.set_path("/");
        base.set_query(None);
        base.set_fragment(None);
        base
    }

    /// Probe the server root (`GET /`).
    pub async fn backend_info(&self) -> Result<BackendInfo, PollError> {
        let body = self
            .client
            .get(self.base_url())
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl CaptionSource for CaptionApi {
    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    async fn fetch_caption(&self) -> Result<CaptionFetch, PollError> {
        let resp = self.client.get(self.endpoint.clone()).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Ok(CaptionFetch::Status(status.as_u16()));
        }

        let body = resp.bytes().await?;
        let caption: CaptionResponse = serde_json::from_slice(&body)?;
        Ok(CaptionFetch::Caption(caption))
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn api(addr: std::net::SocketAddr) -> CaptionApi {
        CaptionApi::new(&endpoint(addr), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_base_url() {
        let api = CaptionApi::new(
            "http://localhost:8000/latest_caption?x=1",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(api.base_url().as_str(), "http://localhost:8000/");
        assert_eq!(api.endpoint(), "http://localhost:8000/latest_caption?x=1");
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = CaptionApi::new("/latest_caption", Duration::from_secs(1));
        assert!(matches!(result, Err(OverlayError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_is_loopback() {
        assert!(is_loopback(&Url::parse("http://localhost:8000/").unwrap()));
        assert!(is_loopback(&Url::parse("http://127.0.0.1:8000/").unwrap()));
        assert!(is_loopback(&Url::parse("http://[::1]:8000/").unwrap()));
        assert!(!is_loopback(&Url::parse("http://captions.example.com/").unwrap()));
    }

    #[tokio::test]
    async fn test_fetch_caption() {
        let addr = spawn_server(caption_router("a red car")).await;
        let fetch = api(addr).fetch_caption().await.unwrap();
        assert_eq!(
            fetch,
            CaptionFetch::Caption(CaptionResponse {
                caption: Some("a red car".into())
            })
        );
    }

    #[tokio::test]
    async fn test_fetch_empty_object() {
        let addr = spawn_server(empty_router()).await;
        let fetch = api(addr).fetch_caption().await.unwrap();
        assert_eq!(fetch, CaptionFetch::Caption(CaptionResponse::default()));
    }

    #[tokio::test]
    async fn test_fetch_server_error_status() {
        let addr = spawn_server(failing_router()).await;
        let fetch = api(addr).fetch_caption().await.unwrap();
        assert_eq!(fetch, CaptionFetch::Status(500));
    }

    #[tokio::test]
    async fn test_fetch_malformed_json() {
        let addr = spawn_server(malformed_router()).await;
        let err = api(addr).fetch_caption().await.unwrap_err();
        assert!(matches!(err, PollError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_non_string_caption_is_decode_error() {
        let addr = spawn_server(json_router(serde_json::json!({ "caption": 42 }))).await;
        let err = api(addr).fetch_caption().await.unwrap_err();
        assert!(matches!(err, PollError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let addr = refused_addr().await;
        let err = api(addr).fetch_caption().await.unwrap_err();
        assert!(matches!(err, PollError::Request(_)));
    }

    #[tokio::test]
    async fn test_backend_info() {
        let addr = spawn_server(caption_router("hello")).await;
        let info = api(addr).backend_info().await.unwrap();
        assert_eq!(info.message, "SonicLens Backend Running");
    }
}
