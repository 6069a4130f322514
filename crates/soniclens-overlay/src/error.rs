use thiserror::Error;

/// Why a single caption poll fell back to the "backend not running" text.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("caption request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("caption response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors raised while setting up an overlay session.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Config error: {0}")]
    Config(#[from] soniclens_config::ConfigError),
    #[error("Invalid caption endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Poll interval must be greater than zero")]
    ZeroInterval,
}
