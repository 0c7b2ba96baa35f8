use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("WebSocket connection error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Channel client must be created inside a tokio runtime")]
    NoRuntime,

    #[error("Transport error: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Server returned {status}: {detail}")]
    Status { status: u16, detail: String },
}

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Metrics server error: {0}")]
    MetricsError(String),
}
