use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid backend url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("backend url '{0}' is not a hierarchical http(s) url")]
    UnsupportedBaseUrl(String),
    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend sent a malformed body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to read upload file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("no user is logged in")]
    NotAuthenticated,
}
