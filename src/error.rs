use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single backend call.
///
/// "No data" is not an error: endpoints that legitimately return nothing
/// produce an empty collection instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(String),

    /// Non-2xx status; `detail` carries the backend's `detail` field when present.
    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(String::from("request timed out"))
        } else if err.is_connect() {
            Self::Transport(String::from("could not connect to backend"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("api url must start with http:// or https://: '{0}'")]
    InvalidUrl(String),

    #[error("field '{field}' must be greater than zero")]
    ZeroValue { field: &'static str },
}
