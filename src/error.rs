use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

pub(crate) const ERROR_BODY_SNIPPET_LEN: usize = 220;

/// Errors that end a streaming session.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Base URL and endpoint did not form a valid URL.
    #[error("invalid stream uri: {0}")]
    InvalidUri(#[from] url::ParseError),

    /// The base URL has no authority to hold credentials.
    #[error("stream uri cannot carry credentials")]
    InvalidCredentials,

    /// Connect, TLS or body read failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("http status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    /// A message on the stream was not valid JSON or not a status object.
    #[error("failed to decode stream message: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StreamError {
    /// Whether reconnecting after this error is likely to help.
    ///
    /// Nothing in this crate acts on it; reconnect policy belongs to the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_timeout() || err.is_connect() || err.is_body(),
            Self::HttpStatus { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || status.as_u16() == 420
            }
            Self::InvalidUri(_) | Self::InvalidCredentials | Self::Decode(_) => false,
        }
    }
}

pub(crate) fn summarize_error_body(body: &str) -> String {
    #[derive(Debug, Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        detail: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.error.or(parsed.message).or(parsed.detail) {
            return message;
        }
    }

    body.trim().chars().take(ERROR_BODY_SNIPPET_LEN).collect()
}
