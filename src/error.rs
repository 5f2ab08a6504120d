//! Forwarder errors and the JSON error envelope returned to callers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

// =============================================================================
// ENVELOPE
// =============================================================================

/// Wire shape for every failure: `{error, message?, details?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorEnvelope {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), message: None, details: None }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced while forwarding a single request.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Sending the outbound request or reading its body failed.
    #[error("upstream request failed: {}", error_chain(.0))]
    Transport(reqwest::Error),

    /// The upstream labelled its body JSON but it did not parse.
    #[error("upstream response parse failed: {0}")]
    ResponseParse(String),

    /// The inbound JSON body did not parse and the policy is `reject`.
    #[error("invalid JSON body: {0}")]
    InvalidJsonBody(serde_json::Error),

    /// The inbound body could not be read (too large or aborted).
    #[error("request body read failed: {0}")]
    RequestBody(String),

    /// The outbound HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ProxyError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidJsonBody(_) | Self::RequestBody(_) => StatusCode::BAD_REQUEST,
            Self::Transport(_) | Self::ResponseParse(_) | Self::HttpClientBuild(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text placed in the envelope's `details` field.
    #[must_use]
    pub fn details(&self) -> String {
        match self {
            Self::Transport(e) => error_chain(e),
            Self::InvalidJsonBody(e) => e.to_string(),
            Self::ResponseParse(msg) | Self::RequestBody(msg) | Self::HttpClientBuild(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let label = match &self {
            Self::InvalidJsonBody(_) => "Invalid JSON body",
            Self::RequestBody(_) => "Invalid request body",
            _ => "Proxy failed",
        };
        ErrorEnvelope::new(label)
            .with_details(self.details())
            .into_response_with(self.status())
    }
}

/// Render an error and its sources as `outer: inner: root`, skipping
/// sources whose text the outer message already contains.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = inner.source();
    }
    out
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
