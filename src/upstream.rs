//! Upstream forwarding: target URL, outbound body, send, and relay.
//!
//! DESIGN
//! ======
//! Pure helpers (`target_url`, `prepare_body`, `truncate_chars`) are split
//! from the two async steps (`send`, `relay`) so the request shaping can be
//! tested without a network. The outbound request always carries
//! `Content-Type: application/json` regardless of the inbound type.

use axum::body::Bytes;
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::Value;
use tracing::{error, warn};

use crate::config::MalformedJsonPolicy;
use crate::error::{ErrorEnvelope, ProxyError, error_chain};
use crate::state::AppState;

const JSON_MIME: &str = "application/json";

/// Max characters of a non-JSON upstream body returned in `details`.
pub const DETAILS_LIMIT: usize = 500;
/// Max characters of a non-JSON upstream body written to the log.
pub const LOG_SNIPPET_LIMIT: usize = 200;

pub const BACKEND_ERROR: &str = "Backend error";
pub const BACKEND_ERROR_MESSAGE: &str = "The API returned an unexpected response";

// =============================================================================
// REQUEST SHAPING
// =============================================================================

/// `base + path + ?query`. `base` is already normalized (no trailing `/`).
#[must_use]
pub fn target_url(base: &str, path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{base}{path}?{q}"),
        _ => format!("{base}{path}"),
    }
}

/// True when the `Content-Type` header mentions `application/json`.
#[must_use]
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains(JSON_MIME))
}

/// Decide what body the outbound request carries.
///
/// `GET`/`HEAD` never carry one. JSON bodies are parsed and re-serialized;
/// a parse failure is handled per `policy`. Anything else is passed through.
///
/// # Errors
///
/// Returns [`ProxyError::InvalidJsonBody`] only under [`MalformedJsonPolicy::Reject`].
pub fn prepare_body(
    method: &Method,
    headers: &HeaderMap,
    body: Bytes,
    policy: MalformedJsonPolicy,
) -> Result<Option<Bytes>, ProxyError> {
    if *method == Method::GET || *method == Method::HEAD {
        return Ok(None);
    }

    if !is_json(headers) {
        return Ok(Some(body));
    }

    let parsed = serde_json::from_slice::<Value>(&body).and_then(|value| serde_json::to_vec(&value));
    match (parsed, policy) {
        (Ok(encoded), _) => Ok(Some(Bytes::from(encoded))),
        (Err(e), MalformedJsonPolicy::Drop) => {
            warn!(error = %e, "failed to parse JSON body; forwarding without body");
            Ok(None)
        }
        (Err(e), MalformedJsonPolicy::Raw) => {
            warn!(error = %e, "failed to parse JSON body; forwarding raw bytes");
            Ok(Some(body))
        }
        (Err(e), MalformedJsonPolicy::Reject) => Err(ProxyError::InvalidJsonBody(e)),
    }
}

/// Longest prefix of `text` holding at most `limit` characters.
#[must_use]
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// =============================================================================
// SEND
// =============================================================================

/// Issue the outbound request.
///
/// # Errors
///
/// Returns [`ProxyError::Transport`] if the request cannot be sent.
pub async fn send(
    state: &AppState,
    method: Method,
    target: &str,
    inbound: &HeaderMap,
    body: Option<Bytes>,
) -> Result<reqwest::Response, ProxyError> {
    let mut request = state.http.request(method, target).header(CONTENT_TYPE, JSON_MIME);

    for name in &state.config.forward_headers {
        // Content-Type is fixed above; Host belongs to the upstream.
        if *name == CONTENT_TYPE || *name == HOST {
            continue;
        }
        for value in inbound.get_all(name) {
            request = request.header(name.clone(), value.clone());
        }
    }

    if let Some(body) = body {
        request = request.body(body);
    }

    request.send().await.map_err(ProxyError::Transport)
}

// =============================================================================
// RELAY
// =============================================================================

/// Turn the upstream response into the response for the caller.
///
/// JSON bodies are relayed with the upstream status. Anything else becomes
/// a `Backend error` envelope carrying the first [`DETAILS_LIMIT`] chars.
/// Responses that cannot carry a body (`HEAD`, 204, 205, 304) relay the
/// status alone.
///
/// # Errors
///
/// Returns an error if the body cannot be read or a JSON body does not parse.
pub async fn relay(method: &Method, response: reqwest::Response) -> Result<Response, ProxyError> {
    let status = response.status();
    let json = is_json(response.headers());
    let bytes = response.bytes().await.map_err(ProxyError::Transport)?;

    if *method == Method::HEAD || is_bodyless(status) {
        return Ok(status.into_response());
    }

    if json {
        let data: Value =
            serde_json::from_slice(&bytes).map_err(|e| ProxyError::ResponseParse(error_chain(&e)))?;
        if !status.is_success() {
            error!(status = status.as_u16(), body = %data, "backend error");
        }
        return Ok((status, Json(data)).into_response());
    }

    let text = String::from_utf8_lossy(&bytes);
    error!(
        status = status.as_u16(),
        snippet = truncate_chars(&text, LOG_SNIPPET_LIMIT),
        "backend returned non-JSON response"
    );

    Ok(ErrorEnvelope::new(BACKEND_ERROR)
        .with_message(BACKEND_ERROR_MESSAGE)
        .with_details(truncate_chars(&text, DETAILS_LIMIT))
        .into_response_with(status))
}

fn is_bodyless(status: StatusCode) -> bool {
    status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT || status == StatusCode::NOT_MODIFIED
}

#[cfg(test)]
#[path = "upstream_test.rs"]
mod tests;
