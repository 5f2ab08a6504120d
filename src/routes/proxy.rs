//! Catch-all forwarding route.

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ProxyError;
use crate::state::AppState;
use crate::upstream;

/// `ANY {mount}/*`: relay the request to the internal API.
///
/// Never fails: transport and parse errors become a JSON envelope.
pub async fn forward(State(state): State<AppState>, request: Request) -> Response {
    let request_id = Uuid::new_v4();
    let (parts, body) = request.into_parts();
    let path = parts.uri.path();
    let target = upstream::target_url(&state.config.base_url, path, parts.uri.query());

    info!(%request_id, method = %parts.method, path, %target, "proxying");

    let result = async {
        let body = axum::body::to_bytes(body, state.config.body_limit)
            .await
            .map_err(|e| ProxyError::RequestBody(e.to_string()))?;
        let body = upstream::prepare_body(&parts.method, &parts.headers, body, state.config.malformed_json)?;
        let response = upstream::send(&state, parts.method.clone(), &target, &parts.headers, body).await?;
        upstream::relay(&parts.method, response).await
    }
    .await;

    match result {
        Ok(response) => {
            info!(%request_id, status = response.status().as_u16(), "proxied");
            response
        }
        Err(e @ (ProxyError::InvalidJsonBody(_) | ProxyError::RequestBody(_))) => {
            warn!(%request_id, error = %e, "rejected inbound request");
            e.into_response()
        }
        Err(e) => {
            error!(%request_id, error = %e, "proxy failed");
            e.into_response()
        }
    }
}

#[cfg(test)]
#[path = "proxy_test.rs"]
mod tests;
