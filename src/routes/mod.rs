//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Everything under the configured mount (default `/api`) is relayed to the
//! internal API by `proxy::forward`. A mount of `/` turns the forwarder into
//! the router fallback, so every path except `/healthz` is relayed.

pub mod proxy;

use axum::Router;
use axum::response::Json;
use axum::routing::{any, get};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mount = state.config.mount.clone();
    let router: Router<AppState> = Router::new().route("/healthz", get(healthz));
    let router = if mount == "/" {
        router.fallback(proxy::forward)
    } else {
        router
            .route(&mount, any(proxy::forward))
            .route(&format!("{mount}/{{*rest}}"), any(proxy::forward))
    };

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
