//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the immutable config and one pooled `reqwest::Client`; both are
//! cheap to clone, so concurrent requests share connections without locks.

use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::error::ProxyError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub http: reqwest::Client,
}

impl AppState {
    /// Build state and the outbound HTTP client from config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeouts.request {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.timeouts.connect {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ProxyError::HttpClientBuild(e.to_string()))?;

        Ok(Self { config: Arc::new(config), http })
    }
}
