mod config;
mod error;
mod routes;
mod state;
mod upstream;

use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset. Quiets connection-level chatter from the
/// HTTP stack instead of filtering it after the fact.
const DEFAULT_LOG_FILTER: &str = "info,hyper=warn,hyper_util=warn,reqwest=warn";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is the normal production case.
    let dotenv = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let config = config::ProxyConfig::from_env()?;
    let addr = format!("{}:{}", config.bind_addr, config.port);
    tracing::info!(
        base_url = %config.base_url,
        mount = %config.mount,
        malformed_json = ?config.malformed_json,
        "forwarder configured"
    );

    let state = state::AppState::new(config)?;
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, "api-forwarder listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("api-forwarder stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
