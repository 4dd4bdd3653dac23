pub mod cors;
pub mod handlers;
pub mod state;

use crate::{config::Config, error::Result, hls::PROXY_PATH, metrics, proxy::upstream::Upstream};
use axum::{
    Router,
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use state::AppState;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Response header carrying the crate version
pub const VERSION_HEADER: &str = "x-hls-relay-version";

/// Build the router backed by the real HTTP upstream
pub fn build_router(config: Config) -> Result<Router> {
    let state = AppState::new(&config)?;
    Ok(router(state))
}

/// Build the router with an injected upstream
pub fn build_router_with_upstream(config: Config, upstream: Arc<dyn Upstream>) -> Router {
    router(AppState::with_upstream(&config, upstream))
}

fn router(state: AppState) -> Router {
    metrics::init();

    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::serve_metrics))
        .route(PROXY_PATH, get(handlers::proxy::serve_proxy))
        .layer(middleware::from_fn(cors::cors_middleware))
        .layer(middleware::from_fn(version_header))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn version_header(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response.headers_mut().insert(
        VERSION_HEADER,
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.bind_addr, config.port);

    let app = build_router(config)?;

    // Bind TCP listener
    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("🚀 Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
