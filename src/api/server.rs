//! HTTP server exposing the profiling endpoints

use axum::{routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::handlers;
use crate::core::error::{bind_error, Error, Result};
use crate::core::{AppState, Config};

/// Creates the router with every `/debug/pprof/` route and request tracing
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/debug/pprof/", get(handlers::index))
        .route("/debug/pprof/cmdline", get(handlers::cmdline))
        .route("/debug/pprof/profile", get(handlers::profile))
        .route(
            "/debug/pprof/symbol",
            get(handlers::symbol).post(handlers::symbol_post),
        )
        .route("/debug/pprof/trace", get(handlers::trace))
        // Named profiles, and the index for any other name
        .route("/debug/pprof/{cmd}", get(handlers::named_profile))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(Arc::new(state))
}

/// Bind the configured address and serve until Ctrl+C or SIGTERM
pub async fn start_server(config: &Config, state: AppState) -> Result<()> {
    let addr = config.server.addr.as_str();
    info!("Starting pprof endpoint server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| bind_error(addr, e))?;

    serve(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener.local_addr()?;
    info!("pprof endpoints available at http://{}/debug/pprof/", local);

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(Error::Serve)?;

    info!("pprof endpoint server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
