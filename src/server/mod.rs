//! HTTP transport for the trade dispatcher.
//!
//! Thin adapter: decodes trades off the request, runs them through a
//! [`Dispatcher`], and streams results back. Each request is its own
//! dispatch run, sharing one processor.

pub mod handler;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::error::Result;
use crate::processor::TradeProcessor;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher<TradeProcessor>,
}

impl AppState {
    pub fn new(processor: TradeProcessor, config: DispatchConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(Arc::new(processor), config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/trades/process", post(handler::process_trades))
        .route("/health", get(handler::health))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then drain open connections.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("server shut down");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c"),
        () = terminate => info!("received SIGTERM"),
    }
}
