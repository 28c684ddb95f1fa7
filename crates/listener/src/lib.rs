//! Uploader event source infrastructure.
//!
//! Receives storage object notifications as CloudEvents over HTTP (the push
//! format used by Eventarc and Cloud Run functions) and hands each one to
//! [`dispatcher::Uploader`].
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /` | One CloudEvent, binary or structured content mode |
//! | `GET /healthz` | Liveness |
//!
//! `POST /` answers `200` with the [`trigger::Invocation`] on every non-error
//! path. Failures map to an HTTP status and a `{"error", "retryable"}` body;
//! see [`ApiError`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport details and CloudEvent decoding live here.
//! Each request is one independent invocation. No state is shared between
//! requests beyond the immutable [`dispatcher::Uploader`].

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use dispatcher::Uploader;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use trigger::Invocation;

pub mod cloudevent;
mod error;

pub use cloudevent::{decode, decode_binary, decode_structured};
pub use error::{ApiError, ErrorBody};

/// Builds the receiver's router.
pub fn router(uploader: Arc<Uploader>) -> Router {
    Router::new()
        .route("/", post(receive))
        .route("/healthz", get(healthz))
        .with_state(uploader)
}

/// Serves [`router`] on `listener` until `shutdown` resolves, then drains
/// in-flight requests.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve<F>(
    listener: TcpListener,
    uploader: Arc<Uploader>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "listening for storage events");
    }
    axum::serve(listener, router(uploader))
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("receiver shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl+C");
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
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

async fn receive(
    State(uploader): State<Arc<Uploader>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Invocation>, ApiError> {
    let event = decode(&headers, &body)?;
    let invocation = uploader.handle(&event).await?;
    Ok(Json(invocation))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
