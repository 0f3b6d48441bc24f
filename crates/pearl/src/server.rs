//! HTTP plumbing: axum router, health checks, the access log and graceful
//! shutdown. All image logic lives in `pearl_core::Gateway`.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use pearl_core::{Gateway, GatewayError, ImageResponse};
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    gateway: Arc<Gateway>,
    request_timeout: Duration,
}

/// Routes: `/health` and `/healthcheck`, everything else goes to the
/// gateway.
pub fn router(gateway: Arc<Gateway>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthcheck", get(health_check))
        .fallback(serve_image)
        .with_state(AppState {
            gateway,
            request_timeout,
        })
}

/// Serve until `shutdown` resolves.
pub async fn run(
    listener: TcpListener,
    gateway: Arc<Gateway>,
    request_timeout: Duration,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(gateway, request_timeout))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

async fn serve_image(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    let start = Instant::now();
    let query = uri.query().unwrap_or("");

    let result = tokio::time::timeout(state.request_timeout, state.gateway.serve(uri.path(), query))
        .await
        .unwrap_or_else(|_| {
            Err(GatewayError::Timeout {
                timeout_ms: state.request_timeout.as_millis() as u64,
            })
        });

    let (response, size) = match result {
        Ok(image) => {
            let size = image.image.bytes.len();
            (image_response(image), size)
        }
        Err(e) => error_response(&e),
    };

    info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        size,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request"
    );
    response
}

fn image_response(response: ImageResponse) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, response.image.mime_type),
            (header::CACHE_CONTROL, response.cache_control),
        ],
        response.image.bytes,
    )
        .into_response()
}

/// Status and a plain-text body. Only "no route" explains itself; other
/// failures get the canonical reason phrase.
fn error_response(err: &GatewayError) -> (Response, usize) {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match err {
        GatewayError::NoRoute { .. } => err.to_string(),
        _ => status.canonical_reason().unwrap_or("Error").to_string(),
    };
    let size = body.len();
    (
        (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response(),
        size,
    )
}

/// Resolves on Ctrl-C (or SIGTERM on Unix).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
