// HTTP server
// Page, sound files, listing endpoint and the host playback API
use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::future::Future;
use tokio::net::TcpListener;

use crate::commands;
use crate::state::AppState;

pub fn build_router(state: AppState, debug: bool) -> Router {
    let router = Router::new()
        .route("/", get(commands::index))
        .route("/api/sounds", get(commands::list_sounds))
        .route("/api/status", get(commands::status))
        .route("/api/sounds/:id/toggle", post(commands::toggle_sound))
        .route("/sounds/:file", get(commands::serve_sound))
        .fallback(commands::public_file)
        .with_state(state);

    if debug {
        router.layer(middleware::from_fn(log_requests))
    } else {
        router
    }
}

async fn log_requests(request: Request, next: Next) -> Response {
    tracing::debug!(
        method = %request.method(),
        uri = %request.uri(),
        headers = ?request.headers(),
        "Incoming request"
    );
    let response = next.run(request).await;
    tracing::debug!(status = %response.status(), "Response sent");
    response
}

/// Serve until `shutdown` resolves
pub async fn run_server(
    listener: TcpListener,
    state: AppState,
    debug: bool,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("Soundboard server running on http://localhost:{}", addr.port());
    tracing::debug!("Available routes:");
    tracing::debug!("  GET / - Main soundboard page");
    tracing::debug!("  GET /api/sounds - List of available sounds");
    tracing::debug!("  GET /api/status - Playback status");
    tracing::debug!("  POST /api/sounds/:id/toggle - Toggle a sound on the host");
    tracing::debug!("  GET /sounds/* - Sound files");

    axum::serve(listener, build_router(state, debug))
        .with_graceful_shutdown(shutdown)
        .await
}
