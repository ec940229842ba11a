//! Read-only diagnostics HTTP surface (`debug_http` feature). Exposes the
//! same [`telemetry::DiagnosticsSnapshot`] the CLI and tests can already
//! read in-process, for desktop tooling that would rather poll an endpoint
//! than embed the crate.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use axum::routing::get;
use axum::{Json, Router};
use tower::timeout::TimeoutLayer;
use tracing::{error, info, warn};

use crate::telemetry::{self, DiagnosticsSnapshot};

static SERVER_STARTED: AtomicBool = AtomicBool::new(false);

/// Spawns the diagnostics server on its own thread with its own single
/// Tokio runtime, binding `127.0.0.1:<port>`. A second call is a no-op; the
/// server is meant to live for the process lifetime of the CLI.
pub fn spawn(port: u16) {
    if SERVER_STARTED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!("debug HTTP server already running");
        return;
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build tokio runtime for debug HTTP server");

        info!("debug HTTP server binding {addr}");
        runtime.block_on(async move {
            if let Err(err) = run(addr).await {
                error!("debug HTTP server stopped: {err}");
            }
        });
    });
}

async fn run(addr: SocketAddr) -> std::io::Result<()> {
    let app = Router::new()
        .route("/diagnostics", get(diagnostics))
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(5)));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn diagnostics() -> Json<DiagnosticsSnapshot> {
    Json(telemetry::hub().snapshot())
}
