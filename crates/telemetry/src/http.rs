// Path: crates/telemetry/src/http.rs
use axum::{
    error_handling::HandleErrorLayer,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, TextEncoder};
use std::{future::Future, net::SocketAddr, time::Duration};
use tower::{BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;

/// Renders the default registry in the text exposition format.
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    match encoder.encode(&prometheus::gather(), &mut buf) {
        Ok(()) => ([(CONTENT_TYPE, encoder.format_type().to_string())], buf).into_response(),
        Err(e) => {
            tracing::error!(target: "telemetry", error = %e, "metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn on_layer_error(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        return (StatusCode::REQUEST_TIMEOUT, "timed out".into());
    }
    if err.is::<tower::load_shed::error::Overloaded>() {
        return (StatusCode::SERVICE_UNAVAILABLE, "overloaded".into());
    }
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

/// `/metrics` and `/healthz`, shedding load past a handful of concurrent scrapes.
pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(on_layer_error))
                .layer(TraceLayer::new_for_http())
                .load_shed()
                .concurrency_limit(8)
                .timeout(Duration::from_secs(2)),
        )
}

/// Serves [`router`] on `addr` until `shutdown` resolves. Bind failures are logged,
/// not fatal: the watcher keeps running without a metrics endpoint.
pub async fn run_server<F>(addr: SocketAddr, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(target: "telemetry", %addr, error = %e, "cannot bind metrics endpoint");
            return;
        }
    };
    if let Ok(local) = listener.local_addr() {
        tracing::info!(target: "telemetry", addr = %local, "metrics endpoint listening");
    }

    let served = axum::serve(listener, router()).with_graceful_shutdown(shutdown);
    if let Err(e) = served.await {
        tracing::error!(target: "telemetry", error = %e, "metrics endpoint failed");
    }
    tracing::info!(target: "telemetry", "metrics endpoint stopped");
}
