//! Web routes.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use mood_queue::Broker;

use crate::{Bridge, BridgeError};

/// Create the bridge router.
pub fn create_router<B: Broker>(bridge: Arc<Bridge<B>>) -> Router {
    Router::new()
        .route("/api/emotion", get(handle_emotion::<B>))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(bridge)
}

/// Allow a dashboard served from `origin` to call the bridge.
pub fn with_cors(router: Router, origin: HeaderValue) -> Router {
    router.layer(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET]),
    )
}

/// Dequeue at most one emotion payload.
///
/// `200` with the payload JSON as published, or `204` when the queue is empty.
async fn handle_emotion<B: Broker>(
    State(bridge): State<Arc<Bridge<B>>>,
) -> Result<Response, BridgeError> {
    match bridge.dequeue_one().await? {
        Some(payload) => Ok((StatusCode::OK, Json(payload.into_raw())).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Liveness check. Does not touch the broker.
async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Serve `router` on `listen` until `shutdown` resolves.
pub async fn run_server<F>(router: Router, listen: &str, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(listen).await?;

    info!("bridge listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
