//! `serve` command: run the HTTP bridge against a broker.

use std::sync::Arc;

use axum::http::HeaderValue;
use miette::Result;
use tracing::info;

use mood_queue::{AmqpBroker, ConnectionManager};
use mood_web::{Bridge, create_router, run_server, with_cors};

pub async fn run(
    rabbit_url: &str,
    queue: &str,
    listen: &str,
    allow_origin: Option<&str>,
) -> Result<()> {
    let broker = AmqpBroker::new(rabbit_url);
    info!(broker = %broker.display_url(), queue, "starting bridge");

    // The broker is only contacted on the first request.
    let bridge = Arc::new(Bridge::new(ConnectionManager::new(broker, queue)));

    let mut router = create_router(bridge);
    if let Some(origin) = allow_origin {
        let origin = HeaderValue::from_str(origin)
            .map_err(|e| miette::miette!("invalid allowed origin '{}': {}", origin, e))?;
        router = with_cors(router, origin);
    }

    run_server(router, listen, shutdown_signal())
        .await
        .map_err(|e| miette::miette!("bridge server error: {}", e))?;

    info!("bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("received shutdown signal");
}
