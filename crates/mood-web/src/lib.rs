//! HTTP bridge from the emotions queue to dashboard clients.
//!
//! Each `GET /api/emotion` takes at most one message off the durable queue,
//! acknowledges it and hands its JSON to the caller, or answers
//! `204 No Content` when nothing is pending.

mod bridge;
mod error;
mod routes;

pub use bridge::Bridge;
pub use error::BridgeError;
pub use routes::{create_router, run_server, with_cors};
