//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: collaborator wiring (directory, grants, flags, governor, pipeline)
//! - `routes/`: HTTP routes + handlers, each group with its access policy
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{Services, build_services, build_services_with_clock, spawn_rate_window_pruner};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<Services>) -> Router {
    let protected = routes::router(&services.pipeline).layer(Extension(services));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
