use std::sync::Arc;

use axum::{Router, middleware::from_fn_with_state};

use coachgate_auth::{AccessPipeline, RoutePolicy};

use crate::middleware::{self, AccessState};

pub mod admin;
pub mod ai;
pub mod permissions;
pub mod progress;
pub mod system;
pub mod workouts;

/// Wrap a route group in the access pipeline with the group's policy.
///
/// Only matched routes pass through the pipeline. Unknown paths fall through
/// to the default 404 without being authenticated or charged.
pub fn guarded(routes: Router, pipeline: &Arc<AccessPipeline>, policy: RoutePolicy) -> Router {
    routes.route_layer(from_fn_with_state(
        AccessState::new(pipeline.clone(), policy),
        middleware::access_middleware,
    ))
}

/// Router for every authenticated endpoint, each group behind its own policy.
pub fn router(pipeline: &Arc<AccessPipeline>) -> Router {
    Router::new()
        .merge(guarded(system::router(), pipeline, system::policy()))
        .merge(guarded(workouts::router(), pipeline, workouts::policy()))
        .merge(guarded(progress::router(), pipeline, progress::policy()))
        .merge(guarded(ai::router(), pipeline, ai::policy()))
        .merge(guarded(
            permissions::trainer_router(),
            pipeline,
            permissions::trainer_policy(),
        ))
        .merge(guarded(
            permissions::admin_router(),
            pipeline,
            permissions::admin_policy(),
        ))
        .merge(guarded(admin::router(), pipeline, admin::policy()))
}
