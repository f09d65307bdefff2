use axum::{
    Extension, Json, Router, http::StatusCode, response::IntoResponse, routing::post,
};

use coachgate_auth::{Feature, Role, RoutePolicy};

use crate::app::dto::{WorkoutPlanAccepted, WorkoutPlanRequest};
use crate::app::errors;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/ai/workout-plans", post(request_workout_plan))
}

pub fn policy() -> RoutePolicy {
    RoutePolicy::authenticated()
        .feature(Feature::AI_GENERATION)
        .roles([Role::Client, Role::Trainer])
}

/// POST /ai/workout-plans
///
/// Accepts the request for asynchronous generation.
pub async fn request_workout_plan(
    Extension(principal): Extension<PrincipalContext>,
    Json(req): Json<WorkoutPlanRequest>,
) -> axum::response::Response {
    if req.goal.trim().is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "goal is required");
    }
    if !(1..=7).contains(&req.days_per_week) {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "days_per_week must be between 1 and 7",
        );
    }

    let accepted = WorkoutPlanAccepted {
        plan_id: uuid::Uuid::now_v7(),
        status: "queued",
        requested_by: principal.principal_id(),
        goal: req.goal.trim().to_string(),
        days_per_week: req.days_per_week,
    };
    (StatusCode::ACCEPTED, Json(accepted)).into_response()
}
