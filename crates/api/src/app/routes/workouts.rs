use std::sync::Arc;

use axum::{
    Extension, Json, Router, http::StatusCode, response::IntoResponse, routing::post,
};

use coachgate_auth::{PermissionRequirement, PermissionType, Role, RoutePolicy};

use crate::app::dto::{CreateWorkoutRequest, WorkoutResponse};
use crate::app::{errors, services::Services};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/workouts", post(create_workout))
}

/// Writing a client's program is a sensitive action: trainer role and an
/// effective `edit_workouts` grant.
pub fn policy() -> RoutePolicy {
    RoutePolicy::authenticated()
        .roles([Role::Trainer])
        .permissions(PermissionRequirement::all([PermissionType::EditWorkouts]))
}

/// POST /workouts
pub async fn create_workout(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(req): Json<CreateWorkoutRequest>,
) -> axum::response::Response {
    let title = req.title.trim();
    if title.is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "title is required");
    }

    let workout = WorkoutResponse {
        id: uuid::Uuid::now_v7(),
        trainer_id: principal.principal_id(),
        client_id: req.client_id,
        title: title.to_string(),
        exercises: req.exercises,
        created_at: services.clock.now(),
    };
    tracing::info!(
        workout_id = %workout.id,
        trainer_id = %workout.trainer_id,
        client_id = %workout.client_id,
        "workout created"
    );

    (StatusCode::CREATED, Json(workout)).into_response()
}
