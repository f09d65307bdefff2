use axum::{
    Extension, Json, Router, extract::Path, http::StatusCode, response::IntoResponse, routing::get,
};

use coachgate_auth::{PermissionRequirement, PermissionType, Role, RoutePolicy};
use coachgate_core::UserId;

use crate::app::{dto::ProgressResponse, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/clients/:id/progress", get(client_progress))
}

/// Progress is readable through either lens: raw progress or analytics.
pub fn policy() -> RoutePolicy {
    RoutePolicy::authenticated()
        .roles([Role::Trainer])
        .permissions(PermissionRequirement::any([
            PermissionType::ViewProgress,
            PermissionType::ViewAnalytics,
        ]))
}

/// GET /clients/:id/progress
pub async fn client_progress(
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let client_id = match id.parse::<UserId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(ProgressResponse {
            client_id,
            viewed_by: principal.principal_id(),
            entries: Vec::new(),
        }),
    )
        .into_response()
}
