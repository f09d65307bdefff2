use axum::{Extension, Json, Router, http::StatusCode, response::IntoResponse, routing::get};

use coachgate_auth::RoutePolicy;

use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/whoami", get(whoami))
}

pub fn policy() -> RoutePolicy {
    RoutePolicy::authenticated()
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let p = principal.principal();
    Json(serde_json::json!({
        "principal_id": p.id.to_string(),
        "role": p.role,
        "status": p.status,
        "email": p.email,
    }))
}
