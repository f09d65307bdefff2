//! Kill-switch administration.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};

use coachgate_auth::{Feature, Role, RoutePolicy};

use crate::app::dto::{FeatureToggleRequest, FeaturesResponse};
use crate::app::{errors, services::Services};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/admin/features", get(list_features))
        .route("/admin/features/:name", put(set_feature))
}

pub fn policy() -> RoutePolicy {
    RoutePolicy::authenticated().roles([Role::Admin])
}

/// GET /admin/features
pub async fn list_features(
    Extension(services): Extension<Arc<Services>>,
) -> axum::response::Response {
    match services.flags.snapshot() {
        Ok(snapshot) => {
            let features = snapshot
                .into_iter()
                .map(|(f, enabled)| (f.as_str().to_string(), enabled))
                .collect();
            (StatusCode::OK, Json(FeaturesResponse { features })).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// PUT /admin/features/:name
pub async fn set_feature(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(name): Path<String>,
    Json(req): Json<FeatureToggleRequest>,
) -> axum::response::Response {
    let Some(feature) = Feature::known(&name) else {
        return errors::json_error(
            StatusCode::NOT_FOUND,
            "unknown_feature",
            format!("unknown feature '{name}'"),
        );
    };

    if let Err(e) = services.flags.set_enabled(feature.clone(), req.enabled) {
        return errors::store_error_to_response(e);
    }
    tracing::warn!(
        target: "audit",
        feature = %feature,
        enabled = req.enabled,
        changed_by = %principal.principal_id(),
        "kill switch toggled"
    );

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "feature": feature,
            "enabled": services.pipeline.kill_switch().is_enabled(&feature),
        })),
    )
        .into_response()
}
