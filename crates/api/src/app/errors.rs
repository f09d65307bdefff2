use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::IntoResponse;
use serde_json::json;

use coachgate_auth::{Denial, Forbidden, StoreError, retry_after_secs};
use coachgate_core::DomainError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Render a pipeline denial with its contractual status code.
pub fn denial_to_response(denial: &Denial) -> axum::response::Response {
    let status =
        StatusCode::from_u16(denial.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut body = json!({
        "error": denial.code(),
        "message": public_message(denial),
    });

    match denial {
        Denial::Forbidden(Forbidden::RoleRequired { required_roles }) => {
            body["required_roles"] = json!(required_roles);
        }
        Denial::Forbidden(Forbidden::MissingPermissions {
            mode,
            missing_permissions,
        }) => {
            body["mode"] = json!(mode);
            body["missing_permissions"] = json!(missing_permissions);
        }
        Denial::RateLimited { scope, .. } => {
            body["scope"] = json!(scope);
        }
        Denial::FeatureDisabled { feature } => {
            body["feature"] = json!(feature);
        }
        _ => {}
    }

    let retry_secs = denial.retry_after().map(|d| retry_after_secs(&d));
    if let Some(secs) = retry_secs {
        body["retry_after"] = json!(secs);
    }

    let mut response = (status, axum::Json(body)).into_response();
    if let Some(secs) = retry_secs {
        if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
    }
    response
}

// Internal details are logged by the pipeline, never returned to callers.
fn public_message(denial: &Denial) -> String {
    match denial {
        Denial::InternalError(_) => "internal error".to_string(),
        other => other.to_string(),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    tracing::error!(error = %err, "store operation failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
}
