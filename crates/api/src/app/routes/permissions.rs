//! Trainer permission endpoints.
//!
//! Trainers (and admins) can inspect the catalogue and their own grants;
//! only admins can list every grant, read stats, grant, revoke or extend.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use coachgate_auth::{PermissionType, Role, RoutePolicy};
use coachgate_core::{DomainResult, GrantId, UserId};
use coachgate_infra::{GrantFilter, NewGrant, PageRequest};

use crate::app::dto::{
    CheckPermissionRequest, CheckPermissionResponse, ExtendPermissionRequest, GrantDto,
    GrantListResponse, GrantPermissionRequest, GrantStatsResponse, ListGrantsQuery,
    PermissionTypeDto, RevokePermissionRequest,
};
use crate::app::{errors, services::Services};
use crate::context::PrincipalContext;

// ─────────────────────────────────────────────────────────────────────────────
// Routers
// ─────────────────────────────────────────────────────────────────────────────

pub fn trainer_router() -> Router {
    Router::new()
        .route("/permissions/types", get(list_types))
        .route("/permissions/trainer/:id", get(list_for_trainer))
        .route("/permissions/check", post(check_permission))
}

pub fn trainer_policy() -> RoutePolicy {
    RoutePolicy::authenticated().roles([Role::Trainer])
}

pub fn admin_router() -> Router {
    Router::new()
        .route("/permissions", get(list_grants))
        .route("/permissions/stats", get(grant_stats))
        .route("/permissions/grant", post(grant_permission))
        .route("/permissions/grants/:id/revoke", put(revoke_permission))
        .route("/permissions/grants/:id/extend", put(extend_permission))
}

pub fn admin_policy() -> RoutePolicy {
    RoutePolicy::authenticated().roles([Role::Admin])
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /permissions/types
pub async fn list_types() -> impl IntoResponse {
    let types: Vec<PermissionTypeDto> = PermissionType::ALL.into_iter().map(Into::into).collect();
    Json(serde_json::json!({ "permission_types": types }))
}

/// GET /permissions/trainer/:id
pub async fn list_for_trainer(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let trainer_id = match id.parse::<UserId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(resp) = ensure_self_or_admin(&principal, trainer_id) {
        return resp;
    }

    let now = services.clock.now();
    match services.permissions.list_for_trainer(trainer_id) {
        Ok(grants) => {
            let grants: Vec<GrantDto> = grants.into_iter().map(|g| GrantDto::at(g, now)).collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "trainer_id": trainer_id,
                    "permissions": grants,
                })),
            )
                .into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// POST /permissions/check
pub async fn check_permission(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(req): Json<CheckPermissionRequest>,
) -> axum::response::Response {
    let permission_type = match parse_permission(&req.permission_type) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    // Admins hold no grants of their own, so they must name a trainer.
    let trainer_id = match (req.trainer_id, principal.is_admin()) {
        (Some(id), _) => id,
        (None, false) => principal.principal_id(),
        (None, true) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "trainer_id is required",
            );
        }
    };
    if let Err(resp) = ensure_self_or_admin(&principal, trainer_id) {
        return resp;
    }

    let now = services.clock.now();
    match services
        .permissions
        .find_effective(trainer_id, permission_type, now)
    {
        Ok(grant) => {
            let resp = CheckPermissionResponse {
                trainer_id,
                permission_type,
                has_permission: grant.is_some(),
                is_expiring_soon: grant.as_ref().is_some_and(|g| g.is_expiring_soon(now)),
                expires_at: grant.as_ref().and_then(|g| g.expires_at),
                days_until_expiration: grant.as_ref().and_then(|g| g.days_until_expiration(now)),
            };
            (StatusCode::OK, Json(resp)).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// GET /permissions
pub async fn list_grants(
    Extension(services): Extension<Arc<Services>>,
    Query(query): Query<ListGrantsQuery>,
) -> axum::response::Response {
    let (filter, page) = match list_request(query) {
        Ok(parsed) => parsed,
        Err(resp) => return resp,
    };

    let now = services.clock.now();
    match services.permissions.list(&filter, page, now) {
        Ok(page) => (StatusCode::OK, Json(GrantListResponse::at(page, now))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// GET /permissions/stats
pub async fn grant_stats(
    Extension(services): Extension<Arc<Services>>,
) -> axum::response::Response {
    match services.permissions.stats(services.clock.now()) {
        Ok(stats) => {
            let trainers = services.directory.count_role(Role::Trainer);
            (StatusCode::OK, Json(GrantStatsResponse::new(stats, trainers))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// POST /permissions/grant
pub async fn grant_permission(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(req): Json<GrantPermissionRequest>,
) -> axum::response::Response {
    let permission_type = match parse_permission(&req.permission_type) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match services.directory.get(req.trainer_id) {
        Some(p) if p.role == Role::Trainer => {}
        Some(_) => {
            return errors::json_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "not_a_trainer",
                "permissions can only be granted to trainers",
            );
        }
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "trainer not found"),
    }

    let now = services.clock.now();
    let request = NewGrant {
        trainer_id: req.trainer_id,
        permission_type,
        expires_at: req.expires_at,
        notes: req.notes,
    };
    match services
        .permissions
        .grant(request, principal.principal_id(), now)
    {
        Ok(grant) => (StatusCode::CREATED, Json(GrantDto::at(grant, now))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// PUT /permissions/grants/:id/revoke
pub async fn revoke_permission(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<RevokePermissionRequest>>,
) -> axum::response::Response {
    let grant_id = match id.parse::<GrantId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let now = services.clock.now();
    match services
        .permissions
        .revoke(grant_id, principal.principal_id(), req.notes, now)
    {
        Ok(grant) => (StatusCode::OK, Json(GrantDto::at(grant, now))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// PUT /permissions/grants/:id/extend
pub async fn extend_permission(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
    Json(req): Json<ExtendPermissionRequest>,
) -> axum::response::Response {
    let grant_id = match id.parse::<GrantId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let now = services.clock.now();
    match services
        .permissions
        .extend(grant_id, req.expires_at, req.notes, now) {
        Ok(grant) => (StatusCode::OK, Json(GrantDto::at(grant, now))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_permission(raw: &str) -> Result<PermissionType, axum::response::Response> {
    raw.parse::<PermissionType>().map_err(|e| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_permission_type", e.to_string())
    })
}

fn list_request(
    query: ListGrantsQuery,
) -> Result<(GrantFilter, PageRequest), axum::response::Response> {
    let trainer_id = query
        .trainer_id
        .map(|raw| raw.parse::<UserId>())
        .transpose()
        .map_err(errors::domain_error_to_response)?;
    let permission_type = query
        .permission_type
        .as_deref()
        .map(parse_permission)
        .transpose()?;
    let page = page_request(query.page, query.limit).map_err(errors::domain_error_to_response)?;

    let filter = GrantFilter {
        trainer_id,
        permission_type,
        is_active: query.is_active,
        include_expired: query.include_expired,
    };
    Ok((filter, page))
}

fn page_request(page: Option<u32>, limit: Option<u32>) -> DomainResult<PageRequest> {
    let defaults = PageRequest::default();
    PageRequest::new(page.unwrap_or(defaults.page), limit.unwrap_or(defaults.limit))
}

// Trainers may only look at their own grants.
fn ensure_self_or_admin(
    principal: &PrincipalContext,
    trainer_id: UserId,
) -> Result<(), axum::response::Response> {
    if principal.is_admin() || principal.principal_id() == trainer_id {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "trainers can only view their own permissions",
        ))
    }
}
