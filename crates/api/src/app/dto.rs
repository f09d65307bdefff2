//! Request/response DTOs and JSON mapping helpers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use coachgate_auth::{PermissionGrant, PermissionType};
use coachgate_core::{GrantId, UserId};
use coachgate_infra::{GrantPage, GrantStats};

// ─────────────────────────────────────────────────────────────────────────────
// Workouts / progress / AI
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateWorkoutRequest {
    pub client_id: UserId,
    pub title: String,
    #[serde(default)]
    pub exercises: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct WorkoutResponse {
    pub id: uuid::Uuid,
    pub trainer_id: UserId,
    pub client_id: UserId,
    pub title: String,
    pub exercises: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub client_id: UserId,
    pub viewed_by: UserId,
    pub entries: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct WorkoutPlanRequest {
    pub goal: String,
    #[serde(default = "default_days_per_week")]
    pub days_per_week: u8,
}

fn default_days_per_week() -> u8 {
    3
}

#[derive(Debug, Serialize)]
pub struct WorkoutPlanAccepted {
    pub plan_id: uuid::Uuid,
    pub status: &'static str,
    pub requested_by: UserId,
    pub goal: String,
    pub days_per_week: u8,
}

// ─────────────────────────────────────────────────────────────────────────────
// Permissions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PermissionTypeDto {
    pub value: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

impl From<PermissionType> for PermissionTypeDto {
    fn from(p: PermissionType) -> Self {
        Self {
            value: p.as_str(),
            label: p.label(),
            description: p.description(),
        }
    }
}

/// A grant plus its state at response time.
#[derive(Debug, Serialize)]
pub struct GrantDto {
    pub id: GrantId,
    pub trainer_id: UserId,
    pub permission_type: PermissionType,
    pub label: &'static str,
    pub is_active: bool,
    pub is_effective: bool,
    pub is_expiring_soon: bool,
    pub days_until_expiration: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<UserId>,
    pub notes: Option<String>,
}

impl GrantDto {
    pub fn at(grant: PermissionGrant, now: DateTime<Utc>) -> Self {
        Self {
            is_effective: grant.is_effective(now),
            is_expiring_soon: grant.is_expiring_soon(now),
            days_until_expiration: grant.days_until_expiration(now),
            label: grant.permission_type.label(),
            id: grant.id,
            trainer_id: grant.trainer_id,
            permission_type: grant.permission_type,
            is_active: grant.is_active,
            expires_at: grant.expires_at,
            granted_by: grant.granted_by,
            granted_at: grant.granted_at,
            revoked_at: grant.revoked_at,
            revoked_by: grant.revoked_by,
            notes: grant.notes,
        }
    }
}

/// `permission_type` arrives as a string so unknown identifiers can be
/// answered with a precise 400 instead of a generic body rejection.
#[derive(Debug, Deserialize)]
pub struct GrantPermissionRequest {
    pub trainer_id: UserId,
    pub permission_type: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RevokePermissionRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExtendPermissionRequest {
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckPermissionRequest {
    /// Defaults to the caller for trainers; required for admins.
    #[serde(default)]
    pub trainer_id: Option<UserId>,
    pub permission_type: String,
}

#[derive(Debug, Serialize)]
pub struct CheckPermissionResponse {
    pub trainer_id: UserId,
    pub permission_type: PermissionType,
    pub has_permission: bool,
    pub is_expiring_soon: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub days_until_expiration: Option<i64>,
}

/// Query string for `GET /permissions`. Ids and types stay strings so bad
/// values get the same JSON errors as the request bodies.
#[derive(Debug, Default, Deserialize)]
pub struct ListGrantsQuery {
    pub trainer_id: Option<String>,
    pub permission_type: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub include_expired: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PaginationDto {
    pub page: u32,
    pub limit: u32,
    pub total_count: usize,
    pub total_pages: usize,
}

#[derive(Debug, Serialize)]
pub struct GrantListResponse {
    pub permissions: Vec<GrantDto>,
    pub pagination: PaginationDto,
}

impl GrantListResponse {
    pub fn at(page: GrantPage, now: DateTime<Utc>) -> Self {
        Self {
            pagination: PaginationDto {
                page: page.page,
                limit: page.limit,
                total_count: page.total_count,
                total_pages: page.total_pages,
            },
            permissions: page.grants.into_iter().map(|g| GrantDto::at(g, now)).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GrantStatsResponse {
    pub total_permissions: usize,
    pub active_permissions: usize,
    pub revoked_permissions: usize,
    pub expired_permissions: usize,
    pub expiring_permissions: usize,
    pub total_trainers: usize,
    pub trainers_with_permissions: usize,
    /// Active grants per trainer account, one decimal.
    pub average_permissions_per_trainer: f64,
    pub permission_type_distribution: BTreeMap<&'static str, usize>,
}

impl GrantStatsResponse {
    pub fn new(stats: GrantStats, total_trainers: usize) -> Self {
        let average = if total_trainers == 0 {
            0.0
        } else {
            (stats.effective as f64 / total_trainers as f64 * 10.0).round() / 10.0
        };
        Self {
            total_permissions: stats.total,
            active_permissions: stats.effective,
            revoked_permissions: stats.revoked,
            expired_permissions: stats.expired,
            expiring_permissions: stats.expiring_soon,
            total_trainers,
            trainers_with_permissions: stats.trainers_with_grants,
            average_permissions_per_trainer: average,
            permission_type_distribution: stats
                .by_type
                .into_iter()
                .map(|(p, n)| (p.as_str(), n))
                .collect(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Kill switch
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FeatureToggleRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct FeaturesResponse {
    pub features: BTreeMap<String, bool>,
}
