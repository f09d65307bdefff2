use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use coachgate_core::{GrantId, UserId};

/// Fine-grained trainer capability.
///
/// The set is closed: adding a capability is a code change. Unknown
/// identifiers fail to parse, so they are rejected where they enter the
/// system (configuration, admin requests) rather than during a check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionType {
    EditWorkouts,
    ViewProgress,
    ManageClients,
    AccessNutrition,
    ModifySchedules,
    ViewAnalytics,
}

impl PermissionType {
    pub const ALL: [PermissionType; 6] = [
        PermissionType::EditWorkouts,
        PermissionType::ViewProgress,
        PermissionType::ManageClients,
        PermissionType::AccessNutrition,
        PermissionType::ModifySchedules,
        PermissionType::ViewAnalytics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionType::EditWorkouts => "edit_workouts",
            PermissionType::ViewProgress => "view_progress",
            PermissionType::ManageClients => "manage_clients",
            PermissionType::AccessNutrition => "access_nutrition",
            PermissionType::ModifySchedules => "modify_schedules",
            PermissionType::ViewAnalytics => "view_analytics",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PermissionType::EditWorkouts => "Edit Workouts",
            PermissionType::ViewProgress => "View Progress",
            PermissionType::ManageClients => "Manage Clients",
            PermissionType::AccessNutrition => "Access Nutrition",
            PermissionType::ModifySchedules => "Modify Schedules",
            PermissionType::ViewAnalytics => "View Analytics",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PermissionType::EditWorkouts => "Create and modify workout logs for assigned clients",
            PermissionType::ViewProgress => "View client progress, measurements and history",
            PermissionType::ManageClients => "Manage client profiles and assignments",
            PermissionType::AccessNutrition => "View and edit client nutrition plans",
            PermissionType::ModifySchedules => "Create and change session schedules",
            PermissionType::ViewAnalytics => "Access aggregated performance analytics",
        }
    }
}

impl core::fmt::Display for PermissionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown permission type '{0}'")]
pub struct UnknownPermission(pub String);

impl FromStr for PermissionType {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        PermissionType::ALL
            .into_iter()
            .find(|p| p.as_str() == needle)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// Grants within this window of their expiry are reported as expiring soon.
pub const EXPIRING_SOON_WINDOW_DAYS: i64 = 7;

/// A capability assigned to a trainer by an admin.
///
/// Read-only to the access core; the lifecycle (grant/revoke/extend) is owned
/// by whichever store backs [`crate::PermissionStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub id: GrantId,
    pub trainer_id: UserId,
    pub permission_type: PermissionType,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<UserId>,
    pub notes: Option<String>,
}

impl PermissionGrant {
    /// A grant is effective iff it is active and not yet expired at `now`.
    ///
    /// Never cache the result across requests: revocation and expiry must be
    /// observed on the very next check.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|exp| exp > now)
    }

    pub fn is_expiring_soon(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => {
                self.is_effective(now) && exp - now <= Duration::days(EXPIRING_SOON_WINDOW_DAYS)
            }
            None => false,
        }
    }

    /// Whole days until expiry, rounded up. `None` for grants that never expire.
    pub fn days_until_expiration(&self, now: DateTime<Utc>) -> Option<i64> {
        let remaining = self.expires_at? - now;
        if remaining <= Duration::zero() {
            return Some(0);
        }
        let days = remaining.num_days();
        if remaining > Duration::days(days) {
            Some(days + 1)
        } else {
            Some(days)
        }
    }
}
