//! Audit/security event sink.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use coachgate_core::UserId;

/// Request coordinates carried through the pipeline for logging and audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestMeta {
    pub method: String,
    pub path: String,
}

impl RequestMeta {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// A principal lookup happened (success or failure).
    PrincipalResolution,
    /// A trainer was refused a permission-gated action.
    PermissionDenied,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub kind: AuditKind,
    pub principal_id: Option<UserId>,
    pub path: String,
    pub method: String,
    /// Decision code (`allowed`, `user_not_found`, `permission_required`, ...).
    pub outcome: String,
    pub timestamp: DateTime<Utc>,
    pub extra: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        kind: AuditKind,
        principal_id: Option<UserId>,
        request: &RequestMeta,
        outcome: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            principal_id,
            path: request.path.clone(),
            method: request.method.clone(),
            outcome: outcome.into(),
            timestamp,
            extra: serde_json::Value::Null,
        }
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = extra;
        self
    }
}

/// Fire-and-forget audit collaborator.
///
/// `record` must not block and cannot fail: an unavailable backend drops or
/// buffers events on its own terms, never the request.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Writes audit events as structured `tracing` events on the `audit` target.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let principal_id = event
            .principal_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        let extra = if event.extra.is_null() {
            String::new()
        } else {
            event.extra.to_string()
        };

        if event.outcome == "allowed" {
            info!(
                target: "audit",
                kind = ?event.kind,
                principal_id = %principal_id,
                path = %event.path,
                method = %event.method,
                outcome = %event.outcome,
                extra = %extra,
                "audit event"
            );
        } else {
            warn!(
                target: "audit",
                kind = ?event.kind,
                principal_id = %principal_id,
                path = %event.path,
                method = %event.method,
                outcome = %event.outcome,
                extra = %extra,
                "audit event"
            );
        }
    }
}
