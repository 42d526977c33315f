// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! Audit logging for security-sensitive operations.
//!
//! Authentication events, role changes, partner provisioning, and coin
//! adjustments are appended to the `audit` table under a monotonic
//! sequence number, so queries in insertion order are a simple range scan.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::db::{Db, DbResult, AUDIT};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Account events
    UserRegistered,
    ProfileUpdated,

    // Auth events
    LoginSucceeded,
    LoginFailed,
    LoginThrottled,
    LoggedOut,
    PermissionDenied,

    // Admin events
    RoleChanged,
    PartnerProvisioned,
    CoinsAdjusted,
    AdminAccess,
}

impl AuditEventType {
    /// Parse the snake_case wire name back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// User who triggered the event (if known).
    pub user_id: Option<String>,
    /// Resource affected (user_id, partner_id, etc.).
    pub resource_id: Option<String>,
    /// Resource type (user, partner, session, etc.).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if the operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    /// Set the user ID.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with an error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Filter for audit queries. Empty filter matches everything.
#[derive(Debug, Default, Clone)]
pub struct AuditFilter {
    pub user_id: Option<String>,
    pub event_type: Option<AuditEventType>,
}

impl AuditFilter {
    fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(ref user_id) = self.user_id {
            if event.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        if let Some(event_type) = self.event_type {
            if event.event_type != event_type {
                return false;
            }
        }
        true
    }
}

impl Db {
    /// Append an audit event under the next sequence number.
    pub fn append_audit(&self, event: &AuditEvent) -> DbResult<u64> {
        let json = serde_json::to_vec(event)?;

        let write_txn = self.db.begin_write()?;
        let seq = {
            let mut audit = write_txn.open_table(AUDIT)?;
            let next = match audit.last()? {
                Some((key, _)) => key.value() + 1,
                None => 0,
            };
            audit.insert(next, json.as_slice())?;
            next
        };
        write_txn.commit()?;
        Ok(seq)
    }

    /// Query audit events, newest first.
    ///
    /// Returns `(events, total_matching)` so callers can paginate.
    pub fn query_audit(
        &self,
        filter: &AuditFilter,
        offset: usize,
        limit: usize,
    ) -> DbResult<(Vec<AuditEvent>, usize)> {
        let read_txn = self.db.begin_read()?;
        let audit = read_txn.open_table(AUDIT)?;

        let mut matching = Vec::new();
        for entry in audit.iter()?.rev() {
            let entry = entry?;
            let event: AuditEvent = serde_json::from_slice(entry.1.value())?;
            if filter.matches(&event) {
                matching.push(event);
            }
        }

        let total = matching.len();
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }
}

/// Helper macro for logging audit events.
///
/// Audit writes are best-effort: a failure to record an event must not
/// fail the request that triggered it.
#[macro_export]
macro_rules! audit_log {
    ($db:expr, $event_type:expr, $user_id:expr) => {{
        let event = $crate::storage::AuditEvent::new($event_type).with_user($user_id);
        if let Err(e) = $db.append_audit(&event) {
            tracing::warn!(error = %e, "failed to append audit event");
        }
    }};
    ($db:expr, $event_type:expr, $user_id:expr, $resource_type:expr, $resource_id:expr) => {{
        let event = $crate::storage::AuditEvent::new($event_type)
            .with_user($user_id)
            .with_resource($resource_type, $resource_id);
        if let Err(e) = $db.append_audit(&event) {
            tracing::warn!(error = %e, "failed to append audit event");
        }
    }};
}
