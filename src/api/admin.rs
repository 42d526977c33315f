// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! Admin-only API endpoints for account management.
//!
//! These endpoints require the Admin role and provide:
//! - User listing with role filters
//! - Partner provisioning (user + partner record in one transaction)
//! - Role changes with session revocation
//! - Coin balance adjustments
//! - Audit log queries

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::{
        password::{hash_password, looks_like_email, normalize_email, MIN_PASSWORD_LEN},
        AdminOnly, Role,
    },
    error::ApiError,
    models::{PartnerResponse, UserResponse},
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, AuditFilter, StoredPartner, StoredUser,
        DEFAULT_COMMISSION_RATE_BPS,
    },
};

/// Default page size for listings.
const DEFAULT_PAGE_SIZE: usize = 50;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for the user listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListUsersParams {
    /// Filter by role (`user`, `partner`, `admin`).
    pub role: Option<String>,
    /// Maximum number of results (default 50).
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

/// Response for the admin user listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    /// Users on this page.
    pub users: Vec<UserResponse>,
    /// Total matching users (before limit/offset).
    pub total: usize,
}

/// Request to provision a partner account.
///
/// Either promotes an existing account (`user_id`) or creates a fresh one
/// (`username` + `email` + `password`). Both paths write the partner record
/// and the role in one transaction.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProvisionPartnerRequest {
    /// Existing user to promote. Mutually exclusive with the new-account
    /// fields.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Username for a new account.
    #[serde(default)]
    pub username: Option<String>,
    /// Email for a new account.
    #[serde(default)]
    pub email: Option<String>,
    /// Initial password for a new account.
    #[serde(default)]
    pub password: Option<String>,
    /// Optional display name for a new account.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Company or trading name.
    pub company_name: String,
    /// Commission rate in basis points (default 2000 = 20%).
    #[serde(default)]
    pub commission_rate_bps: Option<u32>,
    /// Referral code; generated when omitted.
    #[serde(default)]
    pub referral_code: Option<String>,
}

/// Response after provisioning a partner.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProvisionPartnerResponse {
    /// The created user account.
    pub user: UserResponse,
    /// The created partner record.
    pub partner: PartnerResponse,
}

/// Request to change a user's role.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetRoleRequest {
    /// The new role.
    pub role: Role,
}

/// Request to adjust a user's coin balance.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AdjustCoinsRequest {
    /// Signed amount to add to the balance.
    pub delta: i64,
    /// Reason recorded in the audit trail.
    pub reason: String,
}

/// Response after a coin adjustment.
#[derive(Debug, Serialize, ToSchema)]
pub struct CoinBalanceResponse {
    /// The affected user.
    pub user_id: String,
    /// New balance.
    pub coins: i64,
}

/// Query parameters for audit log queries.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Filter by user ID.
    pub user_id: Option<String>,
    /// Filter by event type (snake_case wire name).
    pub event_type: Option<String>,
    /// Maximum number of results (default 50).
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

/// Response for audit log queries.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    /// Audit events matching the query, newest first.
    pub events: Vec<AuditEvent>,
    /// Total count (before limit/offset).
    pub total: usize,
    /// Whether there are more results.
    pub has_more: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// List user accounts.
#[utoipa::path(
    get,
    path = "/v1/admin/users",
    tag = "Admin",
    security(("bearer" = [])),
    params(ListUsersParams),
    responses(
        (status = 200, description = "User listing", body = UserListResponse),
        (status = 400, description = "Invalid role filter"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not an admin"),
    )
)]
pub async fn list_users(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Query(params): Query<ListUsersParams>,
) -> Result<Json<UserListResponse>, ApiError> {
    let role = match params.role.as_deref() {
        Some(s) => Some(
            Role::from_str(s).ok_or_else(|| ApiError::bad_request(format!("unknown role: {s}")))?,
        ),
        None => None,
    };

    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0);

    let (users, total) = state.db().list_users(role, offset, limit)?;
    Ok(Json(UserListResponse {
        users: users.into_iter().map(Into::into).collect(),
        total,
    }))
}

/// Provision a partner account.
///
/// The user row (with the partner role) and the partner record are
/// written in a single transaction, so the role and the record cannot
/// diverge. Admin accounts cannot be partners.
#[utoipa::path(
    post,
    path = "/v1/admin/partners",
    tag = "Admin",
    security(("bearer" = [])),
    request_body = ProvisionPartnerRequest,
    responses(
        (status = 201, description = "Partner provisioned", body = ProvisionPartnerResponse),
        (status = 400, description = "Invalid account or partner fields"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not an admin"),
        (status = 409, description = "Email, username, or referral code already taken"),
    )
)]
pub async fn provision_partner(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Json(request): Json<ProvisionPartnerRequest>,
) -> Result<(StatusCode, Json<ProvisionPartnerResponse>), ApiError> {
    if request.company_name.trim().is_empty() {
        return Err(ApiError::bad_request("company name is required"));
    }

    let commission_rate_bps = request
        .commission_rate_bps
        .unwrap_or(DEFAULT_COMMISSION_RATE_BPS);
    if commission_rate_bps > 10_000 {
        return Err(ApiError::bad_request(
            "commission rate cannot exceed 10000 basis points",
        ));
    }

    let referral_code = match request.referral_code {
        Some(code) => {
            let code = code.trim().to_uppercase();
            if code.len() < 4
                || code.len() > 16
                || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            {
                return Err(ApiError::bad_request(
                    "referral code must be 4-16 alphanumeric characters",
                ));
            }
            code
        }
        None => generate_referral_code(),
    };

    let (user, partner) = if let Some(ref user_id) = request.user_id {
        // Promote an existing account
        if request.username.is_some() || request.email.is_some() || request.password.is_some() {
            return Err(ApiError::bad_request(
                "user_id and new-account fields are mutually exclusive",
            ));
        }
        let partner = StoredPartner::new(
            user_id.as_str(),
            request.company_name.trim(),
            referral_code,
            commission_rate_bps,
        );
        let user = state.db().provision_partner_for_user(user_id, &partner)?;
        // The role changed, so the user's old sessions carry a stale claim
        let revoked = state.sessions().revoke_user(user_id);
        if revoked > 0 {
            tracing::info!(user_id = %user_id, revoked, "revoked sessions on partner promotion");
        }
        (user, partner)
    } else {
        // Create a fresh account carrying the partner role from the start
        let (Some(username), Some(raw_email), Some(password)) =
            (&request.username, &request.email, &request.password)
        else {
            return Err(ApiError::bad_request(
                "either user_id or username + email + password is required",
            ));
        };
        let email = normalize_email(raw_email);

        if username.len() < 3 || username.len() > 32 {
            return Err(ApiError::bad_request("username must be 3-32 characters"));
        }
        if !looks_like_email(&email) {
            return Err(ApiError::bad_request("email address is not valid"));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(ApiError::bad_request(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let password_hash = hash_password(password)
            .map_err(|e| ApiError::internal(format!("Password hashing failed: {e}")))?;

        let mut user = StoredUser::new(username.clone(), email, password_hash, Role::Partner);
        user.display_name = request.display_name;

        let partner = StoredPartner::new(
            &user.id,
            request.company_name.trim(),
            referral_code,
            commission_rate_bps,
        );
        state.db().provision_partner(&user, &partner)?;
        (user, partner)
    };

    audit_log!(
        state.db(),
        AuditEventType::PartnerProvisioned,
        &admin.user_id,
        "partner",
        &partner.id
    );
    tracing::info!(
        admin_id = %admin.user_id,
        partner_id = %partner.id,
        user_id = %user.id,
        "partner provisioned"
    );

    Ok((
        StatusCode::CREATED,
        Json(ProvisionPartnerResponse {
            user: user.into(),
            partner: partner.into(),
        }),
    ))
}

/// Change a user's role.
///
/// Every live session of the affected user is revoked so a stale role
/// claim cannot outlive the change. Promoting to partner requires an
/// existing partner record (use partner provisioning instead); demoting
/// a partner suspends their record.
#[utoipa::path(
    put,
    path = "/v1/admin/users/{user_id}/role",
    tag = "Admin",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User ID")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Role change not allowed"),
    )
)]
pub async fn set_role(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<SetRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    // Admins cannot demote themselves; prevents accidental lockout
    if user_id == admin.user_id && request.role != Role::Admin {
        return Err(ApiError::unprocessable("Cannot change your own role"));
    }

    let previous = state
        .db()
        .get_user(&user_id)?
        .ok_or_else(|| ApiError::not_found(format!("User {user_id}")))?;

    let updated = state.db().set_role(&user_id, request.role)?;
    let revoked = state.sessions().revoke_user(&user_id);

    let event = AuditEvent::new(AuditEventType::RoleChanged)
        .with_user(&admin.user_id)
        .with_resource("user", &user_id)
        .with_details(serde_json::json!({
            "from": previous.role,
            "to": updated.role,
            "sessions_revoked": revoked,
        }));
    if let Err(e) = state.db().append_audit(&event) {
        tracing::warn!(error = %e, "failed to append audit event");
    }
    tracing::info!(
        admin_id = %admin.user_id,
        user_id = %user_id,
        from = %previous.role,
        to = %updated.role,
        revoked_sessions = revoked,
        "role changed"
    );

    Ok(Json(updated.into()))
}

/// Adjust a user's coin balance.
#[utoipa::path(
    post,
    path = "/v1/admin/users/{user_id}/coins",
    tag = "Admin",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User ID")),
    request_body = AdjustCoinsRequest,
    responses(
        (status = 200, description = "New balance", body = CoinBalanceResponse),
        (status = 400, description = "Missing reason"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Balance would go negative"),
    )
)]
pub async fn adjust_coins(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<AdjustCoinsRequest>,
) -> Result<Json<CoinBalanceResponse>, ApiError> {
    if request.reason.trim().is_empty() {
        return Err(ApiError::bad_request("a reason is required"));
    }

    let coins = state.db().adjust_coins(&user_id, request.delta)?;

    let event = AuditEvent::new(AuditEventType::CoinsAdjusted)
        .with_user(&admin.user_id)
        .with_resource("user", &user_id)
        .with_details(serde_json::json!({
            "delta": request.delta,
            "reason": request.reason,
            "balance": coins,
        }));
    if let Err(e) = state.db().append_audit(&event) {
        tracing::warn!(error = %e, "failed to append audit event");
    }

    Ok(Json(CoinBalanceResponse { user_id, coins }))
}

/// Query the audit log.
#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    tag = "Admin",
    security(("bearer" = [])),
    params(AuditQueryParams),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 400, description = "Invalid event type"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not an admin"),
    )
)]
pub async fn query_audit(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let event_type = match params.event_type.as_deref() {
        Some(s) => Some(
            AuditEventType::parse(s)
                .ok_or_else(|| ApiError::bad_request(format!("unknown event type: {s}")))?,
        ),
        None => None,
    };

    let filter = AuditFilter {
        user_id: params.user_id,
        event_type,
    };
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0);

    let (events, total) = state.db().query_audit(&filter, offset, limit)?;
    let has_more = offset + events.len() < total;

    audit_log!(state.db(), AuditEventType::AdminAccess, &admin.user_id);

    Ok(Json(AuditLogResponse {
        events,
        total,
        has_more,
    }))
}

/// Generate an 8-character referral code.
fn generate_referral_code() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_referral_codes_are_well_formed() {
        let code = generate_referral_code();
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));

        let other = generate_referral_code();
        assert_ne!(code, other);
    }
}
