// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! User self-service endpoints.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    audit_log,
    auth::Auth,
    error::ApiError,
    models::UserResponse,
    state::AppState,
    storage::AuditEventType,
};

/// Display name length cap.
const DISPLAY_NAME_MAX: usize = 64;

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    /// The authenticated account.
    #[serde(flatten)]
    pub user: UserResponse,
    /// When the current session expires.
    pub expires_at: DateTime<Utc>,
}

/// Request to update the caller's profile.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    /// New display name; `null` clears it.
    pub display_name: Option<String>,
}

/// Get the current authenticated user's account and session info.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Account information", body = MeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<MeResponse>, ApiError> {
    // A live session whose user row is gone means the account was deleted
    // out from under it; treat the session as dead.
    let stored = state
        .db()
        .get_user(&user.user_id)?
        .ok_or_else(|| {
            state.sessions().revoke(&user.token);
            ApiError::unauthorized("Account no longer exists")
        })?;

    Ok(Json(MeResponse {
        user: stored.into(),
        expires_at: user.expires_at,
    }))
}

/// Update the current user's profile.
#[utoipa::path(
    put,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 400, description = "Invalid display name"),
        (status = 401, description = "Unauthorized"),
    )
)]
pub async fn update_current_user(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if let Some(ref name) = request.display_name {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.len() > DISPLAY_NAME_MAX {
            return Err(ApiError::bad_request(format!(
                "display name must be 1-{DISPLAY_NAME_MAX} characters"
            )));
        }
    }

    let display_name = request.display_name.map(|n| n.trim().to_string());
    let updated = state.db().update_display_name(&user.user_id, display_name)?;

    audit_log!(state.db(), AuditEventType::ProfileUpdated, &user.user_id);
    Ok(Json(updated.into()))
}
