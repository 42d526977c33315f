// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! Authentication endpoints: register, login, logout, CSRF issuance.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    audit_log,
    auth::{
        password::{hash_password, looks_like_email, normalize_email, verify_password, MIN_PASSWORD_LEN},
        Auth, Role,
    },
    error::ApiError,
    models::{SessionResponse, UserResponse},
    state::AppState,
    storage::{AuditEvent, AuditEventType, DbError, StoredUser},
};

/// Username length bounds.
const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;

/// Request to register a new account.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Desired username (3-32 characters).
    pub username: String,
    /// Email address.
    pub email: String,
    /// Password (min 8 characters).
    pub password: String,
    /// Optional display name.
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Request to log in.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Email address.
    pub email: String,
    /// Password.
    pub password: String,
}

/// Response carrying a freshly issued CSRF token.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CsrfResponse {
    /// Token to send in `X-CSRF-Token` on mutating requests.
    pub csrf_token: String,
}

fn validate_new_credentials(username: &str, email: &str, password: &str) -> Result<(), ApiError> {
    if username.len() < USERNAME_MIN || username.len() > USERNAME_MAX {
        return Err(ApiError::bad_request(format!(
            "username must be between {USERNAME_MIN} and {USERNAME_MAX} characters"
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(ApiError::bad_request(
            "username may only contain letters, digits, '_' and '-'",
        ));
    }
    if !looks_like_email(email) {
        return Err(ApiError::bad_request("email address is not valid"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Register a new user account.
///
/// Issues a session immediately so the client is logged in after
/// registration.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created and session issued", body = SessionResponse),
        (status = 400, description = "Invalid username, email, or password"),
        (status = 409, description = "Email or username already taken"),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let email = normalize_email(&request.email);
    validate_new_credentials(&request.username, &email, &request.password)?;

    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Password hashing failed: {e}")))?;

    let mut user = StoredUser::new(request.username.clone(), email, password_hash, Role::User);
    user.display_name = request.display_name;

    match state.db().create_user(&user) {
        Ok(()) => {}
        Err(DbError::AlreadyExists(msg)) => return Err(ApiError::conflict(msg)),
        Err(e) => return Err(e.into()),
    }

    let issued = state.sessions().issue(&user.id, user.role);
    audit_log!(state.db(), AuditEventType::UserRegistered, &user.id);
    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user: user.into(),
        }),
    ))
}

/// Log in with email and password.
///
/// On success the response carries an opaque bearer token valid for 30
/// days; the user's role is embedded in the session at issuance.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 429, description = "Too many failed attempts"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let email = normalize_email(&request.email);

    if !state.login_limiter().check(&email) {
        let event = AuditEvent::new(AuditEventType::LoginThrottled)
            .with_details(serde_json::json!({ "email": email }))
            .failed("attempt budget exhausted");
        if let Err(e) = state.db().append_audit(&event) {
            tracing::warn!(error = %e, "failed to append audit event");
        }
        return Err(ApiError::too_many_requests(
            "Too many failed login attempts; try again later",
        ));
    }

    let user = state.db().get_user_by_email(&email)?;
    let authenticated = match user {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        _ => {
            state.login_limiter().record_failure(&email);
            let event = AuditEvent::new(AuditEventType::LoginFailed)
                .with_details(serde_json::json!({ "email": email }))
                .failed("invalid credentials");
            if let Err(e) = state.db().append_audit(&event) {
                tracing::warn!(error = %e, "failed to append audit event");
            }
            return Err(ApiError::unauthorized("Invalid email or password"));
        }
    };

    state.login_limiter().reset(&email);
    let issued = state.sessions().issue(&authenticated.id, authenticated.role);
    audit_log!(state.db(), AuditEventType::LoginSucceeded, &authenticated.id);
    tracing::info!(user_id = %authenticated.id, role = %authenticated.role, "login");

    Ok(Json(SessionResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user: authenticated.into(),
    }))
}

/// Log out the current session.
///
/// The bearer token is evicted from the session store and is not valid
/// afterwards.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Unauthorized"),
    )
)]
pub async fn logout(Auth(user): Auth, State(state): State<AppState>) -> StatusCode {
    state.sessions().revoke(&user.token);
    audit_log!(state.db(), AuditEventType::LoggedOut, &user.user_id);
    StatusCode::NO_CONTENT
}

/// Issue a CSRF token for the current session.
///
/// The token must accompany all mutating requests in `X-CSRF-Token`.
/// Re-issuing replaces the previous token.
#[utoipa::path(
    get,
    path = "/v1/auth/csrf",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "CSRF token issued", body = CsrfResponse),
        (status = 401, description = "Unauthorized"),
    )
)]
pub async fn csrf_token(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<CsrfResponse>, ApiError> {
    // The session was live a moment ago in the extractor; a miss here
    // means it was revoked or expired in between.
    let csrf_token = state
        .sessions()
        .issue_csrf(&user.token)
        .ok_or_else(|| ApiError::unauthorized("Session is no longer valid"))?;

    Ok(Json(CsrfResponse { csrf_token }))
}
