// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! Axum extractors for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```
//!
//! The bearer token is read from the `Authorization` header, falling back
//! to the `auth_token` cookie for browser clients that cannot attach
//! headers (e.g. full-page navigations).

use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::session::ResolveFailure;
use super::{AuthError, Role};
use crate::state::AppState;

/// Name of the fallback session cookie.
pub const AUTH_COOKIE: &str = "auth_token";

/// Authenticated user information resolved from a live session.
///
/// This is the primary type used throughout the application to represent
/// the authenticated user making a request. The role comes from the session
/// record, which captured it at issuance; nothing here is client-derived.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    /// Canonical user ID.
    pub user_id: String,
    /// Role embedded in the session at issuance.
    pub role: Role,
    /// The bearer token that authenticated this request.
    #[serde(skip)]
    pub token: String,
    /// When the session expires.
    pub expires_at: DateTime<Utc>,
}

impl AuthenticatedUser {
    /// Check if this user is an admin.
    pub fn is_admin(&self) -> bool {
        self.role.has_privilege(Role::Admin)
    }
}

/// Pull the session token out of request headers.
///
/// `Authorization: Bearer <token>` wins; the `auth_token` cookie is the
/// fallback. A present-but-malformed Authorization header is an error even
/// if a cookie exists, so clients notice broken header handling.
pub fn session_token_from_headers(headers: &HeaderMap) -> Result<String, AuthError> {
    if let Some(auth_header) = headers.get(AUTHORIZATION) {
        let value = auth_header
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?
            .trim();
        if token.is_empty() {
            return Err(AuthError::InvalidAuthHeader);
        }
        return Ok(token.to_string());
    }

    if let Some(cookie_header) = headers.get(COOKIE) {
        let value = cookie_header
            .to_str()
            .map_err(|_| AuthError::MissingCredentials)?;
        for pair in value.split(';') {
            let pair = pair.trim();
            if let Some(token) = pair.strip_prefix("auth_token=") {
                if !token.is_empty() {
                    return Ok(token.to_string());
                }
            }
        }
    }

    Err(AuthError::MissingCredentials)
}

/// Resolve the session token in `headers` against the store.
pub fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<AuthenticatedUser, AuthError> {
    let token = session_token_from_headers(headers)?;

    let record = state
        .sessions()
        .resolve_detailed(&token)
        .map_err(|failure| match failure {
            ResolveFailure::Expired => AuthError::TokenExpired,
            ResolveFailure::Unknown => AuthError::InvalidToken,
        })?;

    Ok(AuthenticatedUser {
        user_id: record.user_id,
        role: record.role,
        token,
        expires_at: record.expires_at,
    })
}

/// Extractor for authenticated users.
///
/// Resolves the bearer token (or auth cookie) against the session store
/// and provides the authenticated user information.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // First check if middleware already resolved the user
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let user = authenticate(&parts.headers, state)?;
        Ok(Auth(user))
    }
}

/// Extractor that requires admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}

/// Extractor that requires the partner role.
///
/// Admins are deliberately not allowed through: the partner dashboard acts
/// on the caller's own partner record, which an admin does not have.
pub struct PartnerOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for PartnerOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.role.is_partner() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(PartnerOnly(user))
    }
}

/// Optional authentication extractor.
///
/// Returns `None` if no valid authentication is present, instead of
/// rejecting. Used by public endpoints that can show user-specific data.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(user)) => Ok(OptionalAuth(Some(user))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::SessionRecord;
    use crate::state::AppState;
    use axum::http::Request;

    fn test_state() -> AppState {
        AppState::for_tests()
    }

    fn parts_with_headers(headers: &[(&str, String)]) -> Parts {
        let mut builder = Request::builder().uri("/test");
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_extractor_requires_credentials() {
        let state = test_state();
        let mut parts = parts_with_headers(&[]);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingCredentials)));
    }

    #[tokio::test]
    async fn auth_extractor_resolves_bearer_token() {
        let state = test_state();
        let issued = state.sessions().issue("user-1", Role::User);
        let mut parts =
            parts_with_headers(&[("authorization", format!("Bearer {}", issued.token))]);

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user-1");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.expires_at, issued.expires_at);
    }

    #[tokio::test]
    async fn auth_extractor_falls_back_to_cookie() {
        let state = test_state();
        let issued = state.sessions().issue("user-2", Role::Partner);
        let mut parts = parts_with_headers(&[(
            "cookie",
            format!("theme=dark; auth_token={}; lang=en", issued.token),
        )]);

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user-2");
        assert_eq!(user.role, Role::Partner);
    }

    #[tokio::test]
    async fn malformed_authorization_header_is_rejected() {
        let state = test_state();
        let issued = state.sessions().issue("user-1", Role::User);
        // Header present but not Bearer-shaped: cookie must not rescue it
        let mut parts = parts_with_headers(&[
            ("authorization", "Token abc".to_string()),
            ("cookie", format!("auth_token={}", issued.token)),
        ]);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let state = test_state();
        let mut parts =
            parts_with_headers(&[("authorization", "Bearer not-a-session".to_string())]);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn expired_token_is_rejected_and_evicted() {
        let state = test_state();
        state.sessions().insert_raw(
            "stale",
            SessionRecord {
                user_id: "user-1".to_string(),
                role: Role::User,
                csrf_token: None,
                expires_at: Utc::now() - chrono::Duration::seconds(1),
            },
        );

        let mut parts = parts_with_headers(&[("authorization", "Bearer stale".to_string())]);
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
        // The expired entry was evicted on lookup
        assert_eq!(state.sessions().len(), 0);
    }

    #[tokio::test]
    async fn revoked_token_is_rejected() {
        let state = test_state();
        let issued = state.sessions().issue("user-1", Role::User);
        state.sessions().revoke(&issued.token);

        let mut parts =
            parts_with_headers(&[("authorization", format!("Bearer {}", issued.token))]);
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let state = test_state();
        let mut parts = parts_with_headers(&[]);

        let user = AuthenticatedUser {
            user_id: "user_from_middleware".to_string(),
            role: Role::Admin,
            token: "tok".to_string(),
            expires_at: Utc::now(),
        };
        parts.extensions.insert(user);

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user_from_middleware");
    }

    #[tokio::test]
    async fn admin_only_rejects_non_admin() {
        let state = test_state();
        let issued = state.sessions().issue("partner-1", Role::Partner);
        let mut parts =
            parts_with_headers(&[("authorization", format!("Bearer {}", issued.token))]);

        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn admin_only_accepts_admin() {
        let state = test_state();
        let issued = state.sessions().issue("admin-1", Role::Admin);
        let mut parts =
            parts_with_headers(&[("authorization", format!("Bearer {}", issued.token))]);

        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn partner_only_rejects_admin_and_user() {
        let state = test_state();

        let admin = state.sessions().issue("admin-1", Role::Admin);
        let mut parts =
            parts_with_headers(&[("authorization", format!("Bearer {}", admin.token))]);
        assert!(matches!(
            PartnerOnly::from_request_parts(&mut parts, &state).await,
            Err(AuthError::InsufficientPermissions)
        ));

        let user = state.sessions().issue("user-1", Role::User);
        let mut parts =
            parts_with_headers(&[("authorization", format!("Bearer {}", user.token))]);
        assert!(matches!(
            PartnerOnly::from_request_parts(&mut parts, &state).await,
            Err(AuthError::InsufficientPermissions)
        ));
    }

    #[tokio::test]
    async fn optional_auth_returns_none_without_user() {
        let state = test_state();
        let mut parts = parts_with_headers(&[]);

        let result = OptionalAuth::from_request_parts(&mut parts, &state).await;
        assert!(result.is_ok());
        assert!(result.unwrap().0.is_none());
    }
}
