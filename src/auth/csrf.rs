// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! CSRF protection middleware.
//!
//! Mutating requests must carry an `X-CSRF-Token` header matching the CSRF
//! token bound to the caller's session (issued via `GET /v1/auth/csrf`).
//! Enforcement fails closed: a missing or mismatched token rejects the
//! request with 403. The only exemptions are the unauthenticated entry
//! points (register, login), which have no session to bind a token to.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::extractor::authenticate;
use super::AuthError;
use crate::state::AppState;

/// Header carrying the CSRF token on mutating requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Mutating paths that are reachable without a session.
///
/// Matched exactly against the request path, so a new route that merely
/// extends one of these does not inherit the exemption. Webhook endpoints,
/// if ever added, belong here with their own signature verification.
const EXEMPT_PATHS: &[&str] = &["/v1/auth/register", "/v1/auth/login"];

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.iter().any(|exempt| path == *exempt)
}

/// CSRF enforcement middleware for the API router.
///
/// On success the resolved user is stored in request extensions so the
/// `Auth` extractor does not resolve the session a second time.
pub async fn csrf_guard(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if is_safe_method(request.method()) || is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    // Mutating request: must belong to a live session
    let user = match authenticate(request.headers(), &state) {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let Some(presented) = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!(user_id = %user.user_id, path = %request.uri().path(), "mutating request without CSRF token");
        return AuthError::CsrfMissing.into_response();
    };

    if !state.sessions().verify_csrf(&user.token, presented) {
        tracing::warn!(user_id = %user.user_id, path = %request.uri().path(), "CSRF token mismatch");
        return AuthError::CsrfMismatch.into_response();
    }

    request.extensions_mut().insert(user);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::{get, post},
        Router,
    };
    use tower::util::ServiceExt;

    fn test_app(state: AppState) -> Router {
        Router::new()
            .route("/v1/auth/login", post(|| async { "login" }))
            .route("/v1/auth/login-history", post(|| async { "history" }))
            .route("/v1/things", get(|| async { "list" }).post(|| async { "created" }))
            .layer(from_fn_with_state(state.clone(), csrf_guard))
            .with_state(state)
    }

    #[tokio::test]
    async fn safe_methods_pass_without_token() {
        let state = AppState::for_tests();
        let app = test_app(state);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/v1/things")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn exempt_paths_pass_without_token() {
        let state = AppState::for_tests();
        let app = test_app(state);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/v1/auth/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn exemption_does_not_extend_to_longer_paths() {
        let state = AppState::for_tests();
        let app = test_app(state);

        // A route that merely extends an exempt path is still guarded
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/v1/auth/login-history")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn mutating_request_without_session_is_unauthorized() {
        let state = AppState::for_tests();
        let app = test_app(state);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/v1/things")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn mutating_request_without_csrf_token_fails_closed() {
        let state = AppState::for_tests();
        let issued = state.sessions().issue("user-1", Role::User);
        let app = test_app(state);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/v1/things")
                    .header("authorization", format!("Bearer {}", issued.token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn mismatched_csrf_token_is_rejected() {
        let state = AppState::for_tests();
        let issued = state.sessions().issue("user-1", Role::User);
        state.sessions().issue_csrf(&issued.token).unwrap();
        let app = test_app(state);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/v1/things")
                    .header("authorization", format!("Bearer {}", issued.token))
                    .header(CSRF_HEADER, "wrong-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn valid_csrf_token_passes() {
        let state = AppState::for_tests();
        let issued = state.sessions().issue("user-1", Role::User);
        let csrf = state.sessions().issue_csrf(&issued.token).unwrap();
        let app = test_app(state);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/v1/things")
                    .header("authorization", format!("Bearer {}", issued.token))
                    .header(CSRF_HEADER, csrf)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn another_sessions_csrf_token_is_rejected() {
        let state = AppState::for_tests();
        let victim = state.sessions().issue("victim", Role::User);
        let _ = state.sessions().issue_csrf(&victim.token).unwrap();
        let attacker = state.sessions().issue("attacker", Role::User);
        let attacker_csrf = state.sessions().issue_csrf(&attacker.token).unwrap();
        let app = test_app(state);

        // Victim's session with attacker's CSRF token must not pass
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/v1/things")
                    .header("authorization", format!("Bearer {}", victim.token))
                    .header(CSRF_HEADER, attacker_csrf)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
