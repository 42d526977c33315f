// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! HTTP API surface.
//!
//! All application routes live under `/v1` and sit behind the CSRF guard;
//! health probes and the OpenAPI docs are mounted at the root.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{csrf_guard, Role},
    models::{PartnerResponse, SessionResponse, UserResponse},
    state::AppState,
    storage::{AuditEvent, AuditEventType, PartnerStatus},
};

pub mod admin;
pub mod auth;
pub mod health;
pub mod partners;
pub mod users;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/csrf", get(auth::csrf_token))
        .route(
            "/users/me",
            get(users::get_current_user).put(users::update_current_user),
        )
        .route("/partners/me", get(partners::get_current_partner))
        .route("/referrals/{code}", get(partners::check_referral_code))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/partners", post(admin::provision_partner))
        .route("/admin/users/{user_id}/role", put(admin::set_role))
        .route("/admin/users/{user_id}/coins", post(admin::adjust_coins))
        .route("/admin/audit", get(admin::query_audit))
        .layer(from_fn_with_state(state.clone(), csrf_guard));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Opaque session token from register or login"))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::login,
        auth::logout,
        auth::csrf_token,
        users::get_current_user,
        users::update_current_user,
        partners::get_current_partner,
        partners::check_referral_code,
        admin::list_users,
        admin::provision_partner,
        admin::set_role,
        admin::adjust_coins,
        admin::query_audit,
        health::health,
        health::readiness
    ),
    components(
        schemas(
            Role,
            PartnerStatus,
            UserResponse,
            PartnerResponse,
            SessionResponse,
            AuditEvent,
            AuditEventType,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::CsrfResponse,
            users::MeResponse,
            users::UpdateProfileRequest,
            partners::ReferralCheckResponse,
            admin::UserListResponse,
            admin::ProvisionPartnerRequest,
            admin::ProvisionPartnerResponse,
            admin::SetRoleRequest,
            admin::AdjustCoinsRequest,
            admin::CoinBalanceResponse,
            admin::AuditLogResponse,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login, and session management"),
        (name = "Users", description = "User self-service"),
        (name = "Partners", description = "Partner dashboard"),
        (name = "Admin", description = "Administrative account management"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
