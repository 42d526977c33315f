// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! Partner dashboard endpoints.
//!
//! These act on the caller's own partner record and are gated by the
//! `PartnerOnly` extractor. Admins are not partners and do not pass it.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::PartnerOnly, error::ApiError, models::PartnerResponse, state::AppState,
    storage::PartnerStatus,
};

/// Get the caller's partner record.
///
/// Returns the referral code, commission rate, and earnings for the
/// authenticated partner.
#[utoipa::path(
    get,
    path = "/v1/partners/me",
    tag = "Partners",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Partner record", body = PartnerResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a partner"),
    )
)]
pub async fn get_current_partner(
    PartnerOnly(user): PartnerOnly,
    State(state): State<AppState>,
) -> Result<Json<PartnerResponse>, ApiError> {
    // Provisioning writes the user and partner rows in one transaction,
    // so a partner-role session without a record is a data defect.
    let partner = state
        .db()
        .get_partner_by_user(&user.user_id)?
        .ok_or_else(|| {
            tracing::error!(user_id = %user.user_id, "partner role without partner record");
            ApiError::internal("Partner record missing")
        })?;

    Ok(Json(partner.into()))
}

/// Result of a referral-code check.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReferralCheckResponse {
    /// Whether the code belongs to an active partner.
    pub valid: bool,
    /// The partner's company name, for display on the signup page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

/// Check a referral code.
///
/// Public: signup pages call this before the prospect has an account.
/// Codes of suspended partners report as invalid. Only the company name
/// is disclosed; commission and earnings stay private.
#[utoipa::path(
    get,
    path = "/v1/referrals/{code}",
    tag = "Partners",
    params(("code" = String, Path, description = "Referral code")),
    responses(
        (status = 200, description = "Check result", body = ReferralCheckResponse),
    )
)]
pub async fn check_referral_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ReferralCheckResponse>, ApiError> {
    // Codes are stored uppercase
    let code = code.trim().to_uppercase();
    let partner = state.db().get_partner_by_referral_code(&code)?;

    Ok(Json(match partner {
        Some(partner) if partner.status == PartnerStatus::Active => ReferralCheckResponse {
            valid: true,
            company_name: Some(partner.company_name),
        },
        _ => ReferralCheckResponse {
            valid: false,
            company_name: None,
        },
    }))
}
