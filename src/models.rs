// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! # API Data Models
//!
//! Shared response shapes for the REST API. All types derive `Serialize`
//! and `ToSchema` for JSON handling and OpenAPI documentation.
//!
//! Request types live next to their handlers; these are the public views
//! of stored entities, shared across endpoints. `UserResponse` is the only
//! way a user record leaves the server; the password hash has no route
//! out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;
use crate::storage::{PartnerStatus, StoredPartner, StoredUser};

/// Public view of a user account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    /// Unique user identifier.
    pub id: String,
    /// Username.
    pub username: String,
    /// Email address (normalized).
    pub email: String,
    /// Optional display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// The user's role.
    pub role: Role,
    /// Platform coin balance.
    pub coins: i64,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl From<StoredUser> for UserResponse {
    fn from(user: StoredUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            coins: user.coins,
            created_at: user.created_at,
        }
    }
}

/// Public view of a partner record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PartnerResponse {
    /// Unique partner identifier.
    pub id: String,
    /// Owning user's ID.
    pub user_id: String,
    /// Company or trading name.
    pub company_name: String,
    /// Referral code handed out to prospects.
    pub referral_code: String,
    /// Commission rate in basis points.
    pub commission_rate_bps: u32,
    /// Commission earned but not yet paid out, in cents.
    pub earnings_balance_cents: i64,
    /// Lifetime commission earned, in cents.
    pub total_earnings_cents: i64,
    /// Partner status.
    pub status: PartnerStatus,
    /// When the partner record was created.
    pub created_at: DateTime<Utc>,
}

impl From<StoredPartner> for PartnerResponse {
    fn from(partner: StoredPartner) -> Self {
        Self {
            id: partner.id,
            user_id: partner.user_id,
            company_name: partner.company_name,
            referral_code: partner.referral_code,
            commission_rate_bps: partner.commission_rate_bps,
            earnings_balance_cents: partner.earnings_balance_cents,
            total_earnings_cents: partner.total_earnings_cents,
            status: partner.status,
            created_at: partner.created_at,
        }
    }
}

/// Session envelope returned by register and login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    /// Opaque bearer token.
    pub token: String,
    /// When the session expires.
    pub expires_at: DateTime<Utc>,
    /// The authenticated account.
    pub user: UserResponse,
}
