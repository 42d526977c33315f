// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! User roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User roles for authorization.
///
/// ## Role Hierarchy
///
/// - `Admin` - Full access to all endpoints and the admin dashboard
/// - `Partner` - Affiliate account with a partner dashboard and commission tracking
/// - `User` - Normal account, can only access its own data
///
/// The role is a single enumerated field stored once on the user record and
/// copied into the session at issuance. Partner and Admin are mutually
/// exclusive by construction: an account holds exactly one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Affiliate partner account
    Partner,
    /// Normal user account
    User,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        match (self, required) {
            // Admin can do anything
            (Role::Admin, _) => true,
            // Partner can do partner things
            (Role::Partner, Role::Partner) => true,
            // User can do user things
            (Role::User, Role::User) => true,
            // Everything else is denied
            _ => false,
        }
    }

    /// Whether this role is the partner role.
    ///
    /// This is the only partner check in the system. No flag combinations,
    /// no email-pattern matching.
    pub fn is_partner(&self) -> bool {
        matches!(self, Role::Partner)
    }

    /// Parse role from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Role> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "partner" => Some(Role::Partner),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

impl Default for Role {
    /// Default role is User (least privilege for authenticated accounts).
    fn default() -> Self {
        Role::User
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Partner => write!(f, "partner"),
            Role::User => write!(f, "user"),
        }
    }
}
