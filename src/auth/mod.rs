// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! # Authentication Module
//!
//! Session-based authentication for the Voicedesk API.
//!
//! ## Auth Flow
//!
//! 1. Client registers or logs in with email + password
//! 2. Server issues an opaque bearer token bound to a 30-day session; the
//!    user's role is embedded in the session record at issuance
//! 3. Client sends `Authorization: Bearer <token>` (or the `auth_token`
//!    cookie) on every request
//! 4. Server resolves the token against the in-process session store; an
//!    unknown or expired token yields 401
//! 5. Mutating requests additionally carry `X-CSRF-Token`, checked
//!    fail-closed against the token bound to the session
//!
//! ## Security
//!
//! - Tokens are 32 bytes of CSPRNG output; the client never sees anything
//!   it could forge a role claim from
//! - Role checks are a pure function of the single `Role` field; there is
//!   no flag combination or email-pattern fallback anywhere
//! - Sessions live only in process memory; a restart logs everyone out
//! - Failed logins are throttled per email

pub mod csrf;
pub mod error;
pub mod extractor;
pub mod limiter;
pub mod password;
pub mod roles;
pub mod session;

pub use csrf::{csrf_guard, CSRF_HEADER};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, AuthenticatedUser, OptionalAuth, PartnerOnly};
pub use limiter::LoginLimiter;
pub use roles::Role;
pub use session::{IssuedSession, SessionStore, SESSION_TTL_DAYS};
