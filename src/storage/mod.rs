// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! # Storage Module
//!
//! Persistent state lives in a single redb database file (pure Rust,
//! ACID). Users, partners, and the audit log are JSON-serialized values
//! under typed tables, with secondary index tables for email, username,
//! partner ownership, and referral codes.
//!
//! Sessions are deliberately **not** stored here: the session store is
//! in-process memory only (see `auth::session`).

pub mod audit;
pub mod db;
pub mod partners;
pub mod users;

pub use audit::{AuditEvent, AuditEventType, AuditFilter};
pub use db::{Db, DbError, DbResult};
pub use partners::{PartnerStatus, StoredPartner, DEFAULT_COMMISSION_RATE_BPS};
pub use users::StoredUser;
