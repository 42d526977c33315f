// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! Voicedesk - Account and Session Service
//!
//! This crate provides the account backend for the Voicedesk voice-agent
//! platform: registration and login, opaque bearer-token sessions with the
//! user's role embedded at issuance, CSRF protection for mutating requests,
//! partner (affiliate) accounts, and an admin surface with an audit trail.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Sessions, roles, CSRF, password hashing
//! - `storage` - Embedded database (redb)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
