// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! In-process session store for opaque bearer tokens.
//!
//! Tokens are 32 random bytes, base64url-encoded, and are never persisted:
//! a process restart invalidates all sessions. Each session record carries
//! the user's role as resolved at issuance time, which makes the session the
//! single source of truth for authorization until it expires or is revoked.
//!
//! The store is shared mutable state across request handlers and is guarded
//! by a `Mutex`. All operations are short map lookups, so contention is not
//! a concern at this scale. Multi-instance deployments would need an
//! externalized store; that is out of scope here.

use std::collections::HashMap;
use std::sync::Mutex;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};

use super::roles::Role;

/// Session lifetime: 30 days.
pub const SESSION_TTL_DAYS: i64 = 30;

/// Length in bytes of the random material behind a token.
const TOKEN_BYTES: usize = 32;

/// A live session as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    /// Owning user's ID.
    pub user_id: String,
    /// Role resolved at issuance. Authoritative for the session's lifetime.
    pub role: Role,
    /// CSRF token bound to this session, if one has been issued.
    pub csrf_token: Option<String>,
    /// When the session expires.
    pub expires_at: DateTime<Utc>,
}

/// The opaque credential handed to the client.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Opaque bearer token.
    pub token: String,
    /// When the session expires.
    pub expires_at: DateTime<Utc>,
}

/// Process-wide mapping from opaque bearer token to session record.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
    rng: SystemRandom,
    ttl: Duration,
}

impl SessionStore {
    /// Create a store with the standard 30-day session lifetime.
    pub fn new() -> Self {
        Self::with_ttl(Duration::days(SESSION_TTL_DAYS))
    }

    /// Create a store with a custom session lifetime.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            rng: SystemRandom::new(),
            ttl,
        }
    }

    /// Issue a new session for a user.
    ///
    /// The role is embedded in the record at issuance and is not re-derived
    /// on later requests.
    pub fn issue(&self, user_id: &str, role: Role) -> IssuedSession {
        let token = self.random_token();
        let expires_at = Utc::now() + self.ttl;

        let record = SessionRecord {
            user_id: user_id.to_string(),
            role,
            csrf_token: None,
            expires_at,
        };

        let mut sessions = self.sessions.lock().expect("session store poisoned");
        sessions.insert(token.clone(), record);

        IssuedSession { token, expires_at }
    }

    /// Resolve a bearer token to its session record.
    ///
    /// Returns `None` for unknown tokens. Expired entries are evicted on
    /// lookup and also return `None`.
    pub fn resolve(&self, token: &str) -> Option<SessionRecord> {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        match sessions.get(token) {
            Some(record) if record.expires_at > Utc::now() => Some(record.clone()),
            Some(_) => {
                // Expired entry, evict it
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    /// Whether a token maps to an entry that exists but has expired.
    ///
    /// Used to distinguish a 401 "expired" from a 401 "unknown token" in
    /// error responses. Evicts the expired entry.
    pub fn resolve_detailed(&self, token: &str) -> Result<SessionRecord, ResolveFailure> {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        match sessions.get(token) {
            Some(record) if record.expires_at > Utc::now() => Ok(record.clone()),
            Some(_) => {
                sessions.remove(token);
                Err(ResolveFailure::Expired)
            }
            None => Err(ResolveFailure::Unknown),
        }
    }

    /// Revoke a single session (logout). Returns whether an entry existed.
    pub fn revoke(&self, token: &str) -> bool {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        sessions.remove(token).is_some()
    }

    /// Revoke every session belonging to a user.
    ///
    /// Called on role changes so stale role claims cannot outlive the
    /// change. Returns the number of sessions removed.
    pub fn revoke_user(&self, user_id: &str) -> usize {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        let before = sessions.len();
        sessions.retain(|_, record| record.user_id != user_id);
        before - sessions.len()
    }

    /// Generate a CSRF token and bind it to the session.
    ///
    /// Returns `None` if the token does not resolve to a live session.
    pub fn issue_csrf(&self, token: &str) -> Option<String> {
        let csrf = self.random_token();
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        match sessions.get_mut(token) {
            Some(record) if record.expires_at > Utc::now() => {
                record.csrf_token = Some(csrf.clone());
                Some(csrf)
            }
            _ => None,
        }
    }

    /// Check a CSRF token against the one bound to the session.
    ///
    /// Fails closed: a session with no CSRF token issued never verifies.
    /// The comparison is constant-time so the token cannot be recovered
    /// byte by byte through timing.
    pub fn verify_csrf(&self, token: &str, csrf: &str) -> bool {
        let sessions = self.sessions.lock().expect("session store poisoned");
        match sessions.get(token) {
            Some(record) if record.expires_at > Utc::now() => match record.csrf_token {
                Some(ref bound) => {
                    ring::constant_time::verify_slices_are_equal(bound.as_bytes(), csrf.as_bytes())
                        .is_ok()
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Remove all expired sessions. Returns the number evicted.
    ///
    /// Driven by a periodic background task; lazy eviction in `resolve`
    /// already covers tokens that are presented again after expiry.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        let before = sessions.len();
        sessions.retain(|_, record| record.expires_at > now);
        before - sessions.len()
    }

    /// Number of live entries (including not-yet-swept expired ones).
    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session store poisoned").len()
    }

    fn random_token(&self) -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .expect("system RNG failure");
        Base64UrlUnpadded::encode_string(&bytes)
    }

    /// Test-only: insert a session with an explicit expiry.
    #[cfg(test)]
    pub fn insert_raw(&self, token: &str, record: SessionRecord) {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        sessions.insert(token.to_string(), record);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a token failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveFailure {
    /// Token not in the store (never issued, or revoked).
    Unknown,
    /// Token was in the store but past its expiry; now evicted.
    Expired,
}
