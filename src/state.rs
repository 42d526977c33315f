// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

use std::sync::Arc;

use crate::auth::{LoginLimiter, SessionStore};
use crate::storage::Db;

/// Shared application state, cheap to clone into handlers.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Db>,
    sessions: Arc<SessionStore>,
    login_limiter: Arc<LoginLimiter>,
    // Keeps the throwaway data directory alive for the state's lifetime
    #[cfg(test)]
    _test_dir: Option<Arc<tempfile::TempDir>>,
}

impl AppState {
    pub fn new(db: Db) -> Self {
        Self {
            db: Arc::new(db),
            sessions: Arc::new(SessionStore::new()),
            login_limiter: Arc::new(LoginLimiter::new()),
            #[cfg(test)]
            _test_dir: None,
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn login_limiter(&self) -> &LoginLimiter {
        &self.login_limiter
    }

    /// State over a throwaway database, for tests.
    ///
    /// The temp directory is held by the state and removed when the last
    /// clone is dropped.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let db = Db::open(&dir.path().join("voicedesk.redb")).expect("open db");
        let mut state = Self::new(db);
        state._test_dir = Some(Arc::new(dir));
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_tests_state_owns_a_working_database() {
        let state = AppState::for_tests();
        state.db().ping().expect("database reachable");

        // Clones share the same store
        let clone = state.clone();
        let issued = state.sessions().issue("user-1", crate::auth::Role::User);
        assert!(clone.sessions().resolve(&issued.token).is_some());
    }
}
