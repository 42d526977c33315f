// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! Login attempt throttling.
//!
//! Failed login attempts are counted per normalized email in a fixed
//! window. The counter lives in a bounded LRU so an attacker cycling
//! through many addresses cannot grow memory without bound.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

/// Default: 10 failed attempts per 15 minutes locks the email out.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Max distinct emails tracked at once.
const TRACKED_EMAILS: usize = 4096;

struct WindowEntry {
    failures: u32,
    window_start: Instant,
}

/// In-process failed-login counter keyed by normalized email.
pub struct LoginLimiter {
    entries: Mutex<LruCache<String, WindowEntry>>,
    max_attempts: u32,
    window: Duration,
}

impl LoginLimiter {
    /// Create a limiter with the default attempt budget and window.
    pub fn new() -> Self {
        Self::with_policy(DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW)
    }

    /// Create a limiter with a custom attempt budget and window.
    pub fn with_policy(max_attempts: u32, window: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(TRACKED_EMAILS).unwrap_or(NonZeroUsize::new(1).unwrap()),
            )),
            max_attempts,
            window,
        }
    }

    /// Whether a login attempt for this email is currently allowed.
    pub fn check(&self, email: &str) -> bool {
        let mut entries = self.entries.lock().expect("limiter poisoned");
        match entries.get(email) {
            Some(entry) if entry.window_start.elapsed() < self.window => {
                entry.failures < self.max_attempts
            }
            Some(_) => {
                // Window elapsed, forget the entry
                entries.pop(email);
                true
            }
            None => true,
        }
    }

    /// Record a failed login attempt for this email.
    pub fn record_failure(&self, email: &str) {
        let mut entries = self.entries.lock().expect("limiter poisoned");
        match entries.get_mut(email) {
            Some(entry) if entry.window_start.elapsed() < self.window => {
                entry.failures += 1;
            }
            _ => {
                entries.put(
                    email.to_string(),
                    WindowEntry {
                        failures: 1,
                        window_start: Instant::now(),
                    },
                );
            }
        }
    }

    /// Clear the counter after a successful login.
    pub fn reset(&self, email: &str) {
        let mut entries = self.entries.lock().expect("limiter poisoned");
        entries.pop(email);
    }
}

impl Default for LoginLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_email_is_allowed() {
        let limiter = LoginLimiter::new();
        assert!(limiter.check("alice@example.com"));
    }

    #[test]
    fn lockout_after_budget_exhausted() {
        let limiter = LoginLimiter::with_policy(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check("bob@example.com"));
            limiter.record_failure("bob@example.com");
        }
        assert!(!limiter.check("bob@example.com"));
        // Other emails unaffected
        assert!(limiter.check("carol@example.com"));
    }

    #[test]
    fn success_resets_the_counter() {
        let limiter = LoginLimiter::with_policy(2, Duration::from_secs(60));
        limiter.record_failure("dave@example.com");
        limiter.record_failure("dave@example.com");
        assert!(!limiter.check("dave@example.com"));

        limiter.reset("dave@example.com");
        assert!(limiter.check("dave@example.com"));
    }

    #[test]
    fn window_expiry_clears_the_counter() {
        let limiter = LoginLimiter::with_policy(1, Duration::from_millis(10));
        limiter.record_failure("eve@example.com");
        assert!(!limiter.check("eve@example.com"));

        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.check("eve@example.com"));
    }
}
