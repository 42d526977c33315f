// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding the redb database file | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT` | PEM certificate chain path (enables TLS with `TLS_KEY`) | Optional |
//! | `TLS_KEY` | PEM private key path | Optional |
//! | `SEED_ADMIN_EMAIL` | Bootstrap admin account email | Optional |
//! | `SEED_ADMIN_PASSWORD` | Bootstrap admin account password | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Database file name inside the data directory.
pub const DB_FILE: &str = "voicedesk.redb";

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the database file.
    pub data_dir: PathBuf,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// PEM certificate chain path, if TLS is enabled.
    pub tls_cert: Option<PathBuf>,
    /// PEM private key path, if TLS is enabled.
    pub tls_key: Option<PathBuf>,
    /// Bootstrap admin credentials, if configured.
    pub seed_admin: Option<SeedAdmin>,
    /// Logging format (`json` or `pretty`).
    pub log_format: LogFormat,
}

/// Bootstrap admin account, created on startup if the email is unknown.
#[derive(Debug, Clone)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
}

/// Logging output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Self {
        let data_dir = env::var(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let tls_cert = env::var("TLS_CERT").ok().map(PathBuf::from);
        let tls_key = env::var("TLS_KEY").ok().map(PathBuf::from);

        let seed_admin = match (env::var("SEED_ADMIN_EMAIL"), env::var("SEED_ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some(SeedAdmin { email, password })
            }
            _ => None,
        };

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Self {
            data_dir,
            host,
            port,
            tls_cert,
            tls_key,
            seed_admin,
            log_format,
        }
    }

    /// Path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    /// Bind address, or an error message if it does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| format!("invalid bind address {}:{}: {e}", self.host, self.port))
    }

    /// Whether both TLS paths are configured.
    pub fn tls_enabled(&self) -> bool {
        self.tls_cert.is_some() && self.tls_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_path_joins_data_dir() {
        let config = Config {
            data_dir: PathBuf::from("/var/lib/voicedesk"),
            host: "127.0.0.1".into(),
            port: 9000,
            tls_cert: None,
            tls_key: None,
            seed_admin: None,
            log_format: LogFormat::Pretty,
        };
        assert_eq!(
            config.db_path(),
            PathBuf::from("/var/lib/voicedesk/voicedesk.redb")
        );
        assert_eq!(
            config.bind_addr().unwrap(),
            "127.0.0.1:9000".parse().unwrap()
        );
        assert!(!config.tls_enabled());
    }
}
