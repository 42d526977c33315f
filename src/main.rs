// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

use std::net::SocketAddr;
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use voicedesk_server::api::router;
use voicedesk_server::auth::password::{hash_password, normalize_email};
use voicedesk_server::auth::Role;
use voicedesk_server::config::{Config, LogFormat};
use voicedesk_server::state::AppState;
use voicedesk_server::storage::{Db, StoredUser};

/// How often the session sweeper evicts expired sessions.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    init_tracing(config.log_format);

    // Install the ring crypto provider for rustls (must be done before any
    // TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let db = Db::open(&config.db_path()).expect("Failed to open database");
    tracing::info!(path = %config.db_path().display(), "database open");

    let state = AppState::new(db);

    if let Some(ref seed) = config.seed_admin {
        seed_admin(&state, &seed.email, &seed.password);
    }

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(session_sweeper(state.clone(), shutdown.clone()));

    let app = router(state);
    let addr = config.bind_addr().expect("Invalid bind address");
    let handle = Handle::new();

    tokio::spawn(wait_for_shutdown(handle.clone(), shutdown.clone()));

    if config.tls_enabled() {
        let (cert, key) = (
            config.tls_cert.as_ref().expect("TLS cert path"),
            config.tls_key.as_ref().expect("TLS key path"),
        );
        let tls_config = RustlsConfig::from_pem_file(cert, key)
            .await
            .expect("Failed to load TLS certificate or key");

        tracing::info!(%addr, "listening (https, docs at /docs)");
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .expect("HTTPS server failed");
    } else {
        tracing::warn!("TLS_CERT/TLS_KEY not set, serving plain HTTP");
        tracing::info!(%addr, "listening (http, docs at /docs)");
        axum_server::bind(addr)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .expect("HTTP server failed");
    }

    shutdown.cancel();
    let _ = sweeper.await;
    tracing::info!("shutdown complete");
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Create the bootstrap admin account if the email is not yet registered.
fn seed_admin(state: &AppState, email: &str, password: &str) {
    let email = normalize_email(email);
    match state.db().get_user_by_email(&email) {
        Ok(Some(existing)) => {
            if existing.role != Role::Admin {
                tracing::warn!(%email, role = %existing.role, "seed admin email exists with a different role, leaving it alone");
            }
        }
        Ok(None) => {
            let hash = hash_password(password).expect("Failed to hash seed admin password");
            let admin = StoredUser::new("admin", email.clone(), hash, Role::Admin);
            state
                .db()
                .create_user(&admin)
                .expect("Failed to create seed admin");
            tracing::info!(%email, user_id = %admin.id, "seed admin created");
        }
        Err(e) => {
            tracing::error!(error = %e, "seed admin lookup failed");
        }
    }
}

/// Periodically evict expired sessions so the store does not accumulate
/// records for tokens nobody will present again.
async fn session_sweeper(state: AppState, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    interval.tick().await; // first tick fires immediately
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let evicted = state.sessions().sweep_expired();
                if evicted > 0 {
                    tracing::debug!(evicted, "swept expired sessions");
                }
            }
        }
    }
}

async fn wait_for_shutdown(handle: Handle<SocketAddr>, shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
    shutdown.cancel();
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
