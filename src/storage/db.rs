// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! Embedded application database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredUser (JSON bytes)
//! - `users_by_email`: normalized email → user_id
//! - `users_by_username`: lowercase username → user_id
//! - `partners`: partner_id → serialized StoredPartner (JSON bytes)
//! - `partners_by_user`: user_id → partner_id (1:1)
//! - `referral_codes`: referral code → partner_id (unique)
//! - `audit`: monotonic sequence number → serialized AuditEvent (JSON bytes)
//!
//! Entity operations live in the sibling modules (`users`, `partners`,
//! `audit`) as `impl Db` blocks; this module owns the handle, the table
//! definitions, and the error type.

use std::path::Path;

use redb::{Database, TableDefinition};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: user_id → serialized StoredUser (JSON bytes).
pub(crate) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Index: normalized email → user_id.
pub(crate) const USERS_BY_EMAIL: TableDefinition<&str, &str> =
    TableDefinition::new("users_by_email");

/// Index: lowercase username → user_id.
pub(crate) const USERS_BY_USERNAME: TableDefinition<&str, &str> =
    TableDefinition::new("users_by_username");

/// Primary table: partner_id → serialized StoredPartner (JSON bytes).
pub(crate) const PARTNERS: TableDefinition<&str, &[u8]> = TableDefinition::new("partners");

/// Index: user_id → partner_id. Enforces the 1:1 user/partner relation.
pub(crate) const PARTNERS_BY_USER: TableDefinition<&str, &str> =
    TableDefinition::new("partners_by_user");

/// Index: referral code → partner_id. Enforces code uniqueness.
pub(crate) const REFERRAL_CODES: TableDefinition<&str, &str> =
    TableDefinition::new("referral_codes");

/// Audit log: monotonic sequence number → serialized AuditEvent (JSON bytes).
pub(crate) const AUDIT: TableDefinition<u64, &[u8]> = TableDefinition::new("audit");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Db
// =============================================================================

/// Embedded ACID application database.
pub struct Db {
    pub(crate) db: Database,
}

impl Db {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERS_BY_EMAIL)?;
            let _ = write_txn.open_table(USERS_BY_USERNAME)?;
            let _ = write_txn.open_table(PARTNERS)?;
            let _ = write_txn.open_table(PARTNERS_BY_USER)?;
            let _ = write_txn.open_table(REFERRAL_CODES)?;
            let _ = write_txn.open_table(AUDIT)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Cheap readiness check: open a read transaction against the users
    /// table.
    pub fn ping(&self) -> DbResult<()> {
        use redb::ReadableDatabase;
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(USERS)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::Db;
    use tempfile::TempDir;

    /// Open a throwaway database in a temp directory.
    pub fn test_db() -> (TempDir, Db) {
        let dir = TempDir::new().expect("temp dir");
        let db = Db::open(&dir.path().join("voicedesk.redb")).expect("open db");
        (dir, db)
    }
}
