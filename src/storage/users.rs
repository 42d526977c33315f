// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! User records and user operations on the embedded database.
//!
//! The role is a single enumerated field. There is deliberately no
//! `is_admin` flag and no `is_partner` flag: every authorization decision
//! reads `role` and nothing else.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};

use crate::auth::Role;

use super::db::{Db, DbError, DbResult, PARTNERS, PARTNERS_BY_USER, USERS, USERS_BY_EMAIL, USERS_BY_USERNAME};
use super::partners::{PartnerStatus, StoredPartner};

/// A user account as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUser {
    /// Unique user identifier (UUID).
    pub id: String,
    /// Unique username.
    pub username: String,
    /// Normalized email address (unique).
    pub email: String,
    /// Optional display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Argon2id password hash (PHC string). Never serialized to API responses.
    pub password_hash: String,
    /// The single authoritative role field.
    pub role: Role,
    /// Platform coin balance.
    pub coins: i64,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl StoredUser {
    /// Build a new user record with a fresh UUID and zero coins.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            display_name: None,
            password_hash: password_hash.into(),
            role,
            coins: 0,
            created_at: Utc::now(),
        }
    }
}

impl Db {
    /// Insert a new user. Fails if the id, email, or username is taken.
    pub fn create_user(&self, user: &StoredUser) -> DbResult<()> {
        let json = serde_json::to_vec(user)?;
        let username_key = user.username.to_lowercase();

        let write_txn = self.db.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            let mut by_email = write_txn.open_table(USERS_BY_EMAIL)?;
            let mut by_username = write_txn.open_table(USERS_BY_USERNAME)?;

            if users.get(user.id.as_str())?.is_some() {
                return Err(DbError::AlreadyExists(format!("User {}", user.id)));
            }
            if by_email.get(user.email.as_str())?.is_some() {
                return Err(DbError::AlreadyExists(format!(
                    "User with email {}",
                    user.email
                )));
            }
            if by_username.get(username_key.as_str())?.is_some() {
                return Err(DbError::AlreadyExists(format!(
                    "User with username {}",
                    user.username
                )));
            }

            users.insert(user.id.as_str(), json.as_slice())?;
            by_email.insert(user.email.as_str(), user.id.as_str())?;
            by_username.insert(username_key.as_str(), user.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a user by ID.
    pub fn get_user(&self, user_id: &str) -> DbResult<Option<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        match users.get(user_id)? {
            Some(value) => {
                let user: StoredUser = serde_json::from_slice(value.value())?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Look up a user by normalized email.
    pub fn get_user_by_email(&self, email: &str) -> DbResult<Option<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let by_email = read_txn.open_table(USERS_BY_EMAIL)?;
        let Some(id) = by_email.get(email)? else {
            return Ok(None);
        };
        let users = read_txn.open_table(USERS)?;
        match users.get(id.value())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Update a user's display name. Returns the updated record.
    pub fn update_display_name(
        &self,
        user_id: &str,
        display_name: Option<String>,
    ) -> DbResult<StoredUser> {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut users = write_txn.open_table(USERS)?;

            let existing_bytes = {
                let existing = users
                    .get(user_id)?
                    .ok_or_else(|| DbError::NotFound(format!("User {user_id}")))?;
                existing.value().to_vec()
            };

            let mut user: StoredUser = serde_json::from_slice(&existing_bytes)?;
            user.display_name = display_name;

            let json = serde_json::to_vec(&user)?;
            users.insert(user_id, json.as_slice())?;
            user
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// Adjust a user's coin balance by `delta`. The balance never goes
    /// negative; an over-draw is rejected without modifying the record.
    ///
    /// Returns the new balance.
    pub fn adjust_coins(&self, user_id: &str, delta: i64) -> DbResult<i64> {
        let write_txn = self.db.begin_write()?;
        let new_balance = {
            let mut users = write_txn.open_table(USERS)?;

            let existing_bytes = {
                let existing = users
                    .get(user_id)?
                    .ok_or_else(|| DbError::NotFound(format!("User {user_id}")))?;
                existing.value().to_vec()
            };

            let mut user: StoredUser = serde_json::from_slice(&existing_bytes)?;
            let new_balance = user.coins.checked_add(delta).ok_or_else(|| {
                DbError::Conflict("coin balance overflow".to_string())
            })?;
            if new_balance < 0 {
                return Err(DbError::Conflict(format!(
                    "coin balance cannot go negative (have {}, delta {})",
                    user.coins, delta
                )));
            }
            user.coins = new_balance;

            let json = serde_json::to_vec(&user)?;
            users.insert(user_id, json.as_slice())?;
            new_balance
        };
        write_txn.commit()?;
        Ok(new_balance)
    }

    /// Change a user's role.
    ///
    /// Rules keeping the role model consistent with partner records:
    /// - Promoting to `Partner` requires an existing partner record
    ///   (created via `provision_partner`); re-activation sets it back to
    ///   `Active`.
    /// - Demoting away from `Partner` suspends the partner record in the
    ///   same transaction.
    ///
    /// Returns the updated user. The caller is responsible for revoking
    /// the user's live sessions afterwards.
    pub fn set_role(&self, user_id: &str, new_role: Role) -> DbResult<StoredUser> {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut users = write_txn.open_table(USERS)?;
            let by_user = write_txn.open_table(PARTNERS_BY_USER)?;
            let mut partners = write_txn.open_table(PARTNERS)?;

            let existing_bytes = {
                let existing = users
                    .get(user_id)?
                    .ok_or_else(|| DbError::NotFound(format!("User {user_id}")))?;
                existing.value().to_vec()
            };
            let mut user: StoredUser = serde_json::from_slice(&existing_bytes)?;

            let partner_id: Option<String> =
                by_user.get(user_id)?.map(|v| v.value().to_string());

            match (user.role, new_role) {
                (old, new) if old == new => {}
                (_, Role::Partner) => {
                    // Must have a partner record to hold the partner role
                    let Some(ref pid) = partner_id else {
                        return Err(DbError::Conflict(format!(
                            "User {user_id} has no partner record; use partner provisioning"
                        )));
                    };
                    set_partner_status(&mut partners, pid, PartnerStatus::Active)?;
                }
                (Role::Partner, _) => {
                    // Leaving the partner role suspends the partner record
                    if let Some(ref pid) = partner_id {
                        set_partner_status(&mut partners, pid, PartnerStatus::Suspended)?;
                    }
                }
                _ => {}
            }

            user.role = new_role;
            let json = serde_json::to_vec(&user)?;
            users.insert(user_id, json.as_slice())?;
            user
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// List users, optionally filtered by role, with offset/limit paging.
    ///
    /// Returns `(users, total_matching)`.
    pub fn list_users(
        &self,
        role: Option<Role>,
        offset: usize,
        limit: usize,
    ) -> DbResult<(Vec<StoredUser>, usize)> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;

        let mut matching = Vec::new();
        for entry in users.iter()? {
            let entry = entry?;
            let user: StoredUser = serde_json::from_slice(entry.1.value())?;
            if role.is_none_or(|r| user.role == r) {
                matching.push(user);
            }
        }

        // Stable listing order for pagination
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let total = matching.len();
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }
}

fn set_partner_status(
    partners: &mut redb::Table<'_, &'static str, &'static [u8]>,
    partner_id: &str,
    status: PartnerStatus,
) -> DbResult<()> {
    let existing_bytes = {
        let existing = partners
            .get(partner_id)?
            .ok_or_else(|| DbError::NotFound(format!("Partner {partner_id}")))?;
        existing.value().to_vec()
    };
    let mut partner: StoredPartner = serde_json::from_slice(&existing_bytes)?;
    partner.status = status;
    let json = serde_json::to_vec(&partner)?;
    partners.insert(partner_id, json.as_slice())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::test_util::test_db;

    fn sample_user(username: &str, email: &str, role: Role) -> StoredUser {
        StoredUser::new(username, email, "$argon2id$fake", role)
    }

    #[test]
    fn create_and_get_user() {
        let (_dir, db) = test_db();
        let user = sample_user("alice", "alice@example.com", Role::User);
        db.create_user(&user).unwrap();

        let loaded = db.get_user(&user.id).unwrap().unwrap();
        assert_eq!(loaded, user);
        assert_eq!(loaded.coins, 0);
    }

    #[test]
    fn email_lookup() {
        let (_dir, db) = test_db();
        let user = sample_user("Bob", "bob@example.com", Role::User);
        db.create_user(&user).unwrap();

        let by_email = db.get_user_by_email("bob@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_rejected() {
        let (_dir, db) = test_db();
        db.create_user(&sample_user("alice", "same@example.com", Role::User))
            .unwrap();
        let result = db.create_user(&sample_user("alice2", "same@example.com", Role::User));
        assert!(matches!(result, Err(DbError::AlreadyExists(_))));
    }

    #[test]
    fn duplicate_username_rejected_case_insensitively() {
        let (_dir, db) = test_db();
        db.create_user(&sample_user("Carol", "carol@example.com", Role::User))
            .unwrap();
        let result = db.create_user(&sample_user("carol", "carol2@example.com", Role::User));
        assert!(matches!(result, Err(DbError::AlreadyExists(_))));
    }

    #[test]
    fn update_display_name() {
        let (_dir, db) = test_db();
        let user = sample_user("dave", "dave@example.com", Role::User);
        db.create_user(&user).unwrap();

        let updated = db
            .update_display_name(&user.id, Some("Dave D.".to_string()))
            .unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Dave D."));

        let cleared = db.update_display_name(&user.id, None).unwrap();
        assert!(cleared.display_name.is_none());
    }

    #[test]
    fn adjust_coins_enforces_floor() {
        let (_dir, db) = test_db();
        let user = sample_user("eve", "eve@example.com", Role::User);
        db.create_user(&user).unwrap();

        assert_eq!(db.adjust_coins(&user.id, 100).unwrap(), 100);
        assert_eq!(db.adjust_coins(&user.id, -40).unwrap(), 60);

        let overdraw = db.adjust_coins(&user.id, -61);
        assert!(matches!(overdraw, Err(DbError::Conflict(_))));
        // Balance unchanged after rejected overdraw
        assert_eq!(db.get_user(&user.id).unwrap().unwrap().coins, 60);
    }

    #[test]
    fn set_role_to_partner_without_record_is_rejected() {
        let (_dir, db) = test_db();
        let user = sample_user("frank", "frank@example.com", Role::User);
        db.create_user(&user).unwrap();

        let result = db.set_role(&user.id, Role::Partner);
        assert!(matches!(result, Err(DbError::Conflict(_))));
        assert_eq!(db.get_user(&user.id).unwrap().unwrap().role, Role::User);
    }

    #[test]
    fn set_role_promotes_to_admin() {
        let (_dir, db) = test_db();
        let user = sample_user("grace", "grace@example.com", Role::User);
        db.create_user(&user).unwrap();

        let updated = db.set_role(&user.id, Role::Admin).unwrap();
        assert_eq!(updated.role, Role::Admin);
    }

    #[test]
    fn list_users_filters_and_pages() {
        let (_dir, db) = test_db();
        for i in 0..5 {
            db.create_user(&sample_user(
                &format!("user{i}"),
                &format!("user{i}@example.com"),
                Role::User,
            ))
            .unwrap();
        }
        db.create_user(&sample_user("root", "root@example.com", Role::Admin))
            .unwrap();

        let (all, total) = db.list_users(None, 0, 100).unwrap();
        assert_eq!(total, 6);
        assert_eq!(all.len(), 6);

        let (admins, admin_total) = db.list_users(Some(Role::Admin), 0, 100).unwrap();
        assert_eq!(admin_total, 1);
        assert_eq!(admins[0].username, "root");

        let (page, page_total) = db.list_users(Some(Role::User), 2, 2).unwrap();
        assert_eq!(page_total, 5);
        assert_eq!(page.len(), 2);
    }
}
