// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Voicedesk

//! Partner (affiliate) records and partner operations.
//!
//! A partner record is 1:1 with a user account and is created in the same
//! database transaction as that account, so there is never a window where
//! a user holds the partner role without a partner record (or vice versa).

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;

use super::db::{
    Db, DbError, DbResult, PARTNERS, PARTNERS_BY_USER, REFERRAL_CODES, USERS, USERS_BY_EMAIL,
    USERS_BY_USERNAME,
};
use super::users::StoredUser;

/// Default commission rate: 20%.
pub const DEFAULT_COMMISSION_RATE_BPS: u32 = 2000;

/// Partner account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PartnerStatus {
    /// Partner is active and accruing commission.
    Active,
    /// Partner is suspended (e.g. demoted); record kept for bookkeeping.
    Suspended,
}

/// A partner record as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredPartner {
    /// Unique partner identifier (UUID).
    pub id: String,
    /// Owning user's ID (1:1).
    pub user_id: String,
    /// Company or trading name.
    pub company_name: String,
    /// Unique referral code handed out to prospects.
    pub referral_code: String,
    /// Commission rate in basis points (2000 = 20%).
    pub commission_rate_bps: u32,
    /// Commission earned but not yet paid out, in cents.
    pub earnings_balance_cents: i64,
    /// Lifetime commission earned, in cents.
    pub total_earnings_cents: i64,
    /// Partner status.
    pub status: PartnerStatus,
    /// When the partner record was created.
    pub created_at: DateTime<Utc>,
}

impl StoredPartner {
    /// Build a new active partner record with a fresh UUID and zero earnings.
    pub fn new(
        user_id: impl Into<String>,
        company_name: impl Into<String>,
        referral_code: impl Into<String>,
        commission_rate_bps: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            company_name: company_name.into(),
            referral_code: referral_code.into(),
            commission_rate_bps,
            earnings_balance_cents: 0,
            total_earnings_cents: 0,
            status: PartnerStatus::Active,
            created_at: Utc::now(),
        }
    }
}

impl Db {
    /// Create a partner account: the user row and the partner row are
    /// written in one transaction.
    ///
    /// The user must carry `Role::Partner`; admins cannot be partners.
    /// Fails if the email, username, user, or referral code already exists.
    pub fn provision_partner(&self, user: &StoredUser, partner: &StoredPartner) -> DbResult<()> {
        if user.role != Role::Partner {
            return Err(DbError::Conflict(format!(
                "partner account must carry the partner role, got {}",
                user.role
            )));
        }
        if partner.user_id != user.id {
            return Err(DbError::Conflict(
                "partner record does not reference the provisioned user".to_string(),
            ));
        }

        let user_json = serde_json::to_vec(user)?;
        let partner_json = serde_json::to_vec(partner)?;
        let username_key = user.username.to_lowercase();

        let write_txn = self.db.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            let mut by_email = write_txn.open_table(USERS_BY_EMAIL)?;
            let mut by_username = write_txn.open_table(USERS_BY_USERNAME)?;
            let mut partners = write_txn.open_table(PARTNERS)?;
            let mut by_user = write_txn.open_table(PARTNERS_BY_USER)?;
            let mut codes = write_txn.open_table(REFERRAL_CODES)?;

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
            if codes.get(partner.referral_code.as_str())?.is_some() {
                return Err(DbError::AlreadyExists(format!(
                    "Referral code {}",
                    partner.referral_code
                )));
            }

            users.insert(user.id.as_str(), user_json.as_slice())?;
            by_email.insert(user.email.as_str(), user.id.as_str())?;
            by_username.insert(username_key.as_str(), user.id.as_str())?;
            partners.insert(partner.id.as_str(), partner_json.as_slice())?;
            by_user.insert(user.id.as_str(), partner.id.as_str())?;
            codes.insert(partner.referral_code.as_str(), partner.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Attach a partner record to an existing user, promoting them to the
    /// partner role in the same transaction.
    ///
    /// Admins cannot become partners. Fails if the user already has a
    /// partner record or the referral code is taken. Returns the updated
    /// user; the caller revokes the user's live sessions afterwards.
    pub fn provision_partner_for_user(
        &self,
        user_id: &str,
        partner: &StoredPartner,
    ) -> DbResult<StoredUser> {
        if partner.user_id != user_id {
            return Err(DbError::Conflict(
                "partner record does not reference the provisioned user".to_string(),
            ));
        }
        let partner_json = serde_json::to_vec(partner)?;

        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut users = write_txn.open_table(USERS)?;
            let mut partners = write_txn.open_table(PARTNERS)?;
            let mut by_user = write_txn.open_table(PARTNERS_BY_USER)?;
            let mut codes = write_txn.open_table(REFERRAL_CODES)?;

            let existing_bytes = {
                let existing = users
                    .get(user_id)?
                    .ok_or_else(|| DbError::NotFound(format!("User {user_id}")))?;
                existing.value().to_vec()
            };
            let mut user: StoredUser = serde_json::from_slice(&existing_bytes)?;

            if user.role == Role::Admin {
                return Err(DbError::Conflict(
                    "admin accounts cannot be partners".to_string(),
                ));
            }
            if by_user.get(user_id)?.is_some() {
                return Err(DbError::AlreadyExists(format!(
                    "Partner record for user {user_id}"
                )));
            }
            if codes.get(partner.referral_code.as_str())?.is_some() {
                return Err(DbError::AlreadyExists(format!(
                    "Referral code {}",
                    partner.referral_code
                )));
            }

            user.role = Role::Partner;
            let user_json = serde_json::to_vec(&user)?;
            users.insert(user_id, user_json.as_slice())?;
            partners.insert(partner.id.as_str(), partner_json.as_slice())?;
            by_user.insert(user_id, partner.id.as_str())?;
            codes.insert(partner.referral_code.as_str(), partner.id.as_str())?;
            user
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// Look up the partner record belonging to a user.
    pub fn get_partner_by_user(&self, user_id: &str) -> DbResult<Option<StoredPartner>> {
        let read_txn = self.db.begin_read()?;
        let by_user = read_txn.open_table(PARTNERS_BY_USER)?;
        let Some(pid) = by_user.get(user_id)? else {
            return Ok(None);
        };
        let partners = read_txn.open_table(PARTNERS)?;
        match partners.get(pid.value())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up which partner owns a referral code.
    pub fn get_partner_by_referral_code(&self, code: &str) -> DbResult<Option<StoredPartner>> {
        let read_txn = self.db.begin_read()?;
        let codes = read_txn.open_table(REFERRAL_CODES)?;
        let Some(pid) = codes.get(code)? else {
            return Ok(None);
        };
        let partners = read_txn.open_table(PARTNERS)?;
        match partners.get(pid.value())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::test_util::test_db;

    fn provision(db: &Db, username: &str, code: &str) -> (StoredUser, StoredPartner) {
        let user = StoredUser::new(
            username,
            format!("{username}@example.com"),
            "$argon2id$fake",
            Role::Partner,
        );
        let partner = StoredPartner::new(&user.id, "Acme Calls Ltd", code, 2000);
        db.provision_partner(&user, &partner).unwrap();
        (user, partner)
    }

    #[test]
    fn provision_creates_user_and_partner_atomically() {
        let (_dir, db) = test_db();
        let (user, partner) = provision(&db, "acme", "ACME20");

        let loaded_user = db.get_user(&user.id).unwrap().unwrap();
        assert_eq!(loaded_user.role, Role::Partner);

        let loaded_partner = db.get_partner_by_user(&user.id).unwrap().unwrap();
        assert_eq!(loaded_partner.id, partner.id);
        assert_eq!(loaded_partner.status, PartnerStatus::Active);
        assert_eq!(loaded_partner.earnings_balance_cents, 0);
    }

    #[test]
    fn provision_rejects_non_partner_role() {
        let (_dir, db) = test_db();
        let user = StoredUser::new("boss", "boss@example.com", "$argon2id$fake", Role::Admin);
        let partner = StoredPartner::new(&user.id, "Boss Co", "BOSS1", 2000);

        let result = db.provision_partner(&user, &partner);
        assert!(matches!(result, Err(DbError::Conflict(_))));
        // Nothing was written
        assert!(db.get_user(&user.id).unwrap().is_none());
    }

    #[test]
    fn provision_rejects_duplicate_referral_code() {
        let (_dir, db) = test_db();
        provision(&db, "first", "SHARED");

        let user = StoredUser::new("second", "second@example.com", "$argon2id$fake", Role::Partner);
        let partner = StoredPartner::new(&user.id, "Second Co", "SHARED", 2000);
        let result = db.provision_partner(&user, &partner);
        assert!(matches!(result, Err(DbError::AlreadyExists(_))));
        // The user row was not left behind
        assert!(db.get_user(&user.id).unwrap().is_none());
    }

    #[test]
    fn existing_user_can_be_promoted_with_a_record() {
        let (_dir, db) = test_db();
        let user = StoredUser::new("grower", "grower@example.com", "$argon2id$fake", Role::User);
        db.create_user(&user).unwrap();

        let partner = StoredPartner::new(&user.id, "Grower GmbH", "GROW10", 1500);
        let updated = db.provision_partner_for_user(&user.id, &partner).unwrap();
        assert_eq!(updated.role, Role::Partner);

        let loaded = db.get_partner_by_user(&user.id).unwrap().unwrap();
        assert_eq!(loaded.commission_rate_bps, 1500);
    }

    #[test]
    fn admins_cannot_be_promoted_to_partner() {
        let (_dir, db) = test_db();
        let user = StoredUser::new("chief", "chief@example.com", "$argon2id$fake", Role::Admin);
        db.create_user(&user).unwrap();

        let partner = StoredPartner::new(&user.id, "Chief Co", "CHIEF1", 2000);
        let result = db.provision_partner_for_user(&user.id, &partner);
        assert!(matches!(result, Err(DbError::Conflict(_))));
        assert_eq!(db.get_user(&user.id).unwrap().unwrap().role, Role::Admin);
    }

    #[test]
    fn referral_code_lookup() {
        let (_dir, db) = test_db();
        let (_, partner) = provision(&db, "ref", "REF123");

        let found = db.get_partner_by_referral_code("REF123").unwrap().unwrap();
        assert_eq!(found.id, partner.id);
        assert!(db.get_partner_by_referral_code("NOPE").unwrap().is_none());
    }

    #[test]
    fn demoting_a_partner_suspends_the_record() {
        let (_dir, db) = test_db();
        let (user, _) = provision(&db, "demoted", "DEMOTE1");

        let updated = db.set_role(&user.id, Role::User).unwrap();
        assert_eq!(updated.role, Role::User);

        let partner = db.get_partner_by_user(&user.id).unwrap().unwrap();
        assert_eq!(partner.status, PartnerStatus::Suspended);

        // Re-promotion reactivates the same record
        let repromoted = db.set_role(&user.id, Role::Partner).unwrap();
        assert_eq!(repromoted.role, Role::Partner);
        let partner = db.get_partner_by_user(&user.id).unwrap().unwrap();
        assert_eq!(partner.status, PartnerStatus::Active);
    }
}
