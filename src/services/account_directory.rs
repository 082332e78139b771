//! # Account Directory
//!
//! Account CRUD and the single ownership-check primitive
//! ([`AccountDirectory::get_owned_account`]) that the balance engine
//! and the card service both go through. Balances are read here but
//! only ever written by the balance engine.

use chrono::Utc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::db::models::AccountRecord;
use crate::db::{queries, Database};

/// Errors produced by the account directory.
#[derive(Error, Debug)]
pub enum AccountError {
    /// Initial balance was negative.
    #[error("Initial balance cannot be negative")]
    InvalidInitialBalance,

    /// Account type string was empty.
    #[error("Account type must not be empty")]
    InvalidAccountType,

    /// The account does not exist or is not owned by the caller.
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// The store is unreachable or failed.
    #[error("Store unavailable: {0}")]
    Store(String),
}

/// Account CRUD service.
#[derive(Clone)]
pub struct AccountDirectory {
    db: Database,
}

impl AccountDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open a new account for a user.
    ///
    /// The client-supplied initial balance is honored (it defaults to
    /// 0 and must not be negative). No ledger entry is written for the
    /// opening balance.
    pub async fn create_account(
        &self,
        user_id: Uuid,
        account_type: String,
        initial_balance_minor: Option<i64>,
    ) -> Result<AccountRecord, AccountError> {
        let balance_minor = initial_balance_minor.unwrap_or(0);
        if balance_minor < 0 {
            return Err(AccountError::InvalidInitialBalance);
        }
        if account_type.trim().is_empty() {
            return Err(AccountError::InvalidAccountType);
        }

        let account = AccountRecord {
            id: Uuid::new_v4(),
            user_id,
            account_type,
            balance_minor,
            created_at: Utc::now(),
        };
        queries::account_insert(self.db.pool(), &account)
            .await
            .map_err(|e| AccountError::Store(e.to_string()))?;

        info!(
            "Opened {} account {} for user {}",
            account.account_type, account.id, user_id
        );
        Ok(account)
    }

    /// All accounts owned by a user, in creation order.
    pub async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<AccountRecord>, AccountError> {
        queries::accounts_by_user(self.db.pool(), user_id)
            .await
            .map_err(|e| AccountError::Store(e.to_string()))
    }

    /// Fetch an account only if it belongs to the given user.
    ///
    /// A missing account and a foreign account produce the same
    /// [`AccountError::AccountNotFound`], so callers cannot probe for
    /// other users' account ids.
    pub async fn get_owned_account(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<AccountRecord, AccountError> {
        queries::account_owned(self.db.pool(), account_id, user_id)
            .await
            .map_err(|e| AccountError::Store(e.to_string()))?
            .ok_or(AccountError::AccountNotFound(account_id))
    }
}
