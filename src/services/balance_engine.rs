//! # Balance Engine
//!
//! The money-movement core. Every operation here is one PostgreSQL
//! transaction that validates, mutates balances, appends ledger
//! entries, and commits atomically — or leaves no trace at all.
//!
//! ## Concurrency protocol
//!
//! - Affected account rows are locked with `SELECT ... FOR UPDATE`, so
//!   concurrent operations on one account serialize at the row lock
//!   and no update is ever lost.
//! - A transfer locks its two rows in increasing account-id order.
//!   Two opposite-direction transfers between the same pair therefore
//!   contend on the same first lock instead of deadlocking.
//! - `SET LOCAL lock_timeout` bounds the wait; a timed-out, deadlocked
//!   or serialization-failed transaction is retried whole, up to
//!   `max_conflict_retries` times, then surfaced as [`BalanceError::Conflict`].
//!
//! ## Invariants
//!
//! - Balances never go negative (validated before the update, and
//!   backstopped by the table CHECK constraint).
//! - The ledger is append-only; a transfer writes exactly two rows
//!   (debit + credit) sharing a correlation id.
//! - All validation happens before any mutation; every error path
//!   rolls the transaction back.

use chrono::Utc;
use thiserror::Error;
use tokio_postgres::error::SqlState;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::models::{EntryType, IdempotencyRecord, LedgerEntryRecord};
use crate::db::{queries, Database, DatabaseError};

/// Errors produced by the balance engine.
#[derive(Error, Debug)]
pub enum BalanceError {
    /// The amount is zero or negative.
    #[error("Amount must be greater than 0")]
    InvalidAmount,

    /// The account does not exist, or is not owned by the caller
    /// where ownership is required. The two cases are deliberately
    /// indistinguishable to the caller.
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// The account balance cannot cover the requested amount.
    #[error("Insufficient funds: available {available_minor}, requested {requested_minor}")]
    InsufficientFunds {
        available_minor: i64,
        requested_minor: i64,
    },

    /// Transfer source and destination are the same account.
    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    /// The credited balance would exceed the representable range.
    #[error("Balance would overflow the representable range")]
    Overflow,

    /// The idempotency key was already used for a different operation
    /// or a different account.
    #[error("Idempotency key was already used for a different request")]
    IdempotencyMismatch,

    /// The operation kept losing lock/serialization races after the
    /// configured number of retries. Safe for the client to retry.
    #[error("Operation conflicted with concurrent requests, please retry")]
    Conflict,

    /// The store is unreachable or failed. Never retried silently.
    #[error("Store unavailable: {0}")]
    Store(String),
}

/// Classify a postgres error: lock timeouts, deadlocks, serialization
/// failures and duplicate idempotency inserts are retryable conflicts;
/// everything else is an infrastructure failure.
fn map_pg(e: tokio_postgres::Error) -> BalanceError {
    match e.code() {
        Some(code)
            if *code == SqlState::T_R_SERIALIZATION_FAILURE
                || *code == SqlState::T_R_DEADLOCK_DETECTED
                || *code == SqlState::LOCK_NOT_AVAILABLE
                || *code == SqlState::UNIQUE_VIOLATION =>
        {
            BalanceError::Conflict
        }
        _ => BalanceError::Store(e.to_string()),
    }
}

fn map_db(e: DatabaseError) -> BalanceError {
    match e {
        DatabaseError::QueryError(pg) => map_pg(pg),
        other => BalanceError::Store(other.to_string()),
    }
}

fn validate_amount(amount_minor: i64) -> Result<(), BalanceError> {
    if amount_minor <= 0 {
        return Err(BalanceError::InvalidAmount);
    }
    Ok(())
}

/// Total order for transfer lock acquisition.
fn lock_order(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// The money-movement core.
///
/// The engine is the sole writer of account balances and ledger rows.
/// It holds no state of its own beyond the injected store handle; one
/// instance serves all requests concurrently.
///
/// ## Usage
///
/// ```rust,ignore
/// let engine = BalanceEngine::new(db, config);
/// let new_balance = engine
///     .deposit(account_id, 5_000, user_id, None, None)
///     .await?;
/// ```
#[derive(Clone)]
pub struct BalanceEngine {
    /// Database connection for account and ledger state.
    db: Database,

    /// Application configuration (lock timeout, retry budget).
    config: AppConfig,
}

impl BalanceEngine {
    /// Create a new BalanceEngine instance.
    pub fn new(db: Database, config: AppConfig) -> Self {
        Self { db, config }
    }

    /// Deposit `amount_minor` into an account owned by `actor`.
    ///
    /// Returns the new balance in minor units.
    pub async fn deposit(
        &self,
        account_id: Uuid,
        amount_minor: i64,
        actor: Uuid,
        description: Option<String>,
        idempotency_key: Option<String>,
    ) -> Result<i64, BalanceError> {
        validate_amount(amount_minor)?;

        let mut attempt: u32 = 0;
        loop {
            let result = self
                .deposit_once(
                    account_id,
                    amount_minor,
                    actor,
                    description.as_deref(),
                    idempotency_key.as_deref(),
                )
                .await;
            match result {
                Err(BalanceError::Conflict) if attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    warn!(
                        "Deposit on {} conflicted, retrying ({}/{})",
                        account_id, attempt, self.config.max_conflict_retries
                    );
                }
                other => return other,
            }
        }
    }

    async fn deposit_once(
        &self,
        account_id: Uuid,
        amount_minor: i64,
        actor: Uuid,
        description: Option<&str>,
        idempotency_key: Option<&str>,
    ) -> Result<i64, BalanceError> {
        let mut client = self
            .db
            .pool()
            .get()
            .await
            .map_err(|e| BalanceError::Store(e.to_string()))?;
        let txn = client.transaction().await.map_err(map_pg)?;
        self.bound_lock_wait(&txn).await?;

        if let Some(balance) = self
            .replay_idempotent(&txn, idempotency_key, actor, "deposit", account_id)
            .await?
        {
            return Ok(balance);
        }

        let account = queries::account_owned_for_update(&txn, account_id, actor)
            .await
            .map_err(map_pg)?
            .ok_or(BalanceError::AccountNotFound(account_id))?;

        let new_balance = account
            .balance_minor
            .checked_add(amount_minor)
            .ok_or(BalanceError::Overflow)?;

        queries::account_set_balance(&txn, account_id, new_balance)
            .await
            .map_err(map_pg)?;
        queries::ledger_insert(
            &txn,
            &LedgerEntryRecord {
                id: Uuid::new_v4(),
                account_id,
                entry_type: EntryType::Deposit,
                amount_minor,
                correlation_id: None,
                description: description.map(str::to_string),
                created_at: Utc::now(),
            },
        )
        .await
        .map_err(map_pg)?;

        if let Some(key) = idempotency_key {
            self.record_idempotency(&txn, key, actor, "deposit", account_id, new_balance)
                .await?;
        }

        txn.commit().await.map_err(map_pg)?;
        info!(
            "Deposited {} minor units into account {}",
            amount_minor, account_id
        );
        Ok(new_balance)
    }

    /// Withdraw `amount_minor` from an account owned by `actor`.
    ///
    /// Fails with [`BalanceError::InsufficientFunds`] if the balance
    /// cannot cover the amount at commit time; the check happens under
    /// the row lock, so concurrent withdrawals cannot both pass it on
    /// the same funds.
    pub async fn withdraw(
        &self,
        account_id: Uuid,
        amount_minor: i64,
        actor: Uuid,
        description: Option<String>,
        idempotency_key: Option<String>,
    ) -> Result<i64, BalanceError> {
        validate_amount(amount_minor)?;

        let mut attempt: u32 = 0;
        loop {
            let result = self
                .withdraw_once(
                    account_id,
                    amount_minor,
                    actor,
                    description.as_deref(),
                    idempotency_key.as_deref(),
                )
                .await;
            match result {
                Err(BalanceError::Conflict) if attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    warn!(
                        "Withdrawal on {} conflicted, retrying ({}/{})",
                        account_id, attempt, self.config.max_conflict_retries
                    );
                }
                other => return other,
            }
        }
    }

    async fn withdraw_once(
        &self,
        account_id: Uuid,
        amount_minor: i64,
        actor: Uuid,
        description: Option<&str>,
        idempotency_key: Option<&str>,
    ) -> Result<i64, BalanceError> {
        let mut client = self
            .db
            .pool()
            .get()
            .await
            .map_err(|e| BalanceError::Store(e.to_string()))?;
        let txn = client.transaction().await.map_err(map_pg)?;
        self.bound_lock_wait(&txn).await?;

        if let Some(balance) = self
            .replay_idempotent(&txn, idempotency_key, actor, "withdrawal", account_id)
            .await?
        {
            return Ok(balance);
        }

        let account = queries::account_owned_for_update(&txn, account_id, actor)
            .await
            .map_err(map_pg)?
            .ok_or(BalanceError::AccountNotFound(account_id))?;

        if account.balance_minor < amount_minor {
            return Err(BalanceError::InsufficientFunds {
                available_minor: account.balance_minor,
                requested_minor: amount_minor,
            });
        }
        let new_balance = account.balance_minor - amount_minor;

        queries::account_set_balance(&txn, account_id, new_balance)
            .await
            .map_err(map_pg)?;
        queries::ledger_insert(
            &txn,
            &LedgerEntryRecord {
                id: Uuid::new_v4(),
                account_id,
                entry_type: EntryType::Withdrawal,
                amount_minor,
                correlation_id: None,
                description: description.map(str::to_string),
                created_at: Utc::now(),
            },
        )
        .await
        .map_err(map_pg)?;

        if let Some(key) = idempotency_key {
            self.record_idempotency(&txn, key, actor, "withdrawal", account_id, new_balance)
                .await?;
        }

        txn.commit().await.map_err(map_pg)?;
        info!(
            "Withdrew {} minor units from account {}",
            amount_minor, account_id
        );
        Ok(new_balance)
    }

    /// Move `amount_minor` from one account to another.
    ///
    /// The source must be owned by `actor`; the destination may belong
    /// to any user. Writes two linked ledger rows (debit on the
    /// source, credit on the destination) sharing a correlation id.
    ///
    /// Returns the new balance of the source account.
    pub async fn transfer(
        &self,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount_minor: i64,
        actor: Uuid,
        description: Option<String>,
        idempotency_key: Option<String>,
    ) -> Result<i64, BalanceError> {
        validate_amount(amount_minor)?;
        if from_account_id == to_account_id {
            return Err(BalanceError::SameAccountTransfer);
        }

        let mut attempt: u32 = 0;
        loop {
            let result = self
                .transfer_once(
                    from_account_id,
                    to_account_id,
                    amount_minor,
                    actor,
                    description.as_deref(),
                    idempotency_key.as_deref(),
                )
                .await;
            match result {
                Err(BalanceError::Conflict) if attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    warn!(
                        "Transfer {} -> {} conflicted, retrying ({}/{})",
                        from_account_id, to_account_id, attempt, self.config.max_conflict_retries
                    );
                }
                other => return other,
            }
        }
    }

    async fn transfer_once(
        &self,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount_minor: i64,
        actor: Uuid,
        description: Option<&str>,
        idempotency_key: Option<&str>,
    ) -> Result<i64, BalanceError> {
        let mut client = self
            .db
            .pool()
            .get()
            .await
            .map_err(|e| BalanceError::Store(e.to_string()))?;
        let txn = client.transaction().await.map_err(map_pg)?;
        self.bound_lock_wait(&txn).await?;

        if let Some(balance) = self
            .replay_idempotent(&txn, idempotency_key, actor, "transfer", from_account_id)
            .await?
        {
            return Ok(balance);
        }

        // Lock both rows in id order; ownership is checked afterwards
        // on the already-locked rows.
        let (first, second) = lock_order(from_account_id, to_account_id);
        let first_row = queries::account_for_update(&txn, first).await.map_err(map_pg)?;
        let second_row = queries::account_for_update(&txn, second)
            .await
            .map_err(map_pg)?;
        let (from_row, to_row) = if first == from_account_id {
            (first_row, second_row)
        } else {
            (second_row, first_row)
        };

        let from_account = from_row.ok_or(BalanceError::AccountNotFound(from_account_id))?;
        if from_account.user_id != actor {
            return Err(BalanceError::AccountNotFound(from_account_id));
        }
        let to_account = to_row.ok_or(BalanceError::AccountNotFound(to_account_id))?;

        if from_account.balance_minor < amount_minor {
            return Err(BalanceError::InsufficientFunds {
                available_minor: from_account.balance_minor,
                requested_minor: amount_minor,
            });
        }

        let new_from_balance = from_account.balance_minor - amount_minor;
        let new_to_balance = to_account
            .balance_minor
            .checked_add(amount_minor)
            .ok_or(BalanceError::Overflow)?;

        queries::account_set_balance(&txn, from_account_id, new_from_balance)
            .await
            .map_err(map_pg)?;
        queries::account_set_balance(&txn, to_account_id, new_to_balance)
            .await
            .map_err(map_pg)?;

        let correlation_id = Uuid::new_v4();
        let now = Utc::now();
        queries::ledger_insert(
            &txn,
            &LedgerEntryRecord {
                id: Uuid::new_v4(),
                account_id: from_account_id,
                entry_type: EntryType::TransferDebit,
                amount_minor,
                correlation_id: Some(correlation_id),
                description: description
                    .map(str::to_string)
                    .or_else(|| Some(format!("Transfer to account {}", to_account_id))),
                created_at: now,
            },
        )
        .await
        .map_err(map_pg)?;
        queries::ledger_insert(
            &txn,
            &LedgerEntryRecord {
                id: Uuid::new_v4(),
                account_id: to_account_id,
                entry_type: EntryType::TransferCredit,
                amount_minor,
                correlation_id: Some(correlation_id),
                description: description
                    .map(str::to_string)
                    .or_else(|| Some(format!("Transfer from account {}", from_account_id))),
                created_at: now,
            },
        )
        .await
        .map_err(map_pg)?;

        if let Some(key) = idempotency_key {
            self.record_idempotency(&txn, key, actor, "transfer", from_account_id, new_from_balance)
                .await?;
        }

        txn.commit().await.map_err(map_pg)?;
        info!(
            "Transferred {} minor units from {} to {} (correlation {})",
            amount_minor, from_account_id, to_account_id, correlation_id
        );
        Ok(new_from_balance)
    }

    /// One page of an account's statement, newest first.
    ///
    /// `limit` is clamped to `[1, 1000]`; negative offsets are treated
    /// as 0. Ownership is checked before any ledger row is read.
    pub async fn statement(
        &self,
        account_id: Uuid,
        actor: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntryRecord>, BalanceError> {
        let limit = limit.clamp(1, 1000);
        let offset = offset.max(0);

        queries::account_owned(self.db.pool(), account_id, actor)
            .await
            .map_err(map_db)?
            .ok_or(BalanceError::AccountNotFound(account_id))?;

        queries::ledger_page(self.db.pool(), account_id, limit, offset)
            .await
            .map_err(map_db)
    }

    async fn bound_lock_wait(
        &self,
        txn: &tokio_postgres::Transaction<'_>,
    ) -> Result<(), BalanceError> {
        txn.batch_execute(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.config.lock_timeout_ms
        ))
        .await
        .map_err(map_pg)
    }

    /// Look up a stored result for the request's idempotency key.
    ///
    /// A hit only replays when the stored operation and account match
    /// the current request; reusing a key for a different request is
    /// rejected outright instead of silently returning the old result.
    async fn replay_idempotent(
        &self,
        txn: &tokio_postgres::Transaction<'_>,
        key: Option<&str>,
        actor: Uuid,
        operation: &str,
        account_id: Uuid,
    ) -> Result<Option<i64>, BalanceError> {
        let key = match key {
            Some(key) => key,
            None => return Ok(None),
        };
        match queries::idempotency_lookup(txn, key, actor)
            .await
            .map_err(map_pg)?
        {
            Some(prev) if prev.operation == operation && prev.account_id == account_id => {
                info!("Replaying idempotent {} on account {}", operation, account_id);
                Ok(Some(prev.new_balance_minor))
            }
            Some(_) => Err(BalanceError::IdempotencyMismatch),
            None => Ok(None),
        }
    }

    async fn record_idempotency(
        &self,
        txn: &tokio_postgres::Transaction<'_>,
        key: &str,
        user_id: Uuid,
        operation: &str,
        account_id: Uuid,
        new_balance_minor: i64,
    ) -> Result<(), BalanceError> {
        queries::idempotency_insert(
            txn,
            &IdempotencyRecord {
                key: key.to_string(),
                user_id,
                operation: operation.to_string(),
                account_id,
                new_balance_minor,
                created_at: Utc::now(),
            },
        )
        .await
        .map_err(map_pg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(1).is_ok());
        assert!(matches!(
            validate_amount(0),
            Err(BalanceError::InvalidAmount)
        ));
        assert!(matches!(
            validate_amount(-50),
            Err(BalanceError::InvalidAmount)
        ));
    }

    #[test]
    fn test_lock_order_is_total() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(lock_order(a, b), lock_order(b, a));
        let (first, second) = lock_order(a, b);
        assert!(first < second);
    }
}
