//! # Database Queries
//!
//! All SQL for the banking backend lives here. Each function performs
//! one database operation.
//!
//! ## Query Organization
//!
//! Queries are grouped by the table they operate on:
//! - `user_*` - users table
//! - `account_*` - accounts table
//! - `ledger_*` - ledger_entries table
//! - `card_*` - cards table
//! - `idempotency_*` - idempotency_keys table
//!
//! Functions taking a [`Transaction`] are the ones the balance engine
//! composes into a single atomic unit of work; everything else runs on
//! a pooled client.

use deadpool_postgres::Pool;
use tokio_postgres::{Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::models::*;
use super::DatabaseError;

// ============================================
// HELPER FUNCTIONS
// ============================================

fn row_to_user(row: &Row) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

fn row_to_account(row: &Row) -> AccountRecord {
    AccountRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        account_type: row.get("account_type"),
        balance_minor: row.get("balance_minor"),
        created_at: row.get("created_at"),
    }
}

fn row_to_entry(row: &Row) -> Result<LedgerEntryRecord, DatabaseError> {
    let type_str: String = row.get("entry_type");
    let entry_type = EntryType::parse(&type_str)
        .ok_or_else(|| DatabaseError::InvalidRow(format!("unknown entry type: {type_str}")))?;
    Ok(LedgerEntryRecord {
        id: row.get("id"),
        account_id: row.get("account_id"),
        entry_type,
        amount_minor: row.get("amount_minor"),
        correlation_id: row.get("correlation_id"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    })
}

fn row_to_card(row: &Row) -> CardRecord {
    CardRecord {
        id: row.get("id"),
        account_id: row.get("account_id"),
        user_id: row.get("user_id"),
        card_number: row.get("card_number"),
        expiry_date: row.get("expiry_date"),
        cvv: row.get("cvv"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

async fn get_client(pool: &Pool) -> Result<deadpool_postgres::Object, DatabaseError> {
    pool.get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))
}

// ============================================
// USER QUERIES
// ============================================

/// Insert a new user. Fails with a unique violation if the email is
/// already registered; the caller inspects the SQLSTATE.
pub async fn user_insert(pool: &Pool, user: &UserRecord) -> Result<(), DatabaseError> {
    debug!("Creating user: {}", user.email);

    let client = get_client(pool).await?;
    client
        .execute(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
            &[
                &user.id,
                &user.name,
                &user.email,
                &user.password_hash,
                &user.created_at,
            ],
        )
        .await?;
    Ok(())
}

/// Look up a user by email (login path).
pub async fn user_by_email(pool: &Pool, email: &str) -> Result<Option<UserRecord>, DatabaseError> {
    let client = get_client(pool).await?;
    let rows = client
        .query(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
            &[&email],
        )
        .await?;

    Ok(rows.first().map(row_to_user))
}

// ============================================
// ACCOUNT QUERIES
// ============================================

/// Insert a new account row.
pub async fn account_insert(pool: &Pool, account: &AccountRecord) -> Result<(), DatabaseError> {
    debug!(
        "Creating {} account {} for user {}",
        account.account_type, account.id, account.user_id
    );

    let client = get_client(pool).await?;
    client
        .execute(
            r#"
            INSERT INTO accounts (id, user_id, account_type, balance_minor, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
            &[
                &account.id,
                &account.user_id,
                &account.account_type,
                &account.balance_minor,
                &account.created_at,
            ],
        )
        .await?;
    Ok(())
}

/// All accounts owned by a user, in creation order.
pub async fn accounts_by_user(
    pool: &Pool,
    user_id: Uuid,
) -> Result<Vec<AccountRecord>, DatabaseError> {
    let client = get_client(pool).await?;
    let rows = client
        .query(
            r#"
            SELECT id, user_id, account_type, balance_minor, created_at
            FROM accounts
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
            &[&user_id],
        )
        .await?;

    Ok(rows.iter().map(row_to_account).collect())
}

/// The single ownership-check primitive: fetch an account only if it
/// belongs to the given user.
pub async fn account_owned(
    pool: &Pool,
    account_id: Uuid,
    user_id: Uuid,
) -> Result<Option<AccountRecord>, DatabaseError> {
    let client = get_client(pool).await?;
    let rows = client
        .query(
            r#"
            SELECT id, user_id, account_type, balance_minor, created_at
            FROM accounts
            WHERE id = $1 AND user_id = $2
            "#,
            &[&account_id, &user_id],
        )
        .await?;

    Ok(rows.first().map(row_to_account))
}

/// Lock an account row for update, with ownership check.
///
/// Returns `None` both for a missing account and for an account owned
/// by someone else; callers surface the same not-found error for both.
pub async fn account_owned_for_update(
    txn: &Transaction<'_>,
    account_id: Uuid,
    user_id: Uuid,
) -> Result<Option<AccountRecord>, tokio_postgres::Error> {
    let rows = txn
        .query(
            r#"
            SELECT id, user_id, account_type, balance_minor, created_at
            FROM accounts
            WHERE id = $1 AND user_id = $2
            FOR UPDATE
            "#,
            &[&account_id, &user_id],
        )
        .await?;

    Ok(rows.first().map(row_to_account))
}

/// Lock an account row for update regardless of owner (transfer
/// destinations may belong to any user).
pub async fn account_for_update(
    txn: &Transaction<'_>,
    account_id: Uuid,
) -> Result<Option<AccountRecord>, tokio_postgres::Error> {
    let rows = txn
        .query(
            r#"
            SELECT id, user_id, account_type, balance_minor, created_at
            FROM accounts
            WHERE id = $1
            FOR UPDATE
            "#,
            &[&account_id],
        )
        .await?;

    Ok(rows.first().map(row_to_account))
}

/// Set an account's balance. Only called by the balance engine, on a
/// row it holds the lock for.
pub async fn account_set_balance(
    txn: &Transaction<'_>,
    account_id: Uuid,
    new_balance_minor: i64,
) -> Result<(), tokio_postgres::Error> {
    txn.execute(
        r#"
        UPDATE accounts
        SET balance_minor = $2
        WHERE id = $1
        "#,
        &[&account_id, &new_balance_minor],
    )
    .await?;
    Ok(())
}

// ============================================
// LEDGER QUERIES
// ============================================

/// Append one ledger entry. Insert-only; the table is never updated
/// or deleted from.
pub async fn ledger_insert(
    txn: &Transaction<'_>,
    entry: &LedgerEntryRecord,
) -> Result<(), tokio_postgres::Error> {
    txn.execute(
        r#"
        INSERT INTO ledger_entries (
            id, account_id, entry_type, amount_minor,
            correlation_id, description, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
        &[
            &entry.id,
            &entry.account_id,
            &entry.entry_type.as_str(),
            &entry.amount_minor,
            &entry.correlation_id,
            &entry.description,
            &entry.created_at,
        ],
    )
    .await?;
    Ok(())
}

/// One page of an account's statement, newest first.
///
/// `id DESC` breaks ties between entries sharing a timestamp so pages
/// are stable across requests.
pub async fn ledger_page(
    pool: &Pool,
    account_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<LedgerEntryRecord>, DatabaseError> {
    debug!(
        "Fetching statement for account {} (limit {}, offset {})",
        account_id, limit, offset
    );

    let client = get_client(pool).await?;
    let rows = client
        .query(
            r#"
            SELECT id, account_id, entry_type, amount_minor,
                   correlation_id, description, created_at
            FROM ledger_entries
            WHERE account_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            &[&account_id, &limit, &offset],
        )
        .await?;

    rows.iter().map(row_to_entry).collect()
}

// ============================================
// IDEMPOTENCY QUERIES
// ============================================

/// Look up a previously stored write result for (key, user).
pub async fn idempotency_lookup(
    txn: &Transaction<'_>,
    key: &str,
    user_id: Uuid,
) -> Result<Option<IdempotencyRecord>, tokio_postgres::Error> {
    let rows = txn
        .query(
            r#"
            SELECT key, user_id, operation, account_id, new_balance_minor, created_at
            FROM idempotency_keys
            WHERE key = $1 AND user_id = $2
            "#,
            &[&key, &user_id],
        )
        .await?;

    Ok(rows.first().map(|row| IdempotencyRecord {
        key: row.get("key"),
        user_id: row.get("user_id"),
        operation: row.get("operation"),
        account_id: row.get("account_id"),
        new_balance_minor: row.get("new_balance_minor"),
        created_at: row.get("created_at"),
    }))
}

/// Record the outcome of a write operation under its idempotency key,
/// inside the same transaction as the operation itself.
pub async fn idempotency_insert(
    txn: &Transaction<'_>,
    record: &IdempotencyRecord,
) -> Result<(), tokio_postgres::Error> {
    txn.execute(
        r#"
        INSERT INTO idempotency_keys (
            key, user_id, operation, account_id, new_balance_minor, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
        &[
            &record.key,
            &record.user_id,
            &record.operation,
            &record.account_id,
            &record.new_balance_minor,
            &record.created_at,
        ],
    )
    .await?;
    Ok(())
}

// ============================================
// CARD QUERIES
// ============================================

/// Insert a new card row (fields already encrypted by the caller).
pub async fn card_insert(pool: &Pool, card: &CardRecord) -> Result<(), DatabaseError> {
    debug!("Creating card {} for user {}", card.id, card.user_id);

    let client = get_client(pool).await?;
    client
        .execute(
            r#"
            INSERT INTO cards (
                id, account_id, user_id, card_number, expiry_date,
                cvv, is_active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
            &[
                &card.id,
                &card.account_id,
                &card.user_id,
                &card.card_number,
                &card.expiry_date,
                &card.cvv,
                &card.is_active,
                &card.created_at,
            ],
        )
        .await?;
    Ok(())
}

/// All cards owned by a user.
pub async fn cards_by_user(pool: &Pool, user_id: Uuid) -> Result<Vec<CardRecord>, DatabaseError> {
    let client = get_client(pool).await?;
    let rows = client
        .query(
            r#"
            SELECT id, account_id, user_id, card_number, expiry_date,
                   cvv, is_active, created_at
            FROM cards
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
            &[&user_id],
        )
        .await?;

    Ok(rows.iter().map(row_to_card).collect())
}

/// Flip a card's active flag, scoped to the owning user.
///
/// Returns the updated card, or `None` if the card does not exist or
/// belongs to someone else.
pub async fn card_set_active(
    pool: &Pool,
    card_id: Uuid,
    user_id: Uuid,
    active: bool,
) -> Result<Option<CardRecord>, DatabaseError> {
    let client = get_client(pool).await?;
    let rows = client
        .query(
            r#"
            UPDATE cards
            SET is_active = $3
            WHERE id = $1 AND user_id = $2
            RETURNING id, account_id, user_id, card_number, expiry_date,
                      cvv, is_active, created_at
            "#,
            &[&card_id, &user_id, &active],
        )
        .await?;

    Ok(rows.first().map(row_to_card))
}
