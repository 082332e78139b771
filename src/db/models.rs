//! # Database Models
//!
//! Data structures that map to database tables. Each struct
//! represents a row in a table.
//!
//! ## Table Overview
//!
//! | Table | Description |
//! |-------|-------------|
//! | `users` | Registered users and their password hashes |
//! | `accounts` | Bank accounts with current balances |
//! | `ledger_entries` | Append-only record of every monetary movement |
//! | `cards` | Issued cards (number/expiry/cvv stored encrypted) |
//! | `idempotency_keys` | Dedup cache for client-supplied write tokens |
//!
//! ## Note on money types
//!
//! All amounts and balances are `i64` **minor units** (cents). Binary
//! floating point is never used for money anywhere in this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    /// Unique; login identifier.
    pub email: String,
    /// Argon2 PHC string. Never serialized to API responses.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A bank account row.
///
/// Balances are mutated only by the balance engine, inside a database
/// transaction that also appends the matching ledger entries. The
/// `balance_minor >= 0` invariant is enforced both by the engine and by
/// a CHECK constraint on the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: Uuid,
    /// Owning user. Every account belongs to exactly one user.
    pub user_id: Uuid,
    /// Open string enum, e.g. "checking" or "savings".
    pub account_type: String,
    /// Current balance in minor units (cents).
    pub balance_minor: i64,
    pub created_at: DateTime<Utc>,
}

/// Direction/type of a ledger entry.
///
/// The stored `amount_minor` is always positive; direction is encoded
/// here. A transfer produces exactly two rows, `TransferDebit` on the
/// source account and `TransferCredit` on the destination, sharing a
/// correlation id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Deposit,
    Withdrawal,
    TransferDebit,
    TransferCredit,
}

impl EntryType {
    /// Database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Deposit => "deposit",
            EntryType::Withdrawal => "withdrawal",
            EntryType::TransferDebit => "transfer_debit",
            EntryType::TransferCredit => "transfer_credit",
        }
    }

    /// Parse the database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(EntryType::Deposit),
            "withdrawal" => Some(EntryType::Withdrawal),
            "transfer_debit" => Some(EntryType::TransferDebit),
            "transfer_credit" => Some(EntryType::TransferCredit),
            _ => None,
        }
    }

    /// Whether this entry increases the account balance.
    pub fn is_credit(&self) -> bool {
        matches!(self, EntryType::Deposit | EntryType::TransferCredit)
    }

    /// The signed effect of an entry of this type on a balance.
    pub fn signed_amount(&self, amount_minor: i64) -> i64 {
        if self.is_credit() {
            amount_minor
        } else {
            -amount_minor
        }
    }
}

/// One immutable ledger entry.
///
/// Rows are inserted in the same transaction as the balance mutation
/// they record and are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntryRecord {
    pub id: Uuid,
    /// The single account this entry affects.
    pub account_id: Uuid,
    pub entry_type: EntryType,
    /// Always positive; direction comes from `entry_type`.
    pub amount_minor: i64,
    /// Shared by the debit and credit rows of one transfer; `None` for
    /// deposits and withdrawals.
    pub correlation_id: Option<Uuid>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An issued card.
///
/// `card_number`, `expiry_date` and `cvv` hold fernet tokens, never
/// plaintext. API responses only ever carry the masked number.
#[derive(Debug, Clone)]
pub struct CardRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub card_number: String,
    pub expiry_date: String,
    pub cvv: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Stored outcome of a write operation performed under an idempotency key.
#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    pub key: String,
    pub user_id: Uuid,
    pub operation: String,
    pub account_id: Uuid,
    pub new_balance_minor: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_round_trip() {
        for t in [
            EntryType::Deposit,
            EntryType::Withdrawal,
            EntryType::TransferDebit,
            EntryType::TransferCredit,
        ] {
            assert_eq!(EntryType::parse(t.as_str()), Some(t));
        }
        assert_eq!(EntryType::parse("refund"), None);
    }

    #[test]
    fn test_signed_amounts() {
        assert_eq!(EntryType::Deposit.signed_amount(500), 500);
        assert_eq!(EntryType::TransferCredit.signed_amount(500), 500);
        assert_eq!(EntryType::Withdrawal.signed_amount(500), -500);
        assert_eq!(EntryType::TransferDebit.signed_amount(500), -500);
    }
}
