//! # Services Module
//!
//! Core business logic. Each service handles a specific domain.
//!
//! | Service | Responsibility |
//! |---------|---------------|
//! | `BalanceEngine` | deposits, withdrawals, transfers, statements |
//! | `AccountDirectory` | account CRUD, ownership checks |
//! | `CardService` | card issuance, activation, encryption at rest |
//!
//! The balance engine is the sole writer of balances and ledger rows;
//! the other services only read account state through the directory's
//! query surface.

pub mod account_directory;
pub mod balance_engine;
pub mod card_service;

pub use account_directory::{AccountDirectory, AccountError};
pub use balance_engine::{BalanceEngine, BalanceError};
pub use card_service::{CardError, CardService};
