//! # Banking API Backend
//!
//! A banking service backed by PostgreSQL:
//!
//! - User registration and login (JWT bearer auth)
//! - Account management: create, list, deposit, withdraw, transfer
//! - An append-only ledger with per-account statements
//! - Card issuance and lifecycle (numbers stored encrypted)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      HTTP (actix-web)                     │
//! │   /auth/*   /accounts/*   /cards/*   /health              │
//! └───────────────┬──────────────────────────────────────────┘
//!                 │ AuthedUser extractor resolves actor_user_id
//! ┌───────────────┴──────────────────────────────────────────┐
//! │                     SERVICE LAYER                         │
//! │  BalanceEngine      AccountDirectory      CardService     │
//! │  deposit/withdraw/  create/list/          issue/list/     │
//! │  transfer/statement get_owned_account     (de)activate    │
//! └───────────────┬──────────────────────────────────────────┘
//!                 │ deadpool-postgres pool / SQL transactions
//! ┌───────────────┴──────────────────────────────────────────┐
//! │  PostgreSQL: users, accounts, ledger_entries, cards,      │
//! │              idempotency_keys                             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The balance engine is the sole writer of account balances and
//! ledger rows. Every money movement is one database transaction with
//! row-level locks, so concurrent operations on the same account are
//! linearizable and the ledger always matches the balances.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

use config::AppConfig;
use db::Database;
use services::{AccountDirectory, BalanceEngine, CardService};

/// Application state shared across all handlers.
///
/// Constructed once at startup and handed to actix as
/// `web::Data<Arc<AppState>>`. There is no global database handle;
/// everything that touches the store goes through this struct.
pub struct AppState {
    /// Database connection pool for PostgreSQL.
    pub db: Database,

    /// The money-movement core.
    pub engine: BalanceEngine,

    /// Account CRUD and ownership checks.
    pub accounts: AccountDirectory,

    /// Card issuance and lifecycle.
    pub cards: CardService,

    /// Application configuration.
    pub config: AppConfig,
}
