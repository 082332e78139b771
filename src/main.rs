//! # Banking API Backend Service
//!
//! Main entry point for the banking backend. It provides:
//!
//! - REST API for auth, accounts, money movement, and cards
//! - A PostgreSQL-backed append-only transaction ledger
//!
//! ## Quick Start
//!
//! 1. Set up PostgreSQL and create the database
//! 2. Configure the environment (see `AppConfig`)
//! 3. Start the server: `cargo run`

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use banking_backend::api;
use banking_backend::config::AppConfig;
use banking_backend::db::Database;
use banking_backend::services::{AccountDirectory, BalanceEngine, CardService};
use banking_backend::AppState;

/// Main entry point for the backend service.
///
/// This function:
/// 1. Initializes logging
/// 2. Loads configuration from environment
/// 3. Connects to the database and runs migrations
/// 4. Constructs the services and shared state
/// 5. Launches the HTTP server
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // =========================================
    // STEP 1: Initialize Logging
    // =========================================
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting banking backend service");

    // =========================================
    // STEP 2: Load Configuration
    // =========================================
    dotenvy::dotenv().ok(); // It's okay if .env doesn't exist

    let config = AppConfig::from_env().expect("Failed to load configuration");
    info!("Configuration loaded");

    // =========================================
    // STEP 3: Initialize Database
    // =========================================
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");
    info!("Database connected");

    db.run_migrations()
        .await
        .expect("Failed to run migrations");
    info!("Database migrations complete");

    // =========================================
    // STEP 4: Initialize Services
    // =========================================
    let engine = BalanceEngine::new(db.clone(), config.clone());
    let accounts = AccountDirectory::new(db.clone());
    let cards = CardService::new(db.clone(), accounts.clone(), &config.card_encryption_key)
        .expect("Invalid CARD_ENCRYPTION_KEY");

    info!("Services initialized");

    // =========================================
    // STEP 5: Create Application State
    // =========================================
    let app_state = Arc::new(AppState {
        db: db.clone(),
        engine,
        accounts,
        cards,
        config: config.clone(),
    });

    // =========================================
    // STEP 6: Start HTTP Server
    // =========================================
    let server_host = config.server_host.clone();
    let server_port = config.server_port;

    info!("Starting HTTP server on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        App::new()
            // Attach shared application state
            .app_data(web::Data::new(app_state.clone()))
            // Add logging middleware
            .wrap(middleware::Logger::default())
            .wrap(Cors::permissive())
            // Configure API routes
            .configure(api::configure_routes)
    })
    .bind(format!("{}:{}", server_host, server_port))?
    .run()
    .await
}
