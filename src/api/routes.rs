//! # API Route Configuration
//!
//! Sets up all the HTTP routes for the API.

use actix_web::web;

use super::handlers;

/// Configure all API routes.
///
/// ## Route Structure
///
/// ```text
/// /
/// ├── /health                       GET   - Health check
/// ├── /auth
/// │   ├── /signup                   POST  - Register, returns a token
/// │   └── /login                    POST  - Log in, returns a token
/// ├── /accounts
/// │   ├── /                         POST  - Open an account
/// │   ├── /                         GET   - List own accounts
/// │   ├── /transfer                 POST  - Transfer between accounts
/// │   ├── /{id}/deposit             POST  - Deposit
/// │   ├── /{id}/withdraw            POST  - Withdraw
/// │   └── /{id}/transactions        GET   - Statement (paginated)
/// └── /cards
///     ├── /                         POST  - Issue a card
///     ├── /                         GET   - List own cards
///     ├── /{id}/activate            PATCH - Activate
///     └── /{id}/deactivate          PATCH - Deactivate
/// ```
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Root endpoint - API information
        .route("/", web::get().to(handlers::api_info))
        // Health check endpoint
        .route("/health", web::get().to(handlers::health_check))
        // Authentication endpoints
        .service(
            web::scope("/auth")
                .route("/signup", web::post().to(handlers::signup))
                .route("/login", web::post().to(handlers::login)),
        )
        // Account and money-movement endpoints
        .service(
            web::scope("/accounts")
                .route("", web::post().to(handlers::create_account))
                .route("", web::get().to(handlers::list_accounts))
                .route("/transfer", web::post().to(handlers::transfer))
                .route("/{id}/deposit", web::post().to(handlers::deposit))
                .route("/{id}/withdraw", web::post().to(handlers::withdraw))
                .route("/{id}/transactions", web::get().to(handlers::get_statement)),
        )
        // Card endpoints
        .service(
            web::scope("/cards")
                .route("", web::post().to(handlers::create_card))
                .route("", web::get().to(handlers::list_cards))
                .route("/{id}/activate", web::patch().to(handlers::activate_card))
                .route("/{id}/deactivate", web::patch().to(handlers::deactivate_card)),
        );
}
