//! # API Request Handlers
//!
//! Handler functions for each API endpoint. Each handler:
//! 1. Extracts request data (and the authenticated caller)
//! 2. Validates input
//! 3. Calls the appropriate service
//! 4. Returns a formatted response
//!
//! ## Error Handling
//!
//! All errors are caught and returned as JSON:
//!
//! ```json
//! {
//!     "success": false,
//!     "error": {
//!         "code": "INSUFFICIENT_FUNDS",
//!         "message": "Insufficient funds: available 2000, requested 5000"
//!     }
//! }
//! ```

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use tokio_postgres::error::SqlState;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::{self, AuthedUser};
use crate::db::models::UserRecord;
use crate::db::{queries, DatabaseError};
use crate::models::{
    AccountResponse, ApiResponse, BalanceUpdateResponse, CreateAccountRequest, CreateCardRequest,
    HealthResponse, LedgerEntryResponse, LoginRequest, MoneyRequest, SignupRequest,
    StatementQuery, TokenResponse, TransferRequest,
};
use crate::services::{AccountError, BalanceError, CardError};
use crate::AppState;

/// API information endpoint (root).
///
/// ## Endpoint
///
/// `GET /`
pub async fn api_info() -> HttpResponse {
    let info = json!({
        "name": "Banking API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": ["POST /auth/signup", "POST /auth/login"],
            "accounts": [
                "POST /accounts",
                "GET /accounts",
                "POST /accounts/{id}/deposit",
                "POST /accounts/{id}/withdraw",
                "POST /accounts/transfer",
                "GET /accounts/{id}/transactions"
            ],
            "cards": [
                "POST /cards",
                "GET /cards",
                "PATCH /cards/{id}/activate",
                "PATCH /cards/{id}/deactivate"
            ]
        }
    });

    HttpResponse::Ok().json(ApiResponse::success(info))
}

/// Health check endpoint.
///
/// ## Endpoint
///
/// `GET /health`
pub async fn health_check(state: web::Data<Arc<AppState>>) -> HttpResponse {
    let db_healthy = state.db.pool().get().await.is_ok();

    let response = HealthResponse {
        status: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
        database: db_healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    };

    let status_code = if db_healthy {
        actix_web::http::StatusCode::OK
    } else {
        actix_web::http::StatusCode::SERVICE_UNAVAILABLE
    };

    HttpResponse::build(status_code).json(ApiResponse::success(response))
}

// ============================================
// AUTH HANDLERS
// ============================================

/// Register a new user.
///
/// ## Endpoint
///
/// `POST /auth/signup`
pub async fn signup(
    state: web::Data<Arc<AppState>>,
    body: web::Json<SignupRequest>,
) -> HttpResponse {
    let req = body.into_inner();
    if req.password.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(
            "INVALID_PASSWORD",
            "Password must not be empty",
        ));
    }

    let password_hash = match auth::hash_password(&req.password) {
        Ok(hash) => hash,
        Err(e) => {
            error!("Password hashing failed: {}", e);
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("INTERNAL", "Registration failed"));
        }
    };

    let user = UserRecord {
        id: Uuid::new_v4(),
        name: req.name,
        email: req.email,
        password_hash,
        created_at: Utc::now(),
    };

    match queries::user_insert(state.db.pool(), &user).await {
        Ok(()) => {}
        Err(DatabaseError::QueryError(e))
            if e.code() == Some(&SqlState::UNIQUE_VIOLATION) =>
        {
            return HttpResponse::BadRequest().json(ApiResponse::<()>::error(
                "EMAIL_TAKEN",
                "Email already registered",
            ));
        }
        Err(e) => return store_unavailable(&e.to_string()),
    }

    info!("Registered user {}", user.id);
    issue_token(&state, user.id)
}

/// Log in with email and password.
///
/// ## Endpoint
///
/// `POST /auth/login`
pub async fn login(state: web::Data<Arc<AppState>>, body: web::Json<LoginRequest>) -> HttpResponse {
    let req = body.into_inner();

    let user = match queries::user_by_email(state.db.pool(), &req.email).await {
        Ok(user) => user,
        Err(e) => return store_unavailable(&e.to_string()),
    };

    // Same response for an unknown email and a wrong password.
    let invalid = || {
        HttpResponse::Unauthorized().json(ApiResponse::<()>::error(
            "INVALID_CREDENTIALS",
            "Invalid credentials",
        ))
    };

    let user = match user {
        Some(user) => user,
        None => return invalid(),
    };
    match auth::verify_password(&req.password, &user.password_hash) {
        Ok(true) => issue_token(&state, user.id),
        Ok(false) => invalid(),
        Err(e) => {
            error!("Password verification failed: {}", e);
            invalid()
        }
    }
}

fn issue_token(state: &AppState, user_id: Uuid) -> HttpResponse {
    match auth::create_token(
        user_id,
        &state.config.jwt_secret,
        state.config.token_expiry_minutes,
    ) {
        Ok(token) => HttpResponse::Ok().json(ApiResponse::success(TokenResponse::bearer(token))),
        Err(e) => {
            error!("Token creation failed: {}", e);
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("INTERNAL", "Token creation failed"))
        }
    }
}

// ============================================
// ACCOUNT HANDLERS
// ============================================

/// Open a new account for the caller.
///
/// ## Endpoint
///
/// `POST /accounts`
pub async fn create_account(
    state: web::Data<Arc<AppState>>,
    user: AuthedUser,
    body: web::Json<CreateAccountRequest>,
) -> HttpResponse {
    let req = body.into_inner();
    match state
        .accounts
        .create_account(user.user_id, req.account_type, req.initial_balance_minor)
        .await
    {
        Ok(account) => HttpResponse::Ok().json(ApiResponse::success(AccountResponse::from(account))),
        Err(e) => account_error_response(&e),
    }
}

/// List the caller's accounts.
///
/// ## Endpoint
///
/// `GET /accounts`
pub async fn list_accounts(state: web::Data<Arc<AppState>>, user: AuthedUser) -> HttpResponse {
    match state.accounts.list_accounts(user.user_id).await {
        Ok(accounts) => {
            let out: Vec<AccountResponse> =
                accounts.into_iter().map(AccountResponse::from).collect();
            HttpResponse::Ok().json(ApiResponse::success(out))
        }
        Err(e) => account_error_response(&e),
    }
}

/// Deposit into one of the caller's accounts.
///
/// ## Endpoint
///
/// `POST /accounts/{id}/deposit`
pub async fn deposit(
    state: web::Data<Arc<AppState>>,
    user: AuthedUser,
    path: web::Path<Uuid>,
    body: web::Json<MoneyRequest>,
) -> HttpResponse {
    let account_id = path.into_inner();
    let req = body.into_inner();
    let amount_minor = match req.resolve_amount_minor() {
        Ok(v) => v,
        Err(msg) => return invalid_amount(&msg),
    };

    match state
        .engine
        .deposit(
            account_id,
            amount_minor,
            user.user_id,
            req.description,
            req.idempotency_key,
        )
        .await
    {
        Ok(new_balance) => HttpResponse::Ok().json(ApiResponse::success(
            BalanceUpdateResponse::new(account_id, new_balance),
        )),
        Err(e) => balance_error_response(&e),
    }
}

/// Withdraw from one of the caller's accounts.
///
/// ## Endpoint
///
/// `POST /accounts/{id}/withdraw`
pub async fn withdraw(
    state: web::Data<Arc<AppState>>,
    user: AuthedUser,
    path: web::Path<Uuid>,
    body: web::Json<MoneyRequest>,
) -> HttpResponse {
    let account_id = path.into_inner();
    let req = body.into_inner();
    let amount_minor = match req.resolve_amount_minor() {
        Ok(v) => v,
        Err(msg) => return invalid_amount(&msg),
    };

    match state
        .engine
        .withdraw(
            account_id,
            amount_minor,
            user.user_id,
            req.description,
            req.idempotency_key,
        )
        .await
    {
        Ok(new_balance) => HttpResponse::Ok().json(ApiResponse::success(
            BalanceUpdateResponse::new(account_id, new_balance),
        )),
        Err(e) => balance_error_response(&e),
    }
}

/// Transfer between accounts. The source must belong to the caller.
///
/// ## Endpoint
///
/// `POST /accounts/transfer`
pub async fn transfer(
    state: web::Data<Arc<AppState>>,
    user: AuthedUser,
    body: web::Json<TransferRequest>,
) -> HttpResponse {
    let req = body.into_inner();
    let amount_minor = match req.resolve_amount_minor() {
        Ok(v) => v,
        Err(msg) => return invalid_amount(&msg),
    };

    match state
        .engine
        .transfer(
            req.from_account_id,
            req.to_account_id,
            amount_minor,
            user.user_id,
            req.description,
            req.idempotency_key,
        )
        .await
    {
        Ok(new_balance) => HttpResponse::Ok().json(ApiResponse::success(
            BalanceUpdateResponse::new(req.from_account_id, new_balance),
        )),
        Err(e) => balance_error_response(&e),
    }
}

/// One page of an account's statement, newest first.
///
/// ## Endpoint
///
/// `GET /accounts/{id}/transactions?limit=100&offset=0`
pub async fn get_statement(
    state: web::Data<Arc<AppState>>,
    user: AuthedUser,
    path: web::Path<Uuid>,
    query: web::Query<StatementQuery>,
) -> HttpResponse {
    let account_id = path.into_inner();
    let limit = query.limit.unwrap_or(100);
    let offset = query.offset.unwrap_or(0);

    if let Some(rejection) = validate_statement_window(limit, offset) {
        return rejection;
    }

    match state
        .engine
        .statement(account_id, user.user_id, limit, offset)
        .await
    {
        Ok(entries) => {
            let out: Vec<LedgerEntryResponse> =
                entries.into_iter().map(LedgerEntryResponse::from).collect();
            HttpResponse::Ok().json(ApiResponse::success(out))
        }
        Err(e) => balance_error_response(&e),
    }
}

// ============================================
// CARD HANDLERS
// ============================================

/// Issue a new card against one of the caller's accounts.
///
/// ## Endpoint
///
/// `POST /cards`
pub async fn create_card(
    state: web::Data<Arc<AppState>>,
    user: AuthedUser,
    body: web::Json<CreateCardRequest>,
) -> HttpResponse {
    let req = body.into_inner();
    match state
        .cards
        .issue_card(user.user_id, req.account_id, &req.expiry_date, &req.cvv)
        .await
    {
        Ok(card) => HttpResponse::Ok().json(ApiResponse::success(card)),
        Err(e) => card_error_response(&e),
    }
}

/// List the caller's cards.
///
/// ## Endpoint
///
/// `GET /cards`
pub async fn list_cards(state: web::Data<Arc<AppState>>, user: AuthedUser) -> HttpResponse {
    match state.cards.list_cards(user.user_id).await {
        Ok(cards) => HttpResponse::Ok().json(ApiResponse::success(cards)),
        Err(e) => card_error_response(&e),
    }
}

/// Activate one of the caller's cards.
///
/// ## Endpoint
///
/// `PATCH /cards/{id}/activate`
pub async fn activate_card(
    state: web::Data<Arc<AppState>>,
    user: AuthedUser,
    path: web::Path<Uuid>,
) -> HttpResponse {
    match state.cards.activate_card(path.into_inner(), user.user_id).await {
        Ok(card) => HttpResponse::Ok().json(ApiResponse::success(card)),
        Err(e) => card_error_response(&e),
    }
}

/// Deactivate one of the caller's cards.
///
/// ## Endpoint
///
/// `PATCH /cards/{id}/deactivate`
pub async fn deactivate_card(
    state: web::Data<Arc<AppState>>,
    user: AuthedUser,
    path: web::Path<Uuid>,
) -> HttpResponse {
    match state.cards.deactivate_card(path.into_inner(), user.user_id).await {
        Ok(card) => HttpResponse::Ok().json(ApiResponse::success(card)),
        Err(e) => card_error_response(&e),
    }
}

// ============================================
// VALIDATION & ERROR MAPPING
// ============================================

/// Reject out-of-range statement paging parameters.
///
/// Returns `Some(response)` when the request must be rejected.
fn validate_statement_window(limit: i64, offset: i64) -> Option<HttpResponse> {
    if !(1..=1000).contains(&limit) {
        return Some(HttpResponse::BadRequest().json(ApiResponse::<()>::error(
            "INVALID_LIMIT",
            "limit must be between 1 and 1000",
        )));
    }
    if offset < 0 {
        return Some(HttpResponse::BadRequest().json(ApiResponse::<()>::error(
            "INVALID_OFFSET",
            "offset must not be negative",
        )));
    }
    None
}

fn invalid_amount(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiResponse::<()>::error("INVALID_AMOUNT", message))
}

/// Map a balance engine error to an HTTP response.
///
/// | Error | Code | Status |
/// |-------|------|--------|
/// | InvalidAmount | INVALID_AMOUNT | 400 |
/// | AccountNotFound | ACCOUNT_NOT_FOUND | 404 |
/// | InsufficientFunds | INSUFFICIENT_FUNDS | 400 |
/// | SameAccountTransfer | SAME_ACCOUNT_TRANSFER | 400 |
/// | Overflow | BALANCE_OVERFLOW | 400 |
/// | IdempotencyMismatch | IDEMPOTENCY_MISMATCH | 409 |
/// | Conflict | CONFLICT | 409 |
/// | Store | STORE_UNAVAILABLE | 503 |
fn balance_error_response(e: &BalanceError) -> HttpResponse {
    error!("Balance operation failed: {}", e);
    match e {
        BalanceError::InvalidAmount => invalid_amount(&e.to_string()),
        BalanceError::AccountNotFound(_) => HttpResponse::NotFound()
            .json(ApiResponse::<()>::error("ACCOUNT_NOT_FOUND", &e.to_string())),
        BalanceError::InsufficientFunds { .. } => HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error("INSUFFICIENT_FUNDS", &e.to_string())),
        BalanceError::SameAccountTransfer => HttpResponse::BadRequest().json(
            ApiResponse::<()>::error("SAME_ACCOUNT_TRANSFER", &e.to_string()),
        ),
        BalanceError::Overflow => HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error("BALANCE_OVERFLOW", &e.to_string())),
        BalanceError::IdempotencyMismatch => HttpResponse::Conflict().json(
            ApiResponse::<()>::error("IDEMPOTENCY_MISMATCH", &e.to_string()),
        ),
        BalanceError::Conflict => HttpResponse::Conflict()
            .json(ApiResponse::<()>::error("CONFLICT", &e.to_string())),
        BalanceError::Store(_) => store_unavailable(&e.to_string()),
    }
}

fn account_error_response(e: &AccountError) -> HttpResponse {
    error!("Account operation failed: {}", e);
    match e {
        AccountError::InvalidInitialBalance => HttpResponse::BadRequest().json(
            ApiResponse::<()>::error("INVALID_INITIAL_BALANCE", &e.to_string()),
        ),
        AccountError::InvalidAccountType => HttpResponse::BadRequest().json(
            ApiResponse::<()>::error("INVALID_ACCOUNT_TYPE", &e.to_string()),
        ),
        AccountError::AccountNotFound(_) => HttpResponse::NotFound()
            .json(ApiResponse::<()>::error("ACCOUNT_NOT_FOUND", &e.to_string())),
        AccountError::Store(_) => store_unavailable(&e.to_string()),
    }
}

fn card_error_response(e: &CardError) -> HttpResponse {
    error!("Card operation failed: {}", e);
    match e {
        CardError::AccountNotFound(_) => HttpResponse::NotFound()
            .json(ApiResponse::<()>::error("ACCOUNT_NOT_FOUND", &e.to_string())),
        CardError::CardNotFound(_) => HttpResponse::NotFound()
            .json(ApiResponse::<()>::error("CARD_NOT_FOUND", &e.to_string())),
        CardError::Crypto(_) => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error("CARD_CRYPTO", &e.to_string())),
        CardError::Store(_) => store_unavailable(&e.to_string()),
    }
}

fn store_unavailable(message: &str) -> HttpResponse {
    HttpResponse::ServiceUnavailable()
        .json(ApiResponse::<()>::error("STORE_UNAVAILABLE", message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::http::StatusCode;

    /// Unwrap a rejection into (status, error code) for assertions.
    async fn status_and_code(resp: HttpResponse) -> (StatusCode, String) {
        let status = resp.status();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["data"].is_null());
        (status, json["error"]["code"].as_str().unwrap().to_string())
    }

    #[actix_rt::test]
    async fn test_balance_error_status_mapping() {
        let cases = [
            (
                BalanceError::InvalidAmount,
                StatusCode::BAD_REQUEST,
                "INVALID_AMOUNT",
            ),
            (
                BalanceError::AccountNotFound(Uuid::new_v4()),
                StatusCode::NOT_FOUND,
                "ACCOUNT_NOT_FOUND",
            ),
            (
                BalanceError::InsufficientFunds {
                    available_minor: 2_000,
                    requested_minor: 5_000,
                },
                StatusCode::BAD_REQUEST,
                "INSUFFICIENT_FUNDS",
            ),
            (
                BalanceError::SameAccountTransfer,
                StatusCode::BAD_REQUEST,
                "SAME_ACCOUNT_TRANSFER",
            ),
            (
                BalanceError::Overflow,
                StatusCode::BAD_REQUEST,
                "BALANCE_OVERFLOW",
            ),
            (
                BalanceError::IdempotencyMismatch,
                StatusCode::CONFLICT,
                "IDEMPOTENCY_MISMATCH",
            ),
            (BalanceError::Conflict, StatusCode::CONFLICT, "CONFLICT"),
            (
                BalanceError::Store("connection refused".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
            ),
        ];

        for (err, expected_status, expected_code) in cases {
            let (status, code) = status_and_code(balance_error_response(&err)).await;
            assert_eq!(status, expected_status, "{err}");
            assert_eq!(code, expected_code, "{err}");
        }
    }

    #[actix_rt::test]
    async fn test_account_error_status_mapping() {
        let cases = [
            (
                AccountError::InvalidInitialBalance,
                StatusCode::BAD_REQUEST,
                "INVALID_INITIAL_BALANCE",
            ),
            (
                AccountError::InvalidAccountType,
                StatusCode::BAD_REQUEST,
                "INVALID_ACCOUNT_TYPE",
            ),
            (
                AccountError::AccountNotFound(Uuid::new_v4()),
                StatusCode::NOT_FOUND,
                "ACCOUNT_NOT_FOUND",
            ),
            (
                AccountError::Store("down".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
            ),
        ];

        for (err, expected_status, expected_code) in cases {
            let (status, code) = status_and_code(account_error_response(&err)).await;
            assert_eq!(status, expected_status, "{err}");
            assert_eq!(code, expected_code, "{err}");
        }
    }

    #[actix_rt::test]
    async fn test_card_error_status_mapping() {
        let cases = [
            (
                CardError::AccountNotFound(Uuid::new_v4()),
                StatusCode::NOT_FOUND,
                "ACCOUNT_NOT_FOUND",
            ),
            (
                CardError::CardNotFound(Uuid::new_v4()),
                StatusCode::NOT_FOUND,
                "CARD_NOT_FOUND",
            ),
            (
                CardError::Crypto("bad token".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "CARD_CRYPTO",
            ),
            (
                CardError::Store("down".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
            ),
        ];

        for (err, expected_status, expected_code) in cases {
            let (status, code) = status_and_code(card_error_response(&err)).await;
            assert_eq!(status, expected_status, "{err}");
            assert_eq!(code, expected_code, "{err}");
        }
    }

    #[actix_rt::test]
    async fn test_statement_window_validation() {
        // In-range values pass through.
        assert!(validate_statement_window(1, 0).is_none());
        assert!(validate_statement_window(100, 50).is_none());
        assert!(validate_statement_window(1000, 0).is_none());

        let (status, code) = status_and_code(validate_statement_window(0, 0).unwrap()).await;
        assert_eq!((status, code.as_str()), (StatusCode::BAD_REQUEST, "INVALID_LIMIT"));

        let (status, code) = status_and_code(validate_statement_window(1001, 0).unwrap()).await;
        assert_eq!((status, code.as_str()), (StatusCode::BAD_REQUEST, "INVALID_LIMIT"));

        let (status, code) = status_and_code(validate_statement_window(-5, 0).unwrap()).await;
        assert_eq!((status, code.as_str()), (StatusCode::BAD_REQUEST, "INVALID_LIMIT"));

        let (status, code) = status_and_code(validate_statement_window(100, -1).unwrap()).await;
        assert_eq!((status, code.as_str()), (StatusCode::BAD_REQUEST, "INVALID_OFFSET"));
    }

    #[actix_rt::test]
    async fn test_invalid_amount_rejection() {
        let (status, code) = status_and_code(invalid_amount("amountMinor is required")).await;
        assert_eq!((status, code.as_str()), (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"));
    }
}
