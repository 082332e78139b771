//! # API Request Models
//!
//! Structures for incoming API request bodies. Each struct represents
//! the expected JSON body (or query string) for an endpoint.
//!
//! All amounts are integer **minor units** (cents); the API never
//! accepts floating-point money.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::parse_minor_units;

/// Request to register a new user.
///
/// ## Example JSON
///
/// ```json
/// {
///     "name": "Ada Lovelace",
///     "email": "ada@example.com",
///     "password": "correct horse battery staple"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request to log in with email and password.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request to open a new account.
///
/// ## Example JSON
///
/// ```json
/// {
///     "accountType": "checking",
///     "initialBalanceMinor": 10000
/// }
/// ```
///
/// `initialBalanceMinor` is optional and defaults to 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    /// Open string enum, e.g. "checking" or "savings".
    pub account_type: String,

    /// Opening balance in minor units. Must be >= 0 when present.
    pub initial_balance_minor: Option<i64>,
}

/// Body for deposit and withdraw endpoints.
///
/// The amount is given either as integer minor units (`amountMinor`)
/// or as a decimal string (`amount`, e.g. `"50.00"`). One of the two
/// is required; `amountMinor` wins when both are present.
///
/// ## Example JSON
///
/// ```json
/// {
///     "amountMinor": 5000,
///     "description": "payroll",
///     "idempotencyKey": "dep-2024-06-01-xyz"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyRequest {
    /// Amount in minor units. Must be > 0.
    pub amount_minor: Option<i64>,

    /// Decimal amount string, at most two fraction digits.
    pub amount: Option<String>,

    /// Optional free-text note stored on the ledger entry.
    pub description: Option<String>,

    /// Optional client-supplied dedup token. Repeating a request with
    /// the same key returns the original result without re-applying
    /// the operation.
    pub idempotency_key: Option<String>,
}

impl MoneyRequest {
    /// The requested amount in minor units, from whichever field the
    /// client sent.
    pub fn resolve_amount_minor(&self) -> Result<i64, String> {
        resolve_amount(self.amount_minor, self.amount.as_deref())
    }
}

/// Request to transfer money between two accounts.
///
/// The source must belong to the caller; the destination may belong
/// to any user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,

    /// Amount in minor units. Must be > 0.
    pub amount_minor: Option<i64>,

    /// Decimal amount string, at most two fraction digits.
    pub amount: Option<String>,

    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    /// The requested amount in minor units, from whichever field the
    /// client sent.
    pub fn resolve_amount_minor(&self) -> Result<i64, String> {
        resolve_amount(self.amount_minor, self.amount.as_deref())
    }
}

fn resolve_amount(amount_minor: Option<i64>, amount: Option<&str>) -> Result<i64, String> {
    match (amount_minor, amount) {
        (Some(minor), _) => Ok(minor),
        (None, Some(decimal)) => parse_minor_units(decimal),
        (None, None) => Err("amountMinor or amount is required".to_string()),
    }
}

/// Query string for the statement endpoint.
///
/// `limit` must be in `[1, 1000]`; it defaults to 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Request to issue a new card against one of the caller's accounts.
///
/// The card number is generated server-side; the client only supplies
/// the expiry and CVV to be stored (encrypted).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardRequest {
    pub account_id: Uuid,

    /// Format: MM/YY.
    pub expiry_date: String,

    pub cvv: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_request_wire_shape() {
        let req: MoneyRequest =
            serde_json::from_str(r#"{"amountMinor": 5000, "idempotencyKey": "k1"}"#).unwrap();
        assert_eq!(req.resolve_amount_minor(), Ok(5000));
        assert_eq!(req.idempotency_key.as_deref(), Some("k1"));
        assert!(req.description.is_none());
    }

    #[test]
    fn test_decimal_amount_accepted() {
        let req: MoneyRequest = serde_json::from_str(r#"{"amount": "50.00"}"#).unwrap();
        assert_eq!(req.resolve_amount_minor(), Ok(5_000));

        // Integer form wins when both are present.
        let req: MoneyRequest =
            serde_json::from_str(r#"{"amountMinor": 100, "amount": "50.00"}"#).unwrap();
        assert_eq!(req.resolve_amount_minor(), Ok(100));

        let req: MoneyRequest = serde_json::from_str(r#"{"amount": "1.005"}"#).unwrap();
        assert!(req.resolve_amount_minor().is_err());

        let req: MoneyRequest = serde_json::from_str("{}").unwrap();
        assert!(req.resolve_amount_minor().is_err());
    }

    #[test]
    fn test_transfer_request_resolves_amount() {
        let req: TransferRequest = serde_json::from_str(
            r#"{
                "fromAccountId": "6f9a2483-c2c1-4f1a-8f5a-2f4d7c9b1e3d",
                "toAccountId": "0d4f2a91-7b3e-4c8d-9e1f-5a6b7c8d9e0f",
                "amount": "40.00"
            }"#,
        )
        .unwrap();
        assert_eq!(req.resolve_amount_minor(), Ok(4_000));
    }

    #[test]
    fn test_create_account_defaults() {
        let req: CreateAccountRequest =
            serde_json::from_str(r#"{"accountType": "savings"}"#).unwrap();
        assert_eq!(req.account_type, "savings");
        assert!(req.initial_balance_minor.is_none());
    }
}
