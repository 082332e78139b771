//! # API Response Models
//!
//! Structures for outgoing API response bodies. All responses are
//! wrapped in a standard envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{AccountRecord, EntryType, LedgerEntryRecord};
use crate::utils::format_minor_units;

/// Standard API response wrapper.
///
/// ## Success Response
///
/// ```json
/// { "success": true, "data": { ... }, "error": null }
/// ```
///
/// ## Error Response
///
/// ```json
/// {
///     "success": false,
///     "data": null,
///     "error": { "code": "INSUFFICIENT_FUNDS", "message": "..." }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Whether the request was successful.
    pub success: bool,

    /// Response data (null on error).
    pub data: Option<T>,

    /// Error information (null on success).
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response with data.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// API error information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Error code (e.g., "INSUFFICIENT_FUNDS").
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

/// Access token response for signup/login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    /// Always "bearer".
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// One account, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: Uuid,
    pub account_type: String,

    /// Balance in minor units.
    pub balance_minor: i64,

    /// Human-readable balance, e.g. "1,234.56".
    pub formatted_balance: String,

    pub created_at: DateTime<Utc>,
}

impl From<AccountRecord> for AccountResponse {
    fn from(account: AccountRecord) -> Self {
        Self {
            id: account.id,
            account_type: account.account_type,
            formatted_balance: format_minor_units(account.balance_minor),
            balance_minor: account.balance_minor,
            created_at: account.created_at,
        }
    }
}

/// Result of a deposit, withdrawal, or transfer.
///
/// For a transfer, `account_id`/`new_balance_minor` describe the
/// source account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceUpdateResponse {
    pub account_id: Uuid,
    pub new_balance_minor: i64,
    pub formatted_balance: String,
}

impl BalanceUpdateResponse {
    pub fn new(account_id: Uuid, new_balance_minor: i64) -> Self {
        Self {
            account_id,
            new_balance_minor,
            formatted_balance: format_minor_units(new_balance_minor),
        }
    }
}

/// One statement line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub entry_type: EntryType,

    /// Always positive; direction comes from `entryType`.
    pub amount_minor: i64,

    /// The entry's effect on the balance: positive for credits,
    /// negative for debits.
    pub signed_amount_minor: i64,

    /// Links the two rows of one transfer.
    pub correlation_id: Option<Uuid>,

    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntryRecord> for LedgerEntryResponse {
    fn from(entry: LedgerEntryRecord) -> Self {
        Self {
            id: entry.id,
            account_id: entry.account_id,
            signed_amount_minor: entry.entry_type.signed_amount(entry.amount_minor),
            entry_type: entry.entry_type,
            amount_minor: entry.amount_minor,
            correlation_id: entry.correlation_id,
            description: entry.description,
            created_at: entry.created_at,
        }
    }
}

/// One card, as returned by the API. The number is always masked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
    pub id: Uuid,
    pub account_id: Uuid,

    /// Masked: `**** **** **** 1234`.
    pub card_number: String,

    /// Format: MM/YY.
    pub expiry_date: String,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub database: bool,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shapes() {
        let ok = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["data"], 42);
        assert!(ok["error"].is_null());

        let err = serde_json::to_value(ApiResponse::<()>::error("NOPE", "nope")).unwrap();
        assert_eq!(err["success"], false);
        assert_eq!(err["error"]["code"], "NOPE");
    }

    #[test]
    fn test_ledger_entry_response_signed_amount() {
        let entry = LedgerEntryRecord {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            entry_type: EntryType::TransferDebit,
            amount_minor: 4000,
            correlation_id: Some(Uuid::new_v4()),
            description: None,
            created_at: Utc::now(),
        };
        let resp = LedgerEntryResponse::from(entry);
        assert_eq!(resp.amount_minor, 4000);
        assert_eq!(resp.signed_amount_minor, -4000);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["entryType"], "transfer_debit");
    }
}
