//! # Card Service
//!
//! Card issuance and lifecycle. Card numbers are generated
//! server-side (15 random digits plus a Luhn check digit); number,
//! expiry and CVV are stored as fernet tokens and only ever leave the
//! service masked.

use chrono::Utc;
use fernet::Fernet;
use rand::Rng;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::db::models::CardRecord;
use crate::db::{queries, Database};
use crate::models::CardResponse;
use crate::services::account_directory::{AccountDirectory, AccountError};
use crate::utils::{luhn_check_digit, mask_card_number};

/// Errors produced by the card service.
#[derive(Error, Debug)]
pub enum CardError {
    /// The backing account does not exist or is not owned by the caller.
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// The card does not exist or is not owned by the caller.
    #[error("Card not found: {0}")]
    CardNotFound(Uuid),

    /// Encryption or decryption of stored card data failed.
    #[error("Card data encryption failed: {0}")]
    Crypto(String),

    /// The store is unreachable or failed.
    #[error("Store unavailable: {0}")]
    Store(String),
}

impl From<AccountError> for CardError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::AccountNotFound(id) => CardError::AccountNotFound(id),
            other => CardError::Store(other.to_string()),
        }
    }
}

/// Generate a fresh 16-digit card number that passes Luhn validation.
fn generate_card_number() -> String {
    let mut rng = rand::thread_rng();
    let payload: String = (0..15).map(|_| rng.gen_range(0..10u8).to_string()).collect();
    let check = luhn_check_digit(&payload);
    format!("{payload}{check}")
}

/// Card issuance and lifecycle service.
#[derive(Clone)]
pub struct CardService {
    db: Database,

    /// Ownership checks go through the account directory.
    accounts: AccountDirectory,

    /// Symmetric key for card data at rest.
    fernet: Fernet,
}

impl CardService {
    /// Create the service.
    ///
    /// Fails if `encryption_key` is not a valid fernet key (32 bytes,
    /// url-safe base64).
    pub fn new(
        db: Database,
        accounts: AccountDirectory,
        encryption_key: &str,
    ) -> Result<Self, CardError> {
        let fernet = Fernet::new(encryption_key)
            .ok_or_else(|| CardError::Crypto("invalid CARD_ENCRYPTION_KEY".to_string()))?;
        Ok(Self {
            db,
            accounts,
            fernet,
        })
    }

    /// Issue a new card against one of the caller's accounts.
    pub async fn issue_card(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        expiry_date: &str,
        cvv: &str,
    ) -> Result<CardResponse, CardError> {
        let account = self.accounts.get_owned_account(account_id, user_id).await?;

        let card_number = generate_card_number();
        let card = CardRecord {
            id: Uuid::new_v4(),
            account_id: account.id,
            user_id,
            card_number: self.encrypt(&card_number),
            expiry_date: self.encrypt(expiry_date),
            cvv: self.encrypt(cvv),
            is_active: true,
            created_at: Utc::now(),
        };
        queries::card_insert(self.db.pool(), &card)
            .await
            .map_err(|e| CardError::Store(e.to_string()))?;

        info!("Issued card {} on account {}", card.id, account.id);
        self.to_response(&card)
    }

    /// All of the caller's cards, masked.
    pub async fn list_cards(&self, user_id: Uuid) -> Result<Vec<CardResponse>, CardError> {
        let cards = queries::cards_by_user(self.db.pool(), user_id)
            .await
            .map_err(|e| CardError::Store(e.to_string()))?;
        cards.iter().map(|c| self.to_response(c)).collect()
    }

    /// Activate one of the caller's cards.
    pub async fn activate_card(
        &self,
        card_id: Uuid,
        user_id: Uuid,
    ) -> Result<CardResponse, CardError> {
        self.set_active(card_id, user_id, true).await
    }

    /// Deactivate one of the caller's cards.
    pub async fn deactivate_card(
        &self,
        card_id: Uuid,
        user_id: Uuid,
    ) -> Result<CardResponse, CardError> {
        self.set_active(card_id, user_id, false).await
    }

    async fn set_active(
        &self,
        card_id: Uuid,
        user_id: Uuid,
        active: bool,
    ) -> Result<CardResponse, CardError> {
        let card = queries::card_set_active(self.db.pool(), card_id, user_id, active)
            .await
            .map_err(|e| CardError::Store(e.to_string()))?
            .ok_or(CardError::CardNotFound(card_id))?;

        info!(
            "Card {} {}",
            card.id,
            if active { "activated" } else { "deactivated" }
        );
        self.to_response(&card)
    }

    fn encrypt(&self, value: &str) -> String {
        self.fernet.encrypt(value.as_bytes())
    }

    fn decrypt(&self, token: &str) -> Result<String, CardError> {
        let bytes = self
            .fernet
            .decrypt(token)
            .map_err(|e| CardError::Crypto(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| CardError::Crypto(e.to_string()))
    }

    fn to_response(&self, card: &CardRecord) -> Result<CardResponse, CardError> {
        let number_plain = self.decrypt(&card.card_number)?;
        Ok(CardResponse {
            id: card.id,
            account_id: card.account_id,
            card_number: mask_card_number(&number_plain),
            expiry_date: self.decrypt(&card.expiry_date)?,
            is_active: card.is_active,
            created_at: card.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::luhn_valid;

    #[test]
    fn test_generated_numbers_pass_luhn() {
        for _ in 0..100 {
            let number = generate_card_number();
            assert_eq!(number.len(), 16);
            assert!(luhn_valid(&number), "generated number failed Luhn: {number}");
        }
    }

    #[test]
    fn test_fernet_round_trip() {
        let key = Fernet::generate_key();
        let fernet = Fernet::new(&key).unwrap();
        let token = fernet.encrypt(b"4539148803436467");
        assert_ne!(token, "4539148803436467");
        assert_eq!(fernet.decrypt(&token).unwrap(), b"4539148803436467");
    }
}
