// dtos/walletdtos.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::walletmodels::*;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WalletResponseDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub available_balance: BigDecimal,
    pub pending_balance: BigDecimal,
    pub total_earned: BigDecimal,
    pub currency: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<Wallet> for WalletResponseDto {
    fn from(wallet: Wallet) -> Self {
        Self {
            id: wallet.id,
            user_id: wallet.user_id,
            available_balance: wallet.available_balance,
            pending_balance: wallet.pending_balance,
            total_earned: wallet.total_earned,
            currency: wallet.currency,
            created_at: wallet.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TopUpRequestDto {
    #[validate(length(min = 1, message = "Amount is required"))]
    pub amount: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct WithdrawRequestDto {
    #[validate(length(min = 1, message = "Amount is required"))]
    pub amount: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerEntryDto {
    pub id: Uuid,
    pub amount: BigDecimal,
    pub direction: EntryDirection,
    pub source: LedgerSource,
    pub description: String,
    pub contract_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<LedgerEntry> for LedgerEntryDto {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            amount: entry.amount,
            direction: entry.direction,
            source: entry.source,
            description: entry.description,
            contract_id: entry.contract_id,
            payment_id: entry.payment_id,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransactionHistoryQuery {
    pub since: Option<DateTime<Utc>>,
}
