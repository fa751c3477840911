// dtos/contractdtos.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::contractmodels::*;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateContractDto {
    pub professional_id: Uuid,

    #[validate(length(min = 1, message = "Total amount is required"))]
    pub total_amount: String,

    /// Fraction in [0, 1]; the platform default applies when omitted.
    pub commission_rate: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AllocateFundsDto {
    #[validate(length(min = 1, message = "Amount is required"))]
    pub amount: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreatePaymentRequestDto {
    pub kind: PaymentRequestKind,

    #[validate(length(min = 1, message = "Amount is required"))]
    pub amount: String,

    #[validate(length(max = 500, message = "Description is too long"))]
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CancelPaymentDto {
    #[validate(length(min = 1, max = 500, message = "Reason must be between 1 and 500 characters"))]
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SettleContractDto {
    #[validate(length(min = 1, message = "Professional share is required"))]
    pub professional_share_pct: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContractResponseDto {
    pub id: Uuid,
    pub contract_number: String,
    pub client_id: Uuid,
    pub professional_id: Uuid,
    pub total_amount: BigDecimal,
    pub contract_balance: BigDecimal,
    pub professional_balance: BigDecimal,
    pub professional_balance_release_date: Option<DateTime<Utc>>,
    pub paid_amount: BigDecimal,
    pub platform_commission_rate: BigDecimal,
    pub status: ContractStatus,
    pub completion_percentage: i32,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<Contract> for ContractResponseDto {
    fn from(contract: Contract) -> Self {
        Self {
            id: contract.id,
            contract_number: contract.contract_number,
            client_id: contract.client_id,
            professional_id: contract.professional_id,
            total_amount: contract.total_amount,
            contract_balance: contract.contract_balance,
            professional_balance: contract.professional_balance,
            professional_balance_release_date: contract.professional_balance_release_date,
            paid_amount: contract.paid_amount,
            platform_commission_rate: contract.platform_commission_rate,
            status: contract.status,
            completion_percentage: contract.completion_percentage,
            created_at: contract.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentRequestResponseDto {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub kind: PaymentRequestKind,
    pub amount: BigDecimal,
    pub platform_commission_amount: BigDecimal,
    pub net_amount_to_professional: BigDecimal,
    pub status: PaymentRequestStatus,
    pub description: String,
    pub requested_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub transferred_at: Option<DateTime<Utc>>,
    pub available_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<PaymentRequest> for PaymentRequestResponseDto {
    fn from(request: PaymentRequest) -> Self {
        Self {
            id: request.id,
            contract_id: request.contract_id,
            kind: request.kind,
            amount: request.amount,
            platform_commission_amount: request.platform_commission_amount,
            net_amount_to_professional: request.net_amount_to_professional,
            status: request.status,
            description: request.description,
            requested_by: request.requested_by,
            approved_by: request.approved_by,
            created_at: request.created_at,
            transferred_at: request.transferred_at,
            available_at: request.available_at,
            completed_at: request.completed_at,
        }
    }
}
