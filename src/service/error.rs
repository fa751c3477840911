use axum::http::StatusCode;
use bigdecimal::BigDecimal;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    error::HttpError,
    models::contractmodels::{ContractStatus, PaymentRequestStatus},
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: BigDecimal,
        available: BigDecimal,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Contract {0} is in status {1:?}")]
    InvalidContractStatus(Uuid, ContractStatus),

    #[error("Payment request {0} is in status {1:?}")]
    InvalidPaymentStatus(Uuid, PaymentRequestStatus),

    #[error("User {0} is not authorized to perform this action")]
    Unauthorized(Uuid),

    #[error("Transfer can no longer be reversed: {0}")]
    IrreversibleTransfer(String),

    #[error("Contract {0} not found")]
    ContractNotFound(Uuid),

    #[error("Payment request {0} not found")]
    PaymentRequestNotFound(Uuid),

    #[error("Wallet not found for user {0}")]
    WalletNotFound(Uuid),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::ContractNotFound(_)
            | ServiceError::PaymentRequestNotFound(_)
            | ServiceError::WalletNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::InvalidState(_)
            | ServiceError::InvalidContractStatus(_, _)
            | ServiceError::InvalidPaymentStatus(_, _)
            | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,

            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,

            ServiceError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,

            // Reported distinctly so callers can route it to dispute
            // handling instead of a generic failure.
            ServiceError::IrreversibleTransfer(_) => StatusCode::CONFLICT,

            ServiceError::Gateway(_) => StatusCode::BAD_GATEWAY,

            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        HttpError::new(error.to_string(), error.status_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_code_mapping() {
        let insufficient = ServiceError::InsufficientFunds {
            required: BigDecimal::from_str("700.00").unwrap(),
            available: BigDecimal::from_str("600.00").unwrap(),
        };
        assert_eq!(insufficient.status_code(), StatusCode::PAYMENT_REQUIRED);

        let irreversible = ServiceError::IrreversibleTransfer("already promoted".into());
        assert_eq!(irreversible.status_code(), StatusCode::CONFLICT);

        let not_found = ServiceError::ContractNotFound(Uuid::nil());
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let unauthorized = ServiceError::Unauthorized(Uuid::nil());
        assert_eq!(unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_insufficient_funds_reports_shortfall() {
        let err = ServiceError::InsufficientFunds {
            required: BigDecimal::from_str("700.00").unwrap(),
            available: BigDecimal::from_str("600.00").unwrap(),
        };
        let message = err.to_string();
        assert!(message.contains("700.00"));
        assert!(message.contains("600.00"));
    }
}
