// service/payment_service.rs
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::Duration;
use uuid::Uuid;

use crate::{
    db::contractdb::{ContractExt, TransferOutcome},
    db::db::DBClient,
    models::contractmodels::*,
    models::usermodel::{User, UserRole},
    service::error::ServiceError,
    service::escrow_service::EscrowService,
    utils::money::round_money,
};

/// The request -> approve -> transfer -> complete lifecycle, one state
/// machine for direct payments, milestones and installments. Who may do
/// what comes from the declarative role table on `PaymentRequestKind`.
#[derive(Clone)]
pub struct PaymentRequestService {
    db_client: Arc<DBClient>,
    escrow_service: Arc<EscrowService>,
    hold: Duration,
}

impl PaymentRequestService {
    pub fn new(
        db_client: Arc<DBClient>,
        escrow_service: Arc<EscrowService>,
        hold_period_days: i64,
    ) -> Self {
        Self {
            db_client,
            escrow_service,
            hold: Duration::days(hold_period_days),
        }
    }

    pub async fn request_payment(
        &self,
        actor: &User,
        contract_id: Uuid,
        kind: PaymentRequestKind,
        amount: BigDecimal,
        description: String,
    ) -> Result<PaymentRequest, ServiceError> {
        let contract = self.escrow_service.fetch_contract(contract_id).await?;
        self.escrow_service.ensure_operable(&contract)?;

        let expected = match kind.requester_role() {
            UserRole::Client => contract.client_id,
            _ => contract.professional_id,
        };
        if actor.id != expected || actor.role != kind.requester_role() {
            return Err(ServiceError::Unauthorized(actor.id));
        }

        self.db_client
            .create_payment_request(
                contract_id,
                kind,
                round_money(&amount),
                actor.id,
                description,
            )
            .await
    }

    /// Client approval immediately triggers the transfer; both happen in
    /// one transaction so the sufficiency re-check and the money movement
    /// cannot be separated by a concurrent approval.
    pub async fn approve_payment(
        &self,
        actor: &User,
        request_id: Uuid,
    ) -> Result<(PaymentRequest, TransferOutcome), ServiceError> {
        let request = self.fetch_request(request_id).await?;
        let contract = self
            .escrow_service
            .fetch_contract(request.contract_id)
            .await?;
        self.escrow_service.ensure_operable(&contract)?;

        if actor.id != contract.client_id || actor.role != request.kind.approver_role() {
            return Err(ServiceError::Unauthorized(actor.id));
        }

        self.db_client
            .approve_payment_request(request_id, actor.id, self.hold)
            .await
    }

    /// Either party can cancel. Before the transfer this only flips the
    /// request (installments also hand their escrowed amount back); after
    /// the transfer the full reversal runs, or fails as irreversible.
    pub async fn cancel_payment(
        &self,
        actor: &User,
        request_id: Uuid,
        reason: String,
    ) -> Result<PaymentRequest, ServiceError> {
        let request = self.fetch_request(request_id).await?;
        let contract = self
            .escrow_service
            .fetch_contract(request.contract_id)
            .await?;

        if contract.is_frozen() {
            return Err(ServiceError::InvalidState(format!(
                "Contract {} is frozen pending dispute resolution",
                contract.contract_number
            )));
        }
        if actor.id != contract.client_id && actor.id != contract.professional_id {
            return Err(ServiceError::Unauthorized(actor.id));
        }

        self.db_client.cancel_payment_request(request_id, reason).await
    }

    /// Scheduler-only: promote a matured transfer. Ok(None) means there
    /// was nothing to do (already completed, or another worker has it).
    pub async fn complete_payment(
        &self,
        request_id: Uuid,
    ) -> Result<Option<PaymentRequest>, ServiceError> {
        self.db_client.complete_payment_request(request_id).await
    }

    pub async fn requests_for_contract(
        &self,
        actor: &User,
        contract_id: Uuid,
    ) -> Result<Vec<PaymentRequest>, ServiceError> {
        let contract = self.escrow_service.fetch_contract(contract_id).await?;
        if actor.id != contract.client_id && actor.id != contract.professional_id {
            return Err(ServiceError::Unauthorized(actor.id));
        }

        self.db_client.payment_requests_for_contract(contract_id).await
    }

    pub async fn pending_requests(&self, actor: &User) -> Result<Vec<PaymentRequest>, ServiceError> {
        self.db_client.pending_requests_for_professional(actor.id).await
    }

    pub async fn completed_requests(
        &self,
        actor: &User,
    ) -> Result<Vec<PaymentRequest>, ServiceError> {
        self.db_client
            .completed_requests_for_professional(actor.id)
            .await
    }

    async fn fetch_request(&self, request_id: Uuid) -> Result<PaymentRequest, ServiceError> {
        self.db_client
            .get_payment_request(request_id)
            .await?
            .ok_or(ServiceError::PaymentRequestNotFound(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn test_payment_service_construction() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/craftlink")
            .unwrap();
        let db_client = Arc::new(DBClient::new(pool));
        let escrow_service = Arc::new(EscrowService::new(db_client.clone(), 3));

        let _ = PaymentRequestService::new(db_client, escrow_service, 3);
    }
}
