// service/escrow_service.rs
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::Duration;
use uuid::Uuid;

use crate::{
    db::contractdb::{ContractBalanceInfo, ContractCompletion, ContractExt},
    db::db::DBClient,
    db::userdb::UserExt,
    models::contractmodels::Contract,
    models::usermodel::{User, UserRole},
    service::error::ServiceError,
    utils::money::round_money,
};

/// Owns the escrow side of a contract: funding it, paying out of it, and
/// winding it down. All balance arithmetic happens in the db layer inside
/// a single transaction per operation; this service enforces who may call
/// what and in which contract state.
#[derive(Clone)]
pub struct EscrowService {
    db_client: Arc<DBClient>,
    hold: Duration,
}

impl EscrowService {
    pub fn new(db_client: Arc<DBClient>, hold_period_days: i64) -> Self {
        Self {
            db_client,
            hold: Duration::days(hold_period_days),
        }
    }

    pub fn hold_period(&self) -> Duration {
        self.hold
    }

    pub async fn create_contract(
        &self,
        actor: &User,
        professional_id: Uuid,
        total_amount: BigDecimal,
        platform_commission_rate: BigDecimal,
    ) -> Result<Contract, ServiceError> {
        if actor.role != UserRole::Client {
            return Err(ServiceError::Unauthorized(actor.id));
        }

        let professional = self
            .db_client
            .get_user(professional_id)
            .await
            .map_err(ServiceError::Database)?
            .ok_or(ServiceError::Validation(
                "Professional does not exist".to_string(),
            ))?;
        if professional.role != UserRole::Professional {
            return Err(ServiceError::Validation(
                "Counterparty is not a professional".to_string(),
            ));
        }

        if platform_commission_rate < BigDecimal::from(0)
            || platform_commission_rate > BigDecimal::from(1)
        {
            return Err(ServiceError::Validation(
                "Commission rate must be within [0, 1]".to_string(),
            ));
        }

        self.db_client
            .create_contract(
                actor.id,
                professional_id,
                round_money(&total_amount),
                platform_commission_rate,
            )
            .await
    }

    pub async fn activate_contract(
        &self,
        actor: &User,
        contract_id: Uuid,
    ) -> Result<Contract, ServiceError> {
        let contract = self.fetch_contract(contract_id).await?;
        if contract.client_id != actor.id {
            return Err(ServiceError::Unauthorized(actor.id));
        }

        self.db_client.activate_contract(contract_id).await
    }

    /// Client sets funds aside for this engagement: available -> pending
    /// on the wallet, escrow incremented, in one atomic unit.
    pub async fn allocate_funds(
        &self,
        actor: &User,
        contract_id: Uuid,
        amount: BigDecimal,
    ) -> Result<Contract, ServiceError> {
        let contract = self.fetch_contract(contract_id).await?;
        if contract.client_id != actor.id {
            return Err(ServiceError::Unauthorized(actor.id));
        }
        self.ensure_operable(&contract)?;

        self.db_client
            .allocate_contract_funds(contract_id, round_money(&amount))
            .await
    }

    pub async fn balance_info(
        &self,
        actor: &User,
        contract_id: Uuid,
    ) -> Result<ContractBalanceInfo, ServiceError> {
        let contract = self.fetch_contract(contract_id).await?;
        if contract.client_id != actor.id && contract.professional_id != actor.id {
            return Err(ServiceError::Unauthorized(actor.id));
        }

        self.db_client.contract_balance_info(contract_id).await
    }

    /// Terminal: pays the whole remaining escrow to the professional and
    /// closes the contract.
    pub async fn complete_contract(
        &self,
        actor: &User,
        contract_id: Uuid,
    ) -> Result<ContractCompletion, ServiceError> {
        let contract = self.fetch_contract(contract_id).await?;
        if contract.client_id != actor.id {
            return Err(ServiceError::Unauthorized(actor.id));
        }

        let completion = self
            .db_client
            .complete_contract(contract_id, self.hold)
            .await?;

        tracing::info!(
            "Contract {} completed, remaining escrow {} transferred",
            completion.contract.contract_number,
            completion.remaining_balance
        );

        Ok(completion)
    }

    /// Contract-level release of held professional funds. Driven by the
    /// hold-release sweep; idempotent when nothing is held.
    pub async fn release_professional_balance(
        &self,
        contract_id: Uuid,
    ) -> Result<Option<BigDecimal>, ServiceError> {
        self.db_client.release_professional_balance(contract_id).await
    }

    pub(crate) async fn fetch_contract(&self, contract_id: Uuid) -> Result<Contract, ServiceError> {
        self.db_client
            .get_contract(contract_id)
            .await?
            .ok_or(ServiceError::ContractNotFound(contract_id))
    }

    /// Money can only move on an active, unfrozen contract.
    pub(crate) fn ensure_operable(&self, contract: &Contract) -> Result<(), ServiceError> {
        if contract.is_frozen() {
            return Err(ServiceError::InvalidState(format!(
                "Contract {} is frozen pending dispute resolution",
                contract.contract_number
            )));
        }
        if !contract.is_active() {
            return Err(ServiceError::InvalidContractStatus(
                contract.id,
                contract.status,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn test_escrow_service_construction() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/craftlink")
            .unwrap();
        let db_client = Arc::new(DBClient::new(pool));

        let service = EscrowService::new(db_client, 3);
        assert_eq!(service.hold_period(), Duration::days(3));
    }
}
