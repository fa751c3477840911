// service/dispute_service.rs
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::Duration;
use uuid::Uuid;

use crate::{
    db::contractdb::{ContractExt, SettlementOutcome},
    db::db::DBClient,
    models::contractmodels::Contract,
    service::error::ServiceError,
};

/// Boundary for the external disputes subsystem. It can freeze a
/// contract's money movement, lift the freeze, or settle the contract
/// with a percentage split of the remaining escrow.
#[derive(Clone)]
pub struct DisputeService {
    db_client: Arc<DBClient>,
    hold: Duration,
}

impl DisputeService {
    pub fn new(db_client: Arc<DBClient>, hold_period_days: i64) -> Self {
        Self {
            db_client,
            hold: Duration::days(hold_period_days),
        }
    }

    /// Freeze: no approve/transfer/cancel until unfreeze or settlement.
    /// In-flight transfers stop maturing so settlement can still reverse
    /// them.
    pub async fn freeze_contract(&self, contract_id: Uuid) -> Result<Contract, ServiceError> {
        let contract = self.db_client.mark_contract_disputed(contract_id).await?;
        tracing::warn!(
            "Contract {} frozen pending dispute resolution",
            contract.contract_number
        );
        Ok(contract)
    }

    pub async fn unfreeze_contract(&self, contract_id: Uuid) -> Result<Contract, ServiceError> {
        let contract = self.db_client.unfreeze_contract(contract_id).await?;
        tracing::info!("Contract {} unfrozen", contract.contract_number);
        Ok(contract)
    }

    /// Settle with outcome: `professional_share_pct` of the remaining
    /// escrow goes to the professional through the commissioned transfer
    /// path, the rest returns to the client. Terminal for the contract.
    pub async fn settle_contract(
        &self,
        contract_id: Uuid,
        professional_share_pct: BigDecimal,
    ) -> Result<SettlementOutcome, ServiceError> {
        if professional_share_pct < BigDecimal::from(0)
            || professional_share_pct > BigDecimal::from(100)
        {
            return Err(ServiceError::Validation(
                "Professional share must be a percentage within [0, 100]".to_string(),
            ));
        }

        let outcome = self
            .db_client
            .settle_contract(contract_id, professional_share_pct, self.hold)
            .await?;

        tracing::info!(
            "Contract {} settled: {} to professional, {} refunded to client, {} request(s) reversed",
            outcome.contract.contract_number,
            outcome.professional_share,
            outcome.refunded_to_client,
            outcome.reversed_requests.len()
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_settlement_rejects_out_of_range_share() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/craftlink")
            .unwrap();
        let service = DisputeService::new(Arc::new(DBClient::new(pool)), 3);

        let too_high = BigDecimal::from_str("100.01").unwrap();
        let result = service.settle_contract(Uuid::new_v4(), too_high).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));

        let negative = BigDecimal::from_str("-1").unwrap();
        let result = service.settle_contract(Uuid::new_v4(), negative).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
