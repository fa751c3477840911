// service/wallet_service.rs
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::db::DBClient,
    db::walletdb::{WalletExt, WalletReconciliation},
    models::walletmodels::*,
    service::error::ServiceError,
    service::payment_gateway::PaymentGateway,
    utils::money::{is_positive_amount, round_money},
};

#[derive(Clone)]
pub struct WalletService {
    db_client: Arc<DBClient>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl WalletService {
    pub fn new(db_client: Arc<DBClient>, gateway: Arc<dyn PaymentGateway>, currency: String) -> Self {
        Self {
            db_client,
            gateway,
            currency,
        }
    }

    pub async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<Wallet, ServiceError> {
        self.db_client.get_or_create_wallet(user_id).await
    }

    /// Charge the external gateway, then credit the wallet's available
    /// bucket. The gateway reference is kept in the ledger description so
    /// a top-up can be traced back to its authorization.
    pub async fn top_up(
        &self,
        user_id: Uuid,
        amount: BigDecimal,
    ) -> Result<(Wallet, LedgerEntry), ServiceError> {
        if !is_positive_amount(&amount) {
            return Err(ServiceError::Validation(
                "Top-up amount must be positive".to_string(),
            ));
        }
        let amount = round_money(&amount);

        let reference = generate_payment_reference();
        let authorization = self
            .gateway
            .authorize(&amount, &self.currency, &reference)
            .await?;

        if !authorization.approved {
            return Err(ServiceError::Gateway(
                authorization
                    .failure_reason
                    .unwrap_or_else(|| "Authorization declined".to_string()),
            ));
        }

        tracing::info!(
            "Top-up authorized for user {}: {} {} (gateway ref {})",
            user_id,
            amount,
            self.currency,
            authorization.gateway_reference
        );

        self.db_client
            .credit_wallet(
                user_id,
                amount,
                LedgerSource::TopUp,
                format!("Wallet top-up (ref {})", authorization.gateway_reference),
            )
            .await
    }

    pub async fn withdraw(
        &self,
        user_id: Uuid,
        amount: BigDecimal,
    ) -> Result<(Wallet, LedgerEntry), ServiceError> {
        if !is_positive_amount(&amount) {
            return Err(ServiceError::Validation(
                "Withdrawal amount must be positive".to_string(),
            ));
        }

        self.db_client
            .debit_wallet(
                user_id,
                round_money(&amount),
                LedgerSource::Withdrawal,
                "Wallet withdrawal".to_string(),
            )
            .await
    }

    pub async fn transactions(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<LedgerEntry>, ServiceError> {
        let wallet = self
            .db_client
            .get_wallet(user_id)
            .await?
            .ok_or(ServiceError::WalletNotFound(user_id))?;

        self.db_client.entries_for_wallet(wallet.id, since).await
    }

    pub async fn reconcile(&self, user_id: Uuid) -> Result<WalletReconciliation, ServiceError> {
        let reconciliation = self.db_client.reconcile_wallet(user_id).await?;

        if !reconciliation.in_sync {
            tracing::error!(
                "Wallet {} drifted from its ledger: cached {}/{} vs replayed {}/{}",
                reconciliation.wallet.id,
                reconciliation.wallet.available_balance,
                reconciliation.wallet.pending_balance,
                reconciliation.replayed_available,
                reconciliation.replayed_pending
            );
        }

        Ok(reconciliation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::payment_gateway::MockGateway;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn test_wallet_service_construction() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/craftlink")
            .unwrap();
        let db_client = Arc::new(DBClient::new(pool));
        let gateway = Arc::new(MockGateway::approving());

        let _ = WalletService::new(db_client, gateway, "USD".to_string());
    }
}
