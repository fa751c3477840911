// db/contractdb.rs
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use num_traits::Zero;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::db::DBClient;
use super::walletdb::{lock_wallet_for_user, record_wallet_mutation};
use crate::{
    models::contractmodels::*,
    models::walletmodels::*,
    service::error::ServiceError,
    utils::money::{is_positive_amount, percentage_of, split_commission},
};

const CONTRACT_COLUMNS: &str = r#"
    id,
    contract_number,
    client_id,
    professional_id,
    total_amount,
    contract_balance,
    professional_balance,
    professional_balance_release_date,
    paid_amount,
    platform_commission_rate,
    status,
    completion_percentage,
    created_at,
    updated_at
"#;

const PAYMENT_REQUEST_COLUMNS: &str = r#"
    id,
    contract_id,
    kind,
    amount,
    platform_commission_rate,
    platform_commission_amount,
    net_amount_to_professional,
    status,
    description,
    requested_by,
    approved_by,
    created_at,
    approved_at,
    transferred_at,
    available_at,
    completed_at,
    cancelled_at,
    cancellation_reason
"#;

#[derive(Debug, Clone, serde::Serialize)]
pub struct TransferOutcome {
    pub gross_amount: BigDecimal,
    pub commission_amount: BigDecimal,
    pub net_amount: BigDecimal,
    pub release_date: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize)]
pub struct ContractBalanceInfo {
    pub contract_balance: BigDecimal,
    pub available_contract_balance: BigDecimal,
    pub paid_amount: BigDecimal,
    pub client_pending_balance: BigDecimal,
    pub professional_available_balance: BigDecimal,
    pub professional_pending_balance: BigDecimal,
}

#[derive(Debug, serde::Serialize)]
pub struct ContractCompletion {
    pub contract: Contract,
    pub remaining_balance: BigDecimal,
    pub transfer: Option<TransferOutcome>,
}

#[derive(Debug, serde::Serialize)]
pub struct SettlementOutcome {
    pub contract: Contract,
    pub professional_share: BigDecimal,
    pub refunded_to_client: BigDecimal,
    pub reversed_requests: Vec<Uuid>,
    pub cancelled_requests: Vec<Uuid>,
}

/// Lock the contract row for the enclosing transaction. Every money-moving
/// operation acquires this lock first, wallets after (client before
/// professional), so concurrent operations on one contract serialize.
pub(crate) async fn lock_contract(
    tx: &mut Transaction<'_, Postgres>,
    contract_id: Uuid,
) -> Result<Contract, ServiceError> {
    sqlx::query_as::<_, Contract>(&format!(
        "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = $1 FOR UPDATE"
    ))
    .bind(contract_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(ServiceError::ContractNotFound(contract_id))
}

async fn lock_payment_request(
    tx: &mut Transaction<'_, Postgres>,
    request_id: Uuid,
) -> Result<PaymentRequest, ServiceError> {
    sqlx::query_as::<_, PaymentRequest>(&format!(
        "SELECT {PAYMENT_REQUEST_COLUMNS} FROM payment_requests WHERE id = $1 FOR UPDATE"
    ))
    .bind(request_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(ServiceError::PaymentRequestNotFound(request_id))
}

/// Sum of requests still holding a claim on the escrow (pending or
/// approved), optionally excluding the request currently being acted on.
async fn committed_amount(
    tx: &mut Transaction<'_, Postgres>,
    contract_id: Uuid,
    excluding: Option<Uuid>,
) -> Result<BigDecimal, ServiceError> {
    let total: Option<BigDecimal> = sqlx::query_scalar(
        r#"
        SELECT SUM(amount)
        FROM payment_requests
        WHERE contract_id = $1
          AND status IN ('pending'::payment_request_status, 'approved'::payment_request_status)
          AND ($2::uuid IS NULL OR id <> $2)
        "#,
    )
    .bind(contract_id)
    .bind(excluding)
    .fetch_one(&mut **tx)
    .await?;

    Ok(total.unwrap_or_else(BigDecimal::zero))
}

/// The only authorized path that moves escrowed funds to the professional.
/// Caller holds the contract lock and has already split the commission.
/// Moves the gross out of the client's pending bucket, credits the net to
/// the professional's pending bucket, and advances the hold release date.
async fn transfer_to_professional_locked(
    tx: &mut Transaction<'_, Postgres>,
    contract: &Contract,
    gross: &BigDecimal,
    commission: &BigDecimal,
    net: &BigDecimal,
    source: LedgerSource,
    payment_id: Option<Uuid>,
    hold: Duration,
) -> Result<(Contract, TransferOutcome), ServiceError> {
    let client_wallet = lock_wallet_for_user(tx, contract.client_id).await?;
    record_wallet_mutation(
        tx,
        &client_wallet,
        gross,
        EntryDirection::Debit,
        source,
        &format!(
            "Payment to professional for contract {}",
            contract.contract_number
        ),
        Some(contract.id),
        payment_id,
    )
    .await?;

    let professional_wallet = lock_wallet_for_user(tx, contract.professional_id).await?;
    record_wallet_mutation(
        tx,
        &professional_wallet,
        net,
        EntryDirection::Credit,
        source,
        &format!(
            "Payment from contract {} (held until release)",
            contract.contract_number
        ),
        Some(contract.id),
        payment_id,
    )
    .await?;

    let release_date = Utc::now() + hold;
    let contract = sqlx::query_as::<_, Contract>(&format!(
        r#"
        UPDATE contracts
        SET contract_balance = contract_balance - $2,
            paid_amount = paid_amount + $2,
            professional_balance = professional_balance + $3,
            professional_balance_release_date = $4,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {CONTRACT_COLUMNS}
        "#
    ))
    .bind(contract.id)
    .bind(gross)
    .bind(net)
    .bind(release_date)
    .fetch_one(&mut **tx)
    .await?;

    Ok((
        contract,
        TransferOutcome {
            gross_amount: gross.clone(),
            commission_amount: commission.clone(),
            net_amount: net.clone(),
            release_date,
        },
    ))
}

/// Return escrowed funds to the client's available bucket (the reverse of
/// an allocation). Used for installment cancellation and settlement.
async fn deallocate_locked(
    tx: &mut Transaction<'_, Postgres>,
    contract: &Contract,
    amount: &BigDecimal,
    description: &str,
) -> Result<Contract, ServiceError> {
    let client_wallet = lock_wallet_for_user(tx, contract.client_id).await?;
    record_wallet_mutation(
        tx,
        &client_wallet,
        amount,
        EntryDirection::Credit,
        LedgerSource::ContractAllocation,
        description,
        Some(contract.id),
        None,
    )
    .await?;

    let contract = sqlx::query_as::<_, Contract>(&format!(
        r#"
        UPDATE contracts
        SET contract_balance = contract_balance - $2,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {CONTRACT_COLUMNS}
        "#
    ))
    .bind(contract.id)
    .bind(amount)
    .fetch_one(&mut **tx)
    .await?;

    Ok(contract)
}

/// Reverse a transferred request: gross back into escrow and the client's
/// pending bucket, net out of the professional's pending bucket. Fails
/// with `IrreversibleTransfer` (zero effect) when the professional's
/// pending balance no longer covers the net.
async fn reverse_transfer_locked(
    tx: &mut Transaction<'_, Postgres>,
    contract: &Contract,
    request: &PaymentRequest,
) -> Result<Contract, ServiceError> {
    let client_wallet = lock_wallet_for_user(tx, contract.client_id).await?;
    let professional_wallet = lock_wallet_for_user(tx, contract.professional_id).await?;

    if professional_wallet.pending_balance < request.net_amount_to_professional {
        return Err(ServiceError::IrreversibleTransfer(format!(
            "Net amount {} already promoted past the professional's pending balance",
            request.net_amount_to_professional
        )));
    }

    record_wallet_mutation(
        tx,
        &client_wallet,
        &request.amount,
        EntryDirection::Credit,
        LedgerSource::Refund,
        &format!(
            "Refund of cancelled payment on contract {}",
            contract.contract_number
        ),
        Some(contract.id),
        Some(request.id),
    )
    .await?;

    record_wallet_mutation(
        tx,
        &professional_wallet,
        &request.net_amount_to_professional,
        EntryDirection::Debit,
        LedgerSource::Refund,
        &format!(
            "Reversal of cancelled payment on contract {}",
            contract.contract_number
        ),
        Some(contract.id),
        Some(request.id),
    )
    .await?;

    let contract = sqlx::query_as::<_, Contract>(&format!(
        r#"
        UPDATE contracts
        SET contract_balance = contract_balance + $2,
            paid_amount = paid_amount - $2,
            professional_balance = professional_balance - $3,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {CONTRACT_COLUMNS}
        "#
    ))
    .bind(contract.id)
    .bind(&request.amount)
    .bind(&request.net_amount_to_professional)
    .fetch_one(&mut **tx)
    .await?;

    Ok(contract)
}

async fn mark_request_cancelled(
    tx: &mut Transaction<'_, Postgres>,
    request_id: Uuid,
    reason: &str,
) -> Result<PaymentRequest, ServiceError> {
    let request = sqlx::query_as::<_, PaymentRequest>(&format!(
        r#"
        UPDATE payment_requests
        SET status = 'cancelled'::payment_request_status,
            cancelled_at = NOW(),
            cancellation_reason = $2
        WHERE id = $1
        RETURNING {PAYMENT_REQUEST_COLUMNS}
        "#
    ))
    .bind(request_id)
    .bind(reason)
    .fetch_one(&mut **tx)
    .await?;

    Ok(request)
}

#[async_trait]
pub trait ContractExt {
    async fn create_contract(
        &self,
        client_id: Uuid,
        professional_id: Uuid,
        total_amount: BigDecimal,
        platform_commission_rate: BigDecimal,
    ) -> Result<Contract, ServiceError>;

    async fn get_contract(&self, contract_id: Uuid) -> Result<Option<Contract>, ServiceError>;

    async fn activate_contract(&self, contract_id: Uuid) -> Result<Contract, ServiceError>;

    /// Move funds from the client's available balance into this contract's
    /// escrow. Wallet move and contract increment commit together.
    async fn allocate_contract_funds(
        &self,
        contract_id: Uuid,
        amount: BigDecimal,
    ) -> Result<Contract, ServiceError>;

    async fn contract_balance_info(
        &self,
        contract_id: Uuid,
    ) -> Result<ContractBalanceInfo, ServiceError>;

    async fn create_payment_request(
        &self,
        contract_id: Uuid,
        kind: PaymentRequestKind,
        amount: BigDecimal,
        requested_by: Uuid,
        description: String,
    ) -> Result<PaymentRequest, ServiceError>;

    /// Approve and transfer in one transaction. The sufficiency check runs
    /// again under the contract lock because the escrow may have shrunk
    /// since the request was created.
    async fn approve_payment_request(
        &self,
        request_id: Uuid,
        approver_id: Uuid,
        hold: Duration,
    ) -> Result<(PaymentRequest, TransferOutcome), ServiceError>;

    async fn cancel_payment_request(
        &self,
        request_id: Uuid,
        reason: String,
    ) -> Result<PaymentRequest, ServiceError>;

    /// Scheduler entry point: promote a matured transferred request.
    /// Returns Ok(None) when the request is already completed or currently
    /// held by another worker (both are benign no-ops).
    async fn complete_payment_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<PaymentRequest>, ServiceError>;

    /// Contract-level release of held professional funds once the hold has
    /// elapsed. Idempotent: Ok(None) when there is nothing to release.
    async fn release_professional_balance(
        &self,
        contract_id: Uuid,
    ) -> Result<Option<BigDecimal>, ServiceError>;

    async fn complete_contract(
        &self,
        contract_id: Uuid,
        hold: Duration,
    ) -> Result<ContractCompletion, ServiceError>;

    async fn mark_contract_disputed(&self, contract_id: Uuid) -> Result<Contract, ServiceError>;

    async fn unfreeze_contract(&self, contract_id: Uuid) -> Result<Contract, ServiceError>;

    /// Terminal dispute settlement: reverse frozen transfers, cancel open
    /// requests, then split the remaining escrow between the professional
    /// (through the commissioned transfer path) and the client.
    async fn settle_contract(
        &self,
        contract_id: Uuid,
        professional_share_pct: BigDecimal,
        hold: Duration,
    ) -> Result<SettlementOutcome, ServiceError>;

    async fn get_payment_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<PaymentRequest>, ServiceError>;

    async fn payment_requests_for_contract(
        &self,
        contract_id: Uuid,
    ) -> Result<Vec<PaymentRequest>, ServiceError>;

    /// Requests whose funds are still pending for the professional
    /// (awaiting approval, transfer, or the hold).
    async fn pending_requests_for_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<PaymentRequest>, ServiceError>;

    /// Requests whose funds have been promoted to the professional's
    /// available balance.
    async fn completed_requests_for_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<PaymentRequest>, ServiceError>;

    async fn due_payment_request_ids(&self, limit: i64) -> Result<Vec<Uuid>, ServiceError>;

    async fn due_contract_release_ids(&self, limit: i64) -> Result<Vec<Uuid>, ServiceError>;
}

#[async_trait]
impl ContractExt for DBClient {
    async fn create_contract(
        &self,
        client_id: Uuid,
        professional_id: Uuid,
        total_amount: BigDecimal,
        platform_commission_rate: BigDecimal,
    ) -> Result<Contract, ServiceError> {
        if client_id == professional_id {
            return Err(ServiceError::Validation(
                "Client and professional must be different users".to_string(),
            ));
        }

        let contract = sqlx::query_as::<_, Contract>(&format!(
            r#"
            INSERT INTO contracts
            (contract_number, client_id, professional_id, total_amount, platform_commission_rate)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CONTRACT_COLUMNS}
            "#
        ))
        .bind(generate_contract_number())
        .bind(client_id)
        .bind(professional_id)
        .bind(total_amount)
        .bind(platform_commission_rate)
        .fetch_one(&self.pool)
        .await?;

        Ok(contract)
    }

    async fn get_contract(&self, contract_id: Uuid) -> Result<Option<Contract>, ServiceError> {
        let contract = sqlx::query_as::<_, Contract>(&format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = $1"
        ))
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contract)
    }

    async fn activate_contract(&self, contract_id: Uuid) -> Result<Contract, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let contract = lock_contract(&mut tx, contract_id).await?;
        if !matches!(
            contract.status,
            ContractStatus::Draft | ContractStatus::Pending
        ) {
            return Err(ServiceError::InvalidContractStatus(
                contract.id,
                contract.status,
            ));
        }

        let contract = sqlx::query_as::<_, Contract>(&format!(
            r#"
            UPDATE contracts
            SET status = 'active'::contract_status, updated_at = NOW()
            WHERE id = $1
            RETURNING {CONTRACT_COLUMNS}
            "#
        ))
        .bind(contract_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(contract)
    }

    async fn allocate_contract_funds(
        &self,
        contract_id: Uuid,
        amount: BigDecimal,
    ) -> Result<Contract, ServiceError> {
        if !is_positive_amount(&amount) {
            return Err(ServiceError::Validation(
                "Allocation amount must be positive".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let contract = lock_contract(&mut tx, contract_id).await?;
        let client_wallet = lock_wallet_for_user(&mut tx, contract.client_id).await?;

        record_wallet_mutation(
            &mut tx,
            &client_wallet,
            &amount,
            EntryDirection::Debit,
            LedgerSource::ContractAllocation,
            &format!("Funds allocated to contract {}", contract.contract_number),
            Some(contract.id),
            None,
        )
        .await?;

        let contract = sqlx::query_as::<_, Contract>(&format!(
            r#"
            UPDATE contracts
            SET contract_balance = contract_balance + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {CONTRACT_COLUMNS}
            "#
        ))
        .bind(contract_id)
        .bind(&amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(contract)
    }

    async fn contract_balance_info(
        &self,
        contract_id: Uuid,
    ) -> Result<ContractBalanceInfo, ServiceError> {
        let contract = self
            .get_contract(contract_id)
            .await?
            .ok_or(ServiceError::ContractNotFound(contract_id))?;

        let committed: Option<BigDecimal> = sqlx::query_scalar(
            r#"
            SELECT SUM(amount)
            FROM payment_requests
            WHERE contract_id = $1
              AND status IN ('pending'::payment_request_status, 'approved'::payment_request_status)
            "#,
        )
        .bind(contract_id)
        .fetch_one(&self.pool)
        .await?;
        let committed = committed.unwrap_or_else(BigDecimal::zero);

        let client_wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {} FROM wallets WHERE user_id = $1",
            super::walletdb::WALLET_COLUMNS
        ))
        .bind(contract.client_id)
        .fetch_optional(&self.pool)
        .await?;

        let professional_wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {} FROM wallets WHERE user_id = $1",
            super::walletdb::WALLET_COLUMNS
        ))
        .bind(contract.professional_id)
        .fetch_optional(&self.pool)
        .await?;

        let zero = BigDecimal::zero();
        Ok(ContractBalanceInfo {
            available_contract_balance: contract.contract_balance.clone() - committed,
            contract_balance: contract.contract_balance,
            paid_amount: contract.paid_amount,
            client_pending_balance: client_wallet
                .map(|w| w.pending_balance)
                .unwrap_or_else(|| zero.clone()),
            professional_available_balance: professional_wallet
                .as_ref()
                .map(|w| w.available_balance.clone())
                .unwrap_or_else(|| zero.clone()),
            professional_pending_balance: professional_wallet
                .map(|w| w.pending_balance)
                .unwrap_or(zero),
        })
    }

    async fn create_payment_request(
        &self,
        contract_id: Uuid,
        kind: PaymentRequestKind,
        amount: BigDecimal,
        requested_by: Uuid,
        description: String,
    ) -> Result<PaymentRequest, ServiceError> {
        if !is_positive_amount(&amount) {
            return Err(ServiceError::Validation(
                "Payment amount must be positive".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let mut contract = lock_contract(&mut tx, contract_id).await?;

        if kind == PaymentRequestKind::Installment {
            // Client-initiated pre-payment: the installment brings its own
            // funds into escrow when it is created.
            let client_wallet = lock_wallet_for_user(&mut tx, contract.client_id).await?;
            record_wallet_mutation(
                &mut tx,
                &client_wallet,
                &amount,
                EntryDirection::Debit,
                LedgerSource::ContractAllocation,
                &format!(
                    "Installment funds allocated to contract {}",
                    contract.contract_number
                ),
                Some(contract.id),
                None,
            )
            .await?;

            contract = sqlx::query_as::<_, Contract>(&format!(
                r#"
                UPDATE contracts
                SET contract_balance = contract_balance + $2, updated_at = NOW()
                WHERE id = $1
                RETURNING {CONTRACT_COLUMNS}
                "#
            ))
            .bind(contract_id)
            .bind(&amount)
            .fetch_one(&mut *tx)
            .await?;
        } else {
            let committed = committed_amount(&mut tx, contract_id, None).await?;
            let available = contract.contract_balance.clone() - committed;
            if available < amount {
                return Err(ServiceError::InsufficientFunds {
                    required: amount,
                    available,
                });
            }
        }

        let (commission, net) = split_commission(&amount, &contract.platform_commission_rate);

        let request = sqlx::query_as::<_, PaymentRequest>(&format!(
            r#"
            INSERT INTO payment_requests
            (contract_id, kind, amount, platform_commission_rate,
             platform_commission_amount, net_amount_to_professional,
             description, requested_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PAYMENT_REQUEST_COLUMNS}
            "#
        ))
        .bind(contract_id)
        .bind(kind)
        .bind(&amount)
        .bind(&contract.platform_commission_rate)
        .bind(&commission)
        .bind(&net)
        .bind(description)
        .bind(requested_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(request)
    }

    async fn approve_payment_request(
        &self,
        request_id: Uuid,
        approver_id: Uuid,
        hold: Duration,
    ) -> Result<(PaymentRequest, TransferOutcome), ServiceError> {
        let mut tx = self.pool.begin().await?;

        // Read without a lock to learn the contract, then lock in the
        // fixed order: contract row first, request row second.
        let unlocked = sqlx::query_as::<_, PaymentRequest>(&format!(
            "SELECT {PAYMENT_REQUEST_COLUMNS} FROM payment_requests WHERE id = $1"
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::PaymentRequestNotFound(request_id))?;

        let contract = lock_contract(&mut tx, unlocked.contract_id).await?;
        let request = lock_payment_request(&mut tx, request_id).await?;

        if request.status != PaymentRequestStatus::Pending {
            return Err(ServiceError::InvalidPaymentStatus(
                request.id,
                request.status,
            ));
        }

        // Mandatory re-check: other approvals may have drained the escrow
        // since this request was created.
        let committed = committed_amount(&mut tx, contract.id, Some(request.id)).await?;
        let available = contract.contract_balance.clone() - committed;
        if available < request.amount {
            return Err(ServiceError::InsufficientFunds {
                required: request.amount.clone(),
                available,
            });
        }

        let (contract_after, outcome) = transfer_to_professional_locked(
            &mut tx,
            &contract,
            &request.amount,
            &request.platform_commission_amount,
            &request.net_amount_to_professional,
            request.kind.ledger_source(),
            Some(request.id),
            hold,
        )
        .await?;

        let request = sqlx::query_as::<_, PaymentRequest>(&format!(
            r#"
            UPDATE payment_requests
            SET status = 'transferred'::payment_request_status,
                approved_by = $2,
                approved_at = NOW(),
                transferred_at = NOW(),
                available_at = $3
            WHERE id = $1
            RETURNING {PAYMENT_REQUEST_COLUMNS}
            "#
        ))
        .bind(request.id)
        .bind(approver_id)
        .bind(outcome.release_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Payment request {} transferred on contract {}: gross {}, net {}",
            request.id,
            contract_after.contract_number,
            outcome.gross_amount,
            outcome.net_amount
        );

        Ok((request, outcome))
    }

    async fn cancel_payment_request(
        &self,
        request_id: Uuid,
        reason: String,
    ) -> Result<PaymentRequest, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let unlocked = sqlx::query_as::<_, PaymentRequest>(&format!(
            "SELECT {PAYMENT_REQUEST_COLUMNS} FROM payment_requests WHERE id = $1"
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::PaymentRequestNotFound(request_id))?;

        let contract = lock_contract(&mut tx, unlocked.contract_id).await?;
        let request = lock_payment_request(&mut tx, request_id).await?;

        if !request.can_transition_to(PaymentRequestStatus::Cancelled) {
            return Err(ServiceError::InvalidPaymentStatus(
                request.id,
                request.status,
            ));
        }

        match request.status {
            PaymentRequestStatus::Pending | PaymentRequestStatus::Approved => {
                if request.kind == PaymentRequestKind::Installment {
                    // The installment allocated its own funds at creation;
                    // cancelling hands them back to the client.
                    deallocate_locked(
                        &mut tx,
                        &contract,
                        &request.amount,
                        &format!(
                            "Refund for cancelled installment on contract {}",
                            contract.contract_number
                        ),
                    )
                    .await?;
                }
            }
            PaymentRequestStatus::Transferred => {
                reverse_transfer_locked(&mut tx, &contract, &request).await?;
            }
            _ => {
                return Err(ServiceError::InvalidPaymentStatus(
                    request.id,
                    request.status,
                ));
            }
        }

        let request = mark_request_cancelled(&mut tx, request.id, &reason).await?;

        tx.commit().await?;
        Ok(request)
    }

    async fn complete_payment_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<PaymentRequest>, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let unlocked = sqlx::query_as::<_, PaymentRequest>(&format!(
            "SELECT {PAYMENT_REQUEST_COLUMNS} FROM payment_requests WHERE id = $1"
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::PaymentRequestNotFound(request_id))?;

        if unlocked.status == PaymentRequestStatus::Completed {
            return Ok(None);
        }

        // Fixed lock order (contract first, request second); SKIP LOCKED
        // keeps concurrent sweep workers from queueing on one another —
        // whoever loses the race simply sees a no-op.
        let contract = lock_contract(&mut tx, unlocked.contract_id).await?;
        let request = sqlx::query_as::<_, PaymentRequest>(&format!(
            "SELECT {PAYMENT_REQUEST_COLUMNS} FROM payment_requests WHERE id = $1 FOR UPDATE SKIP LOCKED"
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;

        let request = match request {
            Some(request) => request,
            None => return Ok(None),
        };

        if request.status == PaymentRequestStatus::Completed {
            return Ok(None);
        }
        if !request.can_transition_to(PaymentRequestStatus::Completed) {
            return Err(ServiceError::InvalidPaymentStatus(
                request.id,
                request.status,
            ));
        }
        if !request.is_available_to_professional(Utc::now()) {
            return Err(ServiceError::InvalidState(
                "Hold period has not elapsed".to_string(),
            ));
        }

        let professional_wallet = lock_wallet_for_user(&mut tx, contract.professional_id).await?;
        record_wallet_mutation(
            &mut tx,
            &professional_wallet,
            &request.net_amount_to_professional,
            EntryDirection::Credit,
            LedgerSource::BalanceRelease,
            &format!(
                "Payment available from contract {}",
                contract.contract_number
            ),
            Some(contract.id),
            Some(request.id),
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE contracts
            SET professional_balance = professional_balance - $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(contract.id)
        .bind(&request.net_amount_to_professional)
        .execute(&mut *tx)
        .await?;

        let request = sqlx::query_as::<_, PaymentRequest>(&format!(
            r#"
            UPDATE payment_requests
            SET status = 'completed'::payment_request_status, completed_at = NOW()
            WHERE id = $1
            RETURNING {PAYMENT_REQUEST_COLUMNS}
            "#
        ))
        .bind(request.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(request))
    }

    async fn release_professional_balance(
        &self,
        contract_id: Uuid,
    ) -> Result<Option<BigDecimal>, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let contract = lock_contract(&mut tx, contract_id).await?;

        if contract.professional_balance <= BigDecimal::zero() {
            return Ok(None);
        }
        if !contract.is_professional_balance_available(Utc::now()) {
            return Err(ServiceError::InvalidState(
                "Professional balance is not yet available for release".to_string(),
            ));
        }

        let professional_wallet = lock_wallet_for_user(&mut tx, contract.professional_id).await?;
        record_wallet_mutation(
            &mut tx,
            &professional_wallet,
            &contract.professional_balance,
            EntryDirection::Credit,
            LedgerSource::BalanceRelease,
            &format!("Balance release from contract {}", contract.contract_number),
            Some(contract.id),
            None,
        )
        .await?;

        // The released total includes the nets of any transferred requests
        // on this contract; mark them completed so the per-request sweep
        // does not promote the same funds twice.
        sqlx::query(
            r#"
            UPDATE payment_requests
            SET status = 'completed'::payment_request_status, completed_at = NOW()
            WHERE contract_id = $1 AND status = 'transferred'::payment_request_status
            "#,
        )
        .bind(contract.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE contracts
            SET professional_balance = 0,
                professional_balance_release_date = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(contract.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(contract.professional_balance))
    }

    async fn complete_contract(
        &self,
        contract_id: Uuid,
        hold: Duration,
    ) -> Result<ContractCompletion, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let contract = lock_contract(&mut tx, contract_id).await?;
        if contract.status != ContractStatus::Active {
            return Err(ServiceError::InvalidContractStatus(
                contract.id,
                contract.status,
            ));
        }

        let committed = committed_amount(&mut tx, contract.id, None).await?;
        let remaining = contract.contract_balance.clone() - committed;

        let mut transfer = None;
        let mut contract_after = contract.clone();
        if remaining > BigDecimal::zero() {
            let (commission, net) =
                split_commission(&remaining, &contract.platform_commission_rate);
            let (updated, outcome) = transfer_to_professional_locked(
                &mut tx,
                &contract,
                &remaining,
                &commission,
                &net,
                LedgerSource::ContractPayment,
                None,
                hold,
            )
            .await?;
            contract_after = updated;
            transfer = Some(outcome);
        }

        let contract_after = sqlx::query_as::<_, Contract>(&format!(
            r#"
            UPDATE contracts
            SET status = 'completed'::contract_status,
                completion_percentage = 100,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CONTRACT_COLUMNS}
            "#
        ))
        .bind(contract_after.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ContractCompletion {
            contract: contract_after,
            remaining_balance: remaining,
            transfer,
        })
    }

    async fn mark_contract_disputed(&self, contract_id: Uuid) -> Result<Contract, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let contract = lock_contract(&mut tx, contract_id).await?;
        if contract.status != ContractStatus::Active {
            return Err(ServiceError::InvalidContractStatus(
                contract.id,
                contract.status,
            ));
        }

        // Freezing pauses promotion of in-flight transfers so a later
        // settlement can still reverse them.
        sqlx::query(
            r#"
            UPDATE payment_requests
            SET status = 'disputed'::payment_request_status
            WHERE contract_id = $1 AND status = 'transferred'::payment_request_status
            "#,
        )
        .bind(contract.id)
        .execute(&mut *tx)
        .await?;

        let contract = sqlx::query_as::<_, Contract>(&format!(
            r#"
            UPDATE contracts
            SET status = 'disputed'::contract_status, updated_at = NOW()
            WHERE id = $1
            RETURNING {CONTRACT_COLUMNS}
            "#
        ))
        .bind(contract_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(contract)
    }

    async fn unfreeze_contract(&self, contract_id: Uuid) -> Result<Contract, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let contract = lock_contract(&mut tx, contract_id).await?;
        if contract.status != ContractStatus::Disputed {
            return Err(ServiceError::InvalidContractStatus(
                contract.id,
                contract.status,
            ));
        }

        sqlx::query(
            r#"
            UPDATE payment_requests
            SET status = 'transferred'::payment_request_status
            WHERE contract_id = $1 AND status = 'disputed'::payment_request_status
            "#,
        )
        .bind(contract.id)
        .execute(&mut *tx)
        .await?;

        let contract = sqlx::query_as::<_, Contract>(&format!(
            r#"
            UPDATE contracts
            SET status = 'active'::contract_status, updated_at = NOW()
            WHERE id = $1
            RETURNING {CONTRACT_COLUMNS}
            "#
        ))
        .bind(contract_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(contract)
    }

    async fn settle_contract(
        &self,
        contract_id: Uuid,
        professional_share_pct: BigDecimal,
        hold: Duration,
    ) -> Result<SettlementOutcome, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let mut contract = lock_contract(&mut tx, contract_id).await?;
        if contract.status != ContractStatus::Disputed {
            return Err(ServiceError::InvalidContractStatus(
                contract.id,
                contract.status,
            ));
        }

        // Reverse frozen transfers first so the whole escrow is back in
        // one place before it is split. Freezing paused their promotion,
        // so the professional's pending balance still covers the nets.
        let frozen = sqlx::query_as::<_, PaymentRequest>(&format!(
            r#"
            SELECT {PAYMENT_REQUEST_COLUMNS}
            FROM payment_requests
            WHERE contract_id = $1 AND status = 'disputed'::payment_request_status
            FOR UPDATE
            "#
        ))
        .bind(contract.id)
        .fetch_all(&mut *tx)
        .await?;

        let mut reversed_requests = Vec::new();
        for request in &frozen {
            contract = reverse_transfer_locked(&mut tx, &contract, request).await?;
            mark_request_cancelled(&mut tx, request.id, "Dispute settlement").await?;
            reversed_requests.push(request.id);
        }

        let open = sqlx::query_as::<_, PaymentRequest>(&format!(
            r#"
            SELECT {PAYMENT_REQUEST_COLUMNS}
            FROM payment_requests
            WHERE contract_id = $1
              AND status IN ('pending'::payment_request_status, 'approved'::payment_request_status)
            FOR UPDATE
            "#
        ))
        .bind(contract.id)
        .fetch_all(&mut *tx)
        .await?;

        let mut cancelled_requests = Vec::new();
        for request in &open {
            if request.kind == PaymentRequestKind::Installment {
                contract = deallocate_locked(
                    &mut tx,
                    &contract,
                    &request.amount,
                    &format!(
                        "Refund for cancelled installment on contract {}",
                        contract.contract_number
                    ),
                )
                .await?;
            }
            mark_request_cancelled(&mut tx, request.id, "Dispute settlement").await?;
            cancelled_requests.push(request.id);
        }

        let professional_share = percentage_of(&contract.contract_balance, &professional_share_pct);

        if professional_share > BigDecimal::zero() {
            let (commission, net) =
                split_commission(&professional_share, &contract.platform_commission_rate);
            let (updated, _) = transfer_to_professional_locked(
                &mut tx,
                &contract,
                &professional_share,
                &commission,
                &net,
                LedgerSource::ContractPayment,
                None,
                hold,
            )
            .await?;
            contract = updated;
        }

        let refunded_to_client = contract.contract_balance.clone();
        if refunded_to_client > BigDecimal::zero() {
            contract = deallocate_locked(
                &mut tx,
                &contract,
                &refunded_to_client,
                &format!(
                    "Dispute settlement refund on contract {}",
                    contract.contract_number
                ),
            )
            .await?;
        }

        let contract = sqlx::query_as::<_, Contract>(&format!(
            r#"
            UPDATE contracts
            SET status = 'terminated'::contract_status, updated_at = NOW()
            WHERE id = $1
            RETURNING {CONTRACT_COLUMNS}
            "#
        ))
        .bind(contract.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SettlementOutcome {
            contract,
            professional_share,
            refunded_to_client,
            reversed_requests,
            cancelled_requests,
        })
    }

    async fn get_payment_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<PaymentRequest>, ServiceError> {
        let request = sqlx::query_as::<_, PaymentRequest>(&format!(
            "SELECT {PAYMENT_REQUEST_COLUMNS} FROM payment_requests WHERE id = $1"
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn payment_requests_for_contract(
        &self,
        contract_id: Uuid,
    ) -> Result<Vec<PaymentRequest>, ServiceError> {
        let requests = sqlx::query_as::<_, PaymentRequest>(&format!(
            r#"
            SELECT {PAYMENT_REQUEST_COLUMNS}
            FROM payment_requests
            WHERE contract_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(contract_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn pending_requests_for_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<PaymentRequest>, ServiceError> {
        let requests = sqlx::query_as::<_, PaymentRequest>(&format!(
            r#"
            SELECT {PAYMENT_REQUEST_COLUMNS}
            FROM payment_requests pr
            WHERE pr.contract_id IN (SELECT id FROM contracts WHERE professional_id = $1)
              AND pr.status IN (
                  'pending'::payment_request_status,
                  'approved'::payment_request_status,
                  'transferred'::payment_request_status
              )
            ORDER BY pr.created_at DESC
            "#
        ))
        .bind(professional_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn completed_requests_for_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<PaymentRequest>, ServiceError> {
        let requests = sqlx::query_as::<_, PaymentRequest>(&format!(
            r#"
            SELECT {PAYMENT_REQUEST_COLUMNS}
            FROM payment_requests pr
            WHERE pr.contract_id IN (SELECT id FROM contracts WHERE professional_id = $1)
              AND pr.status = 'completed'::payment_request_status
            ORDER BY pr.completed_at DESC
            "#
        ))
        .bind(professional_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn due_payment_request_ids(&self, limit: i64) -> Result<Vec<Uuid>, ServiceError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM payment_requests
            WHERE status = 'transferred'::payment_request_status
              AND available_at <= NOW()
            ORDER BY available_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn due_contract_release_ids(&self, limit: i64) -> Result<Vec<Uuid>, ServiceError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM contracts
            WHERE professional_balance > 0
              AND professional_balance_release_date IS NOT NULL
              AND professional_balance_release_date <= NOW()
              AND status <> 'disputed'::contract_status
              AND NOT EXISTS (
                  SELECT 1 FROM payment_requests
                  WHERE contract_id = contracts.id
                    AND status = 'transferred'::payment_request_status
                    AND available_at > NOW()
              )
            ORDER BY professional_balance_release_date ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
