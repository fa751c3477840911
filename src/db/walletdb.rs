// db/walletdb.rs
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use num_traits::Zero;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::db::DBClient;
use crate::{
    models::walletmodels::*,
    service::error::ServiceError,
    utils::money::is_positive_amount,
};

pub(crate) const WALLET_COLUMNS: &str = r#"
    id,
    user_id,
    available_balance,
    pending_balance,
    total_earned,
    currency,
    created_at,
    updated_at
"#;

const LEDGER_COLUMNS: &str = r#"
    id,
    wallet_id,
    amount,
    direction,
    source,
    description,
    contract_id,
    payment_id,
    created_at
"#;

/// Lock a wallet row for the duration of the enclosing transaction,
/// creating it lazily on first financial contact. Lock order is always
/// contract row first, then wallets (client before professional) when an
/// operation touches both sides.
pub(crate) async fn lock_wallet_for_user(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<Wallet, ServiceError> {
    sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    let wallet = sqlx::query_as::<_, Wallet>(&format!(
        "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1 FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(ServiceError::WalletNotFound(user_id))?;

    Ok(wallet)
}

/// Apply bucket deltas to a locked wallet row. Callers are responsible for
/// the sufficiency check; the database CHECK constraints are the last line
/// of defence against a negative balance.
pub(crate) async fn apply_wallet_delta(
    tx: &mut Transaction<'_, Postgres>,
    wallet_id: Uuid,
    available_delta: &BigDecimal,
    pending_delta: &BigDecimal,
    earned_delta: &BigDecimal,
) -> Result<Wallet, ServiceError> {
    let wallet = sqlx::query_as::<_, Wallet>(&format!(
        r#"
        UPDATE wallets
        SET available_balance = available_balance + $2,
            pending_balance = pending_balance + $3,
            total_earned = total_earned + $4,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {WALLET_COLUMNS}
        "#
    ))
    .bind(wallet_id)
    .bind(available_delta)
    .bind(pending_delta)
    .bind(earned_delta)
    .fetch_one(&mut **tx)
    .await?;

    Ok(wallet)
}

/// Append the single ledger entry documenting a wallet mutation. Invoked
/// only from within the mutation's own transaction, never independently.
pub(crate) async fn append_ledger_entry(
    tx: &mut Transaction<'_, Postgres>,
    wallet_id: Uuid,
    amount: &BigDecimal,
    direction: EntryDirection,
    source: LedgerSource,
    description: &str,
    contract_id: Option<Uuid>,
    payment_id: Option<Uuid>,
) -> Result<LedgerEntry, ServiceError> {
    let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
        r#"
        INSERT INTO ledger_entries
        (wallet_id, amount, direction, source, description, contract_id, payment_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {LEDGER_COLUMNS}
        "#
    ))
    .bind(wallet_id)
    .bind(amount)
    .bind(direction)
    .bind(source)
    .bind(description)
    .bind(contract_id)
    .bind(payment_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(entry)
}

/// Mutate a locked wallet and write its matching ledger entry as one unit.
/// Every money movement in the engine funnels through here.
pub(crate) async fn record_wallet_mutation(
    tx: &mut Transaction<'_, Postgres>,
    wallet: &Wallet,
    amount: &BigDecimal,
    direction: EntryDirection,
    source: LedgerSource,
    description: &str,
    contract_id: Option<Uuid>,
    payment_id: Option<Uuid>,
) -> Result<(Wallet, LedgerEntry), ServiceError> {
    let entry = LedgerEntry {
        id: Uuid::nil(),
        wallet_id: wallet.id,
        amount: amount.clone(),
        direction,
        source,
        description: description.to_string(),
        contract_id,
        payment_id,
        created_at: None,
    };
    let effect = entry.balance_effect();

    if wallet.available_balance.clone() + &effect.available < BigDecimal::zero() {
        return Err(ServiceError::InsufficientFunds {
            required: -effect.available,
            available: wallet.available_balance.clone(),
        });
    }
    if wallet.pending_balance.clone() + &effect.pending < BigDecimal::zero() {
        return Err(ServiceError::InsufficientFunds {
            required: -effect.pending,
            available: wallet.pending_balance.clone(),
        });
    }

    let updated = apply_wallet_delta(
        tx,
        wallet.id,
        &effect.available,
        &effect.pending,
        &effect.earned,
    )
    .await?;

    let entry = append_ledger_entry(
        tx,
        wallet.id,
        amount,
        direction,
        source,
        description,
        contract_id,
        payment_id,
    )
    .await?;

    Ok((updated, entry))
}

#[derive(Debug, serde::Serialize)]
pub struct WalletReconciliation {
    pub wallet: Wallet,
    pub replayed_available: BigDecimal,
    pub replayed_pending: BigDecimal,
    pub replayed_earned: BigDecimal,
    pub in_sync: bool,
}

#[async_trait]
pub trait WalletExt {
    async fn get_wallet(&self, user_id: Uuid) -> Result<Option<Wallet>, ServiceError>;

    async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<Wallet, ServiceError>;

    /// Credit the available bucket (top-ups and other external credits).
    async fn credit_wallet(
        &self,
        user_id: Uuid,
        amount: BigDecimal,
        source: LedgerSource,
        description: String,
    ) -> Result<(Wallet, LedgerEntry), ServiceError>;

    /// Debit the available bucket (withdrawals). Fails with
    /// `InsufficientFunds` and zero effect when the balance cannot cover.
    async fn debit_wallet(
        &self,
        user_id: Uuid,
        amount: BigDecimal,
        source: LedgerSource,
        description: String,
    ) -> Result<(Wallet, LedgerEntry), ServiceError>;

    async fn entries_for_wallet(
        &self,
        wallet_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<LedgerEntry>, ServiceError>;

    /// Replay the full log for a wallet and compare against the cached
    /// projection. Used by tests and operational audits to detect drift.
    async fn reconcile_wallet(&self, user_id: Uuid) -> Result<WalletReconciliation, ServiceError>;
}

#[async_trait]
impl WalletExt for DBClient {
    async fn get_wallet(&self, user_id: Uuid) -> Result<Option<Wallet>, ServiceError> {
        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<Wallet, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let wallet = lock_wallet_for_user(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    async fn credit_wallet(
        &self,
        user_id: Uuid,
        amount: BigDecimal,
        source: LedgerSource,
        description: String,
    ) -> Result<(Wallet, LedgerEntry), ServiceError> {
        if !is_positive_amount(&amount) {
            return Err(ServiceError::Validation(
                "Credit amount must be positive".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let wallet = lock_wallet_for_user(&mut tx, user_id).await?;
        let result = record_wallet_mutation(
            &mut tx,
            &wallet,
            &amount,
            EntryDirection::Credit,
            source,
            &description,
            None,
            None,
        )
        .await?;
        tx.commit().await?;

        Ok(result)
    }

    async fn debit_wallet(
        &self,
        user_id: Uuid,
        amount: BigDecimal,
        source: LedgerSource,
        description: String,
    ) -> Result<(Wallet, LedgerEntry), ServiceError> {
        if !is_positive_amount(&amount) {
            return Err(ServiceError::Validation(
                "Debit amount must be positive".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let wallet = lock_wallet_for_user(&mut tx, user_id).await?;
        let result = record_wallet_mutation(
            &mut tx,
            &wallet,
            &amount,
            EntryDirection::Debit,
            source,
            &description,
            None,
            None,
        )
        .await?;
        tx.commit().await?;

        Ok(result)
    }

    async fn entries_for_wallet(
        &self,
        wallet_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<LedgerEntry>, ServiceError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            SELECT {LEDGER_COLUMNS}
            FROM ledger_entries
            WHERE wallet_id = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(wallet_id)
        .bind(since)
        .fetch(&self.pool)
        .try_collect()
        .await?;

        Ok(entries)
    }

    async fn reconcile_wallet(&self, user_id: Uuid) -> Result<WalletReconciliation, ServiceError> {
        let wallet = self
            .get_wallet(user_id)
            .await?
            .ok_or(ServiceError::WalletNotFound(user_id))?;

        let entries = self.entries_for_wallet(wallet.id, None).await?;
        let replayed = replay_entries(&entries);

        let in_sync = replayed.available == wallet.available_balance
            && replayed.pending == wallet.pending_balance
            && replayed.earned == wallet.total_earned;

        Ok(WalletReconciliation {
            wallet,
            replayed_available: replayed.available,
            replayed_pending: replayed.pending,
            replayed_earned: replayed.earned,
            in_sync,
        })
    }
}
