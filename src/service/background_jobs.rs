// service/background_jobs.rs
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};

use crate::{db::contractdb::ContractExt, AppState};

const SWEEP_BATCH_SIZE: i64 = 100;

/// Recurring hold-release sweep: promotes professional funds whose hold
/// has elapsed, one transaction per item. Safe to run from several
/// workers at once (each completion re-checks state under a row lock) and
/// safe to resume after a crash mid-batch.
pub async fn start_hold_release_job(app_state: Arc<AppState>) {
    let mut interval = interval(Duration::from_secs(
        app_state.env.release_sweep_interval_secs,
    ));

    loop {
        interval.tick().await;

        tracing::info!("Running hold-release sweep at {}", Utc::now());

        match sweep_once(&app_state).await {
            Ok((completed, released)) => tracing::info!(
                "Hold-release sweep finished: {} payment(s) completed, {} contract release(s)",
                completed,
                released
            ),
            Err(e) => tracing::error!("Hold-release sweep failed: {}", e),
        }
    }
}

/// One pass over everything currently due. Per-item failures are logged
/// and retried on the next sweep instead of failing the batch.
pub async fn sweep_once(app_state: &AppState) -> Result<(usize, usize), crate::service::error::ServiceError> {
    let due = app_state
        .db_client
        .due_payment_request_ids(SWEEP_BATCH_SIZE)
        .await?;

    let mut completed = 0usize;
    for request_id in due {
        match app_state.payment_service.complete_payment(request_id).await {
            Ok(Some(request)) => {
                completed += 1;
                tracing::info!(
                    "Released {} to professional for payment request {}",
                    request.net_amount_to_professional,
                    request.id
                );
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Failed to complete payment request {}: {}", request_id, e);
            }
        }
    }

    let due_contracts = app_state
        .db_client
        .due_contract_release_ids(SWEEP_BATCH_SIZE)
        .await?;

    let mut released = 0usize;
    for contract_id in due_contracts {
        match app_state
            .escrow_service
            .release_professional_balance(contract_id)
            .await
        {
            Ok(Some(amount)) => {
                released += 1;
                tracing::info!("Released {} held on contract {}", amount, contract_id);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(
                    "Failed to release professional balance on contract {}: {}",
                    contract_id,
                    e
                );
            }
        }
    }

    Ok((completed, released))
}
