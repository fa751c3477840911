// handler/wallet.rs
use std::sync::Arc;

use axum::{
    extract::Query,
    response::IntoResponse,
    Extension, Json,
};
use validator::Validate;

use crate::{
    dtos::walletdtos::*,
    error::HttpError,
    middleware::JWTAuthMiddeware,
    utils::money::parse_amount,
    AppState,
};

pub async fn get_wallet(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let wallet = app_state
        .wallet_service
        .get_or_create_wallet(auth.user.id)
        .await?;

    let response: WalletResponseDto = wallet.into();
    Ok(Json(ApiResponse::success(
        "Wallet retrieved successfully",
        response,
    )))
}

pub async fn top_up(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<TopUpRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    let amount = parse_amount(&body.amount).map_err(HttpError::bad_request)?;

    let (wallet, entry) = app_state.wallet_service.top_up(auth.user.id, amount).await?;

    let response = serde_json::json!({
        "wallet": WalletResponseDto::from(wallet),
        "transaction": LedgerEntryDto::from(entry),
    });
    Ok(Json(ApiResponse::success("Top-up completed", response)))
}

pub async fn withdraw(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<WithdrawRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    let amount = parse_amount(&body.amount).map_err(HttpError::bad_request)?;

    let (wallet, entry) = app_state
        .wallet_service
        .withdraw(auth.user.id, amount)
        .await?;

    let response = serde_json::json!({
        "wallet": WalletResponseDto::from(wallet),
        "transaction": LedgerEntryDto::from(entry),
    });
    Ok(Json(ApiResponse::success("Withdrawal completed", response)))
}

pub async fn get_transactions(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(query): Query<TransactionHistoryQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let entries = app_state
        .wallet_service
        .transactions(auth.user.id, query.since)
        .await?;

    let response: Vec<LedgerEntryDto> = entries.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(
        "Transactions retrieved successfully",
        response,
    )))
}

pub async fn reconcile(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let reconciliation = app_state.wallet_service.reconcile(auth.user.id).await?;

    Ok(Json(ApiResponse::success(
        "Wallet reconciled against its ledger",
        reconciliation,
    )))
}
