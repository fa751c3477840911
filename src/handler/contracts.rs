// handler/contracts.rs
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::contractdtos::*,
    dtos::walletdtos::ApiResponse,
    error::HttpError,
    middleware::JWTAuthMiddeware,
    models::usermodel::UserRole,
    service::error::ServiceError,
    utils::money::parse_amount,
    AppState,
};

pub async fn create_contract(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateContractDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    let total_amount = parse_amount(&body.total_amount).map_err(HttpError::bad_request)?;

    let commission_rate = match body.commission_rate {
        Some(rate) => bigdecimal::BigDecimal::from_str(&rate)
            .map_err(|_| HttpError::bad_request("Invalid commission rate"))?,
        None => app_state.env.platform_commission_rate.clone(),
    };

    let contract = app_state
        .escrow_service
        .create_contract(&auth.user, body.professional_id, total_amount, commission_rate)
        .await?;

    let response: ContractResponseDto = contract.into();
    Ok(Json(ApiResponse::success(
        "Contract created successfully",
        response,
    )))
}

pub async fn activate_contract(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let contract = app_state
        .escrow_service
        .activate_contract(&auth.user, contract_id)
        .await?;

    let response: ContractResponseDto = contract.into();
    Ok(Json(ApiResponse::success("Contract activated", response)))
}

pub async fn allocate_funds(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
    Json(body): Json<AllocateFundsDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    let amount = parse_amount(&body.amount).map_err(HttpError::bad_request)?;

    let contract = app_state
        .escrow_service
        .allocate_funds(&auth.user, contract_id, amount)
        .await?;

    let response: ContractResponseDto = contract.into();
    Ok(Json(ApiResponse::success(
        "Funds allocated to contract",
        response,
    )))
}

pub async fn balance_info(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let info = app_state
        .escrow_service
        .balance_info(&auth.user, contract_id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Contract balance retrieved successfully",
        info,
    )))
}

pub async fn complete_contract(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let completion = app_state
        .escrow_service
        .complete_contract(&auth.user, contract_id)
        .await?;

    Ok(Json(ApiResponse::success("Contract completed", completion)))
}

/// Disputes surface: freeze / unfreeze / settle.
pub async fn freeze_contract(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    ensure_party(&app_state, &auth, contract_id).await?;

    let contract = app_state.dispute_service.freeze_contract(contract_id).await?;

    let response: ContractResponseDto = contract.into();
    Ok(Json(ApiResponse::success("Contract frozen", response)))
}

/// Lifting a freeze or imposing a settlement is the dispute resolver's
/// call, not the parties'.
pub async fn unfreeze_contract(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    if auth.user.role != UserRole::Admin {
        return Err(ServiceError::Unauthorized(auth.user.id).into());
    }

    let contract = app_state
        .dispute_service
        .unfreeze_contract(contract_id)
        .await?;

    let response: ContractResponseDto = contract.into();
    Ok(Json(ApiResponse::success("Contract unfrozen", response)))
}

pub async fn settle_contract(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
    Json(body): Json<SettleContractDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    let share = parse_amount(&body.professional_share_pct).map_err(HttpError::bad_request)?;

    if auth.user.role != UserRole::Admin {
        return Err(ServiceError::Unauthorized(auth.user.id).into());
    }

    let outcome = app_state
        .dispute_service
        .settle_contract(contract_id, share)
        .await?;

    Ok(Json(ApiResponse::success("Contract settled", outcome)))
}

async fn ensure_party(
    app_state: &AppState,
    auth: &JWTAuthMiddeware,
    contract_id: Uuid,
) -> Result<(), HttpError> {
    let contract = app_state
        .escrow_service
        .fetch_contract(contract_id)
        .await
        .map_err(HttpError::from)?;

    if contract.client_id != auth.user.id && contract.professional_id != auth.user.id {
        return Err(ServiceError::Unauthorized(auth.user.id).into());
    }
    Ok(())
}
