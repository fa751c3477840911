// handler/payments.rs
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
    utils::money::parse_amount,
    AppState,
};

pub async fn request_payment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
    Json(body): Json<CreatePaymentRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    let amount = parse_amount(&body.amount).map_err(HttpError::bad_request)?;

    let request = app_state
        .payment_service
        .request_payment(&auth.user, contract_id, body.kind, amount, body.description)
        .await?;

    let response: PaymentRequestResponseDto = request.into();
    Ok(Json(ApiResponse::success(
        "Payment request submitted successfully",
        response,
    )))
}

pub async fn approve_payment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let (request, outcome) = app_state
        .payment_service
        .approve_payment(&auth.user, request_id)
        .await?;

    let response = serde_json::json!({
        "request": PaymentRequestResponseDto::from(request),
        "transfer": outcome,
    });
    Ok(Json(ApiResponse::success(
        "Payment approved and transferred",
        response,
    )))
}

pub async fn cancel_payment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<CancelPaymentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let request = app_state
        .payment_service
        .cancel_payment(&auth.user, request_id, body.reason)
        .await?;

    let response: PaymentRequestResponseDto = request.into();
    Ok(Json(ApiResponse::success("Payment cancelled", response)))
}

pub async fn contract_payments(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let requests = app_state
        .payment_service
        .requests_for_contract(&auth.user, contract_id)
        .await?;

    let response: Vec<PaymentRequestResponseDto> = requests.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(
        "Payment requests retrieved successfully",
        response,
    )))
}

/// A professional's requests whose funds are still pending (awaiting
/// approval, transfer, or the hold).
pub async fn my_pending_payments(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let requests = app_state
        .payment_service
        .pending_requests(&auth.user)
        .await?;

    let response: Vec<PaymentRequestResponseDto> = requests.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(
        "Pending payments retrieved successfully",
        response,
    )))
}

/// A professional's requests already promoted to available balance.
pub async fn my_available_payments(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let requests = app_state
        .payment_service
        .completed_requests(&auth.user)
        .await?;

    let response: Vec<PaymentRequestResponseDto> = requests.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(
        "Available payments retrieved successfully",
        response,
    )))
}
