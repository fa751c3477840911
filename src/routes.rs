// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::{get, post}, Extension, Json, Router};
use tower_http::trace::TraceLayer;
use serde_json::json;

use crate::{handler, middleware::auth, AppState};

// Health check handler
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let wallet_routes = Router::new()
        .route("/", get(handler::wallet::get_wallet))
        .route("/top-up", post(handler::wallet::top_up))
        .route("/withdraw", post(handler::wallet::withdraw))
        .route("/transactions", get(handler::wallet::get_transactions))
        .route("/reconcile", get(handler::wallet::reconcile));

    let contract_routes = Router::new()
        .route("/", post(handler::contracts::create_contract))
        .route("/:contract_id/activate", post(handler::contracts::activate_contract))
        .route("/:contract_id/allocate", post(handler::contracts::allocate_funds))
        .route("/:contract_id/balance", get(handler::contracts::balance_info))
        .route("/:contract_id/complete", post(handler::contracts::complete_contract))
        .route("/:contract_id/freeze", post(handler::contracts::freeze_contract))
        .route("/:contract_id/unfreeze", post(handler::contracts::unfreeze_contract))
        .route("/:contract_id/settle", post(handler::contracts::settle_contract))
        .route("/:contract_id/payments",
        get(handler::payments::contract_payments)
        .post(handler::payments::request_payment)
        );

    let payment_routes = Router::new()
        .route("/:request_id/approve", post(handler::payments::approve_payment))
        .route("/:request_id/cancel", post(handler::payments::cancel_payment))
        .route("/mine/pending", get(handler::payments::my_pending_payments))
        .route("/mine/available", get(handler::payments::my_available_payments));

    let api_routes = Router::new()
        .nest("/wallet", wallet_routes)
        .nest("/contracts", contract_routes)
        .nest("/payments", payment_routes)
        .layer(middleware::from_fn(auth));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state))
}
