mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use config::Config;
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::LevelFilter;

use crate::db::db::DBClient;
use service::{
    dispute_service::DisputeService,
    escrow_service::EscrowService,
    payment_gateway::{AuthorizeNetGateway, PaymentGateway},
    payment_service::PaymentRequestService,
    wallet_service::WalletService,
};

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
    // Services
    pub wallet_service: Arc<WalletService>,
    pub escrow_service: Arc<EscrowService>,
    pub payment_service: Arc<PaymentRequestService>,
    pub dispute_service: Arc<DisputeService>,
}

impl AppState {
    pub fn new(db_client: DBClient, config: Config, gateway: Arc<dyn PaymentGateway>) -> Self {
        let db_client_arc = Arc::new(db_client);

        let wallet_service = Arc::new(WalletService::new(
            db_client_arc.clone(),
            gateway,
            config.gateway.currency.clone(),
        ));
        let escrow_service = Arc::new(EscrowService::new(
            db_client_arc.clone(),
            config.hold_period_days,
        ));
        let payment_service = Arc::new(PaymentRequestService::new(
            db_client_arc.clone(),
            escrow_service.clone(),
            config.hold_period_days,
        ));
        let dispute_service = Arc::new(DisputeService::new(
            db_client_arc.clone(),
            config.hold_period_days,
        ));

        Self {
            env: config,
            db_client: db_client_arc,
            wallet_service,
            escrow_service,
            payment_service,
            dispute_service,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = Config::init();

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .connect(&config.database_url)
        .await?;
    tracing::info!("Connection to the database is successful");

    let db_client = DBClient::new(pool);
    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(AuthorizeNetGateway::new(config.gateway.clone()));

    let app_state = Arc::new(AppState::new(db_client, config.clone(), gateway));

    // Start the hold-release sweep
    let app_state_clone = app_state.clone();
    tokio::spawn(async move {
        service::background_jobs::start_hold_release_job(app_state_clone).await;
    });

    let app = create_router(app_state);

    tracing::info!("Server is running on http://localhost:{}", config.port);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port)).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
