pub mod background_jobs;
pub mod dispute_service;
pub mod error;
pub mod escrow_service;
pub mod payment_gateway;
pub mod payment_service;
pub mod wallet_service;
