pub mod contractdtos;
pub mod walletdtos;
