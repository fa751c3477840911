pub mod contractmodels;
pub mod usermodel;
pub mod walletmodels;
