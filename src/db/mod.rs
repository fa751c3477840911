pub mod contractdb;
pub mod db;
pub mod userdb;
pub mod walletdb;
