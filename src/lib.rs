pub mod config;
pub mod crypto;
pub mod dsig;
pub mod keystore;
pub mod telemetry;
