/// The current version of haulage, sourced from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod commands;
pub mod config;
pub mod http;
pub mod logging;
pub mod services;
pub mod session;
pub mod types;
