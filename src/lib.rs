pub mod api;
pub mod auth;
pub mod config;
pub mod forms;
pub mod routes;
pub mod session;
pub mod utils;
pub mod views;

// Crate version exposed for runtime queries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
