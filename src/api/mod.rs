pub mod client;
pub mod endpoints;
pub mod error;
pub mod models;

pub use client::{ApiClient, ApiRequest};
pub use endpoints::{AuthApi, CommoditiesApi, RequestsApi};
pub use error::{extract_error_message, ApiError};
