pub mod store;
pub mod token;

pub use store::{SessionStore, StorageError};
pub use token::{decode_claims, is_token_expired, TokenClaims};
