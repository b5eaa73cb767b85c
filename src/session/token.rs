use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use serde::Deserialize;
use tracing::trace;

/// Unverified claims carried in the payload segment of an access token.
///
/// The server signs and verifies tokens; the client only peeks at `exp`
/// to avoid sending a token it already knows is dead.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
}

/// Decode the payload claims of a JWT without checking its signature.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    // Some issuers keep the '=' padding; the no-pad engine rejects it.
    let raw = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    match serde_json::from_slice::<TokenClaims>(&raw) {
        Ok(claims) => Some(claims),
        Err(e) => {
            trace!(error = %e, "token payload is not a claims object");
            None
        }
    }
}

/// True when the token is absent, malformed, or its `exp` is at or before `now`.
pub fn is_token_expired_at(token: Option<&str>, now: i64) -> bool {
    match token.and_then(decode_claims) {
        Some(claims) => claims.exp <= now,
        None => true,
    }
}

pub fn is_token_expired(token: Option<&str>) -> bool {
    is_token_expired_at(token, Utc::now().timestamp())
}

#[cfg(test)]
pub(crate) fn make_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "exp": exp, "user_id": 7, "token_type": "access" })
            .to_string()
            .as_bytes(),
    );
    format!("{}.{}.signature", header, payload)
}
