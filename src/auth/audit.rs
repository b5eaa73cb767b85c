use tracing::{error, info, warn};

/// Session lifecycle events, emitted under the `audit` target.
#[derive(Debug, Clone, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn login_success(&self, username: &str, role: &str) {
        info!(target: "audit", event = "login_success", username, role);
    }

    pub fn login_failure(&self, username: &str, reason: &str) {
        warn!(target: "audit", event = "login_failure", username, reason);
    }

    pub fn logout(&self, username: Option<&str>, server_ack: bool) {
        info!(target: "audit", event = "logout", username = username.unwrap_or(""), server_ack);
    }

    pub fn session_restored(&self, username: &str) {
        info!(target: "audit", event = "session_restored", username);
    }

    pub fn session_rejected(&self, reason: &str) {
        info!(target: "audit", event = "session_rejected", reason);
    }

    pub fn token_refreshed(&self, request_id: &str) {
        info!(target: "audit", event = "token_refreshed", request_id);
    }

    pub fn session_expired(&self, request_id: &str, reason: &str) {
        warn!(target: "audit", event = "session_expired", request_id, reason);
    }

    pub fn access_denied(&self, username: &str, role: &str, route: &str) {
        warn!(target: "audit", event = "access_denied", username, role, route);
    }

    pub fn internal_error(&self, context: &str, error_msg: &str) {
        error!(target: "audit", event = "internal_error", context, error = error_msg);
    }
}
