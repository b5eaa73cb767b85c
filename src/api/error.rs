use serde_json::Value;

use crate::forms::FormError;
use crate::session::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request failed with status {status}")]
    Status { status: u16, body: Value },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Message fit to show next to a form.
    ///
    /// Validation failures carry their own text; server errors go through
    /// [`extract_error_message`]; anything else collapses to `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Form(e) => e.to_string(),
            ApiError::Status { body, .. } => extract_error_message(body, fallback),
            _ => fallback.to_string(),
        }
    }
}

/// Pull a human readable message out of an API error payload.
///
/// Precedence: `non_field_errors[0]`, then the first message attached to any
/// other field, then `detail`, then `error`, then `fallback`. A bare list of
/// strings counts as a non-field error.
pub fn extract_error_message(body: &Value, fallback: &str) -> String {
    first_message(body.get("non_field_errors"))
        .or_else(|| match body {
            Value::Array(_) => first_message(Some(body)),
            _ => None,
        })
        .or_else(|| first_field_message(body))
        .or_else(|| non_empty_str(body.get("detail")))
        .or_else(|| non_empty_str(body.get("error")))
        .unwrap_or_else(|| fallback.to_string())
}

/// Variant used by the login form: only `non_field_errors` is trusted.
pub fn extract_non_field_error(body: &Value, fallback: &str) -> String {
    first_message(body.get("non_field_errors")).unwrap_or_else(|| fallback.to_string())
}

fn first_field_message(body: &Value) -> Option<String> {
    let map = body.as_object()?;
    map.iter()
        .filter(|(key, _)| !matches!(key.as_str(), "non_field_errors" | "detail" | "error"))
        .find_map(|(_, value)| match value {
            Value::Array(_) => first_message(Some(value)),
            _ => None,
        })
}

fn first_message(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Array(items) => items.iter().find_map(|v| non_empty_str(Some(v))),
        other => non_empty_str(Some(other)),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_field_errors_win() {
        let body = json!({
            "detail": "ignored",
            "non_field_errors": ["Invalid username or password."],
            "username": ["This field is required."]
        });
        assert_eq!(
            extract_error_message(&body, "fallback"),
            "Invalid username or password."
        );
    }

    #[test]
    fn test_field_error_before_detail() {
        let body = json!({
            "detail": "Bad request",
            "quantity_requested": ["Ensure this value is less than or equal to 99."]
        });
        assert_eq!(
            extract_error_message(&body, "fallback"),
            "Ensure this value is less than or equal to 99."
        );
    }

    #[test]
    fn test_detail_then_error_then_fallback() {
        assert_eq!(
            extract_error_message(&json!({"detail": "Not found."}), "fb"),
            "Not found."
        );
        assert_eq!(
            extract_error_message(&json!({"error": "Only CHWs can check allocation status"}), "fb"),
            "Only CHWs can check allocation status"
        );
        assert_eq!(extract_error_message(&json!({}), "fb"), "fb");
        assert_eq!(extract_error_message(&Value::Null, "fb"), "fb");
        assert_eq!(extract_error_message(&json!("<html>"), "fb"), "fb");
        assert_eq!(
            extract_error_message(&json!({"non_field_errors": [], "detail": "  "}), "fb"),
            "fb"
        );
    }

    #[test]
    fn test_bare_list_is_non_field() {
        let body = json!(["You have already requested Paracetamol today."]);
        assert_eq!(
            extract_error_message(&body, "fb"),
            "You have already requested Paracetamol today."
        );
    }

    #[test]
    fn test_login_extraction_ignores_detail() {
        assert_eq!(
            extract_non_field_error(&json!({"detail": "Server error"}), "Login failed"),
            "Login failed"
        );
        assert_eq!(
            extract_non_field_error(
                &json!({"non_field_errors": ["User account is disabled."]}),
                "Login failed"
            ),
            "User account is disabled."
        );
    }

    #[test]
    fn test_user_message() {
        let err = ApiError::Status {
            status: 400,
            body: json!({"detail": "Only CHAs can update request status."}),
        };
        assert_eq!(err.user_message("fb"), "Only CHAs can update request status.");
        assert!(!err.is_unauthorized());

        let err = ApiError::Decode("truncated".into());
        assert_eq!(err.user_message("Failed to load requests"), "Failed to load requests");
    }
}
