use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::models::RefreshResponse;
use crate::auth::audit::AuditLogger;
use crate::config::ClientConfig;
use crate::routes::{Navigator, Route};
use crate::session::SessionStore;

pub const TOKEN_REFRESH_PATH: &str = "/auth/token/refresh/";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// A request that can be dispatched more than once (the 401 replay needs that).
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        Self::with_body(Method::POST, path, body)
    }

    pub fn put<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        Self::with_body(Method::PUT, path, body)
    }

    fn with_body<B: Serialize>(
        method: Method,
        path: impl Into<String>,
        body: &B,
    ) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::Invalid(format!("serialize request body: {}", e)))?;
        Ok(Self {
            method,
            path: path.into(),
            body: Some(body),
        })
    }
}

#[derive(Debug)]
enum RefreshFailure {
    NoRefreshToken,
    Rejected(ApiError),
}

impl RefreshFailure {
    fn reason(&self) -> String {
        match self {
            RefreshFailure::NoRefreshToken => "no refresh token".to_string(),
            RefreshFailure::Rejected(e) => e.to_string(),
        }
    }
}

/// HTTP client for the commodity API.
///
/// Every request carries the stored access token as a bearer credential.
/// A 401 triggers one refresh through `/auth/token/refresh/` and a single
/// replay of the original request; if the refresh cannot happen the session
/// is cleared and the navigator is sent to `/login`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
    session: SessionStore,
    navigator: Navigator,
    audit: AuditLogger,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        session: SessionStore,
        navigator: Navigator,
    ) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "api client initialized");

        Ok(Self {
            base_url,
            http,
            session,
            navigator,
            audit: AuditLogger::new(),
        })
    }

    pub fn from_config(
        config: &ClientConfig,
        session: SessionStore,
        navigator: Navigator,
    ) -> Result<Self, ApiError> {
        Self::new(&config.api_base_url, config.timeout(), session, navigator)
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send `request`, refreshing the access token at most once on 401.
    pub async fn execute(&self, request: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        let request_id = Uuid::new_v4().to_string();
        let mut bearer = self.session.access_token().await;
        // Scoped to this call: concurrent requests track their own retry.
        let mut retried = false;

        loop {
            let response = self
                .dispatch(request, bearer.as_deref(), &request_id)
                .await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            let error = status_error(response).await;

            if status != StatusCode::UNAUTHORIZED || retried {
                debug!(
                    request_id = %request_id,
                    path = %request.path,
                    status = status.as_u16(),
                    retried,
                    "request failed"
                );
                return Err(error);
            }

            retried = true;
            match self.refresh_access_token(&request_id).await {
                Ok(access) => {
                    debug!(request_id = %request_id, path = %request.path, "replaying request with refreshed token");
                    bearer = Some(access);
                }
                Err(failure) => {
                    self.expire_session(&request_id, &failure.reason()).await;
                    return Err(error);
                }
            }
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
        request_id: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let headers = build_headers(bearer, request_id)?;
        let url = self.url(&request.path);

        trace!(
            request_id = %request_id,
            method = %request.method,
            url = %url,
            authenticated = bearer.is_some(),
            "sending request"
        );

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    /// Mint a new access token from the stored refresh token.
    ///
    /// Goes straight to the endpoint: no bearer, no interception.
    async fn refresh_access_token(&self, request_id: &str) -> Result<String, RefreshFailure> {
        let Some(refresh) = self.session.refresh_token().await else {
            return Err(RefreshFailure::NoRefreshToken);
        };

        let response = self
            .http
            .post(self.url(TOKEN_REFRESH_PATH))
            .header(CONTENT_TYPE, "application/json")
            .header(REQUEST_ID_HEADER, request_id)
            .json(&json!({ "refresh": refresh }))
            .send()
            .await
            .map_err(|e| RefreshFailure::Rejected(ApiError::Network(e)))?;

        if !response.status().is_success() {
            return Err(RefreshFailure::Rejected(status_error(response).await));
        }

        let refreshed: RefreshResponse = decode_json(response, TOKEN_REFRESH_PATH)
            .await
            .map_err(RefreshFailure::Rejected)?;

        self.session
            .save_access(&refreshed.access)
            .await
            .map_err(|e| RefreshFailure::Rejected(ApiError::Storage(e)))?;
        self.audit.token_refreshed(request_id);
        Ok(refreshed.access)
    }

    async fn expire_session(&self, request_id: &str, reason: &str) {
        self.audit.session_expired(request_id, reason);
        if let Err(e) = self.session.clear().await {
            warn!(error = %e, "failed to clear session after refresh failure");
        }
        self.navigator.redirect(Route::Login);
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        decode_json(response, &request.path).await
    }

    /// Send and discard whatever body comes back.
    pub async fn send_unit(&self, request: &ApiRequest) -> Result<(), ApiError> {
        self.execute(request).await.map(|_| ())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(&ApiRequest::get(path)).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_json(&ApiRequest::post(path, body)?).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_json(&ApiRequest::put(path, body)?).await
    }
}

fn build_headers(bearer: Option<&str>, request_id: &str) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        REQUEST_ID_HEADER,
        HeaderValue::from_str(request_id)
            .map_err(|e| ApiError::Invalid(format!("request id header: {}", e)))?,
    );
    if let Some(token) = bearer {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ApiError::Invalid(format!("access token is not a valid header: {}", e)))?;
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

async fn status_error(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    ApiError::Status { status, body }
}

async fn decode_json<T: DeserializeOwned>(
    response: reqwest::Response,
    path: &str,
) -> Result<T, ApiError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(format!("{}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_with_token() {
        let headers = build_headers(Some("abc"), "req-1").unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
        assert_eq!(headers.get(REQUEST_ID_HEADER).unwrap(), "req-1");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_headers_without_token() {
        let headers = build_headers(None, "req-1").unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_header_rejects_control_characters() {
        assert!(build_headers(Some("bad\ntoken"), "req-1").is_err());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ApiClient::new(
            "http://localhost:8000/api/",
            Duration::from_secs(1),
            SessionStore::in_memory(),
            Navigator::new(),
        )
        .unwrap();
        assert_eq!(client.url("/auth/login/"), "http://localhost:8000/api/auth/login/");
    }
}
