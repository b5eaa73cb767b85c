//! Session state machine: startup restoration, login and logout.

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::error::extract_non_field_error;
use crate::api::models::{Credentials, LoginResponse, Role, UserProfile};
use crate::api::{ApiClient, ApiError, AuthApi};
use crate::auth::audit::AuditLogger;
use crate::session::token::is_token_expired;
use crate::session::{SessionStore, StorageError};

const LOGIN_FALLBACK: &str = "Login failed";
const RESTORE_FAILED: &str = "Authentication failed";

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// Startup restoration has not settled yet.
    Restoring,
    Unauthenticated { error: Option<String> },
    Authenticating,
    Authenticated(UserProfile),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.user().map(|u| u.role)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AuthState::Unauthenticated { error } => error.as_deref(),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AuthState::Restoring => "restoring",
            AuthState::Unauthenticated { .. } => "unauthenticated",
            AuthState::Authenticating => "authenticating",
            AuthState::Authenticated(_) => "authenticated",
        }
    }
}

/// Result of a login attempt. Login never fails with an `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Success(UserProfile),
    Failure { error: String },
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoginOutcome::Failure { error } => Some(error),
            LoginOutcome::Success(_) => None,
        }
    }
}

/// Owns the auth state and the operations allowed to change it.
///
/// Observers get a snapshot through [`snapshot`](Self::snapshot) or follow
/// transitions through [`subscribe`](Self::subscribe); each operation
/// publishes its final state once it completes.
#[derive(Debug, Clone)]
pub struct AuthController {
    client: ApiClient,
    state: watch::Sender<AuthState>,
    audit: AuditLogger,
}

impl AuthController {
    pub fn new(client: ApiClient) -> Self {
        let (state, _rx) = watch::channel(AuthState::Restoring);
        Self {
            client,
            state,
            audit: AuditLogger::new(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    fn session(&self) -> &SessionStore {
        self.client.session()
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.state.borrow().user().cloned()
    }

    fn transition(&self, next: AuthState) {
        debug!(from = self.state.borrow().name(), to = next.name(), "auth state transition");
        self.state.send_replace(next);
    }

    async fn clear_session(&self) {
        if let Err(e) = self.session().clear().await {
            error!(error = %e, "failed to clear session");
            self.audit.internal_error("clear_session", &e.to_string());
        }
    }

    /// Run once at startup: trust a stored, unexpired token only after the
    /// server hands back the profile for it.
    pub async fn restore_session(&self) -> AuthState {
        let token = self.session().access_token().await;

        if is_token_expired(token.as_deref()) {
            let reason = if token.is_some() { "token expired" } else { "no token" };
            debug!(reason, "no usable stored session");
            self.clear_session().await;
            self.transition(AuthState::Unauthenticated { error: None });
            return self.snapshot();
        }

        match AuthApi::new(&self.client).profile().await {
            Ok(user) => {
                if let Err(e) = self.session().save_user(&user).await {
                    warn!(error = %e, "failed to cache restored profile");
                }
                self.audit.session_restored(&user.username);
                info!(username = %user.username, role = %user.role, "session restored");
                self.transition(AuthState::Authenticated(user));
            }
            Err(e) => {
                warn!(error = %e, "profile fetch failed during restore");
                self.audit.session_rejected(&e.to_string());
                self.clear_session().await;
                self.transition(AuthState::Unauthenticated {
                    error: Some(RESTORE_FAILED.to_string()),
                });
            }
        }
        self.snapshot()
    }

    pub async fn login(&self, credentials: &Credentials) -> LoginOutcome {
        info!(username = %credentials.username, "signing in");
        self.transition(AuthState::Authenticating);

        let response = match AuthApi::new(&self.client).login(credentials).await {
            Ok(response) => response,
            Err(e) => return self.fail_login(&credentials.username, &e),
        };

        if let Err(e) = self.persist_login(&response).await {
            error!(error = %e, "failed to persist session after login");
            self.audit.internal_error("login", &e.to_string());
            self.clear_session().await;
            let error = LOGIN_FALLBACK.to_string();
            self.transition(AuthState::Unauthenticated {
                error: Some(error.clone()),
            });
            return LoginOutcome::Failure { error };
        }

        let user = response.user;
        self.audit.login_success(&user.username, user.role.as_str());
        info!(username = %user.username, role = %user.role, "sign in successful");
        self.transition(AuthState::Authenticated(user.clone()));
        LoginOutcome::Success(user)
    }

    async fn persist_login(&self, response: &LoginResponse) -> Result<(), StorageError> {
        self.session().save(&response.access, &response.refresh).await?;
        self.session().save_user(&response.user).await
    }

    fn fail_login(&self, username: &str, err: &ApiError) -> LoginOutcome {
        let error = match err {
            ApiError::Status { body, .. } => extract_non_field_error(body, LOGIN_FALLBACK),
            _ => LOGIN_FALLBACK.to_string(),
        };
        warn!(username, error = %err, "sign in failed");
        self.audit.login_failure(username, &error);
        self.transition(AuthState::Unauthenticated {
            error: Some(error.clone()),
        });
        LoginOutcome::Failure { error }
    }

    /// Tell the server to drop the refresh token, then forget the session
    /// whatever the server said.
    pub async fn logout(&self) {
        let username = self.current_user().map(|u| u.username);
        let mut server_ack = false;

        if let Some(refresh) = self.session().refresh_token().await {
            match AuthApi::new(&self.client).logout(&refresh).await {
                Ok(()) => server_ack = true,
                Err(e) => warn!(error = %e, "logout request failed, clearing local session anyway"),
            }
        }

        self.clear_session().await;
        self.audit.logout(username.as_deref(), server_ack);
        self.transition(AuthState::Unauthenticated { error: None });
    }

    /// Drop a surfaced login error.
    pub fn clear_error(&self) {
        self.state.send_if_modified(|state| match state {
            AuthState::Unauthenticated { error } if error.is_some() => {
                *error = None;
                true
            }
            _ => false,
        });
    }
}
