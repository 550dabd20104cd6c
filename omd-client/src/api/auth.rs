use reqwest::Method;
use serde_json::{json, Value};
use uuid::Uuid;

use omd_types::AuthSession;

use super::client::decode_body;
use super::transport::BackendRequest;
use super::{ApiError, ApiResult, BackendClient};

const AUTH_PREFIX: &str = "auth/v1";

/// Result of a registration: hosted auth only returns a session when email
/// confirmation is disabled.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user_id: Option<Uuid>,
    pub session: Option<AuthSession>,
}

/// Email/password authentication against the hosted auth service.
#[derive(Clone)]
pub struct AuthClient {
    backend: BackendClient,
}

impl AuthClient {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Sign in and make the session current for every clone of the backend
    pub async fn sign_in(&self, email: &str, password: &str) -> ApiResult<AuthSession> {
        validate_credentials(email, password)?;
        let request = BackendRequest::new(Method::POST, format!("{}/token", AUTH_PREFIX))
            .query("grant_type", "password")
            .json(json!({ "email": email.trim(), "password": password }));
        let response = self.backend.send(request).await?;
        let session: AuthSession = decode_body(&response.body)?;

        tracing::info!("Signed in as {}", session.user.id);
        self.backend.set_session(Some(session.clone()));
        Ok(session)
    }

    /// Register a new account
    pub async fn sign_up(&self, email: &str, password: &str) -> ApiResult<SignUpOutcome> {
        validate_credentials(email, password)?;
        let request = BackendRequest::new(Method::POST, format!("{}/signup", AUTH_PREFIX))
            .json(json!({ "email": email.trim(), "password": password }));
        let response = self.backend.send(request).await?;
        let body: Value = decode_body(&response.body)?;

        let session = if body.get("access_token").is_some() {
            Some(serde_json::from_value::<AuthSession>(body.clone())?)
        } else {
            None
        };
        let user_id = session
            .as_ref()
            .map(|s| s.user.id)
            .or_else(|| parse_user_id(&body));

        if let Some(session) = &session {
            self.backend.set_session(Some(session.clone()));
        }
        Ok(SignUpOutcome { user_id, session })
    }

    /// Ask the auth service to email a password reset link
    pub async fn send_password_reset(&self, email: &str) -> ApiResult<()> {
        if email.trim().is_empty() {
            return Err(ApiError::validation("Email is required"));
        }
        let request = BackendRequest::new(Method::POST, format!("{}/recover", AUTH_PREFIX))
            .json(json!({ "email": email.trim() }));
        self.backend.send(request).await?;
        Ok(())
    }

    /// Revoke the current session remotely and forget it locally
    pub async fn sign_out(&self) -> ApiResult<()> {
        if self.backend.session().is_none() {
            return Ok(());
        }
        let request = BackendRequest::new(Method::POST, format!("{}/logout", AUTH_PREFIX));
        let result = self.backend.send(request).await;
        self.backend.set_session(None);
        match result {
            // An expired token is as good as signed out
            Ok(_) | Err(ApiError::Unauthorized(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Reuse a session persisted by a previous run
    pub fn restore(&self, session: AuthSession) {
        self.backend.set_session(Some(session));
    }

    pub fn current_user_id(&self) -> Option<Uuid> {
        self.backend.current_user_id()
    }
}

fn validate_credentials(email: &str, password: &str) -> ApiResult<()> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(ApiError::validation("A valid email is required"));
    }
    if password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }
    Ok(())
}

fn parse_user_id(body: &Value) -> Option<Uuid> {
    body.get("user")
        .and_then(|u| u.get("id"))
        .or_else(|| body.get("id"))
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}
