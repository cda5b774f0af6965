//! Authentication endpoints.
//!
//! These are the only operations besides a rejected token that write the
//! session store.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use tienda_core::{Email, Password, UserId, Username};

use super::{Auth, StoreClient, decode};
use crate::error::ClientError;
use crate::session::{Session, SessionUser};

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<SessionUser>,
}

#[derive(Deserialize)]
struct RegisterResponse {
    user_id: UserId,
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ProfileResponse {
    user: Profile,
}

/// The signed-in user as reported by the dashboard endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Deserialize)]
struct ResetRequestResponse {
    #[serde(default)]
    token: Option<String>,
}

impl StoreClient {
    /// Log in and store the returned session.
    ///
    /// Any previous session is cleared first, so a failed login leaves the
    /// client anonymous. Mounted views hear about the change either way.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` with status 401 for bad credentials, or any
    /// request or storage error.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let had_session = self.forget_session()?;

        let body = json!({ "email": email.trim(), "password": password });
        let result = self.open_session(body).await;
        if result.is_err() && had_session {
            self.publish_session_change();
        }
        result
    }

    async fn open_session(&self, body: serde_json::Value) -> Result<Session, ClientError> {
        let response = self
            .execute(Method::POST, "api/auth/login", Some(body), Auth::None)
            .await?;
        let login: LoginResponse = decode(&response)?;

        let session = Session {
            access_token: SecretString::from(login.access_token),
            refresh_token: login.refresh_token.map(SecretString::from),
            user: login.user,
        };
        self.store_session(session.clone())?;
        tracing::info!("logged in");
        Ok(session)
    }

    /// Create an account and store the returned session.
    ///
    /// Input is validated locally first; invalid input never reaches the
    /// network.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a malformed email, empty username or short
    /// password, `Rejected` with status 409 when the account exists, or any
    /// request or storage error.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<Session, ClientError> {
        let email = Email::parse(email)?;
        let username = Username::parse(username)?;
        let password = Password::parse(password)?;

        let had_session = self.forget_session()?;
        let result = self.create_account(email, username, &password).await;
        if result.is_err() && had_session {
            self.publish_session_change();
        }
        result
    }

    async fn create_account(
        &self,
        email: Email,
        username: Username,
        password: &Password,
    ) -> Result<Session, ClientError> {
        let body = json!({
            "email": email.as_str(),
            "username": username.as_str(),
            "password": password.expose(),
        });
        let response = self
            .execute(Method::POST, "api/auth/register", Some(body), Auth::None)
            .await?;
        let registered: RegisterResponse = decode(&response)?;

        let session = Session {
            access_token: SecretString::from(registered.access_token),
            refresh_token: registered.refresh_token.map(SecretString::from),
            user: Some(SessionUser {
                id: registered.user_id,
                name: Some(username.into_inner()),
                email: Some(email.into_inner()),
            }),
        };
        self.store_session(session.clone())?;
        tracing::info!("account registered");
        Ok(session)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `SessionMissing` when no refresh token is stored and
    /// `Unauthorized` (after clearing the session) when it is rejected.
    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> Result<(), ClientError> {
        let response = self
            .execute(Method::POST, "api/auth/refresh", None, Auth::Refresh)
            .await?;
        let refreshed: RefreshResponse = decode(&response)?;

        let mut session = self
            .inner
            .session
            .session()
            .ok_or(ClientError::SessionMissing)?;
        session.access_token = SecretString::from(refreshed.access_token);
        self.inner.session.set_session(session)?;
        tracing::info!("access token refreshed");
        Ok(())
    }

    /// Forget the local session. Safe to call when already logged out.
    ///
    /// # Errors
    ///
    /// Returns `Session` if persisted state cannot be removed.
    pub fn logout(&self) -> Result<(), ClientError> {
        if self.forget_session()? {
            tracing::info!("logged out");
            self.publish_session_change();
        }
        Ok(())
    }

    /// Ask the server for a password reset token.
    ///
    /// Servers that cannot mail the link return the token in the response;
    /// it is passed back here so it can be shown to the user.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a malformed email, `NotFound` when no
    /// account uses it, or any request error.
    #[instrument(skip(self))]
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<SecretString>, ClientError> {
        let email = Email::parse(email)?;
        let body = json!({ "email": email.as_str() });
        let response = self
            .execute(Method::POST, "api/auth/request-reset", Some(body), Auth::None)
            .await?;
        let reset: ResetRequestResponse = decode(&response)?;
        tracing::info!(token_returned = reset.token.is_some(), "password reset requested");
        Ok(reset.token.filter(|t| !t.is_empty()).map(SecretString::from))
    }

    /// Set a new password using a reset token. The session is untouched.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty token or short password (without
    /// a request), `Rejected` with status 400 for an invalid or expired
    /// token, or any request error.
    #[instrument(skip(self, token, password))]
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), ClientError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ClientError::Validation("reset token is required".to_string()));
        }
        let password = Password::parse(password)?;

        let body = json!({ "token": token, "password": password.expose() });
        self.execute(Method::POST, "api/auth/reset-password", Some(body), Auth::None)
            .await?;
        tracing::info!("password reset");
        Ok(())
    }

    /// The signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Any request error.
    #[instrument(skip(self))]
    pub async fn profile(&self) -> Result<Profile, ClientError> {
        let body = self
            .execute(Method::GET, "api/dashboard", None, Auth::Access)
            .await?;
        let response: ProfileResponse = decode(&body)?;
        Ok(response.user)
    }

    fn store_session(&self, session: Session) -> Result<(), ClientError> {
        if session.access_token.expose_secret().is_empty() {
            return Err(ClientError::Validation(
                "server returned an empty access token".to_string(),
            ));
        }
        self.inner.session.set_session(session)?;
        self.publish_session_change();
        Ok(())
    }
}
