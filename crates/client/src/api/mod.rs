//! REST client for the Tienda API.
//!
//! One [`StoreClient`] owns the HTTP connection pool, a handle to the
//! session store and the event bus. Operations are split by resource:
//!
//! - [`cart`] - cart lines and quantity changes
//! - [`wishlist`] - wishlist membership
//! - [`catalog`] - public product listings, cached with `moka`
//! - [`auth`] - login, registration, token refresh
//! - [`orders`] - checkout and order receipts
//!
//! Every request is bounded by the configured timeout. Responses are
//! classified into [`ClientError`] in one place, and a rejected token clears
//! the session no matter which operation saw it.

mod auth;
mod cache;
mod cart;
mod catalog;
mod orders;
mod wishlist;

use std::borrow::Cow;
use std::sync::Arc;

use moka::future::Cache;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::{ChangeEvent, EventBus};
use crate::session::SessionStore;

pub use auth::Profile;
pub use cart::QuantityChange;

use cache::{CacheKey, CacheValue};

/// Header carrying a per-request correlation id.
const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Longest slice of a response body copied into errors and logs.
const BODY_PREVIEW_CHARS: usize = 200;

/// Which credential, if any, a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    /// Public endpoint.
    None,
    /// The access token; absent token fails with `SessionMissing`.
    Access,
    /// The refresh token; only the refresh endpoint accepts it.
    Refresh,
}

// =============================================================================
// StoreClient
// =============================================================================

/// Client for the Tienda REST API.
///
/// Cheap to clone; clones share the connection pool, session, bus and cache.
#[derive(Clone)]
pub struct StoreClient {
    inner: Arc<StoreClientInner>,
}

struct StoreClientInner {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<dyn SessionStore>,
    events: EventBus,
    catalog: Cache<CacheKey, CacheValue>,
}

impl StoreClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NetworkFailure` if the HTTP client cannot be
    /// built (for example when no TLS backend is available).
    pub fn new(
        config: &ClientConfig,
        session: Arc<dyn SessionStore>,
        events: EventBus,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("tienda-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let catalog = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.catalog_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(StoreClientInner {
                http,
                base_url: config.api_base_url.clone(),
                session,
                events,
                catalog,
            }),
        })
    }

    /// The session store this client reads and clears.
    #[must_use]
    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.inner.session
    }

    /// The bus this client publishes change events on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Whether a session token is present.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.inner.session.has_session()
    }

    /// Send a request and return the body of a successful response.
    ///
    /// `path` is relative to the API base URL and must not start with `/`.
    #[instrument(skip(self, body), fields(request_id))]
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        auth: Auth,
    ) -> Result<String, ClientError> {
        let token = self.credential(auth)?;

        let url = self.inner.base_url.join(path).map_err(|e| {
            ClientError::Validation(format!("invalid request path '{path}': {e}"))
        })?;

        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let mut request = self
            .inner
            .http
            .request(method, url)
            .header(REQUEST_ID_HEADER, &request_id);
        if let Some(token) = &token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            let err = ClientError::from(e);
            tracing::warn!(error = %err, "request failed without a response");
            err
        })?;
        let status = response.status();
        let response_text = response.text().await?;

        if status.is_success() {
            debug!(status = %status, "request succeeded");
            return Ok(response_text);
        }

        let err = classify(status, &response_text, token.is_some());
        if matches!(err, ClientError::Unauthorized) {
            self.drop_session();
        }
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                body = %preview(&response_text),
                "API returned server error"
            );
        } else {
            tracing::warn!(status = %status, error = %err, "API rejected request");
        }
        Err(err)
    }

    /// Resolve the credential for a request, failing before any I/O when it
    /// is required but absent.
    fn credential(&self, auth: Auth) -> Result<Option<SecretString>, ClientError> {
        match auth {
            Auth::None => Ok(None),
            Auth::Access => self
                .inner
                .session
                .token()
                .map(Some)
                .ok_or(ClientError::SessionMissing),
            Auth::Refresh => self
                .inner
                .session
                .session()
                .and_then(|s| s.refresh_token)
                .map(Some)
                .ok_or(ClientError::SessionMissing),
        }
    }

    /// Clear the session after the server rejected its token.
    fn drop_session(&self) {
        match self.forget_session() {
            Ok(true) => {
                tracing::info!("session cleared after 401");
                self.publish_session_change();
            }
            Ok(false) => {}
            Err(e) => tracing::error!(error = %e, "failed to clear rejected session"),
        }
    }

    /// Clear the stored session. Returns whether there was one.
    ///
    /// Callers publish the session change once they know the outcome.
    fn forget_session(&self) -> Result<bool, ClientError> {
        let had_session = self.inner.session.has_session();
        self.inner.session.clear_session()?;
        Ok(had_session)
    }

    /// A new identity (or none) means different cart and wishlist contents.
    fn publish_session_change(&self) {
        self.inner.events.publish(ChangeEvent::CartUpdated);
        self.inner.events.publish(ChangeEvent::WishlistUpdated);
    }
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("has_session", &self.has_session())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Error body shape used by the API (`{"error": "..."}`, sometimes `message`).
#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Map a non-success response onto the error taxonomy.
///
/// `authenticated` says whether the request carried a token; a 401 on an
/// anonymous request (bad login credentials) is a plain rejection.
fn classify(status: StatusCode, body: &str, authenticated: bool) -> ClientError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .unwrap_or_else(|| preview(body));

    match status {
        StatusCode::UNAUTHORIZED if authenticated => ClientError::Unauthorized,
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        s if s.is_server_error() => ClientError::ServerError {
            status: s.as_u16(),
            message,
        },
        s => ClientError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

/// Parse a JSON body, logging a preview when it does not match.
fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %preview(body),
            "failed to parse API response"
        );
        ClientError::Decode(e)
    })
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

/// Percent-encode an id for use as a path segment.
fn segment(id: &str) -> Cow<'_, str> {
    urlencoding::encode(id)
}

/// Timeout used by tests that need a fast network failure.
#[cfg(test)]
const TEST_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(300);
