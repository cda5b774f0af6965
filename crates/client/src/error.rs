//! Client error taxonomy and the user-facing notices derived from it.
//!
//! Every remote operation returns `Result<T, ClientError>`. Callers never
//! crash a view on these errors; they turn them into a transient [`Notice`]
//! with [`ClientError::notice`], and redirect to login when
//! [`ClientError::requires_login`] holds.

use std::fmt;

use thiserror::Error;

use tienda_core::{AccountError, CheckoutError};

use crate::session::SessionError;

/// Errors returned by [`crate::StoreClient`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No session token is stored; the request was never sent.
    #[error("no active session, log in first")]
    SessionMissing,

    /// The server rejected the token (401). The session has been cleared.
    #[error("session expired or rejected by the server")]
    Unauthorized,

    /// The resource does not exist (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// No response was received (connection failure or timeout).
    #[error("network failure: {message}")]
    NetworkFailure {
        /// Transport error description.
        message: String,
        /// Whether the configured timeout elapsed.
        timed_out: bool,
    },

    /// The server failed (5xx).
    #[error("server error ({status}): {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Server-provided message, if any.
        message: String,
    },

    /// The server refused the request for another client-side reason (4xx).
    #[error("request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-provided message, if any.
        message: String,
    },

    /// Local input validation failed; nothing was sent.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Reading or writing the persisted session failed.
    #[error("session storage error: {0}")]
    Session(#[from] SessionError),
}

impl ClientError {
    /// Whether the caller should send the user to the login screen.
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(self, Self::SessionMissing | Self::Unauthorized)
    }

    /// Whether re-triggering the same action may succeed.
    ///
    /// Nothing retries automatically; this only decides the notice wording.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure { .. } | Self::ServerError { .. })
    }

    /// Whether this is a 404, which removals treat as "already absent".
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The transient notification to show for this error.
    #[must_use]
    pub fn notice(&self) -> Notice {
        match self {
            Self::SessionMissing => Notice::info("Log in to continue"),
            Self::Unauthorized => {
                Notice::error("Session expired").with_detail("Please log in again")
            }
            Self::NotFound(_) => Notice::error("The item is no longer available"),
            Self::NetworkFailure { .. } => Notice::error("Connection problem")
                .with_detail("Check your connection and try again"),
            Self::ServerError { .. } | Self::Decode(_) => {
                Notice::error("Something went wrong").with_detail("Please try again later")
            }
            Self::Rejected { message, .. } | Self::Validation(message) => {
                Notice::error("Request not accepted").with_detail(message.clone())
            }
            Self::Session(_) => Notice::error("Could not save your session"),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkFailure {
            timed_out: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

impl From<AccountError> for ClientError {
    fn from(err: AccountError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<CheckoutError> for ClientError {
    fn from(err: CheckoutError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A short-lived, user-visible message (a toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub detail: Option<String>,
}

impl Notice {
    #[must_use]
    pub fn success(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, title)
    }

    #[must_use]
    pub fn info(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, title)
    }

    #[must_use]
    pub fn error(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title)
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn new(level: NoticeLevel, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            detail: None,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self.title),
            None => f.write_str(&self.title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_required_variants() {
        assert!(ClientError::SessionMissing.requires_login());
        assert!(ClientError::Unauthorized.requires_login());
        assert!(!ClientError::NotFound("x".to_string()).requires_login());
    }

    #[test]
    fn test_network_failure_is_retryable_and_keeps_session() {
        let err = ClientError::NetworkFailure {
            message: "connection refused".to_string(),
            timed_out: false,
        };
        assert!(err.is_retryable());
        assert!(!err.requires_login());
        assert_eq!(
            err.notice().to_string(),
            "Connection problem: Check your connection and try again"
        );
    }

    #[test]
    fn test_server_error_notice_is_generic() {
        let err = ClientError::ServerError {
            status: 503,
            message: "mongo down".to_string(),
        };
        let notice = err.notice();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(!notice.to_string().contains("mongo"));
    }

    #[test]
    fn test_validation_from_core_errors() {
        let err = ClientError::from(CheckoutError::MalformedCoupon);
        assert_eq!(err.to_string(), "invalid input: coupon code is malformed");
        assert_eq!(
            err.notice().detail.as_deref(),
            Some("coupon code is malformed")
        );
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::NotFound("product 42".to_string());
        assert_eq!(err.to_string(), "Not found: product 42");
    }
}
