//! Account credentials validated before they are sent to the auth endpoints.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors produced while validating login or registration input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// The email is empty.
    #[error("email cannot be empty")]
    EmptyEmail,
    /// The email is longer than RFC 5321 allows.
    #[error("email must be at most {max} characters")]
    EmailTooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The email is not `local@domain.tld`.
    #[error("email format is not valid")]
    MalformedEmail,
    /// The username is empty after trimming.
    #[error("username cannot be empty")]
    EmptyUsername,
    /// The password is shorter than the server minimum.
    #[error("password must be at least {min} characters")]
    PasswordTooShort {
        /// Minimum length.
        min: usize,
    },
}

/// A normalized email address.
///
/// Input is trimmed and lower-cased, mirroring what the registration
/// endpoint stores.
///
/// ## Constraints
///
/// - Length: 1-254 characters
/// - Exactly one `@` with a non-empty local part
/// - The domain contains a dot with characters on both sides
///
/// ## Examples
///
/// ```
/// use tienda_core::Email;
///
/// assert_eq!(Email::parse("  Ana@Example.com ").unwrap().as_str(), "ana@example.com");
/// assert!(Email::parse("ana@localhost").is_err());
/// assert!(Email::parse("@example.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse and normalize an email address.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or not shaped like
    /// `local@domain.tld`.
    pub fn parse(s: &str) -> Result<Self, AccountError> {
        let normalized = s.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(AccountError::EmptyEmail);
        }
        if normalized.len() > Self::MAX_LENGTH {
            return Err(AccountError::EmailTooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let (local, domain) = normalized
            .split_once('@')
            .ok_or(AccountError::MalformedEmail)?;
        let local_ok = !local.is_empty() && local.chars().all(is_address_char);
        let domain_ok = domain.chars().all(is_address_char)
            && domain
                .rsplit_once('.')
                .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty());
        if !local_ok || !domain_ok {
            return Err(AccountError::MalformedEmail);
        }

        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

const fn is_address_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+')
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A trimmed, non-empty username.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// # Errors
    ///
    /// Returns [`AccountError::EmptyUsername`] when nothing is left after trimming.
    pub fn parse(s: &str) -> Result<Self, AccountError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AccountError::EmptyUsername);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A password that satisfies the registration length rule.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Minimum accepted length.
    pub const MIN_LENGTH: usize = 6;

    /// # Errors
    ///
    /// Returns [`AccountError::PasswordTooShort`] below [`Self::MIN_LENGTH`] characters.
    pub fn parse(s: &str) -> Result<Self, AccountError> {
        if s.chars().count() < Self::MIN_LENGTH {
            return Err(AccountError::PasswordTooShort {
                min: Self::MIN_LENGTH,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// The raw password, for building the request body.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_emails() {
        assert!(Email::parse("user@example.com").is_ok());
        assert!(Email::parse("user.name+tag@example.com").is_ok());
        assert!(Email::parse("user@sub.example.com.ar").is_ok());
    }

    #[test]
    fn test_email_is_normalized() {
        let email = Email::parse("  USER@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "user@example.com");
    }

    #[test]
    fn test_parse_invalid_emails() {
        assert_eq!(Email::parse("   "), Err(AccountError::EmptyEmail));
        assert_eq!(Email::parse("no-at"), Err(AccountError::MalformedEmail));
        assert_eq!(Email::parse("@x.com"), Err(AccountError::MalformedEmail));
        assert_eq!(Email::parse("a@nodot"), Err(AccountError::MalformedEmail));
        assert_eq!(Email::parse("a@b@c.com"), Err(AccountError::MalformedEmail));
        assert_eq!(Email::parse("a b@c.com"), Err(AccountError::MalformedEmail));
    }

    #[test]
    fn test_email_too_long() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            Email::parse(&long),
            Err(AccountError::EmailTooLong { max: 254 })
        ));
    }

    #[test]
    fn test_username_trimmed() {
        assert_eq!(Username::parse("  ana ").unwrap().as_str(), "ana");
        assert_eq!(Username::parse("  "), Err(AccountError::EmptyUsername));
    }

    #[test]
    fn test_password_length_and_redaction() {
        assert!(Password::parse("12345").is_err());
        let password = Password::parse("hunter22").unwrap();
        assert_eq!(password.expose(), "hunter22");
        assert!(!format!("{password:?}").contains("hunter22"));
    }
}
