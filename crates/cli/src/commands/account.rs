//! Session commands: login, register, logout, session, password reset.

use secrecy::{ExposeSecret, SecretString};

use tienda_client::Notice;
use tienda_client::token::{self, TokenExpiry};

use super::{CliError, Context, report};
use crate::output;

/// Use the password given on the command line, or read one line from stdin.
fn read_password(arg: Option<String>) -> Result<SecretString, CliError> {
    if let Some(password) = arg {
        return Ok(SecretString::from(password));
    }

    output::prompt("Password: ")?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(CliError::InvalidArgument("password is required".to_string()));
    }
    Ok(SecretString::from(password))
}

/// Log in and persist the session.
///
/// # Errors
///
/// Returns an error for bad credentials or if the session cannot be saved.
pub async fn login(ctx: &Context, email: &str, password: Option<String>) -> Result<(), CliError> {
    let password = read_password(password)?;
    let session = ctx
        .client
        .login(email, password.expose_secret())
        .await
        .map_err(report)?;

    let name = session
        .user
        .as_ref()
        .and_then(|u| u.name.clone())
        .unwrap_or_else(|| email.trim().to_string());
    output::notice(&Notice::success(format!("Logged in as {name}")));
    tracing::debug!(session_file = %ctx.config.session_file.display(), "session saved");
    Ok(())
}

/// Create an account and persist the session.
///
/// # Errors
///
/// Returns an error for invalid input, an existing account, or if the
/// session cannot be saved.
pub async fn register(
    ctx: &Context,
    email: &str,
    username: &str,
    password: Option<String>,
) -> Result<(), CliError> {
    let password = read_password(password)?;
    ctx.client
        .register(email, username, password.expose_secret())
        .await
        .map_err(report)?;

    output::notice(&Notice::success(format!("Welcome, {}", username.trim())));
    Ok(())
}

/// Forget the stored session. Succeeds when already logged out.
///
/// # Errors
///
/// Returns an error if the session file cannot be removed.
pub fn logout(ctx: &Context) -> Result<(), CliError> {
    let had_session = ctx.client.has_session();
    ctx.client.logout()?;

    if had_session {
        output::notice(&Notice::success("Logged out"));
    } else {
        output::notice(&Notice::info("No session to log out of"));
    }
    Ok(())
}

/// Request a password reset token.
///
/// # Errors
///
/// Returns an error for a malformed or unknown email.
pub async fn forgot_password(ctx: &Context, email: &str) -> Result<(), CliError> {
    let token = ctx
        .client
        .request_password_reset(email)
        .await
        .map_err(report)?;

    output::notice(&Notice::success("Password reset requested"));
    match token {
        Some(token) => {
            output::line(format!("Reset token: {}", token.expose_secret()));
            output::line("Run `tienda password reset --token <TOKEN>` to set a new password");
        }
        None => output::line("Check your email for the reset link"),
    }
    Ok(())
}

/// Set a new password with a reset token. The stored session is untouched.
///
/// # Errors
///
/// Returns an error for a short password or an invalid or expired token.
pub async fn reset_password(
    ctx: &Context,
    token: &str,
    password: Option<String>,
) -> Result<(), CliError> {
    let password = read_password(password)?;
    ctx.client
        .reset_password(token, password.expose_secret())
        .await
        .map_err(report)?;

    output::notice(&Notice::success("Password updated, you can log in now"));
    Ok(())
}

/// Describe the stored session, optionally confirming it with the server.
///
/// # Errors
///
/// Returns an error if `remote` is set and the profile request fails.
pub async fn session(ctx: &Context, remote: bool) -> Result<(), CliError> {
    let Some(session) = ctx.client.session().session() else {
        output::notice(&Notice::info("Not logged in"));
        return Ok(());
    };

    if let Some(user) = &session.user {
        let name = user.name.as_deref().unwrap_or("-");
        let email = user.email.as_deref().unwrap_or("-");
        output::line(format!("User:    {name} <{email}> ({})", user.id));
    }

    let expiry = token::expiry(session.access_token.expose_secret(), chrono::Utc::now());
    let status = match expiry {
        TokenExpiry::Unknown => "no readable expiry".to_string(),
        TokenExpiry::ValidUntil(at) => format!("valid until {}", at.format("%Y-%m-%d %H:%M UTC")),
        TokenExpiry::Expired(at) => format!("expired at {}", at.format("%Y-%m-%d %H:%M UTC")),
    };
    output::line(format!("Token:   {status}"));
    output::line(format!(
        "Refresh: {}",
        if session.refresh_token.is_some() { "stored" } else { "none" }
    ));

    if remote {
        if !expiry.is_usable() && session.refresh_token.is_some() {
            ctx.client.refresh_session().await.map_err(report)?;
            output::notice(&Notice::success("Access token refreshed"));
        }
        let profile = ctx.client.profile().await.map_err(report)?;
        let role = profile.role.as_deref().unwrap_or("user");
        output::line(format!(
            "Server:  {} <{}> role={role}",
            profile.username, profile.email
        ));
    }
    Ok(())
}
