//! CLI command implementations.

pub mod account;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod watch;
pub mod wishlist;

use std::sync::Arc;

use thiserror::Error;

use tienda_client::{
    ClientConfig, ClientError, EventBus, FileSessionStore, SessionError, StoreClient,
};
use tienda_core::CheckoutError;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("session file: {0}")]
    Session(#[from] SessionError),

    #[error("checkout: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    InvalidArgument(String),
}

/// Everything a command needs: the configuration and a client bound to the
/// persisted session.
pub struct Context {
    pub config: ClientConfig,
    pub client: StoreClient,
}

impl Context {
    /// Open the session file and build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file is unreadable or the HTTP client
    /// cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, CliError> {
        let session = Arc::new(FileSessionStore::open(&config.session_file)?);
        let client = StoreClient::new(&config, session, EventBus::new())?;
        Ok(Self { config, client })
    }
}

/// Log the user-facing notice for a failed request and hand the error back.
///
/// Login-required errors also get a hint on how to sign in.
pub fn report(err: ClientError) -> CliError {
    tracing::warn!("{}", err.notice());
    if err.requires_login() {
        tracing::info!("Run `tienda login --email <EMAIL>` to sign in");
    }
    CliError::Client(err)
}
