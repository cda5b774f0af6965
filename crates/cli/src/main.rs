//! Tienda CLI - cart, wishlist and checkout from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (prompts for the password when --password is omitted)
//! tienda login -e ana@example.com
//!
//! # Forgotten password
//! tienda password forgot -e ana@example.com
//! tienda password reset -t <TOKEN>
//!
//! # Browse the catalog
//! tienda products search "yerba"
//!
//! # Manage the cart
//! tienda cart add 64f1c0ffee -q 2
//! tienda cart dec 64f1c0ffee
//!
//! # Follow cart and wishlist changes live, typing commands on stdin
//! tienda watch
//! ```
//!
//! # Commands
//!
//! - `login` / `register` / `logout` / `session` - Session management
//! - `password` - Request a reset token and set a new password
//! - `products` - Public catalog
//! - `cart` - Cart lines and quantities
//! - `wishlist` - Saved products
//! - `checkout` / `order` - Orders
//! - `watch` - Drive live cart and wishlist views from stdin until Ctrl+C

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tienda_client::ClientConfig;

mod commands;
mod output;

use commands::Context;

#[derive(Parser)]
#[command(name = "tienda")]
#[command(author, version, about = "Tienda storefront client")]
struct Cli {
    /// Session file to use instead of `TIENDA_SESSION_FILE`
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Password (read from stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Create an account and sign in
    Register {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        username: String,

        /// Password, at least 6 characters (read from stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Reset a forgotten password
    Password {
        #[command(subcommand)]
        action: PasswordAction,
    },
    /// Show the stored session
    Session {
        /// Also fetch the profile from the server
        #[arg(long)]
        remote: bool,
    },
    /// Browse the catalog
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Place an order for the current cart
    Checkout(commands::checkout::CheckoutArgs),
    /// Inspect orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Mount cart and wishlist views, print every change and read
    /// commands from stdin
    Watch,
}

#[derive(Subcommand)]
enum PasswordAction {
    /// Request a reset token for an account
    Forgot {
        /// Account email
        #[arg(short, long)]
        email: String,
    },
    /// Set a new password with a reset token
    Reset {
        /// Token from the reset request
        #[arg(short, long)]
        token: String,

        /// New password, at least 6 characters (read from stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List active products
    List,
    /// Show one product
    Show { id: String },
    /// List products in a category
    Category { name: String },
    /// Search titles, descriptions and categories
    Search { query: String },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines and totals
    List,
    /// Add a product
    Add {
        id: String,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Add one unit
    Inc { id: String },
    /// Remove one unit (removes the line at quantity 1)
    Dec { id: String },
    /// Remove a line
    Remove { id: String },
}

#[derive(Subcommand)]
enum WishlistAction {
    /// Show saved products
    List,
    /// Save a product
    Add { id: String },
    /// Drop a product
    Remove { id: String },
    /// Check whether a product is saved
    Check { id: String },
    /// Flip a product's membership
    Toggle { id: String },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Show an order receipt
    Show { id: String },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

/// Logs go to stderr so command output on stdout stays clean.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tienda_client=info,tienda_cli=info".into());
    let json = std::env::var("TIENDA_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Sentry must be initialized before the tracing subscriber
    let config = ClientConfig::from_env();
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();
    if sentry_guard.is_some() {
        tracing::info!("Sentry initialized");
    }

    let result: Result<(), Box<dyn std::error::Error>> = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config = match cli.session_file {
        Some(path) => config.with_session_file(path),
        None => config,
    };
    let ctx = Context::new(config)?;

    match cli.command {
        Commands::Login { email, password } => {
            commands::account::login(&ctx, &email, password).await?;
        }
        Commands::Register {
            email,
            username,
            password,
        } => commands::account::register(&ctx, &email, &username, password).await?,
        Commands::Logout => commands::account::logout(&ctx)?,
        Commands::Password { action } => match action {
            PasswordAction::Forgot { email } => {
                commands::account::forgot_password(&ctx, &email).await?;
            }
            PasswordAction::Reset { token, password } => {
                commands::account::reset_password(&ctx, &token, password).await?;
            }
        },
        Commands::Session { remote } => commands::account::session(&ctx, remote).await?,
        Commands::Products { action } => match action {
            ProductsAction::List => commands::catalog::list(&ctx).await?,
            ProductsAction::Show { id } => commands::catalog::show(&ctx, &id).await?,
            ProductsAction::Category { name } => commands::catalog::category(&ctx, &name).await?,
            ProductsAction::Search { query } => commands::catalog::search(&ctx, &query).await?,
        },
        Commands::Cart { action } => match action {
            CartAction::List => commands::cart::list(&ctx).await?,
            CartAction::Add { id, quantity } => commands::cart::add(&ctx, &id, quantity).await?,
            CartAction::Inc { id } => commands::cart::increment(&ctx, &id).await?,
            CartAction::Dec { id } => commands::cart::decrement(&ctx, &id).await?,
            CartAction::Remove { id } => commands::cart::remove(&ctx, &id).await?,
        },
        Commands::Wishlist { action } => match action {
            WishlistAction::List => commands::wishlist::list(&ctx).await?,
            WishlistAction::Add { id } => commands::wishlist::add(&ctx, &id).await?,
            WishlistAction::Remove { id } => commands::wishlist::remove(&ctx, &id).await?,
            WishlistAction::Check { id } => commands::wishlist::check(&ctx, &id).await?,
            WishlistAction::Toggle { id } => commands::wishlist::toggle(&ctx, &id).await?,
        },
        Commands::Checkout(args) => commands::checkout::checkout(&ctx, args).await?,
        Commands::Order { action } => match action {
            OrderAction::Show { id } => commands::checkout::show_order(&ctx, &id).await?,
        },
        Commands::Watch => commands::watch::watch(&ctx).await?,
    }
    Ok(())
}
