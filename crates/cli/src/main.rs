//! Storefront Sync CLI - Drive the cart, wishlist and account from a terminal.
//!
//! State persists in `STOREFRONT_DATA_DIR` between invocations: the guest
//! cart and wishlist, the session token, the encrypted user mirror and the
//! saved theme. Each run resumes the stored session, reconciles the
//! collections with it, runs one command and pushes pending changes before
//! exiting.
//!
//! # Usage
//!
//! ```bash
//! # Add a product to the cart (guest or signed in)
//! sfs cart add --product-id p1 --name "Ring" --slug ring --price 500
//!
//! # Show the cart with totals
//! sfs cart show
//!
//! # Sign in; the guest cart and wishlist are merged into the account
//! sfs auth login --email a@b.co --password hunter22
//!
//! # Print the theme as CSS custom properties
//! sfs theme css
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_sync_client::config::{ClientConfig, ConfigError};
use storefront_sync_client::notifications::{ToastSink, TracingSink};
use storefront_sync_client::{ClientError, Storefront};

mod commands;

use commands::auth::AuthAction;
use commands::cart::CartAction;
use commands::notifications::NotificationAction;
use commands::theme::ThemeAction;
use commands::wishlist::WishlistAction;

#[derive(Parser)]
#[command(name = "sfs")]
#[command(author, version, about = "Storefront Sync CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shopping cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Saved products
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Sign in, sign out, account details
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Notification inbox
    Notifications {
        #[command(subcommand)]
        action: NotificationAction,
    },
    /// Theme settings
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
    },
}

/// Errors that end a CLI run.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("Invalid JSON in --{field}: {source}")]
    InvalidJson {
        field: &'static str,
        source: serde_json::Error,
    },
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to warnings only so command output stays readable
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn,storefront_sync_client=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    let storefront = Storefront::open(config)?;

    if let Err(e) = storefront.auth().restore().await {
        tracing::warn!(error = %e, "Continuing as guest");
    }
    storefront.reconcile().await;

    let result = match cli.command {
        Commands::Cart { action } => commands::cart::run(&storefront, action).await,
        Commands::Wishlist { action } => commands::wishlist::run(&storefront, action).await,
        Commands::Auth { action } => commands::auth::run(&storefront, action).await,
        Commands::Notifications { action } => {
            commands::notifications::run(&storefront, action).await
        }
        Commands::Theme { action } => commands::theme::run(&storefront, action),
    };

    // Login and logout change the session; apply it before pushing
    storefront.reconcile().await;
    if let Err(e) = storefront.flush().await {
        tracing::warn!(error = %e, "Some changes were not synced");
    }
    drain_toasts(&storefront);

    result
}

/// Show every queued toast at once; there is no screen to pace them on.
fn drain_toasts(storefront: &Storefront) {
    let sink = TracingSink;
    while let Some(toast) = storefront.notifications().next_toast() {
        sink.show(&toast);
    }
}
