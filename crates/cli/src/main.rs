//! Bazaar CLI - the storefront in a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Start the interactive shell
//! bazaar
//!
//! # Run a single command and exit
//! bazaar cart show
//! bazaar products --category shirts --sort price_asc
//!
//! # Skip the startup session check and catalog preload
//! bazaar --offline notifications list
//! ```
//!
//! Configuration is read from the environment (see
//! [`bazaar_storefront::config`]). Logs go to stderr so command output stays
//! clean on stdout.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use bazaar_storefront::{Storefront, StorefrontConfig};
use clap::Parser;
use sentry::integrations::tracing as sentry_tracing;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod render;
mod shell;

use shell::Shell;

#[derive(Parser)]
#[command(name = "bazaar")]
#[command(author, version, about = "Bazaar storefront in your terminal")]
struct Cli {
    /// Skip the startup session check and catalog preload
    #[arg(long)]
    offline: bool,

    /// Command to run instead of starting the shell
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
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

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt().with_writer(std::io::stderr).init();
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bazaar_storefront=warn,bazaar_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let storefront = match Storefront::new(config) {
        Ok(storefront) => storefront,
        Err(e) => {
            tracing::error!("Failed to start storefront: {e}");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_ctrl_c(cancel.clone()));
    let watcher = storefront.spawn_session_watcher(cancel.child_token());

    if !cli.offline {
        match storefront.spawn_bootstrap(cancel.child_token()).await {
            Ok(Some(report)) => tracing::info!(
                authenticated = report.authenticated,
                featured = report.featured.map_or(0, |page| page.products.len()),
                "Startup complete"
            ),
            Ok(None) => return ExitCode::SUCCESS,
            Err(e) => tracing::error!("Bootstrap task failed: {e}"),
        }
    }

    let input = BufReader::new(tokio::io::stdin());
    let mut shell = Shell::new(storefront, input, std::io::stdout());

    let result = if cli.command.is_empty() {
        shell.run(&cancel).await
    } else {
        shell.run_once(cli.command).await
    };

    cancel.cancel();
    let _ = watcher.await;

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("Terminal I/O failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Cancel `token` on Ctrl+C.
async fn shutdown_on_ctrl_c(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to install Ctrl+C handler: {e}");
        return;
    }
    tracing::info!("Interrupted, shutting down");
    token.cancel();
}
