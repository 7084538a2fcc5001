// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mandap provider CLI
//!
//! Drives the provider session from a terminal: log in, register, log out,
//! inspect the current session, or watch approval-status pushes live.

use clap::{Parser, Subcommand};
use mandap_provider::{config::Config, services::evaluate, ProviderApp};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mandap-provider", about = "Mandap provider session client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in as an approved provider
    Login { email: String, password: String },
    /// Create a provider account
    Register {
        name: String,
        email: String,
        password: String,
        phone: String,
    },
    /// End the current session
    Logout,
    /// Show the current session and route decision
    Status,
    /// Stay connected and follow approval-status changes
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    tracing::info!(api = %config.api_url, socket = %config.socket_url, "Starting mandap provider client");

    let app = ProviderApp::new(config)?;
    app.session.hydrate().await;

    let outcome = match cli.command {
        Command::Login { email, password } => app.auth.login(&email, &password).await.map(|_| ()),
        Command::Register {
            name,
            email,
            password,
            phone,
        } => app
            .auth
            .register(&name, &email, &password, &phone)
            .await
            .map(|_| ()),
        Command::Logout => app.auth.logout().await,
        Command::Status => Ok(()),
        Command::Watch => {
            watch(&app).await;
            Ok(())
        }
    };

    let state = app.session.snapshot();
    match &state.provider {
        Some(provider) => println!(
            "{} <{}> status={} route={:?}",
            provider.name,
            provider.email,
            provider.approval_status,
            evaluate(&state)
        ),
        None => println!("signed out route={:?}", evaluate(&state)),
    }
    for notification in app.notifications.list().iter().rev() {
        println!("[{:?}] {}", notification.level, notification.message);
    }

    app.shutdown();
    outcome.map_err(Into::into)
}

/// Follow session changes until Ctrl-C or the session ends.
async fn watch(app: &ProviderApp) {
    let mut changes = app.session.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = changes.borrow_and_update().clone();
                let decision = app.guard.check();
                tracing::info!(
                    authenticated = state.is_authenticated(),
                    status = %state.approval_status(),
                    decision = ?decision,
                    "Session changed"
                );
                if !state.is_authenticated() {
                    break;
                }
            }
        }
    }
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mandap_provider=debug,info")),
        )
        .with(format)
        .init();
}
