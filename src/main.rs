//! Vessa alert watcher.
//!
//! Keeps a signed-in console refreshing in the background and logs every
//! new unread alert. Intended to run under a supervisor next to the
//! dashboard; it exits when the gateway ends the session.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{EnvFilter, fmt};

use vessa_core::config::AppConfig;
use vessa_core::error::AppError;
use vessa_core::types::NotificationId;
use vessa_sync::{Console, PushListener, Session, StoreEvent};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Watcher stopped: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration for the selected environment
fn load_configuration() -> Result<AppConfig, AppError> {
    match std::env::var("VESSA_CONFIG") {
        Ok(path) => AppConfig::load_file(&path),
        Err(_) => {
            let env = std::env::var("VESSA_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Bearer token from `VESSA_TOKEN`, else the CLI's saved session file.
async fn resolve_token(config: &AppConfig) -> Result<String, AppError> {
    if let Ok(token) = std::env::var("VESSA_TOKEN") {
        if !token.trim().is_empty() {
            return Ok(token.trim().to_string());
        }
    }
    let path = &config.session.token_file;
    match tokio::fs::read_to_string(path).await {
        Ok(contents) if !contents.trim().is_empty() => Ok(contents.trim().to_string()),
        _ => Err(AppError::authentication(format!(
            "No session token: set VESSA_TOKEN or sign in with `vessa auth login` ({})",
            path.display()
        ))),
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting vessa-watch v{}", env!("CARGO_PKG_VERSION"));

    let token = resolve_token(&config).await?;
    let session = Arc::new(Session::with_token(token)?);
    let console = Console::with_session(config, session)?;

    let controller = console.refresh_controller();
    let mut events = controller.subscribe();
    let handle = controller.spawn();
    let push = console.push_listener(&controller).map(PushListener::spawn);
    let mut seen: HashSet<NotificationId> = HashSet::new();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    tracing::info!(
        interval_seconds = console.config().polling.interval_seconds,
        push = push.is_some(),
        "Watching for alerts"
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                console.shutdown();
                break;
            }
            event = events.recv() => match event {
                Ok(StoreEvent::Replaced { unread }) => {
                    report_new_alerts(&console, &mut seen);
                    tracing::debug!(unread, "Notifications refreshed");
                }
                Ok(StoreEvent::ReadStateChanged { .. }) => {}
                Ok(StoreEvent::Cleared) | Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Watcher fell behind store events");
                }
            }
        }
    }

    if let Err(e) = handle.await {
        tracing::warn!("Refresh task ended abnormally: {}", e);
    }
    if let Some(push) = push {
        if let Err(e) = push.await {
            tracing::warn!("Push listener ended abnormally: {}", e);
        }
    }

    if !console.session().is_authenticated() && !console.is_shut_down() {
        return Err(AppError::authentication("Session ended by the gateway"));
    }
    tracing::info!("vessa-watch stopped");
    Ok(())
}

fn report_new_alerts(console: &Console, seen: &mut HashSet<NotificationId>) {
    for alert in console.store().unread() {
        if seen.insert(alert.id.clone()) {
            tracing::warn!(
                notification_id = %alert.id,
                priority = %alert.priority,
                incident_id = alert.incident_id.as_deref().unwrap_or("-"),
                "{}",
                alert.title
            );
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
