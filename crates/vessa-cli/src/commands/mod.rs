//! CLI command definitions and dispatch.

pub mod auth;
pub mod incidents;
pub mod keys;
pub mod notifications;
pub mod preferences;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use vessa_core::config::AppConfig;
use vessa_core::error::AppError;
use vessa_core::result::AppResult;
use vessa_sync::{Console, Session};

use crate::output::OutputFormat;
use crate::token_store;

/// Vessa console: alerts, incidents and API keys from the terminal
#[derive(Debug, Parser)]
#[command(name = "vessa", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in, sign out and account management
    Auth(auth::AuthArgs),
    /// Alert notifications
    Notifications(notifications::NotificationArgs),
    /// Notification delivery preferences
    Preferences(preferences::PreferenceArgs),
    /// Security incidents
    Incidents(incidents::IncidentArgs),
    /// API key management
    Keys(keys::KeyArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> AppResult<()> {
        match &self.command {
            Commands::Auth(args) => auth::execute(args, &self.config, self.format).await,
            Commands::Notifications(args) => {
                notifications::execute(args, &self.config, self.format).await
            }
            Commands::Preferences(args) => {
                preferences::execute(args, &self.config, self.format).await
            }
            Commands::Incidents(args) => incidents::execute(args, &self.config, self.format).await,
            Commands::Keys(args) => keys::execute(args, &self.config, self.format).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> AppResult<AppConfig> {
    AppConfig::load_file(config_path)
}

/// Helper: build a console, resuming the saved session if there is one.
pub async fn open_console(config_path: &str) -> AppResult<Console> {
    let config = load_config(config_path)?;
    let session = match token_store::load(&config.session.token_file).await? {
        Some(token) => match Session::with_token(token) {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!(error = %e, "Discarding saved session");
                token_store::remove(&config.session.token_file).await?;
                Session::new()
            }
        },
        None => Session::new(),
    };
    Console::with_session(config, Arc::new(session))
}

/// Helper: build a console that must already be signed in.
pub async fn signed_in_console(config_path: &str) -> AppResult<Console> {
    let console = open_console(config_path).await?;
    if !console.session().is_authenticated() {
        return Err(AppError::authentication(
            "Not signed in. Run `vessa auth login` first.",
        ));
    }
    Ok(console)
}

/// Drop the saved token once the gateway has refused it.
pub async fn forget_rejected_session(console: &Console, err: &AppError) -> AppResult<()> {
    if !console.session().is_authenticated() && err.kind == vessa_core::ErrorKind::Authentication
    {
        token_store::remove(&console.config().session.token_file).await?;
    }
    Ok(())
}

/// Run `work` against a signed-in console and clean up a rejected session.
pub async fn with_console<T, F, Fut>(config_path: &str, work: F) -> AppResult<T>
where
    F: FnOnce(Arc<Console>) -> Fut,
    Fut: std::future::Future<Output = AppResult<T>>,
{
    let console = Arc::new(signed_in_console(config_path).await?);
    let result = work(console.clone()).await;
    if let Err(err) = &result {
        forget_rejected_session(&console, err).await?;
    }
    result
}

/// Helper: ask for confirmation unless `force` is set.
pub fn confirm(prompt: &str, force: bool) -> AppResult<bool> {
    if force {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| AppError::internal(format!("Input error: {e}")))
}
