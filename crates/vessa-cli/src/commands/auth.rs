//! Authentication CLI commands.

use clap::{Args, Subcommand};

use vessa_core::error::AppError;
use vessa_core::result::AppResult;
use vessa_entity::auth::{Credentials, Registration};
use vessa_sync::SessionState;

use crate::output::{self, OutputFormat};
use crate::token_store;

/// Arguments for auth commands
#[derive(Debug, Args)]
pub struct AuthArgs {
    /// Auth subcommand
    #[command(subcommand)]
    pub command: AuthCommand,
}

/// Auth subcommands
#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Sign in and save the session token
    Login {
        /// Account email or username
        username: String,
    },
    /// Create an account
    Register {
        /// Email address
        email: String,
        /// Display name
        name: String,
    },
    /// Sign out and forget the saved token
    Logout,
    /// Show the signed-in account
    Whoami,
}

/// Execute auth commands
pub async fn execute(args: &AuthArgs, config_path: &str, format: OutputFormat) -> AppResult<()> {
    let console = super::open_console(config_path).await?;
    let token_file = console.config().session.token_file.clone();

    match &args.command {
        AuthCommand::Login { username } => {
            let password = prompt_password("Password", false)?;
            console
                .login(&Credentials::new(username.clone(), password))
                .await?;
            let token = console
                .session()
                .token()
                .ok_or_else(|| AppError::internal("Sign-in did not produce a token"))?;
            token_store::save(&token_file, &token).await?;
            output::print_success(&format!("Signed in as {username}"));
        }
        AuthCommand::Register { email, name } => {
            let password = prompt_password("Password", true)?;
            let profile = console
                .register(&Registration {
                    email: email.clone(),
                    name: name.clone(),
                    password,
                })
                .await?;
            output::print_success(&format!("Account {} created", profile.email));
            output::print_record(&profile, format);
        }
        AuthCommand::Logout => {
            console.logout();
            token_store::remove(&token_file).await?;
            output::print_success("Signed out");
        }
        AuthCommand::Whoami => match console.session().state() {
            SessionState::Authenticated { claims, .. } => match claims {
                Some(claims) => {
                    output::print_kv("Subject", &claims.sub);
                    output::print_kv("Email", claims.email.as_deref().unwrap_or("-"));
                    output::print_kv("Expires", &output::timestamp(claims.expires_at()));
                }
                None => output::print_kv("Session", "signed in (opaque token)"),
            },
            _ => output::print_warning("Not signed in"),
        },
    }

    Ok(())
}

fn prompt_password(prompt: &str, confirm: bool) -> AppResult<String> {
    let mut input = dialoguer::Password::new().with_prompt(prompt);
    if confirm {
        input = input.with_confirmation("Repeat password", "Passwords do not match");
    }
    input
        .interact()
        .map_err(|e| AppError::internal(format!("Input error: {e}")))
}
