//! API key CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use vessa_core::result::AppResult;
use vessa_core::types::ApiKeyId;
use vessa_entity::api_key::{ApiKeyRecord, NewApiKey};
use vessa_sync::IssuedKey;

use crate::output::{self, OutputFormat};

/// Arguments for API key commands
#[derive(Debug, Args)]
pub struct KeyArgs {
    /// Key subcommand
    #[command(subcommand)]
    pub command: KeyCommand,
}

/// API key subcommands
#[derive(Debug, Subcommand)]
pub enum KeyCommand {
    /// List API keys
    List,
    /// Create a key and print its secret once
    Create {
        /// Key name
        name: String,
        /// Expire the key after this many days
        #[arg(long)]
        expires_in_days: Option<u32>,
    },
    /// Issue a new secret; the old one stops working
    Regenerate {
        /// Key ID
        id: String,
    },
    /// Re-enable a key
    Activate {
        /// Key ID
        id: String,
    },
    /// Disable a key without deleting it
    Deactivate {
        /// Key ID
        id: String,
    },
    /// Delete a key
    Delete {
        /// Key ID
        id: String,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

/// API key display row
#[derive(Debug, Serialize, Tabled)]
struct KeyRow {
    /// Key ID
    id: String,
    /// Name
    name: String,
    /// State
    state: String,
    /// Created
    created: String,
    /// Expires
    expires: String,
    /// Last used
    last_used: String,
}

impl From<&ApiKeyRecord> for KeyRow {
    fn from(k: &ApiKeyRecord) -> Self {
        let state = if k.is_expired() {
            "expired"
        } else {
            k.state().as_str()
        };
        Self {
            id: k.id.to_string(),
            name: k.name.clone(),
            state: state.to_string(),
            created: output::timestamp(Some(k.created_at)),
            expires: output::timestamp(k.expires_at),
            last_used: output::timestamp(k.last_used_at),
        }
    }
}

/// Execute API key commands
pub async fn execute(args: &KeyArgs, config_path: &str, format: OutputFormat) -> AppResult<()> {
    super::with_console(config_path, |console| async move {
        let keys = console.keys().clone();
        keys.refresh().await?;

        match &args.command {
            KeyCommand::List => {
                let rows: Vec<KeyRow> = keys.keys().iter().map(KeyRow::from).collect();
                output::print_list(&rows, format);
            }
            KeyCommand::Create {
                name,
                expires_in_days,
            } => {
                let request = NewApiKey {
                    expires_in_days: *expires_in_days,
                    ..NewApiKey::new(name.as_str())
                };
                print_issued(&keys.create(&request).await?, format);
            }
            KeyCommand::Regenerate { id } => {
                print_issued(&keys.regenerate(&ApiKeyId::new(id.as_str())).await?, format);
            }
            KeyCommand::Activate { id } => {
                let record = keys.activate(&ApiKeyId::new(id.as_str())).await?;
                output::print_success(&format!("API key {} activated", record.name));
            }
            KeyCommand::Deactivate { id } => {
                let record = keys.deactivate(&ApiKeyId::new(id.as_str())).await?;
                output::print_success(&format!("API key {} deactivated", record.name));
            }
            KeyCommand::Delete { id, force } => {
                if !super::confirm(&format!("Delete API key {id}? This cannot be undone."), *force)? {
                    println!("Cancelled.");
                    return Ok(());
                }
                keys.delete(&ApiKeyId::new(id.as_str())).await?;
                output::print_success(&format!("API key {id} deleted"));
            }
        }
        Ok(())
    })
    .await
}

#[derive(Serialize)]
struct IssuedOutput<'a> {
    id: &'a ApiKeyId,
    name: &'a str,
    secret: &'a str,
}

fn print_issued(issued: &IssuedKey, format: OutputFormat) {
    match format {
        OutputFormat::Json => output::print_record(
            &IssuedOutput {
                id: &issued.record.id,
                name: &issued.record.name,
                secret: issued.secret.reveal(),
            },
            format,
        ),
        OutputFormat::Table => {
            output::print_success(&format!("API key {} issued", issued.record.name));
            output::print_kv("ID", issued.record.id.as_str());
            output::print_kv("Secret", issued.secret.reveal());
            output::print_warning("Store the secret now. It will not be shown again.");
        }
    }
}
