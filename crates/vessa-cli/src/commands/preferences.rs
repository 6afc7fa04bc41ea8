//! Notification preference CLI commands.

use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use tabled::Tabled;

use vessa_core::result::AppResult;
use vessa_core::types::PreferenceId;
use vessa_entity::notification::{
    NewPreference, NotificationChannel, NotificationPreference, PreferencePriority,
    PreferenceUpdate,
};
use vessa_gateway::NotificationGateway;

use crate::output::{self, OutputFormat};

/// Arguments for preference commands
#[derive(Debug, Args)]
pub struct PreferenceArgs {
    /// Preference subcommand
    #[command(subcommand)]
    pub command: PreferenceCommand,
}

/// Delivery channel argument
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ChannelArg {
    Email,
    Websocket,
    Webhook,
}

impl From<ChannelArg> for NotificationChannel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Email => Self::Email,
            ChannelArg::Websocket => Self::Websocket,
            ChannelArg::Webhook => Self::Webhook,
        }
    }
}

/// Minimum priority argument
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<PriorityArg> for PreferencePriority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Self::Low,
            PriorityArg::Medium => Self::Medium,
            PriorityArg::High => Self::High,
            PriorityArg::Critical => Self::Critical,
        }
    }
}

/// Preference subcommands
#[derive(Debug, Subcommand)]
pub enum PreferenceCommand {
    /// List delivery preferences
    List,
    /// Add a delivery preference
    Add {
        /// Delivery channel
        #[arg(value_enum)]
        channel: ChannelArg,
        /// Lowest priority to deliver
        #[arg(short, long, value_enum, default_value = "low")]
        min_priority: PriorityArg,
        /// Webhook target URL
        #[arg(long)]
        webhook_url: Option<String>,
        /// Email override address
        #[arg(long)]
        email: Option<String>,
        /// Create the preference switched off
        #[arg(long)]
        disabled: bool,
    },
    /// Change a delivery preference
    Update {
        /// Preference ID
        id: String,
        /// Switch delivery on or off
        #[arg(long)]
        enabled: Option<bool>,
        /// Lowest priority to deliver
        #[arg(short, long, value_enum)]
        min_priority: Option<PriorityArg>,
        /// Webhook target URL
        #[arg(long)]
        webhook_url: Option<String>,
        /// Email override address
        #[arg(long)]
        email: Option<String>,
    },
    /// Remove a delivery preference
    Remove {
        /// Preference ID
        id: String,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

/// Preference display row
#[derive(Debug, Serialize, Tabled)]
struct PreferenceRow {
    /// Preference ID
    id: String,
    /// Channel
    channel: String,
    /// Enabled
    enabled: String,
    /// Minimum priority
    min_priority: String,
    /// Target
    target: String,
}

impl From<&NotificationPreference> for PreferenceRow {
    fn from(p: &NotificationPreference) -> Self {
        Self {
            id: p.id.to_string(),
            channel: p.channel.to_string(),
            enabled: if p.enabled { "✓" } else { "✗" }.to_string(),
            min_priority: p.min_priority.to_string(),
            target: p
                .webhook_url
                .clone()
                .or_else(|| p.email_address.clone())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Execute preference commands
pub async fn execute(
    args: &PreferenceArgs,
    config_path: &str,
    format: OutputFormat,
) -> AppResult<()> {
    super::with_console(config_path, |console| async move {
        let gateway = console.gateway().clone();

        match &args.command {
            PreferenceCommand::List => {
                let preferences = gateway.list_preferences().await?;
                let rows: Vec<PreferenceRow> = preferences.iter().map(PreferenceRow::from).collect();
                output::print_list(&rows, format);
            }
            PreferenceCommand::Add {
                channel,
                min_priority,
                webhook_url,
                email,
                disabled,
            } => {
                let request = NewPreference {
                    enabled: !disabled,
                    min_priority: (*min_priority).into(),
                    webhook_url: webhook_url.clone(),
                    email_address: email.clone(),
                    ..NewPreference::new((*channel).into())
                };
                let created = gateway.create_preference(&request).await?;
                output::print_success(&format!("Preference {} created", created.id));
                output::print_list(&[PreferenceRow::from(&created)], format);
            }
            PreferenceCommand::Update {
                id,
                enabled,
                min_priority,
                webhook_url,
                email,
            } => {
                let update = PreferenceUpdate {
                    enabled: *enabled,
                    min_priority: min_priority.map(Into::into),
                    webhook_url: webhook_url.clone(),
                    email_address: email.clone(),
                };
                let updated = gateway
                    .update_preference(&PreferenceId::new(id.as_str()), &update)
                    .await?;
                output::print_success(&format!("Preference {id} updated"));
                output::print_list(&[PreferenceRow::from(&updated)], format);
            }
            PreferenceCommand::Remove { id, force } => {
                if !super::confirm(&format!("Remove preference {id}?"), *force)? {
                    println!("Cancelled.");
                    return Ok(());
                }
                gateway
                    .delete_preference(&PreferenceId::new(id.as_str()))
                    .await?;
                output::print_success(&format!("Preference {id} removed"));
            }
        }
        Ok(())
    })
    .await
}
