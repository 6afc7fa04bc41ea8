//! Incident CLI commands.
//!
//! Incident endpoints take an API key in addition to the session token.
//! The key secret is read from `VESSA_API_KEY` or prompted for; it is
//! held for this invocation only.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use vessa_core::error::AppError;
use vessa_core::result::AppResult;
use vessa_core::types::{ApiKeyId, IncidentId, PageRequest};
use vessa_entity::api_key::SecretKey;
use vessa_entity::incident::{IncidentQuery, IncidentRecord, IncidentSeverity, IncidentStatus};
use vessa_sync::{ActiveKey, Console};

use crate::output::{self, OutputFormat};

/// Environment variable holding the API key secret.
pub const API_KEY_ENV: &str = "VESSA_API_KEY";

/// Arguments for incident commands
#[derive(Debug, Args)]
pub struct IncidentArgs {
    /// ID of the API key to authenticate incident requests with
    #[arg(short, long, global = true)]
    pub key: Option<String>,

    /// Incident subcommand
    #[command(subcommand)]
    pub command: IncidentCommand,
}

/// Incident subcommands
#[derive(Debug, Subcommand)]
pub enum IncidentCommand {
    /// List incidents
    List {
        /// Page number (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: u64,
        /// Items per page
        #[arg(long, default_value_t = 20)]
        page_size: u64,
        /// Filter by severity
        #[arg(long)]
        severity: Option<IncidentSeverity>,
        /// Filter by status
        #[arg(long)]
        status: Option<IncidentStatus>,
        /// Filter by tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Show one incident
    Show {
        /// Incident ID
        id: String,
    },
    /// Mark an incident reviewed
    Review {
        /// Incident ID
        id: String,
    },
}

/// Incident display row
#[derive(Debug, Serialize, Tabled)]
struct IncidentRow {
    /// Incident ID
    id: String,
    /// Severity
    severity: String,
    /// Status
    status: String,
    /// Title
    title: String,
    /// Created
    created: String,
}

impl From<&IncidentRecord> for IncidentRow {
    fn from(i: &IncidentRecord) -> Self {
        Self {
            id: i.id.to_string(),
            severity: i.severity.to_string(),
            status: i.status.to_string(),
            title: output::truncate(&i.title, 60),
            created: output::timestamp(Some(i.created_at)),
        }
    }
}

/// Execute incident commands
pub async fn execute(args: &IncidentArgs, config_path: &str, format: OutputFormat) -> AppResult<()> {
    super::with_console(config_path, |console| async move {
        attach_api_key(&console, args.key.as_deref())?;
        let board = console.incidents().clone();

        match &args.command {
            IncidentCommand::List {
                page,
                page_size,
                severity,
                status,
                tag,
            } => {
                let query = IncidentQuery {
                    page: PageRequest::new(*page, *page_size),
                    severity: severity.clone(),
                    status: status.clone(),
                    tag: tag.clone(),
                };
                let Some(page) = board.load_page(query).await? else {
                    return Ok(());
                };
                let rows: Vec<IncidentRow> = page.items.iter().map(IncidentRow::from).collect();
                output::print_list(&rows, format);
                if format == OutputFormat::Table {
                    println!(
                        "Page {} of {} ({} incidents)",
                        page.page,
                        page.total_pages.max(1),
                        page.total_items
                    );
                }
                output::print_rate_limit(console.rate_limit(), format);
            }
            IncidentCommand::Show { id } => {
                let record = board.get(&IncidentId::new(id.as_str())).await?;
                output::print_record(&record, format);
            }
            IncidentCommand::Review { id } => {
                let record = board.review(&IncidentId::new(id.as_str())).await?;
                output::print_success(&format!("Incident {id} is now {}", record.status));
            }
        }
        Ok(())
    })
    .await
}

fn attach_api_key(console: &Console, key_id: Option<&str>) -> AppResult<()> {
    let key_id = key_id.ok_or_else(|| {
        AppError::validation("Incident commands need --key <API_KEY_ID>; see `vessa keys list`")
    })?;
    let secret = match std::env::var(API_KEY_ENV) {
        Ok(secret) if !secret.trim().is_empty() => secret,
        _ => dialoguer::Password::new()
            .with_prompt(format!("Secret for API key {key_id}"))
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?,
    };
    console.session().select_api_key(ActiveKey {
        id: ApiKeyId::new(key_id),
        secret: SecretKey::new(secret.trim()),
    })
}
