//! Notification CLI commands.

use std::collections::HashSet;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use vessa_core::result::AppResult;
use vessa_core::types::NotificationId;
use vessa_entity::notification::NotificationRecord;
use vessa_sync::{Console, MarkOutcome, PushListener, StoreEvent};

use crate::output::{self, OutputFormat};

/// Arguments for notification commands
#[derive(Debug, Args)]
pub struct NotificationArgs {
    /// Notification subcommand
    #[command(subcommand)]
    pub command: NotificationCommand,
}

/// Notification subcommands
#[derive(Debug, Subcommand)]
pub enum NotificationCommand {
    /// List recent notifications
    List {
        /// Only show unread notifications
        #[arg(short, long)]
        unread: bool,
    },
    /// Show the unread count
    Count,
    /// Show one notification with its findings
    Show {
        /// Notification ID
        id: String,
    },
    /// Mark a notification read
    Read {
        /// Notification ID
        id: String,
    },
    /// Mark every loaded notification read
    ReadAll,
    /// Keep refreshing and print alerts as they arrive
    Watch,
}

/// Notification display row
#[derive(Debug, Serialize, Tabled)]
struct NotificationRow {
    /// Notification ID
    id: String,
    /// Priority
    priority: String,
    /// Title
    title: String,
    /// Created
    created: String,
    /// Read
    read: String,
}

impl From<&NotificationRecord> for NotificationRow {
    fn from(n: &NotificationRecord) -> Self {
        Self {
            id: n.id.to_string(),
            priority: n.priority.to_string(),
            title: output::truncate(&n.title, 60),
            created: output::timestamp(Some(n.created_at)),
            read: if n.is_unread() { "" } else { "✓" }.to_string(),
        }
    }
}

/// Execute notification commands
pub async fn execute(
    args: &NotificationArgs,
    config_path: &str,
    format: OutputFormat,
) -> AppResult<()> {
    super::with_console(config_path, |console| async move {
        let store = console.store().clone();
        store.load().await?;

        match &args.command {
            NotificationCommand::List { unread } => {
                let records = if *unread { store.unread() } else { store.records() };
                let rows: Vec<NotificationRow> = records.iter().map(NotificationRow::from).collect();
                output::print_list(&rows, format);
                output::print_rate_limit(console.rate_limit(), format);
            }
            NotificationCommand::Count => {
                println!("Unread notifications: {}", store.unread_count());
            }
            NotificationCommand::Show { id } => {
                let record = store.get(&NotificationId::new(id.as_str())).ok_or_else(|| {
                    vessa_core::AppError::not_found(format!("Notification {id} is not loaded"))
                })?;
                output::print_record(&record, format);
            }
            NotificationCommand::Read { id } => {
                match store.mark_read(&NotificationId::new(id.as_str())).await? {
                    MarkOutcome::Marked => output::print_success(&format!("Marked {id} read")),
                    MarkOutcome::AlreadyRead => output::print_warning(&format!("{id} was already read")),
                }
            }
            NotificationCommand::ReadAll => match store.mark_all_read().await {
                Ok(count) => output::print_success(&format!("Marked {count} notifications read")),
                Err(err) => {
                    for failed in &err.failed {
                        output::print_error(&format!("{}: {}", failed.id, failed.error));
                    }
                    return Err(err.into());
                }
            },
            NotificationCommand::Watch => watch(&console, format).await?,
        }
        Ok(())
    })
    .await
}

async fn watch(console: &Console, format: OutputFormat) -> AppResult<()> {
    let controller = console.refresh_controller();
    let mut events = controller.subscribe();
    let mut seen: HashSet<NotificationId> =
        console.store().records().into_iter().map(|n| n.id).collect();
    let handle = controller.spawn();
    let push = console.push_listener(&controller).map(PushListener::spawn);

    println!(
        "Watching for alerts every {}s, {} unread. Press Ctrl+C to stop.",
        console.config().polling.interval_seconds,
        console.store().unread_count()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                console.shutdown();
                break;
            }
            event = events.recv() => match event {
                Ok(StoreEvent::Replaced { unread }) => {
                    let fresh: Vec<NotificationRecord> = console
                        .store()
                        .unread()
                        .into_iter()
                        .filter(|n| seen.insert(n.id.clone()))
                        .collect();
                    if !fresh.is_empty() {
                        let rows: Vec<NotificationRow> =
                            fresh.iter().map(NotificationRow::from).collect();
                        output::print_list(&rows, format);
                        println!("{unread} unread");
                    }
                }
                Ok(StoreEvent::ReadStateChanged { .. }) => {}
                Ok(StoreEvent::Cleared) | Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Watcher lagged behind store events");
                }
            }
        }
    }

    join_background("refresh", handle).await;
    if let Some(push) = push {
        join_background("push", push).await;
    }
    if let Some(err) = controller.status().last_error {
        output::print_warning(&format!("Last refresh failed: {err}"));
    }
    if !console.session().is_authenticated() {
        return Err(vessa_core::AppError::authentication(
            "Session ended. Run `vessa auth login` again.",
        ));
    }
    Ok(())
}

/// Wait for a background task and report whether it finished cleanly.
async fn join_background(name: &str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(task = name, error = %e, "Background task ended abnormally");
            false
        }
    }
}
