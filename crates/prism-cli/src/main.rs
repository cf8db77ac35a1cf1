//! # prism
//!
//! Command-line client: follows the live dashboard and works with the
//! assistant's conversation branches.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use prism_conversations::{
    BranchService, ConversationApi, ConversationView, HttpConversationApi, NavigationOutcome,
    Navigator,
};
use prism_core::{ConversationId, MessageId};
use prism_dashboard::{DashboardSession, HttpDashboardApi, WsPushChannel};
use prism_settings::PrismSettings;

/// Prism dashboard client.
#[derive(Parser, Debug)]
#[command(name = "prism", version, about = "Prism dashboard client")]
struct Cli {
    /// Settings file (defaults to `~/.prism/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// REST API base URL (overrides settings).
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Push channel WebSocket URL (overrides settings).
    #[arg(long, global = true)]
    ws_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow the live dashboard until Ctrl-C.
    Watch,
    /// Print the ancestry of a conversation.
    Breadcrumb {
        /// Conversation id.
        conversation: String,
    },
    /// Print the branch count of every message in a conversation.
    Branches {
        /// Conversation id.
        conversation: String,
    },
    /// Branch a conversation at a message.
    Branch {
        /// Source conversation id.
        conversation: String,
        /// Message to fork at.
        message: String,
        /// Title of the new branch.
        #[arg(long)]
        title: String,
        /// Optional description.
        #[arg(long)]
        description: Option<String>,
    },
}

impl Cli {
    fn load_settings(&self) -> Result<PrismSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(prism_settings::settings_path);
        let mut settings = prism_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(url) = &self.api_url {
            settings.api.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = &self.ws_url {
            settings.channel.url.clone_from(url);
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;
    let _ = prism_logging::init_logging(&settings.logging);

    match cli.command {
        Command::Watch => watch(&settings).await,
        Command::Breadcrumb { conversation } => {
            let view = load_view(&settings, &conversation).await?;
            let trail: Vec<_> = view
                .breadcrumb
                .iter()
                .map(|c| format!("{} ({})", c.title, c.conversation_id))
                .collect();
            println!("{}", trail.join(" > "));
            Ok(())
        }
        Command::Branches { conversation } => {
            let view = load_view(&settings, &conversation).await?;
            for message in &view.conversation.messages {
                let preview: String = message.content.chars().take(60).collect();
                println!(
                    "{:<38} {:<9} {:>3}  {}",
                    message.id,
                    message.role.as_str(),
                    view.branch_count(&message.id),
                    preview
                );
            }
            Ok(())
        }
        Command::Branch {
            conversation,
            message,
            title,
            description,
        } => {
            let service = BranchService::new(conversation_api(&settings)?);
            let id = service
                .create_branch(
                    &ConversationId::from_raw(conversation),
                    &MessageId::from_raw(message),
                    &title,
                    description.as_deref(),
                )
                .await
                .context("Failed to create branch")?;
            println!("{id}");
            Ok(())
        }
    }
}

fn conversation_api(settings: &PrismSettings) -> Result<Arc<dyn ConversationApi>> {
    let api = HttpConversationApi::connect(
        settings.api.base_url.clone(),
        settings.api.token.clone(),
        Duration::from_millis(settings.api.timeout_ms),
    )
    .context("Failed to build HTTP client")?;
    Ok(Arc::new(api))
}

async fn load_view(settings: &PrismSettings, conversation: &str) -> Result<ConversationView> {
    let navigator = Navigator::new(conversation_api(settings)?);
    let outcome = navigator
        .navigate(&ConversationId::from_raw(conversation))
        .await
        .with_context(|| format!("Failed to load conversation {conversation}"))?;
    match outcome {
        NavigationOutcome::Loaded(view) => Ok(view),
        NavigationOutcome::Superseded { .. } => bail!("navigation superseded"),
    }
}

async fn watch(settings: &PrismSettings) -> Result<()> {
    let api = HttpDashboardApi::from_settings(&settings.api).context("Failed to build HTTP client")?;
    let channel = WsPushChannel::from_settings(&settings.channel);
    let session = DashboardSession::start(&api, Box::new(channel), &settings.dashboard)
        .await
        .context("Failed to load dashboard snapshot")?;

    if let Some(err) = session.fetch_error() {
        tracing::warn!(error = %err, "showing placeholder dashboard");
    }

    let mut snapshots = session.snapshots();
    let mut status = session.status();
    tracing::info!(api = %settings.api.base_url, ws = %settings.channel.url, "watching dashboard");

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Shutting down...");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    tracing::info!("dashboard session ended");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                tracing::info!(
                    applied = snapshot.applied_events,
                    insights = snapshot.state.ai_insights.len(),
                    news = snapshot.state.news_feed.len(),
                    history = snapshot.state.performance_history.len(),
                    last_updated = ?snapshot.last_updated,
                    "dashboard updated"
                );
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                tracing::info!(status = %current, offline = !current.is_connected(), "push channel status");
            }
        }
    }

    let report = session.disconnect().await;
    tracing::info!(
        applied = report.applied,
        ignored = report.ignored,
        rejected = report.rejected,
        channel_errors = report.channel_errors,
        "Shutdown complete"
    );
    Ok(())
}
