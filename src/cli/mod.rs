use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::config::SignoffConfig;
use crate::coordinator::ApprovalCoordinator;
use crate::notify::{LogNotifier, Notifier, NullNotifier};
use crate::persistence::{JsonSnapshotPersistence, StorePersistence};
use crate::projections;
use crate::store::{ItemFilter, ItemOrder};
use crate::telemetry::init_telemetry;
use crate::workflow::engine::ApprovalAction;
use crate::workflow::types::{ApprovalItem, OverallStatus, Priority};

#[derive(Parser)]
#[command(name = "signoff")]
#[command(about = "Staged content approval workflow for social media teams")]
#[command(long_about = "Signoff moves submitted content through an ordered list of approval \
                       stages, each with its own approvers and quorum. Items live in a JSON \
                       snapshot between invocations; configure stages in signoff.toml.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter signoff.toml with the default stage plan
    Init {
        /// Overwrite an existing signoff.toml
        #[arg(long, help = "Overwrite signoff.toml if it already exists")]
        force: bool,
    },
    /// Submit a new piece of content for approval
    Submit {
        /// Content title
        title: String,
        /// Who is submitting
        #[arg(long = "by")]
        submitted_by: String,
        /// Client / brand the content belongs to
        #[arg(long)]
        client: Option<String>,
        #[arg(long, value_enum, default_value = "medium")]
        priority: PriorityArg,
        /// Due date expressed as hours from now
        #[arg(long)]
        due_in_hours: Option<i64>,
    },
    /// Approve the current stage of an item
    Approve {
        id: String,
        /// Stage being approved (must be the item's current stage)
        #[arg(long)]
        stage: String,
        #[arg(long = "as")]
        actor: String,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Reject an item at its current stage (terminal)
    Reject {
        id: String,
        #[arg(long)]
        stage: String,
        #[arg(long = "as")]
        actor: String,
        /// Required: why the content was rejected
        #[arg(long)]
        comment: String,
    },
    /// Request a revision: soft reject, submitter should fix and resubmit
    Revise {
        id: String,
        #[arg(long)]
        stage: String,
        #[arg(long = "as")]
        actor: String,
        /// Required: what needs to change
        #[arg(long)]
        comment: String,
    },
    /// Cancel a pending or revision-requested item
    Cancel {
        id: String,
        #[arg(long = "as")]
        actor: String,
    },
    /// Add a discussion comment to an item
    Comment {
        id: String,
        #[arg(long = "as")]
        author: String,
        message: String,
        /// Reply to a top-level comment
        #[arg(long)]
        parent: Option<String>,
    },
    /// List items, optionally filtered
    List {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        #[arg(long = "by")]
        submitted_by: Option<String>,
        #[arg(long)]
        client: Option<String>,
        #[arg(long, value_enum, default_value = "created-desc")]
        order: OrderArg,
    },
    /// Show one item in full: stages, progress, comment log
    Show { id: String },
    /// Dashboard view: counts per status, due soon, overdue
    Status {
        /// Due-soon window in hours
        #[arg(long, default_value = "24")]
        within_hours: i64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Pending,
    Approved,
    Rejected,
    RevisionRequested,
    Cancelled,
}

impl From<StatusArg> for OverallStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => OverallStatus::Pending,
            StatusArg::Approved => OverallStatus::Approved,
            StatusArg::Rejected => OverallStatus::Rejected,
            StatusArg::RevisionRequested => OverallStatus::RevisionRequested,
            StatusArg::Cancelled => OverallStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
    Urgent,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
            PriorityArg::Urgent => Priority::Urgent,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OrderArg {
    CreatedDesc,
    CreatedAsc,
    Priority,
    DueDate,
}

impl From<OrderArg> for ItemOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::CreatedDesc => ItemOrder::CreatedAtDesc,
            OrderArg::CreatedAsc => ItemOrder::CreatedAtAsc,
            OrderArg::Priority => ItemOrder::PriorityDesc,
            OrderArg::DueDate => ItemOrder::DueDateAsc,
        }
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = crate::config::config().context("failed to load configuration")?;
    init_telemetry(
        &config.observability.log_level,
        config.observability.json_logs,
    )?;

    // Init must still work when the existing stage config is broken.
    if let Commands::Init { force } = &cli.command {
        return init_command(*force);
    }

    // Stage misconfiguration is fatal before any item can be touched.
    crate::config::init_config().context("invalid stage configuration in signoff.toml")?;
    let plan = config.build_plan()?;

    let persistence = JsonSnapshotPersistence::new(&config.storage.snapshot_path);
    let store = persistence
        .load_store()
        .await
        .context("failed to load item snapshot")?
        .unwrap_or_default();
    let notifier: Arc<dyn Notifier> = if config.notifications.enabled {
        Arc::new(LogNotifier)
    } else {
        Arc::new(NullNotifier)
    };
    let mut coordinator = ApprovalCoordinator::with_store(plan, store, notifier);

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Submit {
            title,
            submitted_by,
            client,
            priority,
            due_in_hours,
        } => {
            let item = coordinator
                .submit(crate::workflow::types::NewApprovalItemInput {
                    title,
                    submitted_by,
                    client_id: client,
                    priority: priority.into(),
                    due_date: due_in_hours.map(|h| chrono::Utc::now() + chrono::Duration::hours(h)),
                })
                .await?;
            println!("Submitted {} — awaiting stage '{}'", item.id, item.current_stage_id.as_deref().unwrap_or("-"));
        }
        Commands::Approve {
            id,
            stage,
            actor,
            comment,
        } => {
            let item = coordinator
                .apply_action(
                    parse_id(&id)?,
                    ApprovalAction::Approve {
                        stage_id: stage,
                        actor_id: actor,
                        comment,
                    },
                )
                .await?;
            print_transition(&item, &coordinator);
        }
        Commands::Reject {
            id,
            stage,
            actor,
            comment,
        } => {
            let item = coordinator
                .apply_action(
                    parse_id(&id)?,
                    ApprovalAction::Reject {
                        stage_id: stage,
                        actor_id: actor,
                        comment,
                    },
                )
                .await?;
            print_transition(&item, &coordinator);
        }
        Commands::Revise {
            id,
            stage,
            actor,
            comment,
        } => {
            let item = coordinator
                .apply_action(
                    parse_id(&id)?,
                    ApprovalAction::RequestRevision {
                        stage_id: stage,
                        actor_id: actor,
                        comment,
                    },
                )
                .await?;
            print_transition(&item, &coordinator);
        }
        Commands::Cancel { id, actor } => {
            let item = coordinator
                .apply_action(parse_id(&id)?, ApprovalAction::Cancel { actor_id: actor })
                .await?;
            print_transition(&item, &coordinator);
        }
        Commands::Comment {
            id,
            author,
            message,
            parent,
        } => {
            let parent_id = parent.as_deref().map(parse_id).transpose()?;
            let item = coordinator
                .comment(parse_id(&id)?, &author, &message, parent_id)
                .await?;
            println!("Comment added to {} ({} total)", item.id, item.comments.len());
        }
        Commands::List {
            status,
            submitted_by,
            client,
            order,
        } => {
            let filter = ItemFilter {
                overall_status: status.map(Into::into),
                submitted_by,
                client_id: client,
                order: order.into(),
            };
            let items = coordinator.list(&filter);
            if items.is_empty() {
                println!("No matching items.");
            }
            for item in items {
                println!(
                    "{}  {:<19} {:<7} {:>4.0}%  {}",
                    item.id,
                    item.overall_status.to_string(),
                    item.priority.to_string(),
                    projections::progress(item) * 100.0,
                    item.title
                );
            }
        }
        Commands::Show { id } => {
            let item = coordinator.get(parse_id(&id)?)?;
            print_item(item, &coordinator);
        }
        Commands::Status { within_hours } => {
            println!("Items by status:");
            for (status, count) in coordinator.counts_by_status() {
                println!("  {:<19} {}", status.to_string(), count);
            }
            let soon = coordinator.due_soon(within_hours);
            println!("Due within {}h: {}", within_hours, soon.len());
            for item in soon {
                println!("  {}  {}", item.id, item.title);
            }
            let late = coordinator.overdue();
            println!("Overdue: {}", late.len());
            for item in late {
                println!("  {}  {}", item.id, item.title);
            }
        }
    }

    persistence
        .save_store(coordinator.store())
        .await
        .context("failed to save item snapshot")?;
    Ok(())
}

fn init_command(force: bool) -> Result<()> {
    if Path::new("signoff.toml").exists() && !force {
        anyhow::bail!("signoff.toml already exists (use --force to overwrite)");
    }
    let config = SignoffConfig::default();
    config.save_to_file("signoff.toml")?;
    println!("Wrote signoff.toml with the default stage plan. Edit it to fit your team.");
    Ok(())
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("'{raw}' is not a valid item id"))
}

fn print_transition(item: &ApprovalItem, coordinator: &ApprovalCoordinator) {
    println!(
        "{} is now {} ({:.0}% complete)",
        item.id,
        item.overall_status,
        coordinator.progress(item.id).unwrap_or(0.0) * 100.0
    );
    if let Some(stage) = &item.current_stage_id {
        if item.overall_status == OverallStatus::Pending {
            println!("Next stage: {}", stage);
        }
    }
}

fn print_item(item: &ApprovalItem, coordinator: &ApprovalCoordinator) {
    println!("{}  {}", item.id, item.title);
    println!(
        "  status: {}   priority: {}   submitted by: {}",
        item.overall_status, item.priority, item.submitted_by
    );
    if let Some(client) = &item.client_id {
        println!("  client: {}", client);
    }
    if let Some(due) = item.due_date {
        println!("  due: {}", due.to_rfc3339());
    }
    println!("  stages:");
    for outcome in &item.stage_outcomes {
        let marker = if Some(outcome.stage_id.as_str()) == item.current_stage_id.as_deref() {
            "->"
        } else {
            "  "
        };
        let stage_name = coordinator
            .plan()
            .stage(&outcome.stage_id)
            .map(|s| s.name.as_str())
            .unwrap_or(outcome.stage_id.as_str());
        println!(
            "  {} {:<20} {:?}  approvals: {}",
            marker,
            stage_name,
            outcome.status,
            outcome.approved_by.len()
        );
    }
    if !item.comments.is_empty() {
        println!("  comments:");
        for comment in &item.comments {
            println!(
                "    [{:?}] {}: {}",
                comment.kind, comment.author_id, comment.message
            );
        }
    }
}
