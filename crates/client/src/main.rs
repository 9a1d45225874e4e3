use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use domain::models::{SubmitManualVerificationRequest, VerificationReason};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use visit_guard::config::Config;
use visit_guard::jobs::{JobScheduler, PollAlertsJob};
use visit_guard::{
    AlertFeed, AlertLifecycleManager, HttpBackend, ManualVerificationWorkflow, NoticeSink,
    ProximityBackend, TracingNoticeSink,
};

#[derive(Parser)]
#[command(name = "visit-guard")]
#[command(version)]
#[command(about = "Proximity alert triage and manual visit verification", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the alert feed until interrupted (default)
    Watch,

    /// Acknowledge an active alert
    Acknowledge {
        #[arg(long)]
        alert: Uuid,
    },

    /// Resolve an acknowledged alert
    Resolve {
        #[arg(long)]
        alert: Uuid,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Close an acknowledged alert as a false alarm
    FalseAlarm {
        #[arg(long)]
        alert: Uuid,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Request manual verification of a visit (therapist)
    SubmitVerification {
        #[arg(long)]
        visit: Uuid,

        /// location_services_disabled, poor_gps_signal, device_issue, app_error or other
        #[arg(long, value_parser = parse_reason)]
        reason: VerificationReason,

        #[arg(long)]
        notes: Option<String>,

        /// I was at the patient's address
        #[arg(long)]
        confirm_location: bool,

        /// The visit took place at the scheduled time
        #[arg(long)]
        confirm_time: bool,

        /// I saw the patient in person
        #[arg(long)]
        confirm_identity: bool,
    },

    /// Approve a pending manual verification (admin)
    ApproveVerification {
        #[arg(long)]
        visit: Uuid,

        #[arg(long)]
        notes: Option<String>,

        /// Version the decision is based on; 0 skips the staleness check
        #[arg(long, default_value_t = 0)]
        version: u64,
    },

    /// Reject a pending manual verification (admin)
    RejectVerification {
        #[arg(long)]
        visit: Uuid,

        #[arg(long)]
        reason: String,

        #[arg(long, default_value_t = 0)]
        version: u64,
    },
}

fn parse_reason(value: &str) -> Result<VerificationReason, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown verification reason: {}", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    visit_guard::logging::init_logging(&config.logging);

    info!("Starting Visit Guard v{}", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = config.metrics_socket_addr()? {
        visit_guard::metrics::install_prometheus_exporter(addr)
            .context("failed to install Prometheus exporter")?;
        info!("Metrics listening on {}", addr);
    }

    let actor = config.actor.to_actor();
    let backend: Arc<dyn ProximityBackend> = Arc::new(HttpBackend::new(&config.backend)?);
    let notices: Arc<dyn NoticeSink> = Arc::new(TracingNoticeSink);
    let feed = Arc::new(RwLock::new(AlertFeed::new()));
    let poller = Arc::new(PollAlertsJob::new(
        Arc::clone(&backend),
        Arc::clone(&feed),
        Arc::clone(&notices),
        config.polling.interval_secs,
    ));

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => {
            let mut scheduler = JobScheduler::new();
            scheduler.register(poller);
            scheduler.start();

            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received");

            scheduler.shutdown();
            scheduler
                .wait_for_shutdown(config.polling.shutdown_timeout())
                .await;
        }
        Command::Acknowledge { alert } => {
            poller.fetch_alerts().await?;
            let lifecycle = AlertLifecycleManager::new(backend, feed, notices);
            lifecycle.acknowledge(&actor, alert).await?;
        }
        Command::Resolve { alert, notes } => {
            poller.fetch_alerts().await?;
            let lifecycle = AlertLifecycleManager::new(backend, feed, notices);
            lifecycle.resolve(&actor, alert, notes).await?;
        }
        Command::FalseAlarm { alert, notes } => {
            poller.fetch_alerts().await?;
            let lifecycle = AlertLifecycleManager::new(backend, feed, notices);
            lifecycle.mark_false_alarm(&actor, alert, notes).await?;
        }
        Command::SubmitVerification {
            visit,
            reason,
            notes,
            confirm_location,
            confirm_time,
            confirm_identity,
        } => {
            let submission = SubmitManualVerificationRequest {
                reason: Some(reason),
                additional_notes: notes,
                confirmed_location: confirm_location,
                confirmed_time: confirm_time,
                confirmed_identity: confirm_identity,
            };
            let workflow = ManualVerificationWorkflow::new(backend, notices);
            let created = workflow.submit(&actor, visit, &submission).await?;
            println!("{}", serde_json::to_string_pretty(&created)?);
        }
        Command::ApproveVerification {
            visit,
            notes,
            version,
        } => {
            let workflow = ManualVerificationWorkflow::new(backend, notices);
            let approved = workflow
                .approve_visit(&actor, visit, version, notes)
                .await?;
            println!("{}", serde_json::to_string_pretty(&approved)?);
        }
        Command::RejectVerification {
            visit,
            reason,
            version,
        } => {
            let workflow = ManualVerificationWorkflow::new(backend, notices);
            let rejected = workflow
                .reject_visit(&actor, visit, version, &reason)
                .await?;
            println!("{}", serde_json::to_string_pretty(&rejected)?);
        }
    }

    Ok(())
}
