mod cli;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::cli::{Args, Commands};
use job_alerts::config::AppConfig;
use job_alerts::domain::{JobPosting, Notification, UserProfile};
use job_alerts::logging::init_logging;
use job_alerts::notification::JobAlertService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::from_env().context("Failed to load configuration")?;
    if let Some(url) = args.store_url.clone() {
        config.store_url = url;
    }
    if args.verbose {
        config.log_filter = "job_alerts=debug".to_string();
    }

    let logging = init_logging(&config.log_filter, config.log_dir.as_deref())
        .context("Failed to initialize logging")?;

    let service =
        JobAlertService::from_config(&config).context("Failed to create job alert service")?;
    info!(mode = %service.delivery().current(), "job-alerts initialized");

    let result = run(&service, args).await;
    drop(logging);
    result
}

async fn run(service: &JobAlertService, args: Args) -> anyhow::Result<()> {
    match args.command {
        Commands::Dispatch { job, users, mode } => {
            let job: JobPosting = read_json(&job)?;
            let users: Vec<UserProfile> = read_json(&users)?;
            if let Some(mode) = mode {
                service.delivery().set(mode);
            }
            // Seeds the in-app claims with notifications from earlier runs.
            service.feed().load().await?;

            let report = service.on_job_posted(&job, &users).await;
            if args.json {
                print_json(&report)?;
            } else {
                println!(
                    "Job {}: {} of {} users matched",
                    report.job_id, report.matched, report.evaluated
                );
                for outcome in &report.outcomes {
                    println!(
                        "  {} via {}: {:?}",
                        outcome.user_id, outcome.channel, outcome.status
                    );
                }
            }
        }
        Commands::List => {
            let notifications = service.feed().load().await?;
            if args.json {
                print_json(&notifications)?;
            } else {
                print_feed(&notifications, service.feed().unread_count());
            }
        }
        Commands::Read { id } => {
            service.feed().load().await?;
            let transition = service.lifecycle().mark_as_read(&id).await?;
            println!("{}: {:?}", id, transition);
        }
        Commands::ReadAll => {
            service.feed().load().await?;
            let changed = service.lifecycle().mark_all_as_read().await?;
            println!("Marked {} notifications as read", changed);
        }
        Commands::Delete { id } => {
            service.feed().load().await?;
            let transition = service.lifecycle().delete_notification(&id).await?;
            println!("{}: {:?}", id, transition);
        }
        Commands::Forward { id } => {
            service.feed().load().await?;
            let ack = service.forward_by_email(&id).await?;
            if args.json {
                print_json(&ack)?;
            } else {
                println!("{} forwarded at {}", id, ack.accepted_at);
            }
        }
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_feed(notifications: &[Notification], unread: usize) {
    println!("{} notifications, {} unread", notifications.len(), unread);
    for n in notifications {
        let marker = if n.read { " " } else { "*" };
        println!(
            "{} [{}] {} {}",
            marker,
            n.id,
            n.created_at.format("%Y-%m-%d %H:%M"),
            n.title
        );
    }
}
