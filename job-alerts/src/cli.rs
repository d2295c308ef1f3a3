use std::path::PathBuf;

use clap::{Parser, Subcommand};
use job_alerts::domain::DeliveryMode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Base URL of the notification store API
    #[arg(long, env = "JOB_ALERTS_STORE_URL")]
    pub store_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a job posting and notify matching users
    Dispatch {
        /// JSON file with the job posting
        #[arg(long)]
        job: PathBuf,

        /// JSON file with an array of user profiles
        #[arg(long)]
        users: PathBuf,

        /// Override the delivery mode (in-app, email, both)
        #[arg(long, value_parser = parse_mode)]
        mode: Option<DeliveryMode>,
    },

    /// Load and print the notification feed
    List,

    /// Mark one notification as read
    Read { id: String },

    /// Mark every notification as read
    ReadAll,

    /// Delete one notification
    Delete { id: String },

    /// Email an existing notification to its recipient
    Forward { id: String },
}

fn parse_mode(s: &str) -> Result<DeliveryMode, String> {
    s.parse::<DeliveryMode>().map_err(|e| e.to_string())
}
