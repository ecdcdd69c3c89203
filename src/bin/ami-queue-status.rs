//! Command-line front end: print queue status, watch it, or start monitoring.

use std::sync::Arc;
use std::time::Duration;

use ami_queue_status::constants::{
    DEFAULT_AMI_HOST, DEFAULT_AMI_SECRET, DEFAULT_AMI_USER, DEFAULT_SUPERVISOR_TECHNOLOGY,
};
use ami_queue_status::{
    AmiConfig, DirectoryConfig, MemberDirectory, Queue, QueueStatusClient, SpyMode,
    SqlMemberDirectory, StaticMemberDirectory, DEFAULT_AMI_PORT,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ami-queue-status")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Manager host
    #[arg(long, env = "AMI_HOST", default_value = DEFAULT_AMI_HOST)]
    host: String,

    /// Manager port
    #[arg(long, env = "AMI_PORT", default_value_t = DEFAULT_AMI_PORT)]
    port: u16,

    /// Manager username
    #[arg(long, env = "AMI_USER", default_value = DEFAULT_AMI_USER)]
    user: String,

    /// Manager secret
    #[arg(long, env = "AMI_PASS", default_value = DEFAULT_AMI_SECRET, hide_env_values = true, hide_default_value = true)]
    secret: String,

    /// Technology prefix used to dial supervisors
    #[arg(long, default_value = DEFAULT_SUPERVISOR_TECHNOLOGY)]
    supervisor_technology: String,

    /// Skip the DB_* member directory even when configured
    #[arg(long)]
    no_directory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print queue status once as JSON
    Status {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Print queue status periodically until interrupted
    Watch {
        /// Seconds between polls
        #[arg(short, long, default_value_t = 5)]
        interval: u64,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Ring a supervisor and attach them to an agent's call
    Monitor {
        /// Supervisor extension to ring, e.g. 104
        supervisor: String,

        /// Agent interface to spy on, e.g. PJSIP/102
        target: String,

        /// spy, listen, whisper or barge
        #[arg(short, long, default_value = "spy")]
        mode: SpyMode,
    },
}

impl Cli {
    fn ami_config(&self) -> AmiConfig {
        AmiConfig {
            host: self
                .host
                .clone(),
            port: self.port,
            username: self
                .user
                .clone(),
            secret: self
                .secret
                .clone(),
            supervisor_technology: self
                .supervisor_technology
                .clone(),
            ..AmiConfig::default()
        }
    }

    fn directory(&self) -> Result<Arc<dyn MemberDirectory>> {
        if self.no_directory {
            return Ok(Arc::new(StaticMemberDirectory::default()));
        }
        match DirectoryConfig::from_env() {
            Some(db) => {
                info!("Using member directory from DB_* settings");
                let directory = SqlMemberDirectory::connect_lazy(&db)
                    .context("invalid member directory settings")?;
                Ok(Arc::new(directory))
            }
            None => Ok(Arc::new(StaticMemberDirectory::default())),
        }
    }
}

fn print_queues(queues: &[Queue], pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(queues)?
    } else {
        serde_json::to_string(queues)?
    };
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let client = QueueStatusClient::with_directory(cli.ami_config(), cli.directory()?);

    match cli.command {
        Commands::Status { pretty } => {
            let queues = client
                .fetch_queue_status()
                .await
                .context("queue status poll failed")?;
            print_queues(&queues, pretty)?;
        }
        Commands::Watch { interval, pretty } => {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match client.fetch_queue_status().await {
                            Ok(queues) => print_queues(&queues, pretty)?,
                            Err(e) => warn!("Poll failed, retrying next tick: {}", e),
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Interrupted");
                        break;
                    }
                }
            }
        }
        Commands::Monitor {
            supervisor,
            target,
            mode,
        } => {
            let outcome = client
                .trigger_monitor(&supervisor, &target, mode)
                .await;
            println!("{}", serde_json::to_string(&outcome)?);
            if !outcome.is_success() {
                client
                    .disconnect()
                    .await;
                anyhow::bail!("monitor request failed: {}", outcome.message);
            }
        }
    }

    client
        .disconnect()
        .await;
    Ok(())
}
