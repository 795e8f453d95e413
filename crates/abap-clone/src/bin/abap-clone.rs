//! abap-clone CLI - clone Git repositories into an ABAP environment system.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use abap_clone::config::{DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL_SECS};
use abap_clone::{CloneConfig, CloneOrchestrator, ManageGitRepository, PollSettings};

/// abap-clone - Clone software components into an ABAP environment system.
#[derive(Parser)]
#[command(name = "abap-clone")]
#[command(about = "Clone Git repositories / software components into an ABAP environment system")]
struct Cli {
    /// Base URL of the ABAP system (or set `ABAP_HOST` env var).
    #[arg(long, env = "ABAP_HOST")]
    host: String,

    /// Communication user (or set `ABAP_USERNAME` env var).
    #[arg(long, env = "ABAP_USERNAME")]
    username: String,

    /// Communication user password (or set `ABAP_PASSWORD` env var).
    #[arg(long, env = "ABAP_PASSWORD", hide_env_values = true, default_value = "")]
    password: String,

    /// Repository / software component to clone.
    #[arg(long, env = "ABAP_REPOSITORY_NAME")]
    repository_name: Option<String>,

    /// Branch of the repository to clone.
    #[arg(long, env = "ABAP_BRANCH_NAME")]
    branch_name: Option<String>,

    /// Commit to check out for `--repository-name`.
    #[arg(long, env = "ABAP_COMMIT_ID")]
    commit_id: Option<String>,

    /// YAML file listing the repositories to clone.
    #[arg(long, env = "ABAP_REPOSITORIES")]
    repositories: Option<PathBuf>,

    /// Seconds between two status polls.
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    poll_interval_secs: u64,

    /// Status polls per repository before giving up.
    #[arg(long, default_value_t = DEFAULT_MAX_POLL_ATTEMPTS)]
    max_poll_attempts: u32,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> CloneConfig {
        CloneConfig {
            host: self.host,
            username: self.username,
            password: self.password,
            repository_name: self.repository_name,
            branch_name: self.branch_name,
            commit_id: self.commit_id,
            repositories: self.repositories,
            poll: PollSettings {
                interval: Duration::from_secs(self.poll_interval_secs),
                max_attempts: self.max_poll_attempts,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.into_config();
    config.validate().context("Invalid configuration")?;

    let service = ManageGitRepository::new(&config.host, &config.username, &config.password)
        .context("Failed to create ABAP service client")?;
    info!(service_url = %service.service_url(), "Connecting to ABAP system");

    let selection = config.selection();
    let orchestrator = CloneOrchestrator::new(service, config.poll);
    orchestrator.run(&selection).await?;

    Ok(())
}
