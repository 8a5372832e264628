use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use yt_retitler::config::{self, ConfigError};
use yt_retitler::credentials::Credentials;
use yt_retitler::engine::TitlePolicy;
use yt_retitler::runner::{self, RunOptions, RunSummary};
use yt_retitler::youtube::YouTubeClient;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Rewrite the title of freshly published videos once, inside an age window"
)]
struct Args {
    /// Path to an optional YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Evaluate and log decisions without submitting updates
    #[arg(long)]
    dry_run: bool,

    /// Print an example config file and exit
    #[arg(long)]
    print_example_config: bool,
}

fn configuration_error(err: ConfigError) -> anyhow::Error {
    error!(%err, "configuration error; aborting before fetch");
    anyhow::Error::new(err)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    if args.print_example_config {
        print!("{}", config::example());
        return Ok(());
    }

    let cfg = config::load(args.config.as_deref(), config::process_env)
        .map_err(configuration_error)?;
    let credentials =
        Credentials::from_env(config::process_env).map_err(configuration_error)?;
    let base_url = cfg.api_base_url().map_err(configuration_error)?;

    let policy = TitlePolicy::new(
        config::override_title(config::process_env),
        cfg.rules.title_template.clone(),
    );
    if policy.has_override() {
        info!("using title from {}", config::ENV_OVERRIDE_TITLE);
    } else {
        warn!(
            "{} not set; deriving titles from template",
            config::ENV_OVERRIDE_TITLE
        );
    }

    let client = YouTubeClient::new(credentials, base_url).context("failed to create YouTube client")?;
    let ctx = cfg.decision_context(Utc::now());
    let opts = RunOptions {
        max_results: cfg.youtube.max_results,
        dry_run: args.dry_run,
    };

    match runner::run(&client, &ctx, |old| policy.title_for(old), opts).await {
        Ok(summary) => summary.log(),
        Err(err) => {
            error!(error = %err, "run ended early");
            RunSummary::default().log();
        }
    }
    Ok(())
}
