mod cli;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use harvest_core::HarvestConfig;
use reddit_client::{RedditClient, RedditCredentials};
use std::sync::Arc;
use table_export::{default_output_path, export_csv, ColumnPolicy};
use thread_extractor::{BatchError, BatchOptions, BatchOrchestrator};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

const DEFAULT_LOG_FILTER: &str = "thread_harvest=info,thread_extractor=info,reddit_client=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let mut config =
        HarvestConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
        config.validate()?;
    }
    let (client_id, client_secret) = config.credentials()?;
    let credentials = RedditCredentials::new(
        client_id.to_string(),
        client_secret.to_string(),
        config.user_agent.clone(),
    );

    let client = RedditClient::connect(credentials)
        .await
        .context("could not authenticate with Reddit")?;
    let orchestrator = BatchOrchestrator::new(Arc::new(client)).with_options(BatchOptions {
        concurrency: config.concurrency,
        report_progress: !cli.quiet,
    });

    let result = match &cli.command {
        Command::Threads { threads } => orchestrator.run_raw(threads.as_slice()).await,
        Command::Top {
            community,
            window,
            limit,
        } => orchestrator.run_top(community, *window, *limit).await,
    };

    let path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&config.output_dir, Local::now()));
    let policy = ColumnPolicy::from_sample_size(config.column_sample);

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(BatchError::Aborted { source, partial }) => {
            eprint!("{}", partial.report);
            if !partial.is_empty() {
                let rows = export_csv(&partial.records, &path, policy)?;
                warn!(
                    "Run aborted; kept {} records collected before it in {}",
                    rows,
                    path.display()
                );
            }
            return Err(source).context("batch aborted");
        }
        Err(other) => return Err(other.into()),
    };

    if !outcome.report.is_clean() {
        eprint!("{}", outcome.report);
    }
    if let Some(report_path) = &cli.report {
        let json = serde_json::to_string_pretty(&outcome.report)?;
        std::fs::write(report_path, json)
            .with_context(|| format!("could not write report to {}", report_path.display()))?;
    }

    let rows = export_csv(&outcome.records, &path, policy)
        .with_context(|| format!("nothing exported to {}", path.display()))?;

    if outcome.report.has_failures() {
        warn!(
            "{} thread(s) failed; see the summary above",
            outcome.report.failed.len()
        );
    }
    info!("Exported {} records to {}", rows, path.display());
    println!("{}", path.display());
    Ok(())
}
