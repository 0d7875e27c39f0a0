//! Data aggregator binary entrypoint.
//! Loads config, runs the fetch → persist → report → mail → sweep pipeline
//! once (or on a fixed interval), and exits non-zero only if a run aborts.

use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use data_aggregator::cli::Cli;
use data_aggregator::notify::{EmailNotifier, Notifier};
use data_aggregator::pipeline::{fetchers_from_config, run_once};
use data_aggregator::{AppConfig, ConnectionManager};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = match &cli.config {
        Some(p) => AppConfig::load_from(p)?,
        None => AppConfig::load_default()?,
    };
    let opts = cli.run_options(&cfg);
    let fetchers = fetchers_from_config(&cfg, &opts.services);
    let email = cfg.mail.as_ref().map(EmailNotifier::from_config);
    let notifier = email.as_ref().map(|e| e as &dyn Notifier);
    let mut conns = ConnectionManager::from_config(&cfg);

    tracing::info!(
        services = ?opts.services,
        entry_count = opts.entry_count,
        "starting automated data aggregator"
    );

    loop {
        let summary = run_once(&mut conns, &fetchers, notifier, &opts).await?;
        tracing::info!(
            report = ?summary.report,
            notified = summary.notified,
            swept = summary.swept,
            "automation completed"
        );

        match cli.interval_secs {
            Some(secs) if secs > 0 => tokio::time::sleep(Duration::from_secs(secs)).await,
            _ => return Ok(()),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "run aborted");
            ExitCode::FAILURE
        }
    }
}
