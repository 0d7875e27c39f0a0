// src/pipeline.rs
//! One aggregation run: provision → fetch/persist per source → report →
//! notify → sweep.
//!
//! Only provisioning can abort a run. Every later step degrades: a broken
//! source contributes no rows, a failed insert is logged without rolling
//! back earlier sources, and a failed report skips notification.

use chrono::Local;
use metrics::gauge;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::AppConfig;
use crate::connections::{ConnectionManager, SchemaMode};
use crate::error::{PersistenceError, PipelineError};
use crate::ingest::providers::{CurrencyFetcher, NewsFetcher, WeatherFetcher};
use crate::ingest::types::{Fetcher, Service};
use crate::ingest::{ensure_metrics_described, fetch_or_empty};
use crate::notify::Notifier;
use crate::report::{ReportCompiler, DEFAULT_ENTRY_COUNT};
use crate::retention;
use crate::store::schema::{default_tables, ensure_schema, ProvisionReport, TableSchema};
use crate::store::{insert_many, Record};

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Services to fetch this run, in order.
    pub services: Vec<Service>,
    pub entry_count: usize,
    pub reports_dir: PathBuf,
    pub retention: Duration,
    pub tables: Vec<TableSchema>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            services: Service::ALL.to_vec(),
            entry_count: DEFAULT_ENTRY_COUNT,
            reports_dir: PathBuf::from("reports"),
            retention: retention::days(30),
            tables: default_tables(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub provision: ProvisionReport,
    /// Rows written per service; absent when nothing was inserted.
    pub inserted: BTreeMap<Service, usize>,
    pub report: Option<PathBuf>,
    pub notified: bool,
    pub swept: usize,
}

/// Build a fetcher for every selected service whose source section exists.
pub fn fetchers_from_config(cfg: &AppConfig, services: &[Service]) -> Vec<Box<dyn Fetcher>> {
    let mut out: Vec<Box<dyn Fetcher>> = Vec::new();
    for s in services {
        let built: Result<Box<dyn Fetcher>, _> = match s {
            Service::News => cfg
                .require_news_source()
                .map(|c| Box::new(NewsFetcher::from_config(c)) as Box<dyn Fetcher>),
            Service::Weather => cfg
                .require_weather_source()
                .map(|c| Box::new(WeatherFetcher::from_config(c)) as Box<dyn Fetcher>),
            Service::Currency => cfg
                .require_currency_source()
                .map(|c| Box::new(CurrencyFetcher::from_config(c)) as Box<dyn Fetcher>),
        };
        match built {
            Ok(f) => out.push(f),
            Err(e) => {
                tracing::warn!(target: "pipeline", service = %s, error = %e, "source not configured, skipping")
            }
        }
    }
    out
}

/// Execute one full run. Connections are closed before returning, on
/// success and on failure alike.
pub async fn run_once(
    conns: &mut ConnectionManager,
    fetchers: &[Box<dyn Fetcher>],
    notifier: Option<&dyn Notifier>,
    opts: &RunOptions,
) -> Result<RunSummary, PipelineError> {
    let summary = run_steps(conns, fetchers, notifier, opts).await;
    conns.close_all().await;
    summary
}

async fn run_steps(
    conns: &mut ConnectionManager,
    fetchers: &[Box<dyn Fetcher>],
    notifier: Option<&dyn Notifier>,
    opts: &RunOptions,
) -> Result<RunSummary, PipelineError> {
    ensure_metrics_described();
    let run_at = Local::now();
    tracing::info!(
        target: "pipeline",
        services = ?opts.services,
        entry_count = opts.entry_count,
        "starting data fetch"
    );

    let provision = ensure_schema(conns, &opts.tables)?;
    if !provision.is_complete() {
        tracing::error!(target: "pipeline", failed = ?provision.failed, "some tables could not be provisioned");
    }
    let mut summary = RunSummary {
        provision,
        ..Default::default()
    };

    for service in &opts.services {
        let Some(fetcher) = fetchers.iter().find(|f| f.service() == *service) else {
            tracing::warn!(target: "pipeline", service = %service, "no fetcher for service");
            continue;
        };

        let records = fetch_or_empty(fetcher.as_ref()).await;
        if records.is_empty() {
            tracing::warn!(target: "pipeline", service = %service, "no data fetched");
            continue;
        }
        if !summary.provision.is_ready(service.table()) {
            tracing::warn!(target: "pipeline", table = service.table(), "table not provisioned, skipping insert");
            continue;
        }

        match persist(conns, service.table(), &records) {
            Ok(n) => {
                summary.inserted.insert(*service, n);
            }
            Err(e) => {
                tracing::error!(target: "pipeline", table = service.table(), error = %e, "bulk insert failed, skipping");
            }
        }
    }

    let compiler = ReportCompiler::new(&opts.reports_dir, Some(opts.entry_count));
    summary.report = match compiler.compile(conns, &run_at) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(target: "pipeline", error = %e, "report generation failed, email not sent");
            None
        }
    };

    if let Some(path) = &summary.report {
        match notifier {
            Some(n) => match n.send_report(conns, path).await {
                Ok(()) => {
                    summary.notified = true;
                    tracing::info!(target: "pipeline", notifier = n.name(), path = %path.display(), "report delivered");
                }
                Err(e) => {
                    tracing::warn!(target: "pipeline", notifier = n.name(), error = %e, "report delivery failed");
                }
            },
            None => tracing::warn!(target: "pipeline", "no notifier configured, report not sent"),
        }
    }

    summary.swept = match retention::sweep(&opts.reports_dir, opts.retention) {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(target: "pipeline", error = %e, "report cleanup failed");
            0
        }
    };

    gauge!("aggregator_last_run_ts").set(run_at.timestamp() as f64);
    tracing::info!(
        target: "pipeline",
        inserted = ?summary.inserted,
        report = ?summary.report,
        notified = summary.notified,
        swept = summary.swept,
        "run complete"
    );
    Ok(summary)
}

fn persist(
    conns: &mut ConnectionManager,
    table: &str,
    records: &[Record],
) -> Result<usize, PersistenceError> {
    let db = conns.database(SchemaMode::Selected)?;
    insert_many(db, table, records)
}
