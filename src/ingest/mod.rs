// src/ingest/mod.rs
pub mod providers;
pub mod types;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::time::Duration;

use crate::error::FetchError;
use crate::ingest::types::Fetcher;
use crate::store::Record;

pub use types::Service;

/// One-time metrics registration.
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "aggregator_records_fetched_total",
            "Records produced by source fetchers."
        );
        describe_counter!(
            "aggregator_fetch_errors_total",
            "Source fetch/decode errors (source degraded to no data)."
        );
        describe_counter!(
            "aggregator_rows_inserted_total",
            "Rows written by bulk inserts."
        );
        describe_counter!("aggregator_reports_total", "Report artifacts written.");
        describe_histogram!("aggregator_fetch_ms", "Source fetch time in milliseconds.");
        describe_gauge!(
            "aggregator_last_run_ts",
            "Unix ts when the aggregation run last finished."
        );
    });
}

/// Local wall-clock stamp stored alongside fetched rows.
pub fn fetch_stamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Run one fetcher, degrading any failure to an empty result.
pub async fn fetch_or_empty(fetcher: &dyn Fetcher) -> Vec<Record> {
    ensure_metrics_described();
    let t0 = std::time::Instant::now();
    let result = fetcher.fetch_latest().await;
    histogram!("aggregator_fetch_ms", "source" => fetcher.name())
        .record(t0.elapsed().as_secs_f64() * 1_000.0);

    match result {
        Ok(records) => {
            counter!("aggregator_records_fetched_total", "source" => fetcher.name())
                .increment(records.len() as u64);
            tracing::info!(
                target: "ingest",
                provider = fetcher.name(),
                records = records.len(),
                "fetched"
            );
            records
        }
        Err(e) => {
            counter!("aggregator_fetch_errors_total", "source" => fetcher.name()).increment(1);
            tracing::warn!(
                target: "ingest",
                provider = fetcher.name(),
                error = %e,
                "provider error, continuing without data"
            );
            Vec::new()
        }
    }
}

/// GET `url` and return the body of a 2xx response.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
    timeout: Duration,
    source_name: &'static str,
) -> Result<String, FetchError> {
    let http = |error| FetchError::Http { source_name, error };
    client
        .get(url)
        .query(query)
        .timeout(timeout)
        .send()
        .await
        .map_err(http)?
        .error_for_status()
        .map_err(http)?
        .text()
        .await
        .map_err(http)
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    body: &str,
    source_name: &'static str,
) -> Result<T, FetchError> {
    serde_json::from_str(body).map_err(|error| FetchError::Decode { source_name, error })
}
