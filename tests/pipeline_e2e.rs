// tests/pipeline_e2e.rs
mod common;

use common::*;
use data_aggregator::config::{MailConfig, WeatherSourceConfig, ENV_SMTP_PASSWORD};
use data_aggregator::error::ConnectionKind;
use data_aggregator::ingest::providers::{CurrencyFetcher, NewsFetcher, WeatherFetcher};
use data_aggregator::notify::{EmailNotifier, RecordingNotifier};
use data_aggregator::store::fetch_all;
use data_aggregator::{run_once, ConnectionManager, Fetcher, Notifier, RunOptions, SchemaMode, Service};

fn read(path: &std::path::Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn fixture_fetchers() -> Vec<Box<dyn Fetcher>> {
    vec![
        Box::new(NewsFetcher::from_fixture(NEWS_JSON)),
        Box::new(WeatherFetcher::from_fixture(Some(LOCATION_JSON), WEATHER_JSON)),
        Box::new(CurrencyFetcher::from_fixture(CURRENCY_SINGLE_JSON)),
    ]
}

#[tokio::test]
async fn full_run_persists_reports_and_notifies() {
    let fx = TestFixture::new();
    let mut conns = fx.connections();
    let notifier = RecordingNotifier::new();

    let summary = run_once(
        &mut conns,
        &fixture_fetchers(),
        Some(&notifier as &dyn Notifier),
        &fx.run_options(),
    )
    .await
    .unwrap();

    assert!(summary.provision.is_complete());
    assert_eq!(summary.inserted.get(&Service::News), Some(&3));
    assert_eq!(summary.inserted.get(&Service::Weather), Some(&1));
    assert_eq!(summary.inserted.get(&Service::Currency), Some(&1));

    let path = summary.report.clone().expect("report written");
    assert!(summary.notified);
    assert_eq!(notifier.sent_paths(), vec![path.clone()]);
    assert_eq!(fx.report_files(), vec![path.clone()]);

    let v = read(&path);
    assert_eq!(v["news"].as_array().unwrap().len(), 3);
    assert_eq!(v["weather"]["city"], "Lisbon");
    assert_eq!(v["currency"].as_array().unwrap().len(), 1);
    assert_eq!(v["currency"][0]["target"], "EUR");

    // Every connection is released at the end of the run.
    assert!(!conns.is_cached(ConnectionKind::Database));
}

#[tokio::test]
async fn broken_weather_source_does_not_block_the_rest() {
    let fx = TestFixture::new();
    let mut conns = fx.connections();
    let notifier = RecordingNotifier::new();

    let fetchers: Vec<Box<dyn Fetcher>> = vec![
        Box::new(NewsFetcher::from_fixture(NEWS_JSON)),
        Box::new(WeatherFetcher::from_config(&WeatherSourceConfig {
            url: DEAD_URL.to_string(),
            location_url: DEAD_URL.to_string(),
            timeout_secs: 1,
        })),
        Box::new(CurrencyFetcher::from_fixture(CURRENCY_SINGLE_JSON)),
    ];

    let summary = run_once(&mut conns, &fetchers, Some(&notifier as &dyn Notifier), &fx.run_options())
        .await
        .unwrap();
    assert!(!summary.inserted.contains_key(&Service::Weather));

    let v = read(summary.report.as_ref().unwrap());
    assert_eq!(v["news"].as_array().unwrap().len(), 3);
    assert_eq!(v["weather"], serde_json::json!({}));
    assert_eq!(v["currency"].as_array().unwrap().len(), 1);
    assert_eq!(notifier.sent_paths().len(), 1);
}

#[tokio::test]
async fn selected_services_only() {
    let fx = TestFixture::new();
    let mut conns = fx.connections();
    let opts = RunOptions {
        services: vec![Service::Currency],
        ..fx.run_options()
    };

    let summary = run_once(&mut conns, &fixture_fetchers(), None, &opts)
        .await
        .unwrap();
    assert_eq!(summary.inserted.keys().copied().collect::<Vec<_>>(), vec![Service::Currency]);

    // Without a notifier the report is still written.
    let v = read(summary.report.as_ref().unwrap());
    assert!(v["news"].as_array().unwrap().is_empty());
    assert!(!summary.notified);
}

#[tokio::test]
async fn failed_delivery_keeps_the_report() {
    let fx = TestFixture::new();
    let mut conns = fx.connections();
    let notifier = RecordingNotifier::failing();

    let summary = run_once(&mut conns, &fixture_fetchers(), Some(&notifier as &dyn Notifier), &fx.run_options())
        .await
        .unwrap();
    assert!(!summary.notified);
    assert!(summary.report.unwrap().is_file());
}

#[tokio::test]
async fn entry_count_caps_news_in_the_report() {
    let fx = TestFixture::new();
    let mut conns = fx.connections();
    let opts = RunOptions {
        entry_count: 2,
        ..fx.run_options()
    };

    let summary = run_once(&mut conns, &fixture_fetchers(), None, &opts)
        .await
        .unwrap();
    let v = read(summary.report.as_ref().unwrap());
    assert_eq!(v["news"].as_array().unwrap().len(), 2);

    // All three articles were still stored.
    let db = conns.database(SchemaMode::Selected).unwrap();
    assert_eq!(fetch_all(db, "news", None).unwrap().len(), 3);
}

#[tokio::test]
async fn repeated_runs_accumulate_rows() {
    let fx = TestFixture::new();
    let mut conns = fx.connections();

    run_once(&mut conns, &fixture_fetchers(), None, &fx.run_options())
        .await
        .unwrap();
    // Report names are per second; keep the second run from colliding.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    run_once(&mut conns, &fixture_fetchers(), None, &fx.run_options())
        .await
        .unwrap();

    let db = conns.database(SchemaMode::Selected).unwrap();
    assert_eq!(fetch_all(db, "news", None).unwrap().len(), 6);
    assert_eq!(fx.report_files().len(), 2);
}

#[tokio::test]
async fn hung_weather_source_times_out_without_blocking_the_rest() {
    let fx = TestFixture::new();
    let mut conns = fx.connections();

    // Accepts connections (kernel backlog) but never answers.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let hung = format!("http://{}/", listener.local_addr().unwrap());

    let fetchers: Vec<Box<dyn Fetcher>> = vec![
        Box::new(NewsFetcher::from_fixture(NEWS_JSON)),
        Box::new(WeatherFetcher::from_config(&WeatherSourceConfig {
            url: hung.clone(),
            location_url: hung,
            timeout_secs: 1,
        })),
        Box::new(CurrencyFetcher::from_fixture(CURRENCY_SINGLE_JSON)),
    ];

    let started = std::time::Instant::now();
    let summary = run_once(&mut conns, &fetchers, None, &fx.run_options())
        .await
        .unwrap();
    assert!(started.elapsed() >= std::time::Duration::from_secs(1));
    assert!(!summary.inserted.contains_key(&Service::Weather));

    let v = read(summary.report.as_ref().unwrap());
    assert_eq!(v["weather"], serde_json::json!({}));
    assert_eq!(v["news"].as_array().unwrap().len(), 3);
    assert_eq!(v["currency"].as_array().unwrap().len(), 1);
    drop(listener);
}

#[tokio::test]
async fn table_that_failed_to_provision_is_skipped() {
    let fx = TestFixture::new();
    // An index already owns the name `currency`, so the table cannot be created.
    std::fs::create_dir_all(&fx.data_dir).unwrap();
    {
        let conn = rusqlite::Connection::open(fx.data_dir.join(format!("{SCHEMA}.sqlite3"))).unwrap();
        conn.execute_batch("CREATE TABLE other (x); CREATE INDEX currency ON other (x);")
            .unwrap();
    }

    let mut conns = fx.connections();
    let notifier = RecordingNotifier::new();
    let summary = run_once(&mut conns, &fixture_fetchers(), Some(&notifier as &dyn Notifier), &fx.run_options())
        .await
        .unwrap();

    assert_eq!(summary.provision.ready, vec!["news", "weather"]);
    assert_eq!(summary.provision.failed.len(), 1);
    assert_eq!(summary.provision.failed[0].0, "currency");

    assert_eq!(summary.inserted.get(&Service::News), Some(&3));
    assert_eq!(summary.inserted.get(&Service::Weather), Some(&1));
    assert!(!summary.inserted.contains_key(&Service::Currency));

    // The report reads every table, so it cannot be compiled and nothing is sent.
    assert!(summary.report.is_none());
    assert!(notifier.sent_paths().is_empty());

    let db = conns.database(SchemaMode::Selected).unwrap();
    assert_eq!(fetch_all(db, "news", None).unwrap().len(), 3);
}

#[tokio::test]
#[serial_test::serial]
async fn unresolved_mail_secret_only_skips_delivery() {
    std::env::remove_var(ENV_SMTP_PASSWORD);
    let fx = TestFixture::new();
    let mail = MailConfig {
        smtp_server: "smtp.example.invalid".to_string(),
        smtp_port: 587,
        sender_email: "digest@example.com".to_string(),
        password: "ENV".to_string(),
        recipients: vec!["ops@example.com".to_string()],
        timeout_secs: 1,
    };
    let notifier = EmailNotifier::from_config(&mail);
    let mut conns = ConnectionManager::new(Some(fx.db_config()), Some(mail), None);

    let summary = run_once(&mut conns, &fixture_fetchers(), Some(&notifier as &dyn Notifier), &fx.run_options())
        .await
        .unwrap();

    assert_eq!(summary.inserted.len(), 3);
    let path = summary.report.expect("report written");
    assert!(path.is_file());
    assert!(!summary.notified);
}
