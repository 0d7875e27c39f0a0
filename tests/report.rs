// tests/report.rs
mod common;

use chrono::{Local, TimeZone};
use common::TestFixture;
use data_aggregator::report::{report_file_name, ReportCompiler};
use data_aggregator::store::schema::{default_tables, ensure_schema};
use data_aggregator::store::{insert_many, Record, Scalar};
use data_aggregator::{ConnectionManager, SchemaMode};

fn news(i: usize) -> Record {
    Record::from([
        ("headline".to_string(), Scalar::from(format!("headline {i}"))),
        ("source".to_string(), Scalar::from("Wire")),
        ("url".to_string(), Scalar::from(format!("https://news.example/{i}"))),
        ("published_at".to_string(), Scalar::from("2025-06-01T06:00:00Z")),
        ("fetched_at".to_string(), Scalar::from("2025-06-01 08:00:00")),
    ])
}

fn weather(city: &str, temp: f64) -> Record {
    Record::from([
        ("city".to_string(), Scalar::from(city)),
        ("temperature".to_string(), Scalar::from(temp)),
        ("humidity".to_string(), Scalar::from(50.0)),
        ("timestamp".to_string(), Scalar::from("2025-06-01T08:00")),
    ])
}

fn seed(conns: &mut ConnectionManager, news_rows: usize) {
    ensure_schema(conns, &default_tables()).unwrap();
    let db = conns.database(SchemaMode::Selected).unwrap();
    let batch: Vec<Record> = (0..news_rows).map(news).collect();
    insert_many(db, "news", &batch).unwrap();
    insert_many(db, "weather", &[weather("Oslo", 3.0), weather("Porto", 19.0)]).unwrap();
}

fn read(path: &std::path::Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn news_is_capped_and_newest_first() {
    let fx = TestFixture::new();
    let mut conns = fx.connections();
    seed(&mut conns, 7);

    let run_at = Local.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();
    let path = ReportCompiler::new(&fx.reports_dir, Some(5))
        .compile(&mut conns, &run_at)
        .unwrap();
    assert_eq!(path, fx.reports_dir.join("auto_report_2025-06-01_08-30-00.json"));

    let v = read(&path);
    let news = v["news"].as_array().unwrap();
    assert_eq!(news.len(), 5);
    assert_eq!(news[0]["headline"], "headline 6");
    assert_eq!(news[4]["headline"], "headline 2");
    assert!(news[0].get("fetched_at").is_none());

    // Only the latest weather row, as an object.
    assert_eq!(v["weather"]["city"], "Porto");
    // No currency rows stored: an empty list, not a missing key.
    assert_eq!(v["currency"], serde_json::json!([]));
}

#[test]
fn report_is_pretty_printed_with_four_spaces() {
    let fx = TestFixture::new();
    let mut conns = fx.connections();
    seed(&mut conns, 1);

    let path = ReportCompiler::new(&fx.reports_dir, None)
        .compile(&mut conns, &Local::now())
        .unwrap();
    let raw = std::fs::read_to_string(path).unwrap();
    assert!(raw.starts_with("{\n    \"news\": ["), "{raw}");
}

#[test]
fn empty_tables_give_an_empty_shaped_report() {
    let fx = TestFixture::new();
    let mut conns = fx.connections();
    ensure_schema(&mut conns, &default_tables()).unwrap();

    let path = ReportCompiler::new(&fx.reports_dir, Some(3))
        .compile(&mut conns, &Local::now())
        .unwrap();
    assert_eq!(
        read(&path),
        serde_json::json!({"news": [], "weather": {}, "currency": []})
    );
}

#[test]
fn existing_report_is_never_overwritten() {
    let fx = TestFixture::new();
    let mut conns = fx.connections();
    seed(&mut conns, 2);

    let run_at = Local.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
    std::fs::create_dir_all(&fx.reports_dir).unwrap();
    let existing = fx.reports_dir.join(report_file_name(&run_at));
    std::fs::write(&existing, "{}").unwrap();

    let compiler = ReportCompiler::new(&fx.reports_dir, None);
    assert!(compiler.compile(&mut conns, &run_at).is_err());
    assert_eq!(std::fs::read_to_string(existing).unwrap(), "{}");
}

#[test]
fn unprovisioned_schema_produces_no_file() {
    let fx = TestFixture::new();
    let mut conns = fx.connections();

    let result = ReportCompiler::new(&fx.reports_dir, None).compile(&mut conns, &Local::now());
    assert!(result.is_err());
    assert!(fx.report_files().is_empty());
}
