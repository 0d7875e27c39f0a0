// src/ingest/providers/currency.rs
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::ingest::types::{Fetcher, Service};
use crate::ingest::{decode, fetch_stamp, get_text};
use crate::store::{Record, Scalar};

const NAME: &str = "currency";

#[derive(Debug, Deserialize)]
struct RatesResponse {
    base_code: Option<String>,
    rates: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyRate {
    pub base: Option<String>,
    pub target: String,
    pub rate: f64,
}

impl CurrencyRate {
    /// Row shape of the `currency` table.
    pub fn into_record(self, timestamp: &str) -> Record {
        Record::from([
            ("base".to_string(), Scalar::from(self.base)),
            ("target".to_string(), Scalar::from(self.target)),
            ("rate".to_string(), Scalar::from(self.rate)),
            ("timestamp".to_string(), Scalar::from(timestamp)),
        ])
    }
}

/// One rate per target currency, all sharing the response's base code.
pub fn parse_rates(body: &str) -> Result<Vec<CurrencyRate>, FetchError> {
    let resp: RatesResponse = decode(body, NAME)?;
    let rates = resp.rates.ok_or(FetchError::MissingField {
        source_name: NAME,
        field: "rates",
    })?;
    Ok(rates
        .into_iter()
        .map(|(target, rate)| CurrencyRate {
            base: resp.base_code.clone(),
            target,
            rate,
        })
        .collect())
}

pub struct CurrencyFetcher {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        url: String,
        client: reqwest::Client,
        timeout: Duration,
    },
}

impl CurrencyFetcher {
    pub fn from_config(cfg: &SourceConfig) -> Self {
        Self {
            mode: Mode::Http {
                url: cfg.url.clone(),
                client: reqwest::Client::new(),
                timeout: cfg.timeout(),
            },
        }
    }

    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }
}

#[async_trait]
impl Fetcher for CurrencyFetcher {
    async fn fetch_latest(&self) -> Result<Vec<Record>, FetchError> {
        let body = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http {
                url,
                client,
                timeout,
            } => get_text(client, url, &[], *timeout, NAME).await?,
        };
        let stamp = fetch_stamp();
        Ok(parse_rates(&body)?
            .into_iter()
            .map(|r| r.into_record(&stamp))
            .collect())
    }

    fn service(&self) -> Service {
        Service::Currency
    }
}
