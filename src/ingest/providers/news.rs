// src/ingest/providers/news.rs
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::ingest::types::{Fetcher, Service};
use crate::ingest::{decode, fetch_stamp, get_text};
use crate::store::{Record, Scalar};

const NAME: &str = "news";

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Option<Vec<Article>>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    source: Option<ArticleSource>,
    title: Option<String>,
    url: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

/// One headline as the news API reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsArticle {
    pub source: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
    pub content: Option<String>,
}

impl NewsArticle {
    /// Row shape of the `news` table.
    pub fn into_record(self, fetched_at: &str) -> Record {
        Record::from([
            ("headline".to_string(), Scalar::from(self.title)),
            ("source".to_string(), Scalar::from(self.source)),
            ("url".to_string(), Scalar::from(self.url)),
            ("published_at".to_string(), Scalar::from(self.published_at)),
            ("fetched_at".to_string(), Scalar::from(fetched_at)),
        ])
    }
}

/// Parse a news API body. A body without `articles` yields no articles.
pub fn parse_articles(body: &str) -> Result<Vec<NewsArticle>, FetchError> {
    let resp: NewsResponse = decode(body, NAME)?;
    Ok(resp
        .articles
        .unwrap_or_default()
        .into_iter()
        .map(|a| NewsArticle {
            source: a.source.and_then(|s| s.name),
            title: a.title,
            url: a.url,
            published_at: a.published_at,
            content: a.content,
        })
        .collect())
}

pub struct NewsFetcher {
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

impl NewsFetcher {
    pub fn from_config(cfg: &SourceConfig) -> Self {
        Self {
            mode: Mode::Http {
                url: cfg.url.clone(),
                client: reqwest::Client::new(),
                timeout: cfg.timeout(),
            },
        }
    }

    /// Serve a canned response body instead of calling the API.
    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }

    async fn body(&self) -> Result<String, FetchError> {
        match &self.mode {
            Mode::Fixture(s) => Ok(s.clone()),
            Mode::Http {
                url,
                client,
                timeout,
            } => get_text(client, url, &[], *timeout, NAME).await,
        }
    }
}

#[async_trait]
impl Fetcher for NewsFetcher {
    async fn fetch_latest(&self) -> Result<Vec<Record>, FetchError> {
        let body = self.body().await?;
        let fetched_at = fetch_stamp();
        Ok(parse_articles(&body)?
            .into_iter()
            .map(|a| a.into_record(&fetched_at))
            .collect())
    }

    fn service(&self) -> Service {
        Service::News
    }
}
