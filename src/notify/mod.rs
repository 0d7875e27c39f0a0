// src/notify/mod.rs
pub mod email;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::connections::ConnectionManager;
use crate::error::NotifyError;

pub use email::EmailNotifier;

/// What gets delivered for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEmail {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachment: PathBuf,
}

impl ReportEmail {
    pub fn for_report(recipients: &[String], report: &Path, now: DateTime<Local>) -> Self {
        Self {
            recipients: recipients.to_vec(),
            subject: format!("Automated Report - {}", now.format("%Y-%m-%d %H:%M")),
            body: "Please find the attached JSON report.".to_string(),
            attachment: report.to_path_buf(),
        }
    }
}

/// Delivers a compiled report. Gets the run's connections so transports
/// that need a cached handle can acquire it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_report(
        &self,
        conns: &mut ConnectionManager,
        report: &Path,
    ) -> Result<(), NotifyError>;

    fn name(&self) -> &'static str;
}

// --- Test helper ---
/// Records every report path it is handed; optionally fails every send.
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<PathBuf>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(vec![]),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(vec![]),
            fail: true,
        }
    }

    pub fn sent_paths(&self) -> Vec<PathBuf> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_report(
        &self,
        _conns: &mut ConnectionManager,
        report: &Path,
    ) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Attachment {
                path: report.to_path_buf(),
                source: std::io::Error::other("recording notifier set to fail"),
            });
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(report.to_path_buf());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
