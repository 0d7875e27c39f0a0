// src/retention.rs
//! Age-based cleanup of old report files.

use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Upper bound accepted for `--retention-days` (about a century).
pub const MAX_RETENTION_DAYS: u64 = 36_500;

const SECS_PER_DAY: u64 = 86_400;

/// Saturates instead of overflowing for absurdly large `n`.
pub fn days(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(SECS_PER_DAY))
}

/// Delete `*.json` files directly under `dir` whose modification time is
/// older than `max_age`. Returns how many were deleted; a missing directory
/// counts as nothing to do.
pub fn sweep(dir: &Path, max_age: Duration) -> io::Result<usize> {
    sweep_at(dir, max_age, SystemTime::now())
}

pub fn sweep_at(dir: &Path, max_age: Duration, now: SystemTime) -> io::Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let cutoff = now.checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH);

    let mut deleted = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else { continue };
        if modified < cutoff {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(target: "retention", path = %path.display(), "deleted old report");
                    deleted += 1;
                }
                Err(e) => {
                    tracing::warn!(target: "retention", path = %path.display(), error = %e, "could not delete old report");
                }
            }
        }
    }

    tracing::info!(target: "retention", dir = %dir.display(), deleted, "old reports deleted");
    Ok(deleted)
}
