//! CSV outreach log.
//!
//! One row per processed lead; the URL column is the dedup key consulted
//! before any work happens on a lead. Appends go through a copy of the file
//! that is atomically renamed over the original, so a crash mid-write can
//! never truncate the log.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const CSV_HEADER: [&str; 5] = ["timestamp", "url", "contact", "subject", "status"];

/// Terminal state of a processed lead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    Found,
    FetchFailed,
    NoEmail,
    SentSuccessfully,
    SendFailed,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Found => "found",
            LogStatus::FetchFailed => "fetch_failed",
            LogStatus::NoEmail => "no_email",
            LogStatus::SentSuccessfully => "sent_successfully",
            LogStatus::SendFailed => "send_failed",
        }
    }
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outreach log row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub url: String,
    pub contact: String,
    pub subject: String,
    pub status: String,
}

impl LogEntry {
    pub fn new(url: &str, contact: &str, subject: &str, status: LogStatus) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            url: url.to_string(),
            contact: contact.to_string(),
            subject: subject.to_string(),
            status: status.as_str().to_string(),
        }
    }
}

/// Append-only CSV log keyed by URL
pub struct OutreachLog {
    path: PathBuf,
}

impl OutreachLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the URL already has a log row. A missing or unreadable log
    /// means nothing was processed yet.
    pub fn already_processed(&self, url: &str) -> bool {
        if !self.path.exists() {
            return false;
        }

        let mut reader = match csv::Reader::from_path(&self.path) {
            Ok(r) => r,
            Err(e) => {
                warn!("Could not read outreach log {}: {}", self.path.display(), e);
                return false;
            }
        };

        for row in reader.deserialize::<LogEntry>() {
            match row {
                Ok(entry) if entry.url == url => return true,
                Ok(_) => {}
                Err(e) => warn!("Skipping malformed outreach log row: {}", e),
            }
        }

        false
    }

    /// Append one row. The row lands in a copy of the log which then
    /// atomically replaces the original.
    pub fn record(&self, entry: &LogEntry) -> Result<()> {
        let temp_path = self.path.with_extension("csv.tmp");

        if self.path.exists() {
            fs::copy(&self.path, &temp_path).with_context(|| {
                format!("Failed to copy outreach log to {}", temp_path.display())
            })?;
        } else {
            let mut writer = csv::Writer::from_path(&temp_path)
                .with_context(|| format!("Failed to create {}", temp_path.display()))?;
            writer.write_record(CSV_HEADER)?;
            writer.flush()?;
        }

        let file = fs::OpenOptions::new()
            .append(true)
            .open(&temp_path)
            .with_context(|| format!("Failed to open {} for append", temp_path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(entry)?;
        writer.flush()?;

        let mut file = writer.into_inner().context("Failed to finish CSV write")?;
        file.flush()?;
        file.sync_all()
            .context("Failed to sync outreach log to disk")?;

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!("Failed to replace outreach log {}", self.path.display())
        })?;

        debug!("Recorded {} for {}", entry.status, entry.url);
        Ok(())
    }

    /// All rows in file order; unreadable rows are skipped
    pub fn entries(&self) -> Vec<LogEntry> {
        if !self.path.exists() {
            return Vec::new();
        }

        let mut reader = match csv::Reader::from_path(&self.path) {
            Ok(r) => r,
            Err(e) => {
                warn!("Could not read outreach log {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        reader
            .deserialize::<LogEntry>()
            .filter_map(|row| row.ok())
            .collect()
    }
}
