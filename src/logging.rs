//! Exchange log: one JSONL record per gateway request.
//!
//! Sits next to `tracing`; it keeps the last [`MAX_RECORDS`] exchanges in
//! memory and appends every record to a file when one is configured.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const MAX_RECORDS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Upstream answered; its status was forwarded.
    Forwarded,
    /// The gateway produced an error envelope itself.
    GatewayError,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub route: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_url: Option<String>,
    pub status: u16,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExchangeRecord {
    pub fn new(route: impl Into<String>, status: u16, outcome: Outcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            route: route.into(),
            upstream_url: None,
            status,
            outcome,
            error: None,
        }
    }

    pub fn with_upstream(mut self, url: impl Into<String>) -> Self {
        self.upstream_url = Some(url.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

struct ExchangeLog {
    records: VecDeque<ExchangeRecord>,
    writer: Option<BufWriter<File>>,
}

impl ExchangeLog {
    fn open(file_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut records = VecDeque::with_capacity(MAX_RECORDS);

        if file_path.exists() {
            let reader = BufReader::new(File::open(file_path)?);
            for line in reader.lines().map_while(std::result::Result::ok) {
                if let Ok(record) = serde_json::from_str::<ExchangeRecord>(&line) {
                    if records.len() >= MAX_RECORDS {
                        records.pop_front();
                    }
                    records.push_back(record);
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        Ok(Self {
            records,
            writer: Some(BufWriter::new(file)),
        })
    }

    fn in_memory() -> Self {
        Self {
            records: VecDeque::new(),
            writer: None,
        }
    }

    fn push(&mut self, record: ExchangeRecord) {
        if let Some(ref mut writer) = self.writer {
            if let Ok(json) = serde_json::to_string(&record) {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
        if self.records.len() >= MAX_RECORDS {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    fn recent(&self, limit: usize) -> Vec<ExchangeRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }
}

/// Cloneable handle to the exchange log, shared by all request tasks.
#[derive(Clone)]
pub struct RequestLogger(Arc<Mutex<ExchangeLog>>);

impl RequestLogger {
    pub fn new(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(ExchangeLog::open(
            file_path.as_ref(),
        )?))))
    }

    /// Keeps records in memory only.
    pub fn disabled() -> Self {
        Self(Arc::new(Mutex::new(ExchangeLog::in_memory())))
    }

    pub fn record(&self, record: ExchangeRecord) {
        if let Ok(mut log) = self.0.lock() {
            log.push(record);
        }
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<ExchangeRecord> {
        self.0.lock().map(|l| l.recent(limit)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("gateway.jsonl");

        let logger = RequestLogger::new(&path).unwrap();
        logger.record(
            ExchangeRecord::new("POST /v1/completions", 200, Outcome::Forwarded)
                .with_upstream("https://upstream/v1/completions"),
        );
        logger.record(
            ExchangeRecord::new("GET /v1/models", 500, Outcome::GatewayError)
                .with_error("No access token"),
        );
        drop(logger);

        let reopened = RequestLogger::new(&path).unwrap();
        let recent = reopened.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].route, "GET /v1/models");
        assert_eq!(recent[0].error.as_deref(), Some("No access token"));
        assert_eq!(recent[1].outcome, Outcome::Forwarded);
    }

    #[test]
    fn test_disabled_logger_keeps_memory_only() {
        let logger = RequestLogger::disabled();
        logger.record(ExchangeRecord::new("GET /nope", 404, Outcome::NotFound));
        logger.record(ExchangeRecord::new("GET /v1/models", 200, Outcome::Forwarded));

        let recent = logger.recent(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].route, "GET /v1/models");
    }
}
