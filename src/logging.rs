//! Exchange log: one record per relayed request, kept in a ring buffer and
//! appended to a JSONL file so the history survives restarts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const MAX_EXCHANGES: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub timestamp: DateTime<Utc>,
    pub id: String,
    /// Route the request arrived on, e.g. `/v1/messages`.
    pub route: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    pub status: u16,
    pub latency_ms: u64,
    /// Error kind of a failed exchange, e.g. `service`. The detail is only
    /// traced, since this record is served on `/v1/exchanges`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExchangeRecord {
    pub fn new(id: impl Into<String>, route: impl Into<String>, status: u16) -> Self {
        Self {
            timestamp: Utc::now(),
            id: id.into(),
            route: route.into(),
            model_id: None,
            status,
            latency_ms: 0,
            error: None,
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

pub struct ExchangeLog {
    records: VecDeque<ExchangeRecord>,
    capacity: usize,
    file_path: PathBuf,
    file_lines: usize,
    writer: Option<BufWriter<File>>,
}

impl ExchangeLog {
    /// Open (or create) the log file and reload the most recent records.
    pub fn open(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        Self::open_with_capacity(file_path, MAX_EXCHANGES)
    }

    /// The file is compacted once it holds twice `capacity` lines.
    pub fn open_with_capacity(
        file_path: impl AsRef<Path>,
        capacity: usize,
    ) -> std::io::Result<Self> {
        let file_path = file_path.as_ref().to_path_buf();
        let capacity = capacity.max(1);

        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut records = VecDeque::with_capacity(capacity);
        let mut file_lines = 0;

        if file_path.exists() {
            let reader = BufReader::new(File::open(&file_path)?);
            for line in reader.lines().map_while(std::result::Result::ok) {
                file_lines += 1;
                // skip lines from older formats or partial writes
                if let Ok(record) = serde_json::from_str::<ExchangeRecord>(&line) {
                    if records.len() >= capacity {
                        records.pop_front();
                    }
                    records.push_back(record);
                }
            }
        }

        let writer = BufWriter::new(open_append(&file_path)?);

        Ok(Self {
            records,
            capacity,
            file_path,
            file_lines,
            writer: Some(writer),
        })
    }

    pub fn record(&mut self, record: ExchangeRecord) {
        if let Some(ref mut writer) = self.writer {
            if let Ok(json) = serde_json::to_string(&record) {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
                self.file_lines += 1;
            }
        }
        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);

        if self.file_lines >= self.capacity * 2 {
            if let Err(e) = self.compact() {
                tracing::warn!(
                    error = %e,
                    path = %self.file_path.display(),
                    "Exchange log compaction failed"
                );
            }
        }
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<ExchangeRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rewrite the file so it holds only the records still in memory.
    pub fn compact(&mut self) -> std::io::Result<()> {
        self.writer = None;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.file_path)?;
        let mut writer = BufWriter::new(file);
        for record in &self.records {
            if let Ok(json) = serde_json::to_string(record) {
                writeln!(writer, "{}", json)?;
            }
        }
        writer.flush()?;
        self.file_lines = self.records.len();
        self.writer = Some(BufWriter::new(open_append(&self.file_path)?));
        Ok(())
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[derive(Clone)]
pub struct SharedExchangeLog(Arc<Mutex<ExchangeLog>>);

impl SharedExchangeLog {
    pub fn open(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(ExchangeLog::open(file_path)?))))
    }

    pub fn record(&self, record: ExchangeRecord) {
        if let Ok(mut log) = self.0.lock() {
            log.record(record);
        }
    }

    /// Record from async code; the file write runs on the blocking pool.
    pub async fn append(&self, record: ExchangeRecord) {
        let log = self.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || log.record(record)).await {
            tracing::warn!(error = %e, "Exchange log write did not complete");
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<ExchangeRecord> {
        self.0.lock().map(|l| l.recent(limit)).unwrap_or_default()
    }

    pub fn compact(&self) -> std::io::Result<()> {
        match self.0.lock() {
            Ok(mut log) => log.compact(),
            Err(_) => Ok(()),
        }
    }
}
