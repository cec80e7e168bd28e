use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::outcome::{ClassificationResult, ExecutionSummary, MetricKey};
use crate::store::jsonl::{load_lines, open_append, write_line};

pub const DEFAULT_MAX_EXECUTIONS: usize = 10_000;

/// A classified workflow execution, kept so a human can confirm it later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub company_id: Option<String>,
    pub summary: ExecutionSummary,
    pub result: ClassificationResult,
    pub confirmed_metric_key: Option<MetricKey>,
    pub classified_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    pub fn new(
        execution_id: &str,
        company_id: Option<&str>,
        summary: ExecutionSummary,
        result: ClassificationResult,
    ) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            company_id: company_id.map(str::to_string),
            summary,
            result,
            confirmed_metric_key: None,
            classified_at: Utc::now(),
            confirmed_at: None,
        }
    }
}

#[derive(Default)]
struct Records {
    by_id: HashMap<String, ExecutionRecord>,
    /// Ids oldest first, for eviction.
    order: VecDeque<String>,
    journal: Option<Journal>,
}

struct Journal {
    path: PathBuf,
    file: File,
    lines: usize,
}

impl Records {
    fn upsert(&mut self, record: ExecutionRecord, capacity: usize) {
        if !self.by_id.contains_key(&record.execution_id) {
            self.order.push_back(record.execution_id.clone());
        }
        self.by_id.insert(record.execution_id.clone(), record);

        while self.order.len() > capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.by_id.remove(&evicted);
                tracing::debug!(execution_id = %evicted, "Evicted oldest execution");
            }
        }
    }

    /// Journal the record, then apply it.
    async fn persist(&mut self, record: ExecutionRecord, capacity: usize) -> Result<()> {
        if let Some(journal) = self.journal.as_mut() {
            write_line(&mut journal.file, &record).await?;
            journal.lines += 1;
        }
        self.upsert(record, capacity);

        let over = self
            .journal
            .as_ref()
            .is_some_and(|j| j.lines > capacity.saturating_mul(2));
        if over {
            if let Err(e) = self.compact().await {
                tracing::warn!(error = %e, "Failed to compact execution log");
            }
        }
        Ok(())
    }

    /// Rewrite the journal with one line per retained execution.
    async fn compact(&mut self) -> Result<()> {
        let Some(path) = self.journal.as_ref().map(|j| j.path.clone()) else {
            return Ok(());
        };
        rewrite(&path, self).await?;
        self.journal = Some(Journal {
            file: open_append(&path).await?,
            lines: self.order.len(),
            path,
        });
        Ok(())
    }
}

/// Classified executions keyed by execution id.
///
/// Keeps at most `capacity` executions, dropping the oldest first. With a
/// journal every change is written as a full record line before it is
/// applied; on open the last line per id wins. The journal is rewritten on
/// open and whenever it holds more than twice `capacity` lines.
pub struct ExecutionLog {
    records: RwLock<Records>,
    capacity: usize,
}

impl Default for ExecutionLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_EXECUTIONS)
    }
}

impl ExecutionLog {
    /// In-memory log with the default retention.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(Records::default()),
            capacity: capacity.max(1),
        }
    }

    /// Log backed by a JSON-lines journal at `path`.
    pub async fn open(path: &Path, capacity: usize) -> Result<Self> {
        let capacity = capacity.max(1);
        let lines: Vec<ExecutionRecord> = load_lines(path).await?;
        let line_count = lines.len();

        let mut records = Records::default();
        for record in lines {
            records.upsert(record, capacity);
        }

        if line_count > records.order.len() {
            rewrite(path, &records).await?;
        }
        records.journal = Some(Journal {
            path: path.to_path_buf(),
            file: open_append(path).await?,
            lines: records.order.len(),
        });

        tracing::info!(
            path = %path.display(),
            executions = records.order.len(),
            dropped_lines = line_count - records.order.len(),
            "Opened execution log"
        );

        Ok(Self {
            records: RwLock::new(records),
            capacity,
        })
    }

    /// Store a classification, replacing an earlier one for the same execution.
    pub async fn record(&self, record: ExecutionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(previous) = records.by_id.get(&record.execution_id) {
            tracing::debug!(
                execution_id = %record.execution_id,
                previous = %previous.result.metric_key,
                "Re-classified execution"
            );
        }
        records.persist(record, self.capacity).await
    }

    pub async fn get(&self, execution_id: &str) -> Option<ExecutionRecord> {
        self.records.read().await.by_id.get(execution_id).cloned()
    }

    /// Persist a human's chosen outcome and return the updated record.
    pub async fn confirm(&self, execution_id: &str, metric_key: MetricKey) -> Result<ExecutionRecord> {
        let mut records = self.records.write().await;
        let mut record = records
            .by_id
            .get(execution_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("execution {execution_id}")))?;

        record.confirmed_metric_key = Some(metric_key);
        record.confirmed_at = Some(Utc::now());

        records.persist(record.clone(), self.capacity).await?;
        Ok(record)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.by_id.len()
    }
}

async fn rewrite(path: &Path, records: &Records) -> Result<()> {
    let tmp = path.with_extension("jsonl.tmp");
    let mut file = File::create(&tmp).await?;
    for id in &records.order {
        if let Some(record) = records.by_id.get(id) {
            write_line(&mut file, record).await?;
        }
    }
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> ExecutionRecord {
        ExecutionRecord::new(
            id,
            Some("c1"),
            ExecutionSummary::new().with("ticket_id", "T-9"),
            ClassificationResult::unknown(vec!["ticket_id".to_string()]),
        )
    }

    #[tokio::test]
    async fn test_record_and_confirm() {
        let log = ExecutionLog::new();
        log.record(record("ex1")).await.unwrap();

        let confirmed = log.confirm("ex1", MetricKey::TicketCreated).await.unwrap();
        assert_eq!(confirmed.confirmed_metric_key, Some(MetricKey::TicketCreated));
        assert!(confirmed.confirmed_at.is_some());

        let stored = log.get("ex1").await.unwrap();
        assert_eq!(stored.confirmed_metric_key, Some(MetricKey::TicketCreated));
        assert_eq!(stored.result.metric_key, MetricKey::Unknown);
    }

    #[tokio::test]
    async fn test_confirm_unknown_execution() {
        let log = ExecutionLog::new();
        assert!(matches!(
            log.confirm("missing", MetricKey::DealWon).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reclassification_replaces_record() {
        let log = ExecutionLog::new();
        log.record(record("ex1")).await.unwrap();
        log.record(record("ex1")).await.unwrap();
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn test_oldest_executions_are_evicted() {
        let log = ExecutionLog::with_capacity(2);
        for id in ["ex1", "ex2", "ex3"] {
            log.record(record(id)).await.unwrap();
        }
        assert_eq!(log.len().await, 2);
        assert!(log.get("ex1").await.is_none());
        assert!(log.get("ex3").await.is_some());

        // Re-classifying keeps the original position
        log.record(record("ex2")).await.unwrap();
        log.record(record("ex4")).await.unwrap();
        assert!(log.get("ex2").await.is_none());
        assert!(log.get("ex3").await.is_some());
    }

    #[tokio::test]
    async fn test_confirmation_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("executions.jsonl");

        {
            let log = ExecutionLog::open(&path, 100).await.unwrap();
            log.record(record("ex1")).await.unwrap();
            log.record(record("ex2")).await.unwrap();
            log.confirm("ex1", MetricKey::TicketResolved).await.unwrap();
        }

        let reopened = ExecutionLog::open(&path, 100).await.unwrap();
        assert_eq!(reopened.len().await, 2);
        let ex1 = reopened.get("ex1").await.unwrap();
        assert_eq!(ex1.confirmed_metric_key, Some(MetricKey::TicketResolved));
        assert_eq!(ex1.company_id.as_deref(), Some("c1"));

        reopened.confirm("ex2", MetricKey::DealWon).await.unwrap();
    }

    #[tokio::test]
    async fn test_reopen_compacts_and_applies_retention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("executions.jsonl");

        {
            let log = ExecutionLog::open(&path, 100).await.unwrap();
            for id in ["ex1", "ex2", "ex3"] {
                log.record(record(id)).await.unwrap();
            }
            log.confirm("ex3", MetricKey::DealWon).await.unwrap();
        }
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 4);

        let reopened = ExecutionLog::open(&path, 2).await.unwrap();
        assert_eq!(reopened.len().await, 2);
        assert!(reopened.get("ex1").await.is_none());
        assert_eq!(
            reopened.get("ex3").await.unwrap().confirmed_metric_key,
            Some(MetricKey::DealWon)
        );

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_journal_is_compacted_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("executions.jsonl");
        let log = ExecutionLog::open(&path, 2).await.unwrap();

        for i in 0..10 {
            log.record(record(&format!("ex{i}"))).await.unwrap();
        }

        let lines = tokio::fs::read_to_string(&path).await.unwrap().lines().count();
        assert!(lines <= 4, "journal has {lines} lines");
        assert!(log.get("ex9").await.is_some());

        drop(log);
        let reopened = ExecutionLog::open(&path, 2).await.unwrap();
        assert!(reopened.get("ex8").await.is_some());
        assert!(reopened.get("ex9").await.is_some());
    }
}
