//! Persistence sinks for finished cycle records.

use async_trait::async_trait;
use cogloop_core::{
    AuditResult, DocumentationResult, Reflection, Result, SynthesisResult, Thought, WeightVector,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Every record a cycle hands to persistence.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum CycleRecord {
    Thought(Thought),
    Reflection(Reflection),
    Audit(AuditResult),
    Synthesis(SynthesisResult),
    Documentation(DocumentationResult),
    Weights(WeightVector),
}

impl CycleRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            CycleRecord::Thought(_) => "thought",
            CycleRecord::Reflection(_) => "reflection",
            CycleRecord::Audit(_) => "audit",
            CycleRecord::Synthesis(_) => "synthesis",
            CycleRecord::Documentation(_) => "documentation",
            CycleRecord::Weights(_) => "weights",
        }
    }
}

#[async_trait]
pub trait CycleStore: Send + Sync {
    /// Persist one finished record.
    async fn put(&self, record: CycleRecord) -> Result<()>;
}

/// In-memory sink.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<CycleRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<CycleRecord> {
        self.records.lock().await.clone()
    }

    pub async fn count(&self, kind: &str) -> usize {
        self.records.lock().await.iter().filter(|r| r.kind() == kind).count()
    }
}

#[async_trait]
impl CycleStore for MemoryStore {
    async fn put(&self, record: CycleRecord) -> Result<()> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

/// Append-only JSON lines file, one record per line.
pub struct JsonlStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record back. A missing file reads as empty; malformed lines are skipped.
    pub async fn read_all(&self) -> Result<Vec<CycleRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = lineno + 1,
                    "Skipping malformed record: {}",
                    e
                ),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl CycleStore for JsonlStore {
    async fn put(&self, record: CycleRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
