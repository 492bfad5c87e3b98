//! File-backed history store: one JSON record log plus artifact files.
//!
//! The log is a single document read-modify-written as a whole, so every
//! mutating operation serializes on one store-level mutex. That mutex is
//! independent of the job registry's lock and the two are never held
//! together.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::retention::RetentionPolicy;
use super::ResultRecord;
use crate::error::StoreError;

/// On-disk shape of the history log.
#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryLog {
    images: Vec<ResultRecord>,
}

/// One page of history, newest first.
#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub images: Vec<ResultRecord>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

/// Outcome of a retention pass.
#[derive(Debug, Serialize)]
pub struct CleanupReport {
    pub deleted_count: usize,
    pub remaining_count: usize,
}

struct StoreInner {
    log_path: PathBuf,
    images_dir: PathBuf,
    retention: RetentionPolicy,
    /// Guards every read-modify-write of the whole log.
    write_lock: Mutex<()>,
}

/// Durable record of completed results. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct HistoryStore {
    inner: Arc<StoreInner>,
}

impl HistoryStore {
    /// Open (and if needed seed) the history log under `data_dir`.
    pub fn open(
        log_path: impl Into<PathBuf>,
        images_dir: impl Into<PathBuf>,
        retention: RetentionPolicy,
    ) -> Result<Self, StoreError> {
        let log_path = log_path.into();
        let images_dir = images_dir.into();
        std::fs::create_dir_all(&images_dir)?;
        if !log_path.exists() {
            std::fs::write(&log_path, "{\"images\": []}")?;
        }
        Ok(Self {
            inner: Arc::new(StoreInner {
                log_path,
                images_dir,
                retention,
                write_lock: Mutex::new(()),
            }),
        })
    }

    /// Absolute path of a record's artifact file.
    pub fn artifact_path(&self, record: &ResultRecord) -> PathBuf {
        self.inner.images_dir.join(&record.filename)
    }

    /// Append a completed result and its artifact, then run retention.
    ///
    /// The artifact file is written before the record so a persisted
    /// record always has its artifact. Pruning happens synchronously with
    /// the commit; log or artifact *write* failures propagate, pruned-file
    /// *delete* failures are logged and tolerated.
    pub async fn commit(&self, record: &ResultRecord, artifact: &[u8]) -> Result<(), StoreError> {
        let path = self.artifact_path(record);
        tokio::fs::write(&path, artifact).await?;

        let _guard = self.inner.write_lock.lock().await;
        let mut log = self.load().await?;
        log.images.push(record.clone());

        let (kept, pruned) = self.inner.retention.partition(log.images, Utc::now());
        self.delete_artifacts(&pruned).await;
        if !pruned.is_empty() {
            tracing::info!(pruned = pruned.len(), "Retention pruned old results");
        }

        self.save(&HistoryLog { images: kept }).await
    }

    /// One page of records, newest first. Stateless slicing over a fresh
    /// sorted view; `page` is 1-indexed.
    pub async fn list(&self, page: usize, page_size: usize) -> Result<HistoryPage, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut images = self.load().await?.images;
        drop(_guard);

        images.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = images.len();
        let page = page.max(1);
        let page_size = page_size.max(1);
        let start = page.saturating_sub(1).saturating_mul(page_size);
        let images = images.into_iter().skip(start).take(page_size).collect();

        Ok(HistoryPage {
            images,
            total,
            page,
            page_size,
        })
    }

    /// Look up one record.
    pub async fn get(&self, id: Uuid) -> Result<ResultRecord, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let log = self.load().await?;
        log.images
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound { id })
    }

    /// The newest record, if any.
    pub async fn latest(&self) -> Result<Option<ResultRecord>, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let log = self.load().await?;
        Ok(log
            .images
            .into_iter()
            .max_by_key(|r| r.created_at))
    }

    /// Read a record's artifact bytes.
    pub async fn read_artifact(&self, id: Uuid) -> Result<(ResultRecord, Vec<u8>), StoreError> {
        let record = self.get(id).await?;
        let path = self.artifact_path(&record);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok((record, bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::ArtifactMissing { id, path })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete one record and its artifact. The file delete is best-effort;
    /// the record is removed regardless.
    pub async fn remove(&self, id: Uuid) -> Result<ResultRecord, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut log = self.load().await?;
        let pos = log
            .images
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::NotFound { id })?;
        let removed = log.images.remove(pos);

        self.delete_artifacts(std::slice::from_ref(&removed)).await;
        self.save(&log).await?;
        tracing::info!(result = %id, "Deleted result");
        Ok(removed)
    }

    /// Manual retention pass.
    pub async fn cleanup(&self) -> Result<CleanupReport, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let log = self.load().await?;
        let (kept, pruned) = self.inner.retention.partition(log.images, Utc::now());

        self.delete_artifacts(&pruned).await;
        let report = CleanupReport {
            deleted_count: pruned.len(),
            remaining_count: kept.len(),
        };
        self.save(&HistoryLog { images: kept }).await?;
        Ok(report)
    }

    async fn load(&self) -> Result<HistoryLog, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.inner.log_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HistoryLog::default());
            }
            Err(e) => {
                return Err(StoreError::LogRead {
                    path: self.inner.log_path.clone(),
                    message: e.to_string(),
                });
            }
        };
        serde_json::from_str(&raw).map_err(|e| StoreError::LogRead {
            path: self.inner.log_path.clone(),
            message: e.to_string(),
        })
    }

    async fn save(&self, log: &HistoryLog) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(log).map_err(|e| StoreError::LogWrite {
            path: self.inner.log_path.clone(),
            message: e.to_string(),
        })?;
        tokio::fs::write(&self.inner.log_path, raw)
            .await
            .map_err(|e| StoreError::LogWrite {
                path: self.inner.log_path.clone(),
                message: e.to_string(),
            })
    }

    /// Best-effort artifact removal: absence is tolerated, other failures
    /// are logged and never abort the surrounding operation.
    async fn delete_artifacts(&self, records: &[ResultRecord]) {
        for record in records {
            let path = self.artifact_path(record);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(file = %record.filename, "Deleted artifact file")
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(file = %record.filename, error = %e, "Failed to delete artifact file")
                }
            }
        }
    }
}
