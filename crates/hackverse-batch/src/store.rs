//! Similarity report persistence.
//!
//! # Design
//! - Saving a report replaces the stored report for the same submission.
//! - The file store keeps every report in one JSON document and rewrites it
//!   through a temporary file and a rename, so readers never see a torn write.
//! - Reports are keyed by submission id only, so one file holds one event.
//!   The first event saved binds the file and other events are rejected.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::model::SimilarityReport;

/// Storage for per-submission similarity reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Report for `submission_id`, if one exists.
    async fn load(&self, submission_id: &str) -> StoreResult<Option<SimilarityReport>>;
    /// Insert or replace the report for `report.submission_id`.
    async fn save(&self, report: &SimilarityReport) -> StoreResult<()>;
    /// Every stored report, ordered by submission id.
    async fn list(&self) -> StoreResult<Vec<SimilarityReport>>;
}

/// In-process store used by tests and one-off runs.
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: RwLock<BTreeMap<String, SimilarityReport>>,
}

impl MemoryReportStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn load(&self, submission_id: &str) -> StoreResult<Option<SimilarityReport>> {
        Ok(self.reports.read().await.get(submission_id).cloned())
    }

    async fn save(&self, report: &SimilarityReport) -> StoreResult<()> {
        self.reports
            .write()
            .await
            .insert(report.submission_id.clone(), report.clone());
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<SimilarityReport>> {
        Ok(self.reports.read().await.values().cloned().collect())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,
    #[serde(default)]
    reports: BTreeMap<String, SimilarityReport>,
}

impl ReportDocument {
    /// Event this document holds, falling back to the reports for files
    /// written before the binding was recorded.
    fn bound_event(&self) -> Option<&str> {
        self.event_id.as_deref().or_else(|| {
            self.reports
                .values()
                .find_map(|report| report.event_id.as_deref())
        })
    }
}

/// Store backed by a single JSON document on disk.
///
/// A file holds the reports of one event; saving a report from another event
/// fails with [`StoreError::EventMismatch`].
#[derive(Debug)]
pub struct JsonFileReportStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonFileReportStore {
    /// Store reading and writing `path`; the file is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Location of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> StoreResult<ReportDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(ReportDocument::default()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| StoreError::json("decode_reports", &self.path, err)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(ReportDocument::default()),
            Err(err) => Err(StoreError::io("read_reports", &self.path, err)),
        }
    }

    async fn write_document(&self, document: &ReportDocument) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| StoreError::io("create_report_dir", parent, err))?;
        }
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|err| StoreError::json("encode_reports", &self.path, err))?;
        let staging = staging_path(&self.path);
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|err| StoreError::io("write_reports", &staging, err))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|err| StoreError::io("replace_reports", &self.path, err))
    }
}

#[async_trait]
impl ReportStore for JsonFileReportStore {
    async fn load(&self, submission_id: &str) -> StoreResult<Option<SimilarityReport>> {
        let _guard = self.guard.lock().await;
        Ok(self.read_document().await?.reports.remove(submission_id))
    }

    async fn save(&self, report: &SimilarityReport) -> StoreResult<()> {
        let _guard = self.guard.lock().await;
        let mut document = self.read_document().await?;
        if let Some(incoming) = report.event_id.as_deref() {
            match document.bound_event() {
                Some(stored) if stored != incoming => {
                    return Err(StoreError::EventMismatch {
                        path: self.path.clone(),
                        stored: stored.to_string(),
                        incoming: incoming.to_string(),
                    });
                }
                Some(_) => {}
                None => document.event_id = Some(incoming.to_string()),
            }
        }
        document
            .reports
            .insert(report.submission_id.clone(), report.clone());
        self.write_document(&document).await
    }

    async fn list(&self) -> StoreResult<Vec<SimilarityReport>> {
        let _guard = self.guard.lock().await;
        Ok(self.read_document().await?.reports.into_values().collect())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
