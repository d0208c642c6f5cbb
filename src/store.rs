use std::{
    cell::RefCell,
    collections::BTreeMap,
    future::Future,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{RecordId, error::StoreError};

/// What a finalized session writes against its owning record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentRecord {
    pub record_id: RecordId,
    pub scale: f64,
    pub rotation: f64,
    pub translate_x: f64,
    pub translate_y: f64,
    pub scan_completed: bool,
}

/// Stored state of one owning record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translate_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translate_y: Option<f64>,
    #[serde(default)]
    pub scan_completed: bool,
}

impl RecordDocument {
    fn merge_alignment(&mut self, record: &AlignmentRecord) {
        self.scale = Some(record.scale);
        self.rotation = Some(record.rotation);
        self.translate_x = Some(record.translate_x);
        self.translate_y = Some(record.translate_y);
        self.scan_completed = record.scan_completed;
    }
}

/// Persistence collaborator for alignment results.
///
/// Writes are plain overwrites, so repeating one after a failure is safe.
pub trait RecordStore {
    fn save_alignment(
        &self,
        record: &AlignmentRecord,
    ) -> impl Future<Output = Result<(), StoreError>>;

    fn save_scale(
        &self,
        record_id: &RecordId,
        scale: f64,
    ) -> impl Future<Output = Result<(), StoreError>>;

    fn load(
        &self,
        record_id: &RecordId,
    ) -> impl Future<Output = Result<Option<RecordDocument>, StoreError>>;
}

type Documents = BTreeMap<RecordId, RecordDocument>;

/// Keeps every record in one pretty-printed JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_documents(&self) -> Result<Documents, StoreError> {
        if !tokio::fs::try_exists(&self.path).await? {
            debug!("store {} does not exist yet", self.path.display());
            return Ok(Documents::new());
        }
        let content = tokio::fs::read(&self.path).await?;
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Documents::new());
        }
        Ok(serde_json::from_slice(&content)?)
    }

    /// Sibling file a write lands in before it replaces the store.
    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }

    async fn write_documents(&self, documents: &Documents) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(documents)?;
        let staging = self.staging_path();
        tokio::fs::write(&staging, content).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        trace!("wrote {} records to {}", documents.len(), self.path.display());
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    async fn save_alignment(&self, record: &AlignmentRecord) -> Result<(), StoreError> {
        let mut documents = self.read_documents().await?;
        documents
            .entry(record.record_id.clone())
            .or_default()
            .merge_alignment(record);
        self.write_documents(&documents).await
    }

    async fn save_scale(&self, record_id: &RecordId, scale: f64) -> Result<(), StoreError> {
        let mut documents = self.read_documents().await?;
        documents.entry(record_id.clone()).or_default().scale = Some(scale);
        self.write_documents(&documents).await
    }

    async fn load(&self, record_id: &RecordId) -> Result<Option<RecordDocument>, StoreError> {
        Ok(self.read_documents().await?.remove(record_id))
    }
}

/// In-process store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RefCell<Documents>,
    writes: RefCell<Vec<RecordId>>,
}

impl MemoryStore {
    /// Record ids in the order they were written.
    pub fn writes(&self) -> Vec<RecordId> {
        self.writes.borrow().clone()
    }
}

impl RecordStore for MemoryStore {
    async fn save_alignment(&self, record: &AlignmentRecord) -> Result<(), StoreError> {
        self.documents
            .borrow_mut()
            .entry(record.record_id.clone())
            .or_default()
            .merge_alignment(record);
        self.writes.borrow_mut().push(record.record_id.clone());
        Ok(())
    }

    async fn save_scale(&self, record_id: &RecordId, scale: f64) -> Result<(), StoreError> {
        self.documents
            .borrow_mut()
            .entry(record_id.clone())
            .or_default()
            .scale = Some(scale);
        self.writes.borrow_mut().push(record_id.clone());
        Ok(())
    }

    async fn load(&self, record_id: &RecordId) -> Result<Option<RecordDocument>, StoreError> {
        Ok(self.documents.borrow().get(record_id).cloned())
    }
}
