//! Local file records — the gateway's bookkeeping entity for staged files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Free-form metadata declared by the client when staging a file.
pub type FileMetadata = serde_json::Value;

/// Stage of the upload saga, persisted on the record.
///
/// The stage advances together with each stage's side effect, so a crash
/// mid-saga can be audited (or resumed) from persisted state alone.
///
/// ```text
/// Pending -> Uploading -> Paying -> Notifying -> Complete
///      \-> Failed (from Uploading/Paying/Notifying on error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStage {
    /// Record staged locally, saga not yet started.
    #[default]
    Pending,
    /// Sending bytes and metadata to the storage network.
    Uploading,
    /// Settling payment through the billing service.
    Paying,
    /// Informing the storage network that payment succeeded.
    Notifying,
    /// Saga finished; the file is uploaded and paid for.
    Complete,
    /// Saga aborted; see the record's populated fields for how far it got.
    Failed,
}

impl UploadStage {
    /// Returns true if the saga can no longer advance from this stage.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Uploading => "UPLOADING",
            Self::Paying => "PAYING",
            Self::Notifying => "NOTIFYING",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Per-file local state tracked by the gateway.
///
/// Records are soft-deleted only: `deleted_locally` marks the byte content
/// as removed while the bookkeeping entry is retained forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalFileRecord {
    /// Generated id, assigned once at creation and never reused.
    pub id: Uuid,
    /// Client-facing file name.
    pub name: String,
    /// Path of the staged byte content on this gateway.
    pub local_path: PathBuf,
    /// File extension.
    pub extension: String,
    /// Declared mime type.
    pub mime_type: String,
    /// Declared metadata, passed through to the storage network.
    pub metadata: FileMetadata,
    /// Bytes written so far; grows monotonically with chunk appends.
    pub size: u64,
    /// This gateway's account address.
    pub service_node_address: String,
    /// Address of the data validator who must pay for the upload.
    pub data_validator_address: String,
    /// Owner address provisioned once payment settles.
    pub data_owner_address: Option<String>,
    /// Private key of the provisioned owner address.
    pub private_key: Option<String>,
    /// Retention deadline on the storage network.
    pub keep_until: DateTime<Utc>,
    /// Set once the saga completed successfully.
    pub uploaded_to_dds: bool,
    /// Set when a saga run ended in a terminal error.
    pub failed: bool,
    /// External file id assigned by the storage network.
    pub dds_id: Option<String>,
    /// Price declared when the record was created.
    pub price: f64,
    /// Price quoted by the storage network at upload time.
    pub storage_price: Option<f64>,
    /// True once the staged byte content has been removed locally.
    pub deleted_locally: bool,
    /// Persisted saga stage.
    #[serde(default)]
    pub stage: UploadStage,
}

/// Parameters for staging a new local file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFileRecord {
    /// Client-facing file name.
    pub name: String,
    /// File extension.
    pub extension: String,
    /// Declared mime type.
    pub mime_type: String,
    /// Declared metadata.
    pub metadata: FileMetadata,
    /// Retention deadline.
    pub keep_until: DateTime<Utc>,
    /// Declared price.
    pub price: f64,
    /// Data validator who must pay for the upload.
    pub data_validator_address: String,
}

impl LocalFileRecord {
    /// Build a fresh record from staging parameters.
    ///
    /// The record starts with size 0, no external id and the saga pending.
    #[must_use]
    pub fn new(
        id: Uuid,
        params: NewFileRecord,
        local_path: PathBuf,
        service_node_address: String,
    ) -> Self {
        Self {
            id,
            name: params.name,
            local_path,
            extension: params.extension,
            mime_type: params.mime_type,
            metadata: params.metadata,
            size: 0,
            service_node_address,
            data_validator_address: params.data_validator_address,
            data_owner_address: None,
            private_key: None,
            keep_until: params.keep_until,
            uploaded_to_dds: false,
            failed: false,
            dds_id: None,
            price: params.price,
            storage_price: None,
            deleted_locally: false,
            stage: UploadStage::Pending,
        }
    }
}

/// Upload status summary for a staged record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCheck {
    /// True once the saga completed and the file lives on the network.
    pub fully_uploaded: bool,
    /// True if the last saga run ended in a terminal error.
    pub failed: bool,
    /// Persisted saga stage.
    pub stage: UploadStage,
    /// External file id, present once the UPLOADING stage completed.
    pub dds_file_id: Option<String>,
    /// Declared price.
    pub price: f64,
    /// Storage-network quoted price, present once uploaded.
    pub storage_price: Option<f64>,
    /// Provisioned owner address, present once payment settled.
    pub data_owner: Option<String>,
    /// Provisioned owner private key, present once payment settled.
    pub private_key: Option<String>,
}

impl From<&LocalFileRecord> for UploadCheck {
    fn from(record: &LocalFileRecord) -> Self {
        Self {
            fully_uploaded: record.uploaded_to_dds,
            failed: record.failed,
            stage: record.stage,
            dds_file_id: record.dds_id.clone(),
            price: record.price,
            storage_price: record.storage_price,
            data_owner: record.data_owner_address.clone(),
            private_key: record.private_key.clone(),
        }
    }
}

/// Descriptive view of an uploaded file, keyed by its external id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// External storage-network file id.
    pub id: String,
    /// Declared metadata.
    pub metadata: FileMetadata,
    /// Data validator address.
    pub data_validator: String,
    /// Owner address, if payment settled.
    pub data_owner: Option<String>,
    /// Gateway account address.
    pub service_node: String,
    /// Retention deadline.
    pub keep_until: DateTime<Utc>,
    /// File extension.
    pub extension: String,
    /// Mime type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Declared price.
    pub price: f64,
    /// File name.
    pub name: String,
}

impl LocalFileRecord {
    /// Map the record to its external descriptive view.
    ///
    /// Returns `None` when the record has not been uploaded yet (no
    /// external id to key the view by).
    #[must_use]
    pub fn to_file_info(&self) -> Option<FileInfo> {
        let id = self.dds_id.clone()?;
        Some(FileInfo {
            id,
            metadata: self.metadata.clone(),
            data_validator: self.data_validator_address.clone(),
            data_owner: self.data_owner_address.clone(),
            service_node: self.service_node_address.clone(),
            keep_until: self.keep_until,
            extension: self.extension.clone(),
            mime_type: self.mime_type.clone(),
            size: self.size,
            price: self.price,
            name: self.name.clone(),
        })
    }
}
