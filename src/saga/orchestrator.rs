//! Upload saga orchestrator.

use crate::clients::{
    Billing, DdsUploadRequest, PayForExtensionRequest, PayForUploadRequest, PaymentNotification,
    StorageNetwork,
};
use crate::error::{Error, Result};
use crate::event::{UploadEvent, UploadEventsChannel, UploadEventsSender};
use crate::record::{LocalFileRecord, UploadStage};
use crate::signature::{SignatureVerifier, SignedRequest};
use crate::store::{ByteStore, RecordStore};
use crate::sync::RecordLocks;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Acceptance acknowledgment returned to a submitting caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// True when the operation was accepted.
    pub success: bool,
}

impl Acknowledgement {
    /// An accepted operation.
    #[must_use]
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Drives staged records through upload, payment and notification.
pub struct UploadOrchestrator {
    store: Arc<RecordStore>,
    bytes: Arc<ByteStore>,
    dds: Arc<dyn StorageNetwork>,
    billing: Arc<dyn Billing>,
    verifier: Arc<dyn SignatureVerifier>,
    locks: Arc<RecordLocks>,
    events: UploadEventsSender,
    notify_payment: bool,
}

/// Everything a spawned pipeline run needs, detached from the orchestrator.
struct PipelineDeps {
    store: Arc<RecordStore>,
    dds: Arc<dyn StorageNetwork>,
    billing: Arc<dyn Billing>,
    locks: Arc<RecordLocks>,
    events: UploadEventsSender,
    notify_payment: bool,
}

impl UploadOrchestrator {
    /// Create an orchestrator over the given stores and collaborators.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        store: Arc<RecordStore>,
        bytes: Arc<ByteStore>,
        dds: Arc<dyn StorageNetwork>,
        billing: Arc<dyn Billing>,
        verifier: Arc<dyn SignatureVerifier>,
        locks: Arc<RecordLocks>,
        events: UploadEventsSender,
        notify_payment: bool,
    ) -> Self {
        Self {
            store,
            bytes,
            dds,
            billing,
            verifier,
            locks,
            events,
            notify_payment,
        }
    }

    /// Subscribe to the saga stage trace.
    #[must_use]
    pub fn subscribe(&self) -> UploadEventsChannel {
        self.events.subscribe()
    }

    /// Submit a staged record for upload.
    ///
    /// Preconditions are checked synchronously; once accepted, the
    /// pipeline proceeds on its own task and this call returns
    /// immediately. The outcome is observed by re-reading the record.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no record exists under `record_id`.
    /// - [`Error::Conflict`] if the record is not addressed to a
    ///   data validator.
    /// - [`Error::Forbidden`] if the signed request does not verify
    ///   against the record's data validator address.
    /// - [`Error::Io`] if the staged bytes cannot be read.
    pub async fn submit(
        &self,
        record_id: Uuid,
        request: SignedRequest,
    ) -> Result<Acknowledgement> {
        let record = self
            .store
            .find_by_id(record_id)
            .ok_or_else(|| Error::record_not_found(record_id))?;

        if record.data_validator_address.is_empty() {
            return Err(Error::Conflict(format!(
                "Local file record {record_id} is not addressed to a data validator"
            )));
        }

        if !self
            .verifier
            .is_valid(&record.data_validator_address, &request)
        {
            return Err(Error::Forbidden("Signature is invalid".to_string()));
        }

        let data = self.bytes.read(record_id).await?;

        let deps = PipelineDeps {
            store: Arc::clone(&self.store),
            dds: Arc::clone(&self.dds),
            billing: Arc::clone(&self.billing),
            locks: Arc::clone(&self.locks),
            events: self.events.clone(),
            notify_payment: self.notify_payment,
        };
        tokio::spawn(async move {
            run_pipeline(deps, record, request, data).await;
        });

        Ok(Acknowledgement::ok())
    }

    /// Extend the storage duration of an uploaded file.
    ///
    /// Synchronous mini-saga: quote the extension price, settle it through
    /// billing, notify the storage network, then bump the record's
    /// retention deadline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record carries `dds_file_id`;
    /// collaborator failures propagate directly.
    pub async fn extend_storage(
        &self,
        dds_file_id: &str,
        keep_until: DateTime<Utc>,
        request: SignedRequest,
    ) -> Result<Acknowledgement> {
        debug!("Extending storage duration of file {dds_file_id}");
        let mut record = self.store.find_by_dds_id(dds_file_id).ok_or_else(|| {
            Error::NotFound(format!(
                "Could not find local file record with DDS id {dds_file_id}"
            ))
        })?;

        // Same read-modify-write discipline as the pipeline: the final
        // save must not clobber a concurrent run's outcome fields.
        let lock = self.locks.for_record(record.id);
        let _guard = lock.lock().await;
        if let Some(current) = self.store.find_by_id(record.id) {
            record = current;
        }

        let duration_secs =
            u64::try_from((keep_until - Utc::now()).num_seconds()).unwrap_or(0);
        let price = self.dds.extend_duration(dds_file_id, duration_secs).await?;

        self.billing
            .pay_for_extension(PayForExtensionRequest {
                sum: crate::clients::format_sum(price),
                service_node: record.service_node_address.clone(),
                data_validator: record.data_validator_address.clone(),
                signature: request,
            })
            .await?;

        self.dds
            .notify_payment(PaymentNotification::success(
                dds_file_id.to_string(),
                price,
            ))
            .await?;

        record.keep_until = keep_until;
        self.store.save(record)?;
        Ok(Acknowledgement::ok())
    }
}

async fn run_pipeline(
    deps: PipelineDeps,
    mut record: LocalFileRecord,
    request: SignedRequest,
    data: Vec<u8>,
) {
    let id = record.id;
    let lock = deps.locks.for_record(id);
    let _guard = lock.lock().await;

    // Reload under the lock: a previous run may have advanced the record
    // between submission and this task being scheduled.
    if let Some(current) = deps.store.find_by_id(id) {
        record = current;
    }

    debug!("Started processing data uploading - {id}");

    // UPLOADING
    enter_stage(&deps, &mut record, UploadStage::Uploading);
    let handle = match deps.dds.upload(upload_request(&record, &data)).await {
        Ok(handle) => handle,
        Err(e) => return fail(&deps, record, UploadStage::Uploading, &e),
    };
    info!("Assigned DDS id is {} - {id}", handle.external_id);
    record.dds_id = Some(handle.external_id.clone());
    record.storage_price = Some(handle.price);
    complete_stage(&deps, &record, UploadStage::Uploading);

    // PAYING
    enter_stage(&deps, &mut record, UploadStage::Paying);
    let owner = match deps
        .billing
        .pay_for_upload(PayForUploadRequest {
            id: handle.external_id.clone(),
            data_validator: record.data_validator_address.clone(),
            sum: crate::clients::format_sum(handle.price),
            service_node: record.service_node_address.clone(),
            signature: request,
        })
        .await
    {
        Ok(owner) => owner,
        Err(e) => return fail(&deps, record, UploadStage::Paying, &e),
    };
    record.data_owner_address = Some(owner.address);
    record.private_key = Some(owner.private_key);
    complete_stage(&deps, &record, UploadStage::Paying);

    // NOTIFYING
    enter_stage(&deps, &mut record, UploadStage::Notifying);
    if deps.notify_payment {
        let notification =
            PaymentNotification::success(handle.external_id.clone(), handle.price);
        if let Err(e) = deps.dds.notify_payment(notification).await {
            return fail(&deps, record, UploadStage::Notifying, &e);
        }
    }
    complete_stage(&deps, &record, UploadStage::Notifying);

    // COMPLETE
    record.uploaded_to_dds = true;
    record.failed = false;
    record.stage = UploadStage::Complete;
    persist(&deps, &record);
    let _ = deps.events.send(UploadEvent::Completed { record_id: id });
    debug!("File uploading has been completed - {id}");
}

/// Advance the persisted stage and announce it, before the stage's side
/// effect runs.
fn enter_stage(deps: &PipelineDeps, record: &mut LocalFileRecord, stage: UploadStage) {
    debug!("Starting stage {stage} - {}", record.id);
    record.stage = stage;
    persist(deps, record);
    let _ = deps.events.send(UploadEvent::StageStarted {
        record_id: record.id,
        stage,
    });
}

/// Persist the outputs a completed stage wrote onto the record.
fn complete_stage(deps: &PipelineDeps, record: &LocalFileRecord, stage: UploadStage) {
    debug!("Stage {stage} has been completed - {}", record.id);
    persist(deps, record);
    let _ = deps.events.send(UploadEvent::StageCompleted {
        record_id: record.id,
        stage,
    });
}

/// Terminal failure: mark the record failed, keeping everything completed
/// stages already wrote.
fn fail(deps: &PipelineDeps, mut record: LocalFileRecord, stage: UploadStage, cause: &Error) {
    error!("Data upload failed at stage {stage} - {}: {cause}", record.id);
    record.failed = true;
    record.stage = UploadStage::Failed;
    persist(deps, &record);
    let _ = deps.events.send(UploadEvent::Failed {
        record_id: record.id,
        stage,
        message: cause.to_string(),
    });
}

/// Save without a caller to report to; failures only reach the log.
fn persist(deps: &PipelineDeps, record: &LocalFileRecord) {
    if let Err(e) = deps.store.save(record.clone()) {
        error!("Failed to persist record {}: {e}", record.id);
    }
}

fn upload_request(record: &LocalFileRecord, data: &[u8]) -> DdsUploadRequest {
    DdsUploadRequest {
        name: record.name.clone(),
        data: hex::encode(data),
        extension: record.extension.clone(),
        mime_type: record.mime_type.clone(),
        metadata: record.metadata.clone(),
        keep_until: record.keep_until,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clients::{DdsFileHandle, ProvisionedOwner};
    use crate::event::create_event_channel;
    use crate::record::NewFileRecord;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::time::Duration;

    struct StubNetwork;

    #[async_trait]
    impl StorageNetwork for StubNetwork {
        async fn upload(&self, _request: DdsUploadRequest) -> Result<DdsFileHandle> {
            Err(Error::Internal("not under test".to_string()))
        }

        async fn notify_payment(&self, _notification: PaymentNotification) -> Result<()> {
            Ok(())
        }

        async fn extend_duration(&self, _file_id: &str, _duration_secs: u64) -> Result<f64> {
            Ok(2.0)
        }
    }

    struct StubBilling;

    #[async_trait]
    impl Billing for StubBilling {
        async fn pay_for_upload(&self, _request: PayForUploadRequest) -> Result<ProvisionedOwner> {
            Err(Error::Internal("not under test".to_string()))
        }

        async fn pay_for_extension(&self, _request: PayForExtensionRequest) -> Result<()> {
            Ok(())
        }
    }

    struct AllowAll;

    impl SignatureVerifier for AllowAll {
        fn is_valid(&self, _address: &str, _request: &SignedRequest) -> bool {
            true
        }
    }

    fn unsigned() -> SignedRequest {
        SignedRequest {
            address: "0xvalidator".to_string(),
            payload: serde_json::json!({}),
            public_key: String::new(),
            signature: String::new(),
        }
    }

    /// Extend-storage honours the per-record lock: while another writer
    /// holds the record, the mini-saga waits instead of clobbering.
    #[tokio::test]
    async fn test_extend_storage_waits_for_record_lock() {
        let records_dir = tempfile::tempdir().unwrap();
        let bytes_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(crate::store::RecordStore::open(records_dir.path()).unwrap());
        let bytes = Arc::new(crate::store::ByteStore::open(bytes_dir.path()).unwrap());
        let locks = Arc::new(RecordLocks::new());
        let (events, _) = create_event_channel();

        let mut record = store
            .create(|id| {
                LocalFileRecord::new(
                    id,
                    NewFileRecord {
                        name: "a.txt".to_string(),
                        extension: "txt".to_string(),
                        mime_type: "text/plain".to_string(),
                        metadata: serde_json::json!({}),
                        keep_until: Utc::now(),
                        price: 1.0,
                        data_validator_address: "0xvalidator".to_string(),
                    },
                    PathBuf::from("/tmp/a"),
                    "0xservice".to_string(),
                )
            })
            .unwrap();
        record.dds_id = Some("dds-ext".to_string());
        store.save(record.clone()).unwrap();

        let orchestrator = Arc::new(UploadOrchestrator::new(
            Arc::clone(&store),
            bytes,
            Arc::new(StubNetwork),
            Arc::new(StubBilling),
            Arc::new(AllowAll),
            Arc::clone(&locks),
            events,
            true,
        ));

        let lock = locks.for_record(record.id);
        let guard = lock.lock().await;

        let keep_until = Utc::now() + chrono::Duration::days(10);
        let task = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .extend_storage("dds-ext", keep_until, unsigned())
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        drop(guard);
        task.await.unwrap().unwrap();
        assert_eq!(
            store.find_by_id(record.id).unwrap().keep_until,
            keep_until
        );
    }

    #[test]
    fn test_upload_request_carries_hex_data() {
        let record = LocalFileRecord::new(
            Uuid::new_v4(),
            NewFileRecord {
                name: "a.txt".to_string(),
                extension: "txt".to_string(),
                mime_type: "text/plain".to_string(),
                metadata: serde_json::json!({"k": "v"}),
                keep_until: Utc::now(),
                price: 1.0,
                data_validator_address: "0xv".to_string(),
            },
            PathBuf::from("/tmp/a"),
            "0xs".to_string(),
        );

        let request = upload_request(&record, b"\x01\x02\xff");
        assert_eq!(request.data, "0102ff");
        assert_eq!(request.name, "a.txt");
        assert_eq!(request.metadata["k"], "v");
    }

    #[test]
    fn test_acknowledgement_is_success() {
        assert!(Acknowledgement::ok().success);
    }
}
