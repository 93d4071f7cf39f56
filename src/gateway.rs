//! The gateway facade: local file lifecycle plus the upload and key
//! resolution flows, wired over pluggable collaborators.

use crate::clients::{
    Billing, HttpBillingClient, HttpDdsClient, HttpDiscoveryClient, HttpValidatorClient,
    NodeDirectory, StorageNetwork, ValidatorNodeApi,
};
use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::event::{create_event_channel, UploadEventsChannel};
use crate::filekey::FileKeyResolver;
use crate::probe::PossessionProbe;
use crate::record::{FileInfo, LocalFileRecord, NewFileRecord, UploadCheck};
use crate::saga::{Acknowledgement, UploadOrchestrator};
use crate::signature::{Ed25519Verifier, SignatureVerifier, SignedRequest};
use crate::store::{ByteStore, RecordStore};
use crate::sync::RecordLocks;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Builder for a [`Gateway`].
///
/// By default every collaborator is an HTTP client pointed at the
/// configured endpoints; each can be replaced, which is how tests wire in
/// fakes.
pub struct GatewayBuilder {
    config: GatewayConfig,
    dds: Option<Arc<dyn StorageNetwork>>,
    billing: Option<Arc<dyn Billing>>,
    directory: Option<Arc<dyn NodeDirectory>>,
    validator_api: Option<Arc<dyn ValidatorNodeApi>>,
    verifier: Option<Arc<dyn SignatureVerifier>>,
}

impl GatewayBuilder {
    /// Start a builder from the given configuration.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            dds: None,
            billing: None,
            directory: None,
            validator_api: None,
            verifier: None,
        }
    }

    /// Replace the storage network collaborator.
    #[must_use]
    pub fn with_storage_network(mut self, dds: Arc<dyn StorageNetwork>) -> Self {
        self.dds = Some(dds);
        self
    }

    /// Replace the billing collaborator.
    #[must_use]
    pub fn with_billing(mut self, billing: Arc<dyn Billing>) -> Self {
        self.billing = Some(billing);
        self
    }

    /// Replace the node discovery collaborator.
    #[must_use]
    pub fn with_node_directory(mut self, directory: Arc<dyn NodeDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Replace the validator node API collaborator.
    #[must_use]
    pub fn with_validator_api(mut self, validator_api: Arc<dyn ValidatorNodeApi>) -> Self {
        self.validator_api = Some(validator_api);
        self
    }

    /// Replace the signature verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Open the stores and assemble the gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if a data directory cannot be opened or a default
    /// HTTP client cannot be built.
    pub fn build(self) -> Result<Gateway> {
        let timeout = Duration::from_secs(self.config.collaborators.timeout_secs);

        let store = Arc::new(RecordStore::open(&self.config.records_dir())?);
        let bytes = Arc::new(ByteStore::open(&self.config.files_dir())?);

        let dds: Arc<dyn StorageNetwork> = match self.dds {
            Some(dds) => dds,
            None => Arc::new(HttpDdsClient::new(
                self.config.collaborators.dds_api_base_url.clone(),
                timeout,
            )?),
        };
        let billing: Arc<dyn Billing> = match self.billing {
            Some(billing) => billing,
            None => Arc::new(HttpBillingClient::new(
                self.config.collaborators.billing_api_base_url.clone(),
                timeout,
            )?),
        };
        let directory: Arc<dyn NodeDirectory> = match self.directory {
            Some(directory) => directory,
            None => Arc::new(HttpDiscoveryClient::new(
                self.config.collaborators.discovery_base_url.clone(),
                timeout,
            )?),
        };
        let validator_api: Arc<dyn ValidatorNodeApi> = match self.validator_api {
            Some(validator_api) => validator_api,
            None => Arc::new(HttpValidatorClient::new(timeout)?),
        };
        let verifier = self
            .verifier
            .unwrap_or_else(|| Arc::new(Ed25519Verifier));

        let locks = Arc::new(RecordLocks::new());
        let (events, _) = create_event_channel();

        let orchestrator = UploadOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&bytes),
            dds,
            billing,
            Arc::clone(&verifier),
            Arc::clone(&locks),
            events,
            self.config.upload.notify_payment,
        );
        let probe = PossessionProbe::new(directory, Arc::clone(&validator_api));
        let filekey = FileKeyResolver::new(verifier, probe, validator_api);

        info!(
            "Gateway assembled under {} as {}",
            self.config.root_dir.display(),
            self.config.service_node_address
        );

        Ok(Gateway {
            config: self.config,
            store,
            bytes,
            locks,
            orchestrator,
            filekey,
        })
    }
}

/// A running gateway node.
pub struct Gateway {
    config: GatewayConfig,
    store: Arc<RecordStore>,
    bytes: Arc<ByteStore>,
    locks: Arc<RecordLocks>,
    orchestrator: UploadOrchestrator,
    filekey: FileKeyResolver,
}

impl Gateway {
    /// Stage a new local file record with an empty byte file behind it.
    ///
    /// # Errors
    ///
    /// Returns an error if the record or its byte file cannot be created.
    pub async fn create_file(&self, params: NewFileRecord) -> Result<LocalFileRecord> {
        let bytes = Arc::clone(&self.bytes);
        let service_node_address = self.config.service_node_address.clone();
        let record = self.store.create(|id| {
            LocalFileRecord::new(id, params, bytes.path_for(id), service_node_address)
        })?;
        self.bytes.create_empty(record.id).await?;
        debug!("Staged file {} as record {}", record.name, record.id);
        Ok(record)
    }

    /// Append a chunk to a staged record's byte content.
    ///
    /// Chunks are applied in arrival order; the record's size reflects the
    /// byte file after the append.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no record exists under `record_id`.
    /// - [`Error::Conflict`] if the content was deleted locally.
    pub async fn append_chunk(&self, record_id: Uuid, chunk: Bytes) -> Result<u64> {
        let lock = self.locks.for_record(record_id);
        let _guard = lock.lock().await;

        let mut record = self
            .store
            .find_by_id(record_id)
            .ok_or_else(|| Error::record_not_found(record_id))?;

        if record.deleted_locally {
            return Err(Error::Conflict(format!(
                "Local content of record {record_id} has been deleted"
            )));
        }

        let size = self.bytes.append(record_id, &chunk).await?;
        record.size = size;
        self.store.save(record)?;
        Ok(size)
    }

    /// Remove a record's staged byte content, keeping the record itself.
    ///
    /// Best-effort cleanup: a removal failure (or an already-missing byte
    /// file) is logged and leaves the record unmodified, so it is never
    /// falsely marked deleted.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no record exists under `record_id`.
    /// - [`Error::Conflict`] if the content was already deleted.
    pub async fn delete_local(&self, record_id: Uuid) -> Result<()> {
        let lock = self.locks.for_record(record_id);
        let _guard = lock.lock().await;

        let mut record = self
            .store
            .find_by_id(record_id)
            .ok_or_else(|| Error::record_not_found(record_id))?;

        if record.deleted_locally {
            return Err(Error::Conflict(format!(
                "Local content of record {record_id} has already been deleted"
            )));
        }

        if self.bytes.exists(record_id).await {
            match self.bytes.remove(record_id).await {
                Ok(()) => {
                    record.deleted_locally = true;
                    self.store.save(record)?;
                    info!("Deleted local content of record {record_id}");
                }
                Err(e) => {
                    warn!("Failed to remove byte file of record {record_id}: {e}");
                }
            }
        }

        Ok(())
    }

    /// Report the upload status of a staged record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record exists under `record_id`.
    pub fn upload_status(&self, record_id: Uuid) -> Result<UploadCheck> {
        let record = self
            .store
            .find_by_id(record_id)
            .ok_or_else(|| Error::record_not_found(record_id))?;
        Ok(UploadCheck::from(&record))
    }

    /// Describe an uploaded file by the external id the storage network
    /// assigned it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no uploaded record carries
    /// `dds_file_id`.
    pub fn file_info(&self, dds_file_id: &str) -> Result<FileInfo> {
        self.store
            .find_by_dds_id(dds_file_id)
            .and_then(|record| record.to_file_info())
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "Could not find uploaded file with id {dds_file_id}"
                ))
            })
    }

    /// Submit a staged record to the upload saga.
    ///
    /// Returns as soon as the submission is accepted; the saga runs on its
    /// own task and its outcome lands on the record and the event trace.
    ///
    /// # Errors
    ///
    /// See [`UploadOrchestrator::submit`].
    pub async fn submit_upload(
        &self,
        record_id: Uuid,
        request: SignedRequest,
    ) -> Result<Acknowledgement> {
        self.orchestrator.submit(record_id, request).await
    }

    /// Extend the storage duration of an uploaded file.
    ///
    /// # Errors
    ///
    /// See [`UploadOrchestrator::extend_storage`].
    pub async fn extend_storage(
        &self,
        dds_file_id: &str,
        keep_until: DateTime<Utc>,
        request: SignedRequest,
    ) -> Result<Acknowledgement> {
        self.orchestrator
            .extend_storage(dds_file_id, keep_until, request)
            .await
    }

    /// Retrieve the decryption key payload for an uploaded file from the
    /// validator node holding it.
    ///
    /// # Errors
    ///
    /// See [`FileKeyResolver::get_file_key`].
    pub async fn get_file_key(
        &self,
        file_id: &str,
        data_validator_address: &str,
        request: &SignedRequest,
    ) -> Result<serde_json::Value> {
        self.filekey
            .get_file_key(file_id, data_validator_address, request)
            .await
    }

    /// Subscribe to the upload saga event trace.
    #[must_use]
    pub fn subscribe_events(&self) -> UploadEventsChannel {
        self.orchestrator.subscribe()
    }

    /// The configuration this gateway was built from.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
