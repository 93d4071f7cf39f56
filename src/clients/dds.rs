//! Storage network (DDS) API client.
//!
//! The DDS API wraps its resources in a JSON:API-style envelope:
//! `{ "data": { "id": ..., "attributes": { ... } } }`.

use crate::error::Result;
use crate::record::FileMetadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Upload request sent to the storage network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdsUploadRequest {
    /// File name.
    pub name: String,
    /// Hex-encoded file content.
    pub data: String,
    /// File extension.
    pub extension: String,
    /// Mime type.
    pub mime_type: String,
    /// Declared metadata, passed through verbatim.
    pub metadata: FileMetadata,
    /// Retention deadline requested for the file.
    pub keep_until: DateTime<Utc>,
}

/// Handle returned by a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct DdsFileHandle {
    /// External file id assigned by the storage network.
    pub external_id: String,
    /// Price the storage network charges for the upload.
    pub price: f64,
}

/// Payment status notification for an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNotification {
    /// External file id the payment refers to.
    pub file_id: String,
    /// Settled amount.
    pub amount: f64,
    /// Settlement status reported to the network.
    pub status: String,
}

impl PaymentNotification {
    /// Notification for a successfully settled payment.
    #[must_use]
    pub fn success(file_id: String, amount: f64) -> Self {
        Self {
            file_id,
            amount,
            status: "success".to_string(),
        }
    }
}

/// Operations the gateway consumes from the storage network.
#[async_trait]
pub trait StorageNetwork: Send + Sync {
    /// Upload file bytes and metadata, obtaining an external id and price.
    async fn upload(&self, request: DdsUploadRequest) -> Result<DdsFileHandle>;

    /// Inform the network of the payment outcome for an uploaded file.
    async fn notify_payment(&self, notification: PaymentNotification) -> Result<()>;

    /// Ask the network to extend a file's storage duration.
    ///
    /// Returns the price charged for the extension.
    async fn extend_duration(&self, file_id: &str, duration_secs: u64) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct DdsEnvelope<T> {
    data: DdsResource<T>,
}

#[derive(Debug, Deserialize)]
struct DdsResource<T> {
    id: String,
    attributes: T,
}

#[derive(Debug, Deserialize)]
struct PriceAttributes {
    price: f64,
}

#[derive(Debug, Serialize)]
struct ExtendDurationRequest {
    duration: u64,
}

/// Production DDS client speaking HTTP to the configured base URL.
pub struct HttpDdsClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpDdsClient {
    /// Create a client for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url,
            http: super::http_client(timeout)?,
        })
    }
}

#[async_trait]
impl StorageNetwork for HttpDdsClient {
    async fn upload(&self, request: DdsUploadRequest) -> Result<DdsFileHandle> {
        debug!("Uploading file {} to the storage network", request.name);
        let envelope: DdsEnvelope<PriceAttributes> = self
            .http
            .post(format!("{}/files", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(DdsFileHandle {
            external_id: envelope.data.id,
            price: envelope.data.attributes.price,
        })
    }

    async fn notify_payment(&self, notification: PaymentNotification) -> Result<()> {
        debug!(
            "Notifying storage network of payment for file {}",
            notification.file_id
        );
        self.http
            .post(format!("{}/files/payment-status", self.base_url))
            .json(&notification)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn extend_duration(&self, file_id: &str, duration_secs: u64) -> Result<f64> {
        debug!("Requesting duration extension for file {file_id}");
        let envelope: DdsEnvelope<PriceAttributes> = self
            .http
            .patch(format!("{}/files/{file_id}/duration", self.base_url))
            .json(&ExtendDurationRequest {
                duration: duration_secs,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(envelope.data.attributes.price)
    }
}
