//! Billing service client.
//!
//! Sums travel as decimal strings. Field casing follows the billing API:
//! upload settlements are snake_case, extension settlements and responses
//! camelCase.

use crate::error::Result;
use crate::signature::SignedRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Payment settlement request for a completed upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayForUploadRequest {
    /// External file id the payment is for.
    pub id: String,
    /// Address of the data validator paying for the upload.
    pub data_validator: String,
    /// Amount to settle, as a decimal string.
    pub sum: String,
    /// Gateway account receiving the service fee.
    pub service_node: String,
    /// The validator's signed request authorising the payment.
    pub signature: SignedRequest,
}

/// Payment request for a storage duration extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayForExtensionRequest {
    /// Amount to settle, as a decimal string.
    pub sum: String,
    /// Gateway account address.
    pub service_node: String,
    /// Paying data validator address.
    pub data_validator: String,
    /// Signed request authorising the payment.
    pub signature: SignedRequest,
}

/// Owner account provisioned by the billing service once payment settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedOwner {
    /// Newly provisioned data owner address.
    pub address: String,
    /// Private key of the provisioned address.
    pub private_key: String,
}

/// Operations the gateway consumes from the billing service.
#[async_trait]
pub trait Billing: Send + Sync {
    /// Settle payment for an upload on behalf of the data validator.
    ///
    /// Returns the owner address (and key) credited with the file.
    async fn pay_for_upload(&self, request: PayForUploadRequest) -> Result<ProvisionedOwner>;

    /// Settle payment for a storage duration extension.
    async fn pay_for_extension(&self, request: PayForExtensionRequest) -> Result<()>;
}

/// Production billing client speaking HTTP to the configured base URL.
pub struct HttpBillingClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpBillingClient {
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
impl Billing for HttpBillingClient {
    async fn pay_for_upload(&self, request: PayForUploadRequest) -> Result<ProvisionedOwner> {
        debug!("Requesting upload payment for file {}", request.id);
        let owner = self
            .http
            .post(format!("{}/pay/data-upload", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(owner)
    }

    async fn pay_for_extension(&self, request: PayForExtensionRequest) -> Result<()> {
        debug!("Requesting storage extension payment of {}", request.sum);
        self.http
            .post(format!("{}/pay/storage-extension", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Format a price the way the billing API expects sums.
#[must_use]
pub(crate) fn format_sum(price: f64) -> String {
    price.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_provisioned_owner_decodes_camel_case() {
        let json = r#"{"address":"0xowner","privateKey":"deadbeef"}"#;
        let owner: ProvisionedOwner = serde_json::from_str(json).unwrap();
        assert_eq!(owner.address, "0xowner");
        assert_eq!(owner.private_key, "deadbeef");
    }

    #[test]
    fn test_extension_request_serializes_camel_case() {
        let request = PayForExtensionRequest {
            sum: "3.5".to_string(),
            service_node: "0xservice".to_string(),
            data_validator: "0xvalidator".to_string(),
            signature: SignedRequest {
                address: "0xvalidator".to_string(),
                payload: serde_json::json!({}),
                public_key: String::new(),
                signature: String::new(),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["serviceNode"], "0xservice");
        assert_eq!(json["dataValidator"], "0xvalidator");
    }

    #[test]
    fn test_sum_formatting() {
        assert_eq!(format_sum(12.5), "12.5");
        assert_eq!(format_sum(3.0), "3");
    }
}
