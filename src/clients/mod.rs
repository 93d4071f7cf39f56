//! Clients for the external services the gateway collaborates with.
//!
//! Each collaborator is consumed through a trait so the saga, probe and
//! resolver logic stay testable without the network:
//!
//! - [`StorageNetwork`] — the decentralized data storage (DDS) API
//! - [`Billing`] — payment settlement
//! - [`NodeDirectory`] — address/type to node-endpoint discovery
//! - [`ValidatorNodeApi`] — per-node possession checks and key retrieval
//!
//! The `Http*` types are the production reqwest implementations.

mod billing;
mod dds;
mod discovery;
mod validator;

pub use billing::{Billing, HttpBillingClient, PayForExtensionRequest, PayForUploadRequest, ProvisionedOwner};
pub(crate) use billing::format_sum;
pub use dds::{DdsFileHandle, DdsUploadRequest, HttpDdsClient, PaymentNotification, StorageNetwork};
pub use discovery::{HttpDiscoveryClient, NodeDirectory, NodeInfo, NodeType};
pub use validator::{HttpValidatorClient, ValidatorNodeApi};

use std::time::Duration;

/// Build the shared reqwest client used by the HTTP implementations.
pub(crate) fn http_client(timeout: Duration) -> crate::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(crate::Error::from)
}
