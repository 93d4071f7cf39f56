//! File key retrieval from the node possessing a file.

use crate::clients::ValidatorNodeApi;
use crate::error::{Error, Result};
use crate::probe::PossessionProbe;
use crate::signature::{SignatureVerifier, SignedRequest};
use std::sync::Arc;
use tracing::{debug, error};

/// Resolves per-file decryption keys by locating the holding node and
/// proxying the key request to it.
pub struct FileKeyResolver {
    verifier: Arc<dyn SignatureVerifier>,
    probe: PossessionProbe,
    validator_api: Arc<dyn ValidatorNodeApi>,
}

impl FileKeyResolver {
    /// Create a resolver over the given verifier, probe and node API.
    #[must_use]
    pub fn new(
        verifier: Arc<dyn SignatureVerifier>,
        probe: PossessionProbe,
        validator_api: Arc<dyn ValidatorNodeApi>,
    ) -> Self {
        Self {
            verifier,
            probe,
            validator_api,
        }
    }

    /// Retrieve the key payload for `file_id`.
    ///
    /// The signed request is verified against the address it claims before
    /// any node is contacted. The holding node's payload is returned
    /// verbatim; its errors are wrapped so they never masquerade as a
    /// success.
    ///
    /// # Errors
    ///
    /// - [`Error::Forbidden`] if the signature does not verify.
    /// - [`Error::NotFound`] / [`Error::Unavailable`] from the probe.
    /// - [`Error::Internal`] if the holding node's key call fails.
    pub async fn get_file_key(
        &self,
        file_id: &str,
        data_validator_address: &str,
        request: &SignedRequest,
    ) -> Result<serde_json::Value> {
        if !self.verifier.is_valid(&request.address, request) {
            return Err(Error::Forbidden("Signature is invalid".to_string()));
        }

        let node = self
            .probe
            .resolve_holding_node(file_id, data_validator_address)
            .await?;

        debug!("Proxying key request for file {file_id} to node {}", node.id);
        match self.validator_api.get_file_key(&node, file_id, request).await {
            Ok(payload) => Ok(payload),
            Err(e) => {
                error!(
                    "Failed to get file key from data validator node {}: {e}",
                    node.ip_address
                );
                Err(Error::Internal(format!(
                    "Error occurred when trying to get key for file with id {file_id}"
                )))
            }
        }
    }
}
