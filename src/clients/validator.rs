//! Data validator node API client.
//!
//! Unlike the other collaborators, validator nodes are addressed per call:
//! the endpoint comes from a discovery result, not from configuration.

use crate::clients::NodeInfo;
use crate::error::Result;
use crate::signature::SignedRequest;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Operations the gateway consumes from individual data validator nodes.
#[async_trait]
pub trait ValidatorNodeApi: Send + Sync {
    /// Ask a node whether it currently holds the given file.
    async fn has_file(&self, node: &NodeInfo, file_id: &str) -> Result<bool>;

    /// Retrieve the decryption key payload for a file from a node.
    ///
    /// The payload is opaque to the gateway and returned verbatim.
    async fn get_file_key(
        &self,
        node: &NodeInfo,
        file_id: &str,
        request: &SignedRequest,
    ) -> Result<serde_json::Value>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresenceResponse {
    has_file: bool,
}

/// Production validator-node client.
pub struct HttpValidatorClient {
    http: reqwest::Client,
}

impl HttpValidatorClient {
    /// Create a client with the given per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: super::http_client(timeout)?,
        })
    }

    fn node_url(node: &NodeInfo, path: &str) -> String {
        format!("http://{}:{}{path}", node.ip_address, node.port)
    }
}

#[async_trait]
impl ValidatorNodeApi for HttpValidatorClient {
    async fn has_file(&self, node: &NodeInfo, file_id: &str) -> Result<bool> {
        debug!("Probing node {} for file {file_id}", node.id);
        let presence: PresenceResponse = self
            .http
            .get(Self::node_url(node, &format!("/files/{file_id}/presence")))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(presence.has_file)
    }

    async fn get_file_key(
        &self,
        node: &NodeInfo,
        file_id: &str,
        request: &SignedRequest,
    ) -> Result<serde_json::Value> {
        debug!("Requesting key for file {file_id} from node {}", node.id);
        let payload = self
            .http
            .post(Self::node_url(node, &format!("/files/{file_id}/key")))
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(payload)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clients::NodeType;

    #[test]
    fn test_node_url_formatting() {
        let node = NodeInfo {
            id: "node-1".to_string(),
            ip_address: "10.0.0.7".to_string(),
            port: 8080,
            address: "0xvalidator".to_string(),
            node_type: NodeType::DataValidatorNode,
        };
        assert_eq!(
            HttpValidatorClient::node_url(&node, "/files/f1/presence"),
            "http://10.0.0.7:8080/files/f1/presence"
        );
    }

    #[test]
    fn test_presence_response_decodes() {
        let presence: PresenceResponse =
            serde_json::from_str(r#"{"hasFile":true}"#).unwrap();
        assert!(presence.has_file);
    }
}
