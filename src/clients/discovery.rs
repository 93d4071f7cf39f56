//! Node discovery directory client.
//!
//! Discovery is uncached by design: every `find_nodes` call queries the
//! directory fresh, and an empty candidate list is a legitimate answer
//! that callers interpret themselves.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Role a node plays in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// Node hosting validated files and their keys.
    DataValidatorNode,
    /// Marketplace node.
    DataMartNode,
    /// Gateway node such as this one.
    ServiceNode,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DataValidatorNode => "DATA_VALIDATOR_NODE",
            Self::DataMartNode => "DATA_MART_NODE",
            Self::ServiceNode => "SERVICE_NODE",
        };
        f.write_str(name)
    }
}

/// A node endpoint returned by the discovery directory.
///
/// Not persisted; used only for the duration of one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// Directory-assigned node id.
    pub id: String,
    /// Reachable IP address.
    pub ip_address: String,
    /// API port.
    pub port: u16,
    /// Account address owning the node.
    pub address: String,
    /// Node role.
    #[serde(rename = "type")]
    pub node_type: NodeType,
}

/// Directory mapping an address and node type to candidate endpoints.
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    /// List the nodes of `node_type` registered under `address`.
    ///
    /// An empty list is not an error.
    async fn find_nodes(&self, address: &str, node_type: NodeType) -> Result<Vec<NodeInfo>>;
}

/// Production discovery client speaking HTTP to the configured base URL.
pub struct HttpDiscoveryClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpDiscoveryClient {
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
impl NodeDirectory for HttpDiscoveryClient {
    async fn find_nodes(&self, address: &str, node_type: NodeType) -> Result<Vec<NodeInfo>> {
        debug!("Querying directory for {node_type} nodes of {address}");
        let node_type = node_type.to_string();
        let nodes: Vec<NodeInfo> = self
            .http
            .get(format!("{}/nodes", self.base_url))
            .query(&[("address", address), ("type", node_type.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("Directory returned {} candidate nodes", nodes.len());
        Ok(nodes)
    }
}
