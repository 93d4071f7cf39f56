//! Possession probe: locating the node that holds a file.
//!
//! Candidates come from the discovery directory and are asked in the order
//! returned whether they hold the file. The probe only stops early on an
//! affirmative answer; a negative answer or a failed probe moves on to the
//! next candidate. Exhausting every candidate without a match is a
//! `Unavailable` outcome, while an address with no registered validator
//! nodes at all is `NotFound`.

use crate::clients::{NodeDirectory, NodeInfo, NodeType, ValidatorNodeApi};
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves which data validator node currently possesses a file.
pub struct PossessionProbe {
    directory: Arc<dyn NodeDirectory>,
    validator_api: Arc<dyn ValidatorNodeApi>,
}

impl PossessionProbe {
    /// Create a probe over the given directory and node API.
    #[must_use]
    pub fn new(directory: Arc<dyn NodeDirectory>, validator_api: Arc<dyn ValidatorNodeApi>) -> Self {
        Self {
            directory,
            validator_api,
        }
    }

    /// Find the node holding `file_id` among the validator's nodes.
    ///
    /// Candidates are probed sequentially; the first affirmative answer
    /// wins. Probe failures are logged and treated as negative answers.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] when the directory knows no validator node
    ///   for `validator_address`.
    /// - [`Error::Unavailable`] when every candidate was probed and none
    ///   affirmed possession.
    pub async fn resolve_holding_node(
        &self,
        file_id: &str,
        validator_address: &str,
    ) -> Result<NodeInfo> {
        let candidates = self
            .directory
            .find_nodes(validator_address, NodeType::DataValidatorNode)
            .await?;

        if candidates.is_empty() {
            return Err(Error::NotFound(format!(
                "Could not find any data validator node with address {validator_address}"
            )));
        }

        debug!(
            "Probing {} candidate nodes for file {file_id}",
            candidates.len()
        );

        for node in candidates {
            match self.validator_api.has_file(&node, file_id).await {
                Ok(true) => {
                    info!("Node {} possesses file {file_id}", node.id);
                    return Ok(node);
                }
                Ok(false) => {
                    info!(
                        "Node {} does not possess file {file_id}, trying next one",
                        node.id
                    );
                }
                Err(e) => {
                    // A failed probe counts as "does not have it".
                    warn!(
                        "Probe of node {} for file {file_id} failed: {e}, trying next one",
                        node.id
                    );
                }
            }
        }

        Err(Error::Unavailable(format!(
            "Could not find any data validator node which possesses file {file_id}"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::signature::SignedRequest;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn node(id: &str) -> NodeInfo {
        NodeInfo {
            id: id.to_string(),
            ip_address: "127.0.0.1".to_string(),
            port: 8080,
            address: "0xvalidator".to_string(),
            node_type: NodeType::DataValidatorNode,
        }
    }

    struct FixedDirectory {
        nodes: Vec<NodeInfo>,
    }

    #[async_trait]
    impl NodeDirectory for FixedDirectory {
        async fn find_nodes(&self, _address: &str, _node_type: NodeType) -> Result<Vec<NodeInfo>> {
            Ok(self.nodes.clone())
        }
    }

    /// Answers per node id: `Ok(bool)` or an error; records probe order.
    struct ScriptedNodes {
        answers: Vec<(String, Result<bool>)>,
        probed: Mutex<Vec<String>>,
    }

    impl ScriptedNodes {
        fn new(answers: Vec<(&str, Result<bool>)>) -> Self {
            Self {
                answers: answers
                    .into_iter()
                    .map(|(id, answer)| (id.to_string(), answer))
                    .collect(),
                probed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ValidatorNodeApi for ScriptedNodes {
        async fn has_file(&self, node: &NodeInfo, _file_id: &str) -> Result<bool> {
            self.probed.lock().push(node.id.clone());
            match self
                .answers
                .iter()
                .find(|(id, _)| *id == node.id)
                .map(|(_, answer)| answer)
            {
                Some(Ok(has)) => Ok(*has),
                Some(Err(_)) => Err(Error::Internal("probe transport failed".to_string())),
                None => Ok(false),
            }
        }

        async fn get_file_key(
            &self,
            _node: &NodeInfo,
            _file_id: &str,
            _request: &SignedRequest,
        ) -> Result<serde_json::Value> {
            Err(Error::Internal("not under test".to_string()))
        }
    }

    fn probe(nodes: Vec<NodeInfo>, scripted: ScriptedNodes) -> (PossessionProbe, Arc<ScriptedNodes>) {
        let scripted = Arc::new(scripted);
        let probe = PossessionProbe::new(
            Arc::new(FixedDirectory { nodes }),
            Arc::clone(&scripted) as Arc<dyn ValidatorNodeApi>,
        );
        (probe, scripted)
    }

    #[tokio::test]
    async fn test_second_candidate_match_is_returned() {
        let (probe, scripted) = probe(
            vec![node("a"), node("b"), node("c")],
            ScriptedNodes::new(vec![("a", Ok(false)), ("b", Ok(true)), ("c", Ok(true))]),
        );

        let holder = probe.resolve_holding_node("f1", "0xvalidator").await.unwrap();
        assert_eq!(holder.id, "b");
        // Stops at first match: "c" is never probed.
        assert_eq!(*scripted.probed.lock(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_exhaustion_is_unavailable() {
        let (probe, scripted) = probe(
            vec![node("a"), node("b"), node("c")],
            ScriptedNodes::new(vec![
                ("a", Ok(false)),
                ("b", Err(Error::Internal(String::new()))),
                ("c", Ok(false)),
            ]),
        );

        let result = probe.resolve_holding_node("f1", "0xvalidator").await;
        assert!(matches!(result, Err(Error::Unavailable(_))));
        // An erroring probe does not stop the scan.
        assert_eq!(*scripted.probed.lock(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_no_candidates_is_not_found() {
        let (probe, _) = probe(Vec::new(), ScriptedNodes::new(Vec::new()));
        let result = probe.resolve_holding_node("f1", "0xvalidator").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_error_then_match_continues() {
        let (probe, scripted) = probe(
            vec![node("a"), node("b")],
            ScriptedNodes::new(vec![
                ("a", Err(Error::Internal(String::new()))),
                ("b", Ok(true)),
            ]),
        );

        let holder = probe.resolve_holding_node("f1", "0xvalidator").await.unwrap();
        assert_eq!(holder.id, "b");
        assert_eq!(*scripted.probed.lock(), vec!["a", "b"]);
    }
}
