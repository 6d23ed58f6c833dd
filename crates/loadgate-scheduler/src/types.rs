use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::List;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Highest score an extender may return
pub const MAX_EXTENDER_PRIORITY: i64 = 10;

/// Lowest score an extender may return
pub const MIN_EXTENDER_PRIORITY: i64 = 0;

/// Score given when there is nothing to base a decision on
pub const NEUTRAL_SCORE: i64 = 1;

/// Arguments the scheduler sends to `/filter` and `/prioritize`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtenderArgs {
    /// Pod being scheduled
    #[serde(default)]
    pub pod: Option<Pod>,
    /// Candidate nodes, populated when the extender is not node-cache capable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<List<Node>>,
    /// Candidate node names, populated when the extender is node-cache capable
    #[serde(default, rename = "nodenames", skip_serializing_if = "Option::is_none")]
    pub node_names: Option<Vec<String>>,
}

impl ExtenderArgs {
    /// Create args carrying node names only
    pub fn with_node_names(pod: Pod, node_names: Vec<String>) -> Self {
        Self {
            pod: Some(pod),
            nodes: None,
            node_names: Some(node_names),
        }
    }

    /// `namespace/name` of the pod, for logging
    pub fn pod_key(&self) -> String {
        match &self.pod {
            Some(pod) => pod_key(pod),
            None => "<none>/<none>".to_string(),
        }
    }
}

/// `namespace/name` of a pod
pub fn pod_key(pod: &Pod) -> String {
    format!(
        "{}/{}",
        pod.metadata.namespace.as_deref().unwrap_or("<none>"),
        pod.metadata.name.as_deref().unwrap_or("<none>")
    )
}

/// Response to `/filter`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtenderFilterResult {
    /// Nodes that passed every predicate
    #[serde(default, rename = "nodenames")]
    pub node_names: Option<Vec<String>>,
    /// Rejected nodes and why
    #[serde(default, rename = "failedNodes")]
    pub failed_nodes: HashMap<String, String>,
    /// Batch-level error; empty on success
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ExtenderFilterResult {
    /// Successful result
    pub fn new(node_names: Vec<String>, failed_nodes: HashMap<String, String>) -> Self {
        Self {
            node_names: Some(node_names),
            failed_nodes,
            error: String::new(),
        }
    }

    /// Failed batch: no survivors, only the error
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            node_names: Some(Vec::new()),
            failed_nodes: HashMap::new(),
            error: message.into(),
        }
    }

    /// Surviving node names, empty if none
    pub fn surviving(&self) -> &[String] {
        self.node_names.as_deref().unwrap_or_default()
    }
}

/// Score of one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPriority {
    /// Node name
    pub host: String,
    /// Score, higher is better
    pub score: i64,
}

impl HostPriority {
    pub fn new(host: impl Into<String>, score: i64) -> Self {
        Self {
            host: host.into(),
            score,
        }
    }
}

/// Response to `/prioritize`
pub type HostPriorityList = Vec<HostPriority>;

/// What a predicate decided for one node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredicateOutcome {
    /// Whether the node fits
    pub fits: bool,
    /// Why it does not
    pub reasons: Vec<String>,
}

impl PredicateOutcome {
    /// The node fits
    pub fn fit() -> Self {
        Self {
            fits: true,
            reasons: Vec::new(),
        }
    }

    /// The node does not fit
    pub fn unfit(reason: impl Into<String>) -> Self {
        Self {
            fits: false,
            reasons: vec![reason.into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_extender_args() {
        let body = r#"{
            "pod": {"metadata": {"name": "web-0", "namespace": "shop"}},
            "nodenames": ["node-a", "node-b"]
        }"#;

        let args: ExtenderArgs = serde_json::from_str(body).unwrap();
        assert_eq!(args.pod_key(), "shop/web-0");
        assert_eq!(
            args.node_names,
            Some(vec!["node-a".to_string(), "node-b".to_string()])
        );
        assert!(args.nodes.is_none());
    }

    #[test]
    fn test_decode_args_with_node_objects() {
        let body = r#"{
            "pod": {"metadata": {"name": "web-0"}},
            "nodes": {"metadata": {}, "items": [{"metadata": {"name": "node-a"}}]}
        }"#;

        let args: ExtenderArgs = serde_json::from_str(body).unwrap();
        assert!(args.node_names.is_none());
        let nodes = args.nodes.unwrap();
        assert_eq!(nodes.items.len(), 1);
        assert_eq!(nodes.items[0].metadata.name.as_deref(), Some("node-a"));
    }

    #[test]
    fn test_encode_filter_result() {
        let mut failed = HashMap::new();
        failed.insert("node-b".to_string(), "node memory load high".to_string());
        let result = ExtenderFilterResult::new(vec!["node-a".to_string()], failed);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["nodenames"][0], "node-a");
        assert_eq!(json["failedNodes"]["node-b"], "node memory load high");
        assert!(json.get("error").is_none());

        let failed = ExtenderFilterResult::error("boom");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["error"], "boom");
        assert!(failed.surviving().is_empty());
    }

    #[test]
    fn test_encode_host_priority() {
        let list: HostPriorityList = vec![HostPriority::new("node-a", 7)];
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, r#"[{"host":"node-a","score":7}]"#);
    }

    #[test]
    fn test_predicate_outcome() {
        assert!(PredicateOutcome::fit().fits);
        let unfit = PredicateOutcome::unfit("too hot");
        assert!(!unfit.fits);
        assert_eq!(unfit.reasons, vec!["too hot".to_string()]);
    }
}
