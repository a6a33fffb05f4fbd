//! Create, destroy, and otherwise interact with Cloud Big Data clusters

use std::io;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::response::{Cluster, ClusterDetail, Node};
use crate::client::Lava;
use crate::error::LavaError;
use crate::wait::{ProgressReporter, SystemClock, WaitConfig, WaitController};

const INVALID_USERNAMES: [&str; 1] = ["root"];

// ============================================================================
// API responses
// ============================================================================

/// Response from /clusters
#[derive(Debug, Deserialize)]
struct ClustersResponse {
    clusters: Vec<Cluster>,
}

/// Response from /clusters/<cluster_id>
#[derive(Debug, Deserialize)]
struct ClusterResponse {
    cluster: ClusterDetail,
}

// ============================================================================
// API request data
// ============================================================================

/// One node group in a create/resize request; also the parsed form of the
/// CLI option `<id>(count=<n>, flavor_id=<flavor>)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCreateNodeGroup {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor_id: Option<String>,
}

/// A connector credential to attach to a new cluster; the CLI form is
/// `type=name`, e.g. `cloud_files=my_files`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorRef {
    pub connector_type: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
struct ScriptRef {
    id: String,
}

#[derive(Debug, Serialize)]
struct ConnectorCredential {
    name: String,
}

#[derive(Debug, Serialize)]
struct ConnectorRequest {
    #[serde(rename = "type")]
    connector_type: String,
    credential: ConnectorCredential,
}

/// POST data to create a cluster
#[derive(Debug, Serialize)]
struct ClusterCreateRequest {
    name: String,
    username: String,
    ssh_keys: Vec<String>,
    stack_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    node_groups: Vec<ClusterCreateNodeGroup>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    scripts: Vec<ScriptRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    connectors: Vec<ConnectorRequest>,
}

#[derive(Debug, Serialize)]
struct ClusterCreateBody {
    cluster: ClusterCreateRequest,
}

/// PUT data to resize a cluster
#[derive(Debug, Serialize)]
struct ClusterResizeRequest {
    node_groups: Vec<ClusterCreateNodeGroup>,
}

#[derive(Debug, Serialize)]
struct ClusterResizeBody {
    cluster: ClusterResizeRequest,
}

/// Parameters for [`ClustersApi::create`]
#[derive(Debug, Clone, Default)]
pub struct ClusterCreate {
    pub name: String,
    pub stack_id: String,
    /// Login user to install onto the created nodes; defaults to the
    /// local user
    pub username: Option<String>,
    /// SSH key credential names; defaults to `user@hostname`
    pub ssh_keys: Vec<String>,
    pub user_scripts: Vec<String>,
    pub node_groups: Vec<ClusterCreateNodeGroup>,
    pub connectors: Vec<ConnectorRef>,
}

impl ClusterCreate {
    pub fn new(name: impl Into<String>, stack_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack_id: stack_id.into(),
            ..Self::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_ssh_key(mut self, key: impl Into<String>) -> Self {
        self.ssh_keys.push(key.into());
        self
    }

    pub fn with_user_script(mut self, script_id: impl Into<String>) -> Self {
        self.user_scripts.push(script_id.into());
        self
    }

    pub fn with_node_group(mut self, group: ClusterCreateNodeGroup) -> Self {
        self.node_groups.push(group);
        self
    }

    pub fn with_connector(mut self, connector: ConnectorRef) -> Self {
        self.connectors.push(connector);
        self
    }
}

// ============================================================================
// CLI option grammars
// ============================================================================

/// Parse a command-line node group string, e.g.
/// `slave(count=1, flavor_id=hadoop1-7)`.
pub fn parse_node_group(value: &str) -> Result<ClusterCreateNodeGroup, String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^([A-Za-z-]\w*)(?:\((.*)\))?$").unwrap());

    let caps = re
        .captures(value.trim())
        .ok_or_else(|| format!("Invalid node group: {}", value))?;

    let mut group = ClusterCreateNodeGroup {
        id: caps[1].to_string(),
        count: None,
        flavor_id: None,
    };

    let Some(args) = caps.get(2) else {
        return Ok(group);
    };

    for item in args.as_str().split(',') {
        if item.trim().is_empty() {
            continue;
        }
        let (key, val) = item
            .split_once('=')
            .ok_or_else(|| format!("Invalid node group: {}", value))?;
        match key.trim() {
            "count" => {
                group.count = Some(
                    val.trim()
                        .parse()
                        .map_err(|_| format!("Invalid node group: {}", value))?,
                );
            }
            "flavor_id" => group.flavor_id = Some(val.trim().to_string()),
            other => return Err(format!("Invalid node group option: {}", other)),
        }
    }

    Ok(group)
}

/// Parse a command-line connector string, e.g. `cloud_files=my_files`.
pub fn parse_connector(value: &str) -> Result<ConnectorRef, String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^([A-Za-z]\w*)=([A-Za-z]\w*)$").unwrap());

    let caps = re
        .captures(value.trim())
        .ok_or_else(|| "Must be in the form of type=name".to_string())?;

    Ok(ConnectorRef {
        connector_type: caps[1].to_string(),
        name: caps[2].to_string(),
    })
}

// ============================================================================
// Defaults and validation
// ============================================================================

fn local_username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "lava".to_string())
}

/// Default SSH key credential name, `user@hostname`
pub fn default_ssh_key_name() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());
    format!("{}@{}", local_username(), host)
}

fn validate_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), LavaError> {
    if value.len() < min || value.len() > max {
        return Err(LavaError::Invalid(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

fn validate_node_groups(groups: &[ClusterCreateNodeGroup]) -> Result<(), LavaError> {
    for group in groups {
        validate_length("node group id", &group.id, 1, 255)?;
        if let Some(count) = group.count {
            if !(1..=100).contains(&count) {
                return Err(LavaError::Invalid(format!(
                    "Invalid node count for group {}: {}",
                    group.id, count
                )));
            }
        }
    }
    Ok(())
}

// ============================================================================
// API resource
// ============================================================================

/// Clusters API methods
pub struct ClustersApi<'a> {
    client: &'a Lava,
}

impl<'a> ClustersApi<'a> {
    pub(crate) fn new(client: &'a Lava) -> Self {
        Self { client }
    }

    /// List clusters that belong to the tenant specified in the client.
    pub async fn list(&self) -> Result<Vec<Cluster>, LavaError> {
        let resp: ClustersResponse = self.client.get("clusters").await?;
        Ok(resp.clusters)
    }

    /// Get the cluster corresponding to the cluster ID.
    pub async fn get(&self, cluster_id: &str) -> Result<ClusterDetail, LavaError> {
        let resp: ClusterResponse = self
            .client
            .get(&format!("clusters/{}", cluster_id))
            .await?;
        Ok(resp.cluster)
    }

    /// Create a cluster. With `wait`, block until it becomes active.
    pub async fn create(&self, spec: ClusterCreate, wait: bool) -> Result<ClusterDetail, LavaError> {
        let username = spec.username.unwrap_or_else(local_username);
        let ssh_keys = if spec.ssh_keys.is_empty() {
            vec![default_ssh_key_name()]
        } else {
            spec.ssh_keys
        };

        validate_length("name", &spec.name, 1, 255)?;
        validate_length("username", &username, 2, 255)?;
        if INVALID_USERNAMES.contains(&username.to_lowercase().as_str()) {
            return Err(LavaError::Invalid(format!(
                "Invalid username: {}",
                username
            )));
        }
        for key in &ssh_keys {
            validate_length("ssh key name", key, 1, 255)?;
        }
        validate_node_groups(&spec.node_groups)?;

        let body = ClusterCreateBody {
            cluster: ClusterCreateRequest {
                name: spec.name,
                username,
                ssh_keys,
                stack_id: spec.stack_id,
                node_groups: spec.node_groups,
                scripts: spec
                    .user_scripts
                    .into_iter()
                    .map(|id| ScriptRef { id })
                    .collect(),
                connectors: spec
                    .connectors
                    .into_iter()
                    .map(|c| ConnectorRequest {
                        connector_type: c.connector_type,
                        credential: ConnectorCredential { name: c.name },
                    })
                    .collect(),
            },
        };

        let resp: ClusterResponse = self.client.post("clusters", &body).await?;
        if wait {
            return self.wait(&resp.cluster.id, None, None).await;
        }
        Ok(resp.cluster)
    }

    /// Resize a cluster by changing node group counts. With `wait`, block
    /// until it becomes active again.
    pub async fn resize(
        &self,
        cluster_id: &str,
        node_groups: Vec<ClusterCreateNodeGroup>,
        wait: bool,
    ) -> Result<ClusterDetail, LavaError> {
        if node_groups.is_empty() {
            return Err(LavaError::Request(
                "Must specify at least one node group to resize".to_string(),
            ));
        }
        if node_groups.iter().any(|group| group.count.is_none()) {
            return Err(LavaError::Request(
                "Invalid or missing count in the node groups".to_string(),
            ));
        }
        validate_node_groups(&node_groups)?;

        let body = ClusterResizeBody {
            cluster: ClusterResizeRequest { node_groups },
        };

        let resp: ClusterResponse = self
            .client
            .put(&format!("clusters/{}", cluster_id), &body)
            .await?;
        if wait {
            return self.wait(&resp.cluster.id, None, None).await;
        }
        Ok(resp.cluster)
    }

    /// Delete a cluster.
    pub async fn delete(&self, cluster_id: &str) -> Result<(), LavaError> {
        self.client
            .delete(&format!("clusters/{}", cluster_id))
            .await
    }

    /// Get the cluster nodes.
    pub async fn nodes(&self, cluster_id: &str) -> Result<Vec<Node>, LavaError> {
        self.client.nodes().list(cluster_id).await
    }

    /// Wait (blocking) for a cluster to either become active or fail.
    ///
    /// Polls `get` until the status classifies as terminal. The timeout
    /// defaults to effectively unbounded and the interval to 30 seconds,
    /// floored at 10. Progress is written to stdout when the client was
    /// built interactive, and only logged otherwise.
    pub async fn wait(
        &self,
        cluster_id: &str,
        timeout: Option<Duration>,
        interval: Option<Duration>,
    ) -> Result<ClusterDetail, LavaError> {
        let config = WaitConfig { timeout, interval };
        let reporter = ProgressReporter::new(io::stdout(), !self.client.interactive());
        let controller = WaitController::new(config, SystemClock, reporter);

        controller.run(|| self.get(cluster_id)).await
    }
}
