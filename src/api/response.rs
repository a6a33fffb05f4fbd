//! Response types shared across the API resources
//!
//! Field names and shapes mirror the Cloud Big Data v2 API. Component
//! lists are kept as opaque JSON objects; the CLI only ever reads their
//! `name` keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wait::Snapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "addr")]
    pub address: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Addresses {
    pub public: Vec<Address>,
    pub private: Vec<Address>,
}

/// A single machine in a cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub status: String,
    pub flavor_id: String,
    pub addresses: Addresses,
    /// Node group ID
    pub node_group: String,
    /// Components installed on this node, e.g. `HiveClient`
    #[serde(default)]
    pub components: Vec<serde_json::Value>,
}

impl Node {
    /// Public IP address
    pub fn public_ip(&self) -> Option<&str> {
        self.addresses.public.first().map(|a| a.address.as_str())
    }

    /// Private IP address on the service network
    pub fn private_ip(&self) -> Option<&str> {
        self.addresses.private.first().map(|a| a.address.as_str())
    }
}

/// Group of nodes that share the same flavor and installed services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeGroup {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor_id: Option<String>,
    #[serde(default)]
    pub components: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterScript {
    pub id: String,
    pub name: String,
    pub status: String,
}

/// Basic cluster information, as returned by list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub status: String,
    pub stack_id: String,
    pub created: DateTime<Utc>,
    pub updated: Option<DateTime<Utc>>,
    /// API version at which the cluster was created
    pub cbd_version: i32,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Detailed cluster information, as returned by get/create/resize
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterDetail {
    pub id: String,
    pub name: String,
    pub status: String,
    pub stack_id: String,
    pub created: DateTime<Utc>,
    pub updated: Option<DateTime<Utc>>,
    pub cbd_version: i32,
    pub username: String,
    pub progress: f64,
    #[serde(default)]
    pub node_groups: Vec<NodeGroup>,
    #[serde(default)]
    pub scripts: Vec<ClusterScript>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Snapshot for ClusterDetail {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> &str {
        &self.status
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flavor {
    pub id: String,
    pub name: String,
    /// Disk space in MB
    pub disk: u64,
    pub vcpus: u32,
    /// Memory in MB
    pub ram: u64,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distro {
    pub id: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistroService {
    pub name: String,
    pub version: String,
    pub description: String,
    #[serde(default)]
    pub components: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistroDetail {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub services: Vec<DistroService>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_count: u32,
    pub min_count: u32,
    /// Minimum RAM in MB
    pub min_ram: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackNodeGroup {
    pub id: String,
    pub flavor_id: String,
    pub count: u32,
    pub resource_limits: ResourceLimits,
    #[serde(default)]
    pub components: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackService {
    pub name: String,
    #[serde(default)]
    pub modes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Distribution ID
    pub distro: String,
    #[serde(default)]
    pub services: Vec<StackService>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub distro: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub services: Vec<StackService>,
    #[serde(default)]
    pub node_groups: Vec<StackNodeGroup>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub script_type: String,
    pub url: String,
    pub is_public: bool,
    pub created: DateTime<Utc>,
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKey {
    #[serde(rename = "key_name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudFilesCredential {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Credential {
    pub access_key_id: String,
}

/// All credentials belonging to the tenant, grouped by type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub ssh_keys: Vec<SshKey>,
    #[serde(default)]
    pub cloud_files: Vec<CloudFilesCredential>,
    #[serde(default)]
    pub s3: Vec<S3Credential>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsoluteLimit {
    pub limit: i64,
    pub remaining: i64,
}

impl AbsoluteLimit {
    pub fn used(&self) -> i64 {
        self.limit - self.remaining
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsoluteLimits {
    pub node_count: AbsoluteLimit,
    pub ram: AbsoluteLimit,
    pub disk: AbsoluteLimit,
    pub vcpus: AbsoluteLimit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limit {
    pub absolute: AbsoluteLimits,
}

/// Join the `name` keys of a list of opaque component objects, the way the
/// CLI tables render them.
pub fn component_names(components: &[serde_json::Value]) -> String {
    components
        .iter()
        .filter_map(|c| c.get("name").and_then(|n| n.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}
