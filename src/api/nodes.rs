//! Node listings for a cluster

use serde::Deserialize;

use crate::api::response::Node;
use crate::client::Lava;
use crate::error::LavaError;

/// Response from /clusters/<cluster_id>/nodes
#[derive(Debug, Deserialize)]
struct NodesResponse {
    nodes: Vec<Node>,
}

/// Nodes API methods
pub struct NodesApi<'a> {
    client: &'a Lava,
}

impl<'a> NodesApi<'a> {
    pub(crate) fn new(client: &'a Lava) -> Self {
        Self { client }
    }

    /// List nodes belonging to the cluster.
    pub async fn list(&self, cluster_id: &str) -> Result<Vec<Node>, LavaError> {
        let resp: NodesResponse = self
            .client
            .get(&format!("clusters/{}/nodes", cluster_id))
            .await?;
        Ok(resp.nodes)
    }
}
