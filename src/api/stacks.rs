//! Manage stacks: the service layouts clusters are built from

use serde::{Deserialize, Serialize};

use crate::api::response::{Stack, StackDetail};
use crate::client::Lava;
use crate::error::LavaError;

// ============================================================================
// API responses
// ============================================================================

/// Response from /stacks
#[derive(Debug, Deserialize)]
struct StacksResponse {
    stacks: Vec<Stack>,
}

/// Response from /stacks/<stack_id>
#[derive(Debug, Deserialize)]
struct StackResponse {
    stack: StackDetail,
}

// ============================================================================
// API request data
// ============================================================================

/// A service to install, e.g. `{"name": "HDFS", "modes": ["Secondary"]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackServiceRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackComponentRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackNodeGroupRequest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<StackComponentRequest>,
}

/// POST data to create a stack
#[derive(Debug, Clone, Serialize)]
pub struct StackCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Distribution ID, e.g. `HDP2.2`
    pub distro: String,
    pub services: Vec<StackServiceRequest>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub node_groups: Vec<StackNodeGroupRequest>,
}

#[derive(Debug, Serialize)]
struct StackCreateBody {
    stack: StackCreate,
}

// ============================================================================
// API resource
// ============================================================================

/// Stacks API methods
pub struct StacksApi<'a> {
    client: &'a Lava,
}

impl<'a> StacksApi<'a> {
    pub(crate) fn new(client: &'a Lava) -> Self {
        Self { client }
    }

    /// List all stacks.
    pub async fn list(&self) -> Result<Vec<Stack>, LavaError> {
        let resp: StacksResponse = self.client.get("stacks").await?;
        Ok(resp.stacks)
    }

    /// Get a specific stack in detail.
    pub async fn get(&self, stack_id: &str) -> Result<StackDetail, LavaError> {
        let resp: StackResponse = self.client.get(&format!("stacks/{}", stack_id)).await?;
        Ok(resp.stack)
    }

    /// Create a custom stack.
    pub async fn create(&self, spec: StackCreate) -> Result<StackDetail, LavaError> {
        if spec.services.is_empty() {
            return Err(LavaError::Invalid(
                "A stack requires at least one service".to_string(),
            ));
        }

        let resp: StackResponse = self
            .client
            .post("stacks", &StackCreateBody { stack: spec })
            .await?;
        Ok(resp.stack)
    }

    /// Delete a custom stack.
    pub async fn delete(&self, stack_id: &str) -> Result<(), LavaError> {
        self.client.delete(&format!("stacks/{}", stack_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_services_parse_from_json() {
        // The CLI accepts the service list as a JSON document
        let services: Vec<StackServiceRequest> = serde_json::from_str(
            r#"[{"name": "HDFS", "modes": ["Secondary"]}, {"name": "YARN"}]"#,
        )
        .unwrap();

        assert_eq!(services.len(), 2);
        assert_eq!(services[0].name, "HDFS");
        assert_eq!(services[0].modes, vec!["Secondary".to_string()]);
        assert!(services[1].modes.is_empty());
    }

    #[test]
    fn test_create_body_shape() {
        let spec = StackCreate {
            name: "custom".to_string(),
            description: None,
            distro: "HDP2.2".to_string(),
            services: vec![StackServiceRequest {
                name: "HDFS".to_string(),
                modes: vec![],
            }],
            node_groups: vec![StackNodeGroupRequest {
                id: "slave".to_string(),
                flavor_id: Some("hadoop1-7".to_string()),
                count: Some(10),
                components: vec![StackComponentRequest {
                    name: "DataNode".to_string(),
                }],
            }],
        };

        let value = serde_json::to_value(StackCreateBody { stack: spec }).unwrap();
        assert_eq!(value["stack"]["distro"], "HDP2.2");
        assert_eq!(value["stack"]["services"][0]["name"], "HDFS");
        assert_eq!(value["stack"]["node_groups"][0]["components"][0]["name"], "DataNode");
        // description was not given, so it must not appear in the body
        assert!(value["stack"].as_object().unwrap().get("description").is_none());
    }
}
