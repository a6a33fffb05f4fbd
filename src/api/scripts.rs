//! Manage cluster scripts; currently only post-init scripts are supported

use serde::{Deserialize, Serialize};

use crate::api::response::Script;
use crate::client::Lava;
use crate::error::LavaError;

// ============================================================================
// API responses
// ============================================================================

/// Response from /scripts
#[derive(Debug, Deserialize)]
struct ScriptsResponse {
    scripts: Vec<Script>,
}

/// Response from /scripts/<script_id>
#[derive(Debug, Deserialize)]
struct ScriptResponse {
    script: Script,
}

// ============================================================================
// API request data
// ============================================================================

/// Script type accepted by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptType {
    #[serde(rename = "POST_INIT")]
    PostInit,
}

#[derive(Debug, Serialize)]
struct CreateScriptRequest {
    name: String,
    url: String,
    #[serde(rename = "type")]
    script_type: ScriptType,
}

#[derive(Debug, Serialize)]
struct UpdateScriptRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    script_type: Option<ScriptType>,
}

#[derive(Debug, Serialize)]
struct ScriptBody<T> {
    script: T,
}

// ============================================================================
// API resource
// ============================================================================

/// Scripts API methods
pub struct ScriptsApi<'a> {
    client: &'a Lava,
}

impl<'a> ScriptsApi<'a> {
    pub(crate) fn new(client: &'a Lava) -> Self {
        Self { client }
    }

    /// List scripts that belong to the tenant specified in the client.
    pub async fn list(&self) -> Result<Vec<Script>, LavaError> {
        let resp: ScriptsResponse = self.client.get("scripts").await?;
        Ok(resp.scripts)
    }

    /// Create a script.
    pub async fn create(
        &self,
        name: impl Into<String>,
        url: impl Into<String>,
        script_type: ScriptType,
    ) -> Result<Script, LavaError> {
        let body = ScriptBody {
            script: CreateScriptRequest {
                name: name.into(),
                url: url.into(),
                script_type,
            },
        };

        let resp: ScriptResponse = self.client.post("scripts", &body).await?;
        Ok(resp.script)
    }

    /// Update an existing script; `None` fields are left unchanged.
    pub async fn update(
        &self,
        script_id: &str,
        name: Option<String>,
        url: Option<String>,
        script_type: Option<ScriptType>,
    ) -> Result<Script, LavaError> {
        let body = ScriptBody {
            script: UpdateScriptRequest {
                name,
                url,
                script_type,
            },
        };

        let resp: ScriptResponse = self
            .client
            .put(&format!("scripts/{}", script_id), &body)
            .await?;
        Ok(resp.script)
    }

    /// Delete a script.
    pub async fn delete(&self, script_id: &str) -> Result<(), LavaError> {
        self.client.delete(&format!("scripts/{}", script_id)).await
    }
}
