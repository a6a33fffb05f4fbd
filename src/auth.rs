//! Keystone authentication
//!
//! Authenticates against the Rackspace identity service and pulls the
//! Cloud Big Data endpoint for the chosen region out of the service
//! catalog.

use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing::{debug, error};

use crate::error::LavaError;

/// Default Rackspace identity endpoint
pub const DEFAULT_AUTH_URL: &str = "https://identity.api.rackspacecloud.com/v2.0";

const CBD_SERVICE_TYPE: &str = "rax:bigdata";
const CBD_SERVICE_NAME: &str = "cloudBigData";

/// Credentials and identity endpoint for token authentication
#[derive(Debug, Clone)]
pub struct KeystoneAuth {
    token_url: String,
    username: String,
    api_key: Option<String>,
    password: Option<String>,
    region: Option<String>,
}

/// A successful authentication: the token plus the catalog endpoint for
/// the configured region, if one was advertised
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub expires: Option<DateTime<Utc>>,
    pub endpoint: Option<String>,
}

impl KeystoneAuth {
    pub fn new(
        auth_url: &str,
        username: impl Into<String>,
        api_key: Option<String>,
        password: Option<String>,
        region: Option<String>,
    ) -> Result<Self, LavaError> {
        let mut url = Url::parse(auth_url)
            .map_err(|e| LavaError::Invalid(format!("Invalid auth url {}: {}", auth_url, e)))?;
        url.set_path("/v2.0/tokens");
        url.set_query(None);

        Ok(Self {
            token_url: url.to_string(),
            username: username.into(),
            api_key,
            password,
            region: region.map(|r| r.to_uppercase()),
        })
    }

    /// Token request body; api key credentials win over a password.
    fn request_data(&self) -> Value {
        if let Some(ref api_key) = self.api_key {
            serde_json::json!({
                "auth": {
                    "RAX-KSKEY:apiKeyCredentials": {
                        "username": self.username,
                        "apiKey": api_key,
                    }
                }
            })
        } else {
            serde_json::json!({
                "auth": {
                    "passwordCredentials": {
                        "username": self.username,
                        "password": self.password,
                    },
                    "RAX-AUTH:domain": {
                        "name": "Rackspace",
                    },
                }
            })
        }
    }

    /// Request a token from the identity service.
    pub async fn authenticate(&self, http: &reqwest::Client) -> Result<AuthSession, LavaError> {
        debug!("authenticating {} via {}", self.username, self.token_url);

        let resp = http
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&self.request_data())
            .send()
            .await
            .map_err(|e| LavaError::Authentication(format!("Unable to authenticate: {}", e)))?;

        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);

        if status == StatusCode::UNAUTHORIZED {
            let msg = error_message(&body, "Invalid credentials");
            error!("authorization failed: {}", msg);
            return Err(LavaError::Authorization(msg));
        }
        if !status.is_success() {
            let msg = error_message(&body, "Unable to authenticate");
            error!("authentication failed: {}", msg);
            return Err(LavaError::Authentication(msg));
        }

        let access = &body["access"];
        let token = access["token"]["id"]
            .as_str()
            .ok_or_else(|| {
                LavaError::Authentication("Unable to parse authentication token".to_string())
            })?
            .to_string();
        let expires = access["token"]["expires"]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(AuthSession {
            token,
            expires,
            endpoint: self.parse_endpoint(access),
        })
    }

    /// Find the Cloud Big Data v2 endpoint for our region in the service
    /// catalog; `None` when the catalog does not advertise one.
    fn parse_endpoint(&self, access: &Value) -> Option<String> {
        let region = self.region.as_deref()?;
        let catalog = access["serviceCatalog"].as_array()?;

        let service = catalog.iter().find(|item| {
            item["type"].as_str() == Some(CBD_SERVICE_TYPE)
                && item["name"].as_str() == Some(CBD_SERVICE_NAME)
        })?;

        let endpoint = service["endpoints"].as_array()?.iter().find(|ep| {
            ep["region"]
                .as_str()
                .is_some_and(|r| r.to_uppercase() == region)
                && ep["versionId"].as_str() == Some("2")
        })?;

        endpoint["publicURL"].as_str().map(|s| s.to_string())
    }
}

/// Pull the service's error message out of a keystone error body, e.g.
/// `{"unauthorized": {"message": "...", "code": 401}}`.
fn error_message(body: &Value, default: &str) -> String {
    body.as_object()
        .and_then(|obj| obj.values().next())
        .and_then(|inner| inner["message"].as_str())
        .unwrap_or(default)
        .to_string()
}
