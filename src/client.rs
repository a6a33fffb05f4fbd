//! Lava API client
//!
//! Wraps reqwest with the Cloud Big Data conventions: every request gets
//! an `X-Auth-Token` header plus a fresh `Client-Request-ID`, and a 401
//! response triggers exactly one keystone reauthentication before the
//! request is retried.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::{
    clusters::ClustersApi, credentials::CredentialsApi, distros::DistrosApi, flavors::FlavorsApi,
    limits::LimitsApi, nodes::NodesApi, scripts::ScriptsApi, stacks::StacksApi,
};
use crate::auth::{KeystoneAuth, DEFAULT_AUTH_URL};
use crate::error::LavaError;

const USER_AGENT: &str = concat!("rust-lavaclient ", env!("CARGO_PKG_VERSION"));

/// Lava API client
pub struct Lava {
    http: reqwest::Client,
    endpoint: String,
    token: RwLock<String>,
    auth: Option<KeystoneAuth>,
    interactive: bool,
    reauth_lock: Mutex<()>,
}

impl Lava {
    /// Start building a client. Authentication happens in
    /// [`LavaBuilder::build`] unless a hard-coded token is supplied.
    pub fn builder() -> LavaBuilder {
        LavaBuilder::default()
    }

    /// Clusters API methods
    pub fn clusters(&self) -> ClustersApi<'_> {
        ClustersApi::new(self)
    }

    /// Stacks API methods
    pub fn stacks(&self) -> StacksApi<'_> {
        StacksApi::new(self)
    }

    /// Scripts API methods
    pub fn scripts(&self) -> ScriptsApi<'_> {
        ScriptsApi::new(self)
    }

    /// Credentials API methods
    pub fn credentials(&self) -> CredentialsApi<'_> {
        CredentialsApi::new(self)
    }

    /// Nodes API methods
    pub fn nodes(&self) -> NodesApi<'_> {
        NodesApi::new(self)
    }

    /// Flavors API methods
    pub fn flavors(&self) -> FlavorsApi<'_> {
        FlavorsApi::new(self)
    }

    /// Distros API methods
    pub fn distros(&self) -> DistrosApi<'_> {
        DistrosApi::new(self)
    }

    /// Limits API methods
    pub fn limits(&self) -> LimitsApi<'_> {
        LimitsApi::new(self)
    }

    /// The current authentication token
    pub async fn token(&self) -> String {
        self.token.read().await.clone()
    }

    /// The Cloud Big Data endpoint this client talks to
    pub fn endpoint(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    /// Whether this client was built for interactive (CLI) use
    pub fn interactive(&self) -> bool {
        self.interactive
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, LavaError> {
        self.request(Method::GET, path, None::<&()>).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, LavaError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub(crate) async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, LavaError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), LavaError> {
        let resp = self
            .send_with_reauth(Method::DELETE, path, None::<&()>)
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(request_error(resp).await)
        }
    }

    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, LavaError> {
        let resp = self.send_with_reauth(method, path, body).await?;
        if !resp.status().is_success() {
            return Err(request_error(resp).await);
        }

        resp.json()
            .await
            .map_err(|e| LavaError::Api(e.to_string()))
    }

    /// Send the request; on 401, reauthenticate once and send it again.
    async fn send_with_reauth<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, LavaError> {
        let resp = self.send(method.clone(), path, body).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        self.reauthenticate().await?;

        let resp = self.send(method.clone(), path, body).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            let msg = format!("{} /{}: Unauthorized", method, path.trim_start_matches('/'));
            error!("{}", msg);
            return Err(LavaError::Authorization(msg));
        }
        Ok(resp)
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, LavaError> {
        let url = format!("{}/{}", self.endpoint(), path.trim_start_matches('/'));
        debug!("{} {}", method, url);

        let mut req = self
            .http
            .request(method.clone(), &url)
            .header("X-Auth-Token", self.token.read().await.clone())
            .header("Client-Request-ID", Uuid::new_v4().to_string())
            .header(reqwest::header::USER_AGENT, USER_AGENT);
        if let Some(body) = body {
            req = req.json(body);
        }

        req.send().await.map_err(|e| {
            let msg = format!(
                "{} /{}: Error encountered during request: {}",
                method,
                path.trim_start_matches('/'),
                e
            );
            error!("{}", msg);
            LavaError::Request(msg)
        })
    }

    /// Reauthenticate with keystone, assuming our token is no longer
    /// valid.
    async fn reauthenticate(&self) -> Result<(), LavaError> {
        let Some(auth) = &self.auth else {
            return Err(LavaError::Authentication(
                "Can not reauthenticate with hard-coded token".to_string(),
            ));
        };

        let _guard = self.reauth_lock.lock().await;
        info!("reauthenticating via keystone");

        let old_token = self.token().await;
        let session = auth.authenticate(&self.http).await?;
        if session.token == old_token {
            warn!("reauthentication produced the same token");
        }
        *self.token.write().await = session.token;

        Ok(())
    }
}

/// Turn a non-success response into a [`LavaError::Request`], preferring
/// the API's own `fault.message` when the body carries one.
async fn request_error(resp: Response) -> LavaError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let msg = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| body["fault"]["message"].as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| {
            if text.is_empty() {
                status.to_string()
            } else {
                text
            }
        });

    LavaError::Request(msg)
}

/// Validate that the endpoint ends with `v2/<tenant_id>`; a bare `…/v2`
/// is accepted when the tenant is known.
fn validate_endpoint(endpoint: &str, tenant_id: Option<&str>) -> Result<String, LavaError> {
    static VERSIONED: OnceLock<Regex> = OnceLock::new();
    let versioned = VERSIONED.get_or_init(|| Regex::new(r"v2/[^/]+$").unwrap());

    let endpoint = endpoint.trim_end_matches('/');

    match tenant_id {
        None => {
            if versioned.is_match(endpoint) {
                Ok(endpoint.to_string())
            } else {
                Err(LavaError::Invalid(
                    "Endpoint must end with v2/<tenant_id>".to_string(),
                ))
            }
        }
        Some(tenant) => {
            if endpoint.ends_with(&format!("v2/{}", tenant)) {
                Ok(endpoint.to_string())
            } else if endpoint.ends_with("v2") {
                Ok(format!("{}/{}", endpoint, tenant))
            } else {
                Err(LavaError::Invalid(
                    "Endpoint must end with v2 or v2/<tenant_id>".to_string(),
                ))
            }
        }
    }
}

/// Builder for [`Lava`]
#[derive(Debug, Default)]
pub struct LavaBuilder {
    username: Option<String>,
    api_key: Option<String>,
    password: Option<String>,
    token: Option<String>,
    region: Option<String>,
    tenant_id: Option<String>,
    endpoint: Option<String>,
    auth_url: Option<String>,
    insecure: bool,
    interactive: bool,
}

impl LavaBuilder {
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Use a pre-existing token; must be paired with [`Self::endpoint`].
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Region identifier, e.g. `DFW`
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Override the Cloud Big Data endpoint URL
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Override the keystone authentication URL
    pub fn auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = Some(auth_url.into());
        self
    }

    /// Skip TLS certificate validation
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Mark the client as CLI-driven; wait progress is printed to stdout
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Validate the configuration and authenticate.
    pub async fn build(self) -> Result<Lava, LavaError> {
        if self.api_key.is_none() && self.password.is_none() && self.token.is_none() {
            return Err(LavaError::Invalid(
                "One of api_key, token, or password is required".to_string(),
            ));
        }
        if self.endpoint.is_none() && self.region.is_none() {
            return Err(LavaError::Invalid(
                "One of endpoint or region is required".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.insecure)
            .build()
            .map_err(|e| LavaError::Invalid(format!("Unable to build HTTP client: {}", e)))?;

        let tenant = self.tenant_id.as_deref();

        if let Some(token) = self.token {
            let Some(endpoint) = self.endpoint else {
                return Err(LavaError::Invalid(
                    "Token must be accompanied by a hard-coded endpoint".to_string(),
                ));
            };

            return Ok(Lava {
                http,
                endpoint: validate_endpoint(&endpoint, tenant)?,
                token: RwLock::new(token),
                auth: None,
                interactive: self.interactive,
                reauth_lock: Mutex::new(()),
            });
        }

        let Some(username) = self.username else {
            return Err(LavaError::Invalid("Missing username".to_string()));
        };

        let auth = KeystoneAuth::new(
            self.auth_url.as_deref().unwrap_or(DEFAULT_AUTH_URL),
            username,
            self.api_key,
            self.password,
            self.region,
        )?;
        let session = auth.authenticate(&http).await?;

        let endpoint = match self.endpoint {
            Some(endpoint) => validate_endpoint(&endpoint, tenant)?,
            None => session.endpoint.ok_or_else(|| {
                LavaError::Invalid(
                    "No Cloud Big Data endpoint found in the service catalog".to_string(),
                )
            })?,
        };

        Ok(Lava {
            http,
            endpoint,
            token: RwLock::new(session.token),
            auth: Some(auth),
            interactive: self.interactive,
            reauth_lock: Mutex::new(()),
        })
    }
}
