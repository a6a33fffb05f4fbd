//! Resource quota limits for the authenticated tenant

use serde::Deserialize;

use crate::api::response::{AbsoluteLimits, Limit};
use crate::client::Lava;
use crate::error::LavaError;

/// Response from /limits
#[derive(Debug, Deserialize)]
struct LimitsResponse {
    limits: Limit,
}

/// Limits API methods
pub struct LimitsApi<'a> {
    client: &'a Lava,
}

impl<'a> LimitsApi<'a> {
    pub(crate) fn new(client: &'a Lava) -> Self {
        Self { client }
    }

    /// Get resource limits for the tenant.
    pub async fn get(&self) -> Result<AbsoluteLimits, LavaError> {
        let resp: LimitsResponse = self.client.get("limits").await?;
        Ok(resp.limits.absolute)
    }
}
