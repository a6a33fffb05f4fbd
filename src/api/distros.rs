//! Get information about available Hadoop platform distributions, e.g.
//! Hortonworks Data Platform

use serde::Deserialize;

use crate::api::response::{Distro, DistroDetail};
use crate::client::Lava;
use crate::error::LavaError;

/// Response from /distros
#[derive(Debug, Deserialize)]
struct DistrosResponse {
    distros: Vec<Distro>,
}

/// Response from /distros/<distro_id>
#[derive(Debug, Deserialize)]
struct DistroResponse {
    distro: DistroDetail,
}

/// Distros API methods
pub struct DistrosApi<'a> {
    client: &'a Lava,
}

impl<'a> DistrosApi<'a> {
    pub(crate) fn new(client: &'a Lava) -> Self {
        Self { client }
    }

    /// List all distros.
    pub async fn list(&self) -> Result<Vec<Distro>, LavaError> {
        let resp: DistrosResponse = self.client.get("distros").await?;
        Ok(resp.distros)
    }

    /// Get a specific distro.
    pub async fn get(&self, distro_id: &str) -> Result<DistroDetail, LavaError> {
        let resp: DistroResponse = self.client.get(&format!("distros/{}", distro_id)).await?;
        Ok(resp.distro)
    }
}
