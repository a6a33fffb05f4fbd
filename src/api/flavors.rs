//! Node flavor listings

use serde::Deserialize;

use crate::api::response::Flavor;
use crate::client::Lava;
use crate::error::LavaError;

/// Response from /flavors
#[derive(Debug, Deserialize)]
struct FlavorsResponse {
    flavors: Vec<Flavor>,
}

/// Flavors API methods
pub struct FlavorsApi<'a> {
    client: &'a Lava,
}

impl<'a> FlavorsApi<'a> {
    pub(crate) fn new(client: &'a Lava) -> Self {
        Self { client }
    }

    /// List all flavors.
    pub async fn list(&self) -> Result<Vec<Flavor>, LavaError> {
        let resp: FlavorsResponse = self.client.get("flavors").await?;
        Ok(resp.flavors)
    }
}
