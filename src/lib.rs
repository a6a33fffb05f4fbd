//! Client library for the Rackspace Cloud Big Data (Lava) REST API
//!
//! The [`Lava`] client exposes one resource handle per API surface
//! (clusters, stacks, scripts, credentials, nodes, flavors, distros,
//! limits). Cluster provisioning is asynchronous on the server side, so
//! [`api::clusters::ClustersApi::wait`] polls a cluster until it reaches
//! a terminal state; the polling machinery lives in [`wait`].
//!
//! ```no_run
//! use std::time::Duration;
//! use lavaclient::Lava;
//!
//! # async fn example() -> Result<(), lavaclient::LavaError> {
//! let client = Lava::builder()
//!     .username("alice")
//!     .api_key("0123456789abcdef")
//!     .region("DFW")
//!     .build()
//!     .await?;
//!
//! let cluster = client
//!     .clusters()
//!     .wait("cluster-id", Some(Duration::from_secs(45 * 60)), None)
//!     .await?;
//! println!("{} is {}", cluster.name, cluster.status);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod error;
pub mod wait;

pub use client::Lava;
pub use error::LavaError;
