//! NMAgent client surface consumed by CNS.
//!
//! Only the two host queries the integration fakes stand in for are modelled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One network container and the version NMAgent has programmed for it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NcVersion {
    pub network_container_id: String,
    pub version: String,
}

/// Response of the NC version list query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NcVersionListResponse {
    #[serde(default)]
    pub containers: Vec<NcVersion>,
}

/// Response of the host availability-zone query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeAzResponse {
    pub home_az: u32,
    #[serde(default)]
    pub api_version: u32,
}

#[async_trait]
pub trait NmAgentClient: Send + Sync {
    /// Versions of the network containers programmed on this host.
    async fn get_nc_version_list(&self) -> Result<NcVersionListResponse>;

    /// Availability zone of the host.
    async fn get_home_az_info(&self) -> Result<HomeAzResponse>;
}
