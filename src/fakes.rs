//! Test doubles for collaborators that live outside the cluster.

use async_trait::async_trait;

use crate::error::Result;
use crate::nmagent::{HomeAzResponse, NcVersionListResponse, NmAgentClient};

type NcVersionListFn = Box<dyn Fn() -> Result<NcVersionListResponse> + Send + Sync>;
type HomeAzFn = Box<dyn Fn() -> Result<HomeAzResponse> + Send + Sync>;

/// [`NmAgentClient`] that forwards each call to an injected closure.
pub struct NmAgentClientFake {
    pub get_nc_version_list_fn: NcVersionListFn,
    pub get_home_az_info_fn: HomeAzFn,
}

impl NmAgentClientFake {
    pub fn new(
        get_nc_version_list: impl Fn() -> Result<NcVersionListResponse> + Send + Sync + 'static,
        get_home_az_info: impl Fn() -> Result<HomeAzResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            get_nc_version_list_fn: Box::new(get_nc_version_list),
            get_home_az_info_fn: Box::new(get_home_az_info),
        }
    }
}

#[async_trait]
impl NmAgentClient for NmAgentClientFake {
    async fn get_nc_version_list(&self) -> Result<NcVersionListResponse> {
        (self.get_nc_version_list_fn)()
    }

    async fn get_home_az_info(&self) -> Result<HomeAzResponse> {
        (self.get_home_az_info_fn)()
    }
}
