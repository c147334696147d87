//! Readiness waiter: blocks until the workload's pods are running.

use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use tracing::{debug, info};

use crate::cluster::ClusterSession;
use crate::error::{Error, Result};

/// Deadline and poll cadence for [`wait_running`].
#[derive(Clone, Copy, Debug)]
pub struct ReadinessConfig {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            interval: Duration::from_secs(5),
        }
    }
}

/// True when there is at least one pod and every pod is in phase `Running`.
pub fn pods_running(pods: &[Pod]) -> bool {
    !pods.is_empty()
        && pods.iter().all(|p| {
            p.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Running")
        })
}

/// Poll pods matching `selector` until all are running or the deadline
/// passes.  API failures end the wait immediately.
pub async fn wait_running(
    session: &dyn ClusterSession,
    namespace: &str,
    selector: &str,
    config: &ReadinessConfig,
) -> Result<()> {
    info!(%namespace, %selector, timeout = ?config.timeout, "waiting for pods to be running");
    let poll = async {
        loop {
            let pods = session.list_pods(namespace, selector).await?;
            if pods_running(&pods) {
                return Ok::<usize, Error>(pods.len());
            }
            debug!(pods = pods.len(), "pods not running yet");
            tokio::time::sleep(config.interval).await;
        }
    };

    match tokio::time::timeout(config.timeout, poll).await {
        Ok(Ok(count)) => {
            info!(%namespace, %selector, pods = count, "pods running");
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(Error::ReadinessTimeout {
            namespace: namespace.to_string(),
            selector: selector.to_string(),
            timeout: config.timeout,
        }),
    }
}
