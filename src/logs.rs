//! Diagnostic log export: the body of the harness's cleanup action.
//!
//! Export never deletes anything from the cluster; the workload and its
//! supporting resources stay in place for inspection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use kube::ResourceExt;
use tracing::{info, warn};

use crate::cluster::ClusterSession;
use crate::error::{Error, Result};
use crate::lifecycle::CleanupAction;

/// Write the logs of every pod matching `selector` to `<dir>/<pod>.log`.
/// Returns the files written.
pub async fn export_logs_by_selector(
    session: &dyn ClusterSession,
    namespace: &str,
    selector: &str,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| Error::LogExport {
            path: dir.to_path_buf(),
            source,
        })?;

    let pods = session.list_pods(namespace, selector).await?;
    if pods.is_empty() {
        warn!(%namespace, %selector, "no pods to export logs from");
    }

    let mut written = Vec::with_capacity(pods.len());
    for pod in &pods {
        let name = pod.name_any();
        let logs = session.pod_logs(namespace, &name).await?;
        let path = dir.join(format!("{name}.log"));
        tokio::fs::write(&path, logs)
            .await
            .map_err(|source| Error::LogExport {
                path: path.clone(),
                source,
            })?;
        info!(pod = %name, path = %path.display(), "exported pod logs");
        written.push(path);
    }
    Ok(written)
}

/// Build the cleanup action registered after a successful install.
pub fn log_export_cleanup(
    session: Arc<dyn ClusterSession>,
    namespace: String,
    selector: String,
    dir: PathBuf,
) -> CleanupAction {
    Box::new(move || {
        async move {
            export_logs_by_selector(session.as_ref(), &namespace, &selector, &dir)
                .await
                .map(|_| ())
        }
        .boxed()
    })
}
