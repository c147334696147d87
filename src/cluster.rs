//! Cluster session: the narrow slice of the Kubernetes API the harness uses.
//!
//! [`ClusterSession`] is the seam between the harness and the cluster so the
//! lifecycle can be exercised without an API server.  [`KubeSession`] is the
//! production implementation on top of `kube::Client`.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, Pod, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use kube::api::{Api, ListParams, LogParams, Patch, PatchParams, PostParams};
use kube::core::{ClusterResourceScope, NamespaceResourceScope};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Field manager name used for server-side apply patches.
pub const FIELD_MANAGER: &str = "cns-harness";

/// Namespace used when a namespaced manifest carries none.
pub const DEFAULT_NAMESPACE: &str = "kube-system";

/// Cluster operations consumed by the provisioner, the readiness waiter and
/// the log export.  The `apply_*` methods are create-or-update and must be
/// safe to repeat; [`ClusterSession::create_daemon_set`] is a plain create
/// that reports a duplicate as [`Error::AlreadyExists`].
#[async_trait]
pub trait ClusterSession: Send + Sync {
    async fn apply_cluster_role(&self, role: &ClusterRole) -> Result<()>;
    async fn apply_cluster_role_binding(&self, binding: &ClusterRoleBinding) -> Result<()>;
    async fn apply_service_account(&self, account: &ServiceAccount) -> Result<()>;
    async fn apply_role(&self, role: &Role) -> Result<()>;
    async fn apply_role_binding(&self, binding: &RoleBinding) -> Result<()>;
    async fn apply_config_map(&self, config_map: &ConfigMap) -> Result<()>;

    async fn create_daemon_set(&self, daemon_set: &DaemonSet) -> Result<()>;

    /// Pods in `namespace` matching the label `selector`.
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>>;

    /// Logs of the pod's default container.
    async fn pod_logs(&self, namespace: &str, pod: &str) -> Result<String>;
}

// ── KubeSession ───────────────────────────────────────────────────────────────

/// [`ClusterSession`] backed by a live API server.
#[derive(Clone)]
pub struct KubeSession {
    client: Client,
}

impl KubeSession {
    /// Acquire a session from the ambient kubeconfig or in-cluster config.
    pub async fn connect() -> Result<Self> {
        let client = Client::try_default().await.map_err(Error::Session)?;
        info!(namespace = %client.default_namespace(), "connected to cluster");
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn apply_cluster_scoped<K>(&self, obj: &K) -> Result<()>
    where
        K: Resource<DynamicType = (), Scope = ClusterResourceScope>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
    {
        let name = obj.name_any();
        let api: Api<K> = Api::all(self.client.clone());
        api.patch(
            &name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(obj),
        )
        .await
        .map_err(|source| Error::Provision {
            kind: kind_of::<K>(),
            name: name.clone(),
            source,
        })?;
        debug!(kind = %kind_of::<K>(), %name, "applied");
        Ok(())
    }

    async fn apply_namespaced<K>(&self, obj: &K) -> Result<()>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
    {
        let name = obj.name_any();
        let ns = obj
            .namespace()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let api: Api<K> = Api::namespaced(self.client.clone(), &ns);
        api.patch(
            &name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(obj),
        )
        .await
        .map_err(|source| Error::Provision {
            kind: kind_of::<K>(),
            name: name.clone(),
            source,
        })?;
        debug!(kind = %kind_of::<K>(), %ns, %name, "applied");
        Ok(())
    }
}

fn kind_of<K: Resource<DynamicType = ()>>() -> String {
    K::kind(&()).to_string()
}

#[async_trait]
impl ClusterSession for KubeSession {
    async fn apply_cluster_role(&self, role: &ClusterRole) -> Result<()> {
        self.apply_cluster_scoped(role).await
    }

    async fn apply_cluster_role_binding(&self, binding: &ClusterRoleBinding) -> Result<()> {
        self.apply_cluster_scoped(binding).await
    }

    async fn apply_service_account(&self, account: &ServiceAccount) -> Result<()> {
        self.apply_namespaced(account).await
    }

    async fn apply_role(&self, role: &Role) -> Result<()> {
        self.apply_namespaced(role).await
    }

    async fn apply_role_binding(&self, binding: &RoleBinding) -> Result<()> {
        self.apply_namespaced(binding).await
    }

    async fn apply_config_map(&self, config_map: &ConfigMap) -> Result<()> {
        self.apply_namespaced(config_map).await
    }

    async fn create_daemon_set(&self, daemon_set: &DaemonSet) -> Result<()> {
        let name = daemon_set.name_any();
        let ns = daemon_set
            .namespace()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), &ns);
        match api.create(&PostParams::default(), daemon_set).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ref e)) if e.code == 409 => Err(Error::AlreadyExists {
                kind: "DaemonSet".into(),
                name,
            }),
            Err(source) => Err(Error::Provision {
                kind: "DaemonSet".into(),
                name,
                source,
            }),
        }
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(Error::Watch)?;
        Ok(list.items)
    }

    async fn pod_logs(&self, namespace: &str, pod: &str) -> Result<String> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(pods.logs(pod, &LogParams::default()).await?)
    }
}
