//! Resource provisioner: RBAC, topology config maps and the CNS daemonset.
//!
//! Supporting resources are applied with create-or-update semantics and may
//! be re-run.  The daemonset is submitted once; a second submission surfaces
//! as [`crate::Error::AlreadyExists`] and is not reconciled.

use k8s_openapi::api::core::v1::{ConfigMap, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use kube::{Resource, ResourceExt};
use tracing::info;

use crate::cluster::ClusterSession;
use crate::error::Result;
use crate::manifest::{load_resource, ManifestPaths, WorkloadManifest};
use crate::scenario::ScenarioConfig;

pub struct Provisioner<'a> {
    session: &'a dyn ClusterSession,
    paths: &'a ManifestPaths,
    /// Namespace given to namespaced templates that do not set one.
    namespace: String,
}

impl<'a> Provisioner<'a> {
    pub fn new(session: &'a dyn ClusterSession, paths: &'a ManifestPaths, namespace: &str) -> Self {
        Self {
            session,
            paths,
            namespace: namespace.to_string(),
        }
    }

    /// Ensure the CNS cluster RBAC (ClusterRole, ClusterRoleBinding,
    /// ServiceAccount) and namespaced RBAC (Role, RoleBinding) exist.
    pub async fn ensure_access_control(&self) -> Result<()> {
        let cluster_role: ClusterRole = load_resource(&self.paths.cluster_role())?;
        let cluster_role_binding: ClusterRoleBinding =
            load_resource(&self.paths.cluster_role_binding())?;
        let mut service_account: ServiceAccount = load_resource(&self.paths.service_account())?;
        self.default_namespace(&mut service_account);

        self.session.apply_cluster_role(&cluster_role).await?;
        self.session
            .apply_cluster_role_binding(&cluster_role_binding)
            .await?;
        self.session.apply_service_account(&service_account).await?;
        info!(
            cluster_role = %cluster_role.name_any(),
            service_account = %service_account.name_any(),
            "cluster RBAC ready"
        );

        let mut role: Role = load_resource(&self.paths.role())?;
        let mut role_binding: RoleBinding = load_resource(&self.paths.role_binding())?;
        self.default_namespace(&mut role);
        self.default_namespace(&mut role_binding);

        self.session.apply_role(&role).await?;
        self.session.apply_role_binding(&role_binding).await?;
        info!(role = %role.name_any(), "namespace RBAC ready");
        Ok(())
    }

    /// Apply the config map of every enabled topology switch.
    pub async fn ensure_topology_config(&self, scenario: &ScenarioConfig) -> Result<()> {
        for config in scenario.topology_configs() {
            let mut config_map: ConfigMap = load_resource(&self.paths.topology_config(config))?;
            self.default_namespace(&mut config_map);
            self.session.apply_config_map(&config_map).await?;
            info!(?config, name = %config_map.name_any(), "topology config map ready");
        }
        Ok(())
    }

    /// Submit the daemonset.  Not idempotent.
    pub async fn deploy(&self, manifest: WorkloadManifest) -> Result<()> {
        info!(
            name = %manifest.name(),
            image = manifest.image().unwrap_or_default(),
            "installing CNS daemonset"
        );
        let mut daemon_set = manifest.into_daemon_set();
        self.default_namespace(&mut daemon_set);
        self.session.create_daemon_set(&daemon_set).await
    }

    fn default_namespace<K: Resource>(&self, obj: &mut K) {
        if obj.meta().namespace.is_none() {
            obj.meta_mut().namespace = Some(self.namespace.clone());
        }
    }
}
