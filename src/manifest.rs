//! Manifest templates: loading from disk and scenario overrides for the CNS
//! daemonset.

use std::path::{Path, PathBuf};

use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::Container;
use kube::ResourceExt;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::image::apply_image_tag;
use crate::scenario::{ScenarioConfig, TopologyConfig};

/// Init image used when the run asks for the dropgz test build.
pub const TEST_INIT_IMAGE: &str = "acnpublic.azurecr.io/cni-dropgz-test:latest";

// ── Template locations ────────────────────────────────────────────────────────

/// Paths of every template, relative to a manifest root
/// (`<root>/cns/*.yaml` and `<root>/cnsconfig/*.yaml`).
#[derive(Clone, Debug)]
pub struct ManifestPaths {
    root: PathBuf,
}

impl ManifestPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cns(&self, file: &str) -> PathBuf {
        self.root.join("cns").join(file)
    }

    pub fn daemon_set(&self) -> PathBuf {
        self.cns("daemonset.yaml")
    }

    pub fn cluster_role(&self) -> PathBuf {
        self.cns("clusterrole.yaml")
    }

    pub fn cluster_role_binding(&self) -> PathBuf {
        self.cns("clusterrolebinding.yaml")
    }

    pub fn service_account(&self) -> PathBuf {
        self.cns("serviceaccount.yaml")
    }

    pub fn role(&self) -> PathBuf {
        self.cns("role.yaml")
    }

    pub fn role_binding(&self) -> PathBuf {
        self.cns("rolebinding.yaml")
    }

    pub fn topology_config(&self, config: TopologyConfig) -> PathBuf {
        self.root.join("cnsconfig").join(config.file_name())
    }
}

impl Default for ManifestPaths {
    fn default() -> Self {
        Self::new("manifests")
    }
}

// ── Generic loading ───────────────────────────────────────────────────────────

/// Read and decode a single-document YAML manifest.
pub fn load_resource<K: DeserializeOwned>(path: &Path) -> Result<K> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::TemplateNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    parse_resource(&raw, path)
}

fn parse_resource<K: DeserializeOwned>(raw: &str, path: &Path) -> Result<K> {
    serde_yaml::from_str(raw).map_err(|source| Error::TemplateParse {
        path: path.to_path_buf(),
        source,
    })
}

// ── WorkloadManifest ──────────────────────────────────────────────────────────

/// The CNS daemonset, loaded from its template and mutated in place by
/// [`WorkloadManifest::apply_scenario`] before submission.
#[derive(Clone, Debug)]
pub struct WorkloadManifest {
    daemon_set: DaemonSet,
    source: PathBuf,
}

impl WorkloadManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::TemplateNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw, path)
    }

    /// Decode a template and check it has the primary and init container the
    /// overrides target.
    pub fn from_yaml(raw: &str, path: &Path) -> Result<Self> {
        let daemon_set: DaemonSet = parse_resource(raw, path)?;
        let manifest = Self {
            daemon_set,
            source: path.to_path_buf(),
        };
        manifest.primary_container()?;
        manifest.init_container()?;
        Ok(manifest)
    }

    pub fn name(&self) -> String {
        self.daemon_set.name_any()
    }

    pub fn namespace(&self) -> Option<String> {
        self.daemon_set.namespace()
    }

    pub fn image(&self) -> Option<&str> {
        self.primary_container().ok()?.image.as_deref()
    }

    pub fn init_image(&self) -> Option<&str> {
        self.init_container().ok()?.image.as_deref()
    }

    pub fn init_args(&self) -> &[String] {
        self.init_container()
            .ok()
            .and_then(|c| c.args.as_deref())
            .unwrap_or_default()
    }

    pub fn daemon_set(&self) -> &DaemonSet {
        &self.daemon_set
    }

    pub fn into_daemon_set(self) -> DaemonSet {
        self.daemon_set
    }

    /// Apply a resolved scenario: workload image tag, init image, and the init
    /// arguments of the winning topology.
    pub fn apply_scenario(&mut self, scenario: &ScenarioConfig) -> Result<()> {
        match &scenario.workload_image_version {
            Some(version) => {
                let container = self.primary_container_mut()?;
                let image = container.image.as_deref().unwrap_or_default();
                container.image = Some(apply_image_tag(image, version));
            }
            None => warn!("workload version not set, keeping template image tag"),
        }

        let init_base = if scenario.use_test_init_image {
            info!("deploying test init image");
            TEST_INIT_IMAGE.to_string()
        } else {
            info!("deploying template init image");
            self.init_image().unwrap_or_default().to_string()
        };
        let init_image = match &scenario.init_image_version {
            Some(version) => apply_image_tag(&init_base, version),
            None => {
                warn!("init image version not set, keeping image tag");
                init_base
            }
        };
        self.init_container_mut()?.image = Some(init_image);

        let topology = scenario.topology();
        if let Some(args) = topology.init_args() {
            info!(?topology, "overriding init container args");
            self.init_container_mut()?.args = Some(args);
        } else {
            info!("no topology switch set, keeping template init args");
        }
        Ok(())
    }

    fn primary_container(&self) -> Result<&Container> {
        self.daemon_set
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|p| p.containers.first())
            .ok_or_else(|| Error::template_invalid(&self.source, "daemonset has no containers"))
    }

    fn primary_container_mut(&mut self) -> Result<&mut Container> {
        let source = &self.source;
        self.daemon_set
            .spec
            .as_mut()
            .and_then(|s| s.template.spec.as_mut())
            .and_then(|p| p.containers.first_mut())
            .ok_or_else(|| Error::template_invalid(source, "daemonset has no containers"))
    }

    fn init_container(&self) -> Result<&Container> {
        self.daemon_set
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|p| p.init_containers.as_ref())
            .and_then(|c| c.first())
            .ok_or_else(|| Error::template_invalid(&self.source, "daemonset has no init containers"))
    }

    fn init_container_mut(&mut self) -> Result<&mut Container> {
        let source = &self.source;
        self.daemon_set
            .spec
            .as_mut()
            .and_then(|s| s.template.spec.as_mut())
            .and_then(|p| p.init_containers.as_mut())
            .and_then(|c| c.first_mut())
            .ok_or_else(|| Error::template_invalid(source, "daemonset has no init containers"))
    }
}
