//! Shared test harness: an in-memory cluster session and fixture helpers.
//!
//! [`FakeCluster`] records every call the harness makes and simulates the few
//! behaviours that matter here: server-side apply, single-shot daemonset
//! creation, pods that become ready after a number of polls, and pod logs.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, Pod, PodStatus, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use kube::api::ObjectMeta;
use kube::core::ErrorResponse;
use kube::{Resource, ResourceExt};

use cns_harness::cluster::ClusterSession;
use cns_harness::lifecycle::HarnessConfig;
use cns_harness::manifest::ManifestPaths;
use cns_harness::readiness::ReadinessConfig;
use cns_harness::{Error, Result};

pub const CNS_NS: &str = "kube-system";
pub const SELECTOR: &str = "k8s-app=azure-cns";

/// Build a `kube::Error` the way the API server would report a failure.
pub fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".into(),
        message: format!("simulated {reason}"),
        reason: reason.into(),
        code,
    })
}

/// Manifest root shipped with the crate.
pub fn manifest_paths() -> ManifestPaths {
    ManifestPaths::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("manifests"))
}

/// Harness settings with short readiness timings and a private log dir.
pub fn test_config(log_dir: PathBuf) -> HarnessConfig {
    HarnessConfig {
        paths: manifest_paths(),
        log_dir,
        label_selector: SELECTOR.into(),
        readiness: ReadinessConfig {
            timeout: Duration::from_millis(300),
            interval: Duration::from_millis(10),
        },
    }
}

/// Environment map from `(key, value)` pairs.
pub fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn pod(name: &str, phase: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(CNS_NS.into()),
            labels: Some(BTreeMap::from([("k8s-app".into(), "azure-cns".into())])),
            ..Default::default()
        },
        status: Some(PodStatus {
            phase: Some(phase.into()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn key<K: Resource<DynamicType = ()>>(obj: &K) -> String {
    match obj.namespace() {
        Some(ns) => format!("{}/{ns}/{}", K::kind(&()), obj.name_any()),
        None => format!("{}/{}", K::kind(&()), obj.name_any()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FakeCluster
// ═══════════════════════════════════════════════════════════════════════════════

pub struct FakeCluster {
    /// `Kind/[ns/]name` of every apply, in call order.
    pub applied: Mutex<Vec<String>>,
    pub daemon_sets: Mutex<Vec<DaemonSet>>,
    pub list_calls: AtomicUsize,
    pub log_calls: AtomicUsize,

    /// Number of pods the daemonset schedules once created.
    pub pod_count: usize,
    /// Pods report `Running` from this list call on; `None` keeps them pending.
    pub running_after: Option<usize>,
    /// Kind whose apply fails with a server error.
    pub fail_apply: Option<&'static str>,
    pub fail_list: bool,
    pub fail_logs: bool,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self {
            applied: Mutex::new(vec![]),
            daemon_sets: Mutex::new(vec![]),
            list_calls: AtomicUsize::new(0),
            log_calls: AtomicUsize::new(0),
            pod_count: 2,
            running_after: Some(0),
            fail_apply: None,
            fail_list: false,
            fail_logs: false,
        }
    }
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(f: impl FnOnce(&mut Self)) -> Arc<Self> {
        let mut fake = Self::default();
        f(&mut fake);
        Arc::new(fake)
    }

    /// Same object as a trait-object session.
    pub fn session(self: &Arc<Self>) -> Arc<dyn ClusterSession> {
        self.clone()
    }

    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }

    pub fn created_daemon_set(&self) -> Option<DaemonSet> {
        self.daemon_sets.lock().unwrap().first().cloned()
    }

    fn record<K: Resource<DynamicType = ()>>(&self, obj: &K) -> Result<()> {
        let kind = K::kind(&()).to_string();
        if self.fail_apply == Some(kind.as_str()) {
            return Err(Error::Provision {
                kind,
                name: obj.name_any(),
                source: api_error(500, "InternalError"),
            });
        }
        self.applied.lock().unwrap().push(key(obj));
        Ok(())
    }
}

#[async_trait]
impl ClusterSession for FakeCluster {
    async fn apply_cluster_role(&self, role: &ClusterRole) -> Result<()> {
        self.record(role)
    }

    async fn apply_cluster_role_binding(&self, binding: &ClusterRoleBinding) -> Result<()> {
        self.record(binding)
    }

    async fn apply_service_account(&self, account: &ServiceAccount) -> Result<()> {
        self.record(account)
    }

    async fn apply_role(&self, role: &Role) -> Result<()> {
        self.record(role)
    }

    async fn apply_role_binding(&self, binding: &RoleBinding) -> Result<()> {
        self.record(binding)
    }

    async fn apply_config_map(&self, config_map: &ConfigMap) -> Result<()> {
        self.record(config_map)
    }

    async fn create_daemon_set(&self, daemon_set: &DaemonSet) -> Result<()> {
        let mut created = self.daemon_sets.lock().unwrap();
        let name = daemon_set.name_any();
        if created.iter().any(|d| d.name_any() == name) {
            return Err(Error::AlreadyExists {
                kind: "DaemonSet".into(),
                name,
            });
        }
        created.push(daemon_set.clone());
        Ok(())
    }

    async fn list_pods(&self, _namespace: &str, _selector: &str) -> Result<Vec<Pod>> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list {
            return Err(Error::Watch(api_error(503, "ServiceUnavailable")));
        }
        if self.daemon_sets.lock().unwrap().is_empty() {
            return Ok(vec![]);
        }
        let phase = match self.running_after {
            Some(n) if call >= n => "Running",
            _ => "Pending",
        };
        Ok((0..self.pod_count)
            .map(|i| pod(&format!("azure-cns-{i}"), phase))
            .collect())
    }

    async fn pod_logs(&self, _namespace: &str, pod: &str) -> Result<String> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_logs {
            return Err(Error::Kube(api_error(500, "InternalError")));
        }
        Ok(format!("log line from {pod}\n"))
    }
}
