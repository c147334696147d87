//! Scenario resolution: turns the process environment into an immutable
//! [`ScenarioConfig`].
//!
//! Every install switch goes through [`parse_switch`], which has an explicit
//! branch for literals that are not booleans.  Those resolve exactly like an
//! unset variable; the only difference is a warning in the log.

use std::collections::{BTreeMap, HashMap};

use tracing::{info, warn};

// ── Environment variable names ────────────────────────────────────────────────

pub const ENV_INSTALL_CNS: &str = "INSTALL_CNS";
pub const ENV_TEST_DROPGZ: &str = "TEST_DROPGZ";
pub const ENV_INSTALL_AZURE_VNET: &str = "INSTALL_AZURE_VNET";
pub const ENV_INSTALL_AZILIUM: &str = "INSTALL_AZILIUM";
pub const ENV_INSTALL_OVERLAY: &str = "INSTALL_OVERLAY";
pub const ENV_CNS_VERSION: &str = "CNS_VERSION";
pub const ENV_CNI_DROPGZ_VERSION: &str = "CNI_DROPGZ_VERSION";

// ── Environment source ────────────────────────────────────────────────────────

/// Read-only view of environment variables.
///
/// The process environment is the production source; tests hand in a map so
/// they never mutate global state.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

// ── Switch parsing ────────────────────────────────────────────────────────────

/// Interpretation of a single install switch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Switch {
    /// Variable absent or empty.
    Unset,
    Enabled,
    Disabled,
    /// Present but not a boolean literal.  Treated as disabled.
    Malformed(String),
}

impl Switch {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Switch::Enabled)
    }
}

/// Parse a raw switch value.  Accepts `1`, `t` and `true` (and `0`, `f`,
/// `false`) in lower, upper or title case.
pub fn parse_switch(raw: Option<&str>) -> Switch {
    match raw {
        None | Some("") => Switch::Unset,
        Some("1" | "t" | "T" | "true" | "TRUE" | "True") => Switch::Enabled,
        Some("0" | "f" | "F" | "false" | "FALSE" | "False") => Switch::Disabled,
        Some(other) => Switch::Malformed(other.to_string()),
    }
}

/// Read and log one switch.  Returns whether it is enabled.
fn read_switch(env: &impl EnvSource, key: &str) -> bool {
    match parse_switch(env.var(key).as_deref()) {
        Switch::Enabled => {
            info!(env = key, "switch set to true");
            true
        }
        Switch::Unset => {
            info!(env = key, "not set to true, skipping");
            false
        }
        Switch::Disabled => {
            info!(env = key, "set to false, skipping");
            false
        }
        Switch::Malformed(value) => {
            warn!(env = key, %value, "not a boolean, treating as disabled");
            false
        }
    }
}

fn read_version(env: &impl EnvSource, key: &str) -> Option<String> {
    env.var(key).filter(|v| !v.is_empty())
}

// ── Topology ──────────────────────────────────────────────────────────────────

/// Networking mode that decides the init container's argument vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// Classic azure-vnet CNI with swift.
    LegacyVnet,
    /// azure-ipam under Cilium; overlay installs the same binaries.
    AziliumOrOverlay,
    /// Leave the template's init arguments alone.
    Default,
}

impl Topology {
    /// Init container arguments for this topology, `None` for the template default.
    pub fn init_args(&self) -> Option<Vec<String>> {
        let args: &[&str] = match self {
            Topology::LegacyVnet => &[
                "deploy",
                "azure-vnet",
                "-o",
                "/opt/cni/bin/azure-vnet",
                "azure-vnet-telemetry",
                "-o",
                "/opt/cni/bin/azure-vnet-telemetry",
                "azure-vnet-ipam",
                "-o",
                "/opt/cni/bin/azure-vnet-ipam",
                "azure-swift.conflist",
                "-o",
                "/etc/cni/net.d/10-azure.conflist",
            ],
            Topology::AziliumOrOverlay => &["deploy", "azure-ipam", "-o", "/opt/cni/bin/azure-ipam"],
            Topology::Default => return None,
        };
        Some(args.iter().map(|a| a.to_string()).collect())
    }
}

/// Supporting CNS config map requested by a topology switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopologyConfig {
    Swift,
    Cilium,
    Overlay,
}

impl TopologyConfig {
    /// File name under the `cnsconfig` manifest folder.
    pub fn file_name(&self) -> &'static str {
        match self {
            TopologyConfig::Swift => "swiftconfigmap.yaml",
            TopologyConfig::Cilium => "ciliumconfigmap.yaml",
            TopologyConfig::Overlay => "overlayconfigmap.yaml",
        }
    }
}

// ── ScenarioConfig ────────────────────────────────────────────────────────────

/// Resolved install switches and versions for one run.  Built once at Setup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScenarioConfig {
    pub install_cns: bool,
    pub use_test_init_image: bool,
    pub install_legacy_vnet: bool,
    pub install_azilium: bool,
    pub install_overlay: bool,
    pub init_image_version: Option<String>,
    pub workload_image_version: Option<String>,
}

impl ScenarioConfig {
    /// Resolve the scenario from an environment source.  Never fails.
    pub fn resolve(env: &impl EnvSource) -> Self {
        info!("checking environment scenario");
        Self {
            install_cns: read_switch(env, ENV_INSTALL_CNS),
            use_test_init_image: read_switch(env, ENV_TEST_DROPGZ),
            install_legacy_vnet: read_switch(env, ENV_INSTALL_AZURE_VNET),
            install_azilium: read_switch(env, ENV_INSTALL_AZILIUM),
            install_overlay: read_switch(env, ENV_INSTALL_OVERLAY),
            init_image_version: read_version(env, ENV_CNI_DROPGZ_VERSION),
            workload_image_version: read_version(env, ENV_CNS_VERSION),
        }
    }

    pub fn from_process_env() -> Self {
        Self::resolve(&ProcessEnv)
    }

    /// The single authoritative topology.  Switches are ranked in declaration
    /// order and the last enabled one wins: overlay and azilium share a
    /// topology and both outrank legacy-vnet.
    pub fn topology(&self) -> Topology {
        if self.install_azilium || self.install_overlay {
            Topology::AziliumOrOverlay
        } else if self.install_legacy_vnet {
            Topology::LegacyVnet
        } else {
            Topology::Default
        }
    }

    /// Config maps to provision, one per enabled switch, in declaration order.
    /// Independent of [`Self::topology`]: legacy-vnet plus azilium yields both
    /// the swift and the cilium config map.
    pub fn topology_configs(&self) -> Vec<TopologyConfig> {
        [
            (self.install_legacy_vnet, TopologyConfig::Swift),
            (self.install_azilium, TopologyConfig::Cilium),
            (self.install_overlay, TopologyConfig::Overlay),
        ]
        .into_iter()
        .filter_map(|(enabled, config)| enabled.then_some(config))
        .collect()
    }
}
