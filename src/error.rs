use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Cluster session error: {0}")]
    Session(#[source] kube::Error),

    #[error("Template not found: {}: {source}", path.display())]
    TemplateNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template parse error in {}: {source}", path.display())]
    TemplateParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid template {}: {reason}", path.display())]
    TemplateInvalid { path: PathBuf, reason: String },

    #[error("Provisioning {kind} {name} failed: {source}")]
    Provision {
        kind: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("Pods matching {selector} in {namespace} not running after {timeout:?}")]
    ReadinessTimeout {
        namespace: String,
        selector: String,
        timeout: Duration,
    },

    #[error("Watch error: {0}")]
    Watch(#[source] kube::Error),

    #[error("Log export to {} failed: {source}", path.display())]
    LogExport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("NMAgent error: {0}")]
    NmAgent(String),
}

/// Short alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn template_invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::TemplateInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn nmagent(msg: impl Into<String>) -> Self {
        Self::NmAgent(msg.into())
    }
}
