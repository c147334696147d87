//! Harness that installs the CNS daemonset for an integration run and
//! guarantees diagnostics capture however the run ends.
//!
//! The flow is Setup → Run → Finalize, driven by [`lifecycle::Harness`]:
//! resolve the scenario from the environment, materialize the daemonset
//! template, provision RBAC and topology config maps, create the workload,
//! wait for its pods, hand over to the test command, then export logs.

pub mod cluster;
pub mod error;
pub mod fakes;
pub mod image;
pub mod lifecycle;
pub mod logs;
pub mod manifest;
pub mod nmagent;
pub mod provision;
pub mod readiness;
pub mod scenario;

pub use error::{Error, Result};
