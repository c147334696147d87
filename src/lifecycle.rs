//! Lifecycle guard: Setup → Run → Finalize.
//!
//! Setup and Run execute inside one unwind boundary, so every way out of them
//! collapses into an [`Outcome`]:
//!
//! | Outcome     | Cause                                         |
//! |-------------|-----------------------------------------------|
//! | `Completed` | Run finished and reported a status            |
//! | `Failed`    | session acquisition or a Setup step errored   |
//! | `Fault`     | a panic anywhere in Setup or Run              |
//!
//! Finalize then runs exactly once.  What it does is a pure function of the
//! outcome ([`FinalizePlan::for_outcome`]): the cleanup action only runs when
//! there was neither a fault nor a recorded error.  A readiness timeout after
//! the daemonset was created therefore skips the log export too.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{error, info, warn};

use crate::cluster::{ClusterSession, DEFAULT_NAMESPACE};
use crate::error::{Error, Result};
use crate::logs::log_export_cleanup;
use crate::manifest::{ManifestPaths, WorkloadManifest};
use crate::provision::Provisioner;
use crate::readiness::{wait_running, ReadinessConfig};
use crate::scenario::{EnvSource, ScenarioConfig, ENV_INSTALL_CNS};

/// Exit status for a fault, a session failure or a failed cleanup.
pub const EXIT_FAIL: i32 = 1;
/// Exit status for any recorded Setup error.
pub const EXIT_SETUP_FAIL: i32 = 2;

/// Label selector of the CNS pods.
pub const CNS_LABEL_SELECTOR: &str = "k8s-app=azure-cns";
/// Relative directory the cleanup action exports logs into.
pub const LOG_DIR: &str = "logs/";

/// Finalization step registered by a successful install.
pub type CleanupAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// How Setup and Run ended.
#[derive(Debug)]
pub enum Outcome {
    /// Setup succeeded (or was skipped) and Run returned this status.
    Completed { status: i32 },
    /// An error was recorded before Run.
    Failed(Error),
    /// A panic unwound out of Setup or Run.
    Fault(String),
}

/// What Finalize does for a given outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FinalizePlan {
    pub run_cleanup: bool,
    pub exit_code: i32,
}

impl FinalizePlan {
    pub fn for_outcome(outcome: &Outcome, cleanup_registered: bool) -> Self {
        match outcome {
            Outcome::Fault(_) => Self {
                run_cleanup: false,
                exit_code: EXIT_FAIL,
            },
            Outcome::Failed(Error::Session(_)) => Self {
                run_cleanup: false,
                exit_code: EXIT_FAIL,
            },
            Outcome::Failed(_) => Self {
                run_cleanup: false,
                exit_code: EXIT_SETUP_FAIL,
            },
            Outcome::Completed { status } => Self {
                run_cleanup: cleanup_registered,
                exit_code: *status,
            },
        }
    }
}

/// Run Finalize: log the outcome, run the cleanup if the plan allows it, and
/// return the process exit code.  A failing or panicking cleanup turns the
/// run into a failure.
pub async fn finalize(outcome: Outcome, cleanup: Option<CleanupAction>) -> i32 {
    let plan = FinalizePlan::for_outcome(&outcome, cleanup.is_some());
    match &outcome {
        Outcome::Fault(msg) => error!(panic = %msg, "unrecovered fault"),
        Outcome::Failed(e) => error!(%e, "setup failed"),
        Outcome::Completed { status } => info!(status, "run completed"),
    }

    if let Some(cleanup) = cleanup.filter(|_| plan.run_cleanup) {
        match AssertUnwindSafe(cleanup()).catch_unwind().await {
            Ok(Ok(())) => info!("cleanup complete"),
            Ok(Err(e)) => {
                error!(%e, "cleanup failed");
                return EXIT_FAIL;
            }
            Err(panic) => {
                error!(panic = %panic_message(panic.as_ref()), "cleanup panicked");
                return EXIT_FAIL;
            }
        }
    } else if cleanup_skipped(&outcome) {
        warn!("skipping cleanup after failure");
    }

    plan.exit_code
}

fn cleanup_skipped(outcome: &Outcome) -> bool {
    !matches!(outcome, Outcome::Completed { .. })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

/// Static settings for one harness run.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub paths: ManifestPaths,
    pub log_dir: PathBuf,
    pub label_selector: String,
    pub readiness: ReadinessConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            paths: ManifestPaths::default(),
            log_dir: PathBuf::from(LOG_DIR),
            label_selector: CNS_LABEL_SELECTOR.to_string(),
            readiness: ReadinessConfig::default(),
        }
    }
}

pub struct Harness {
    config: HarnessConfig,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Drive a full run and return the exit code.
    ///
    /// `acquire` yields the cluster session; `body` is the Run phase and
    /// returns the test status.  Neither errors nor panics escape.
    pub async fn run<A, E, F, Fut>(&self, acquire: A, env: &E, body: F) -> i32
    where
        A: Future<Output = Result<Arc<dyn ClusterSession>>>,
        E: EnvSource,
        F: FnOnce(Arc<dyn ClusterSession>) -> Fut,
        Fut: Future<Output = i32>,
    {
        let mut cleanup: Option<CleanupAction> = None;

        let guarded = AssertUnwindSafe(async {
            let session = acquire.await?;
            cleanup = self.setup(&session, env).await?;
            Ok::<i32, Error>(body(session).await)
        })
        .catch_unwind()
        .await;

        let outcome = match guarded {
            Ok(Ok(status)) => Outcome::Completed { status },
            Ok(Err(e)) => Outcome::Failed(e),
            Err(panic) => Outcome::Fault(panic_message(panic.as_ref())),
        };
        finalize(outcome, cleanup).await
    }

    /// Setup phase.  Installs CNS when `INSTALL_CNS` is true and returns the
    /// cleanup action to register; otherwise returns `None`.
    pub async fn setup(
        &self,
        session: &Arc<dyn ClusterSession>,
        env: &impl EnvSource,
    ) -> Result<Option<CleanupAction>> {
        let scenario = ScenarioConfig::resolve(env);
        if !scenario.install_cns {
            info!(env = ENV_INSTALL_CNS, "not set to true, skipping install");
            return Ok(None);
        }
        self.install(session, &scenario).await.map(Some)
    }

    /// Materialize, provision, deploy and wait.
    pub async fn install(
        &self,
        session: &Arc<dyn ClusterSession>,
        scenario: &ScenarioConfig,
    ) -> Result<CleanupAction> {
        let mut manifest = WorkloadManifest::load(&self.config.paths.daemon_set())?;
        manifest.apply_scenario(scenario)?;
        let namespace = manifest
            .namespace()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        let provisioner = Provisioner::new(session.as_ref(), &self.config.paths, &namespace);
        provisioner.ensure_access_control().await?;
        provisioner.ensure_topology_config(scenario).await?;
        provisioner.deploy(manifest).await?;

        wait_running(
            session.as_ref(),
            &namespace,
            &self.config.label_selector,
            &self.config.readiness,
        )
        .await?;

        Ok(log_export_cleanup(
            Arc::clone(session),
            namespace,
            self.config.label_selector.clone(),
            self.config.log_dir.clone(),
        ))
    }
}
