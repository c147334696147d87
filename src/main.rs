//! cns-harness: installs CNS for an integration run, runs the test command,
//! and exports CNS logs afterwards.
//!
//! Scenario switches (`INSTALL_CNS`, `TEST_DROPGZ`, `INSTALL_AZURE_VNET`,
//! `INSTALL_AZILIUM`, `INSTALL_OVERLAY`, `CNS_VERSION`, `CNI_DROPGZ_VERSION`)
//! are read from the environment by the scenario resolver, not by clap.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::process::Command;
use tracing::{error, info};

use cns_harness::cluster::{ClusterSession, KubeSession};
use cns_harness::lifecycle::{Harness, HarnessConfig, CNS_LABEL_SELECTOR, EXIT_FAIL, LOG_DIR};
use cns_harness::manifest::ManifestPaths;
use cns_harness::readiness::ReadinessConfig;
use cns_harness::scenario::ProcessEnv;

#[derive(Parser, Debug)]
#[command(
    name = "cns-harness",
    about = "Install CNS for an integration run and export its logs afterwards"
)]
struct Args {
    /// Root folder holding the `cns/` and `cnsconfig/` manifest templates.
    #[arg(long, default_value = "manifests", env = "CNS_MANIFEST_DIR")]
    manifest_dir: PathBuf,

    /// Directory CNS pod logs are exported into.
    #[arg(long, default_value = LOG_DIR, env = "CNS_LOG_DIR")]
    log_dir: PathBuf,

    /// Label selector identifying the CNS pods.
    #[arg(long, default_value = CNS_LABEL_SELECTOR, env = "CNS_LABEL_SELECTOR")]
    label_selector: String,

    /// Seconds to wait for the CNS pods to be running.
    #[arg(long, default_value = "600", env = "CNS_READY_TIMEOUT")]
    ready_timeout: u64,

    /// Seconds between readiness polls.
    #[arg(long, default_value = "5", env = "CNS_POLL_INTERVAL")]
    poll_interval: u64,

    /// Log format: "text" for human-readable, "json" for structured.
    #[arg(long, default_value = "text", env = "LOG_FORMAT")]
    log_format: String,

    /// Test command to run once CNS is up (e.g. `-- go test ./...`).
    #[arg(last = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    anyhow::ensure!(
        matches!(args.log_format.as_str(), "text" | "json"),
        "unknown log format {:?}, expected \"text\" or \"json\"",
        args.log_format
    );

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,kube=warn,hyper=warn,tower=warn".into());

    if args.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let harness = Harness::new(HarnessConfig {
        paths: ManifestPaths::new(args.manifest_dir),
        log_dir: args.log_dir,
        label_selector: args.label_selector,
        readiness: ReadinessConfig {
            timeout: Duration::from_secs(args.ready_timeout),
            interval: Duration::from_secs(args.poll_interval),
        },
    });

    let acquire = async {
        let session: Arc<dyn ClusterSession> = Arc::new(KubeSession::connect().await?);
        Ok::<_, cns_harness::Error>(session)
    };

    let command = args.command;
    let code = harness
        .run(acquire, &ProcessEnv, |_session| run_tests(command))
        .await;

    info!(code, "exiting");
    std::process::exit(code);
}

/// Run phase: execute the test command and report its exit status.
async fn run_tests(command: Vec<String>) -> i32 {
    let Some((program, rest)) = command.split_first() else {
        info!("no test command given, setup only");
        return 0;
    };

    info!(%program, args = ?rest, "running tests");
    match Command::new(program).args(rest).status().await {
        Ok(status) => status.code().unwrap_or(EXIT_FAIL),
        Err(e) => {
            error!(%program, %e, "failed to start test command");
            EXIT_FAIL
        }
    }
}
