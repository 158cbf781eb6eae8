//! Lifecycle of the local converter process.
//!
//! The converter is spawned once at startup and owned by a
//! [`ConverterServer`] handle until the app exits. A supervising task owns
//! the child itself: it forwards stdout/stderr into the log, records the
//! exit status, and kills the child when the handle asks for it or is
//! dropped. Crashes are never restarted; the health poller reports them.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::client::ConverterClient;
use crate::config::{AppConfig, PORT_ENV};
use crate::error::AppError;

const LOG_TARGET: &str = "converter";
const DEV_PYTHON: &str = "python";
const PACKAGED_SERVER: &str = "markitdown-server";
const STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// What to run and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl LaunchPlan {
    /// Dev mode runs the Flask script with the system Python; packaged mode
    /// runs the frozen server shipped in the resource dir. The config file
    /// may replace either.
    pub fn resolve(config: &AppConfig, dev_mode: bool, resource_dir: Option<&Path>) -> Self {
        let (default_program, default_args) = if dev_mode {
            (DEV_PYTHON.to_string(), vec![dev_script_path().display().to_string()])
        } else {
            let program = resource_dir
                .map(|dir| dir.join("python").join(PACKAGED_SERVER))
                .unwrap_or_else(|| PathBuf::from(PACKAGED_SERVER));
            (program.display().to_string(), Vec::new())
        };

        let program = config.server_command.clone().unwrap_or(default_program);
        let args = config.server_args.clone().unwrap_or(default_args);
        let flask_env = if dev_mode { "development" } else { "production" };

        Self {
            program,
            args,
            envs: vec![
                ("FLASK_ENV".to_string(), flask_env.to_string()),
                (PORT_ENV.to_string(), config.port.to_string()),
            ],
        }
    }
}

fn dev_script_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("python")
        .join("server.py")
}

/// Result of waiting for the converter to answer `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
    Exited(Option<i32>),
}

/// Owned handle to the running converter. Dropping it kills the child.
#[derive(Debug)]
pub struct ConverterServer {
    pid: Option<u32>,
    stop: Option<oneshot::Sender<()>>,
    exit: watch::Receiver<Option<ExitStatus>>,
    supervisor: Option<JoinHandle<()>>,
}

impl ConverterServer {
    /// Spawns the converter. Must be called from within the async runtime.
    pub fn spawn(plan: &LaunchPlan) -> Result<Self, AppError> {
        let program = Path::new(&plan.program);
        if program.is_absolute() && !program.exists() {
            return Err(AppError::MissingConverter {
                path: program.to_path_buf(),
            });
        }

        info!("starting converter: {} {}", plan.program, plan.args.join(" "));
        let mut child = Command::new(&plan.program)
            .args(&plan.args)
            .envs(plan.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AppError::Spawn {
                program: plan.program.clone(),
                source,
            })?;

        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, log::Level::Info));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, log::Level::Warn));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        let supervisor = tokio::spawn(supervise(child, stop_rx, exit_tx));
        debug!("converter started with pid {pid:?}");

        Ok(Self {
            pid,
            stop: Some(stop_tx),
            exit: exit_rx,
            supervisor: Some(supervisor),
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Exit status, once the child has exited.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        *self.exit.borrow()
    }

    pub fn exit_watch(&self) -> watch::Receiver<Option<ExitStatus>> {
        self.exit.clone()
    }

    /// Kills the child (if still running) and waits for it to be reaped.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(supervisor) = self.supervisor.take() {
            if tokio::time::timeout(STOP_TIMEOUT, supervisor).await.is_err() {
                warn!("converter did not stop within {STOP_TIMEOUT:?}");
            }
        }
    }
}

async fn supervise(
    mut child: Child,
    stop: oneshot::Receiver<()>,
    exit: watch::Sender<Option<ExitStatus>>,
) {
    // A dropped handle closes `stop`, which counts as a stop request.
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => {
                warn!(target: LOG_TARGET, "converter exited with {status}");
                let _ = exit.send(Some(status));
            }
            Err(e) => warn!(target: LOG_TARGET, "failed to wait on converter: {e}"),
        },
        _ = stop => {
            if let Err(e) = child.kill().await {
                warn!(target: LOG_TARGET, "failed to kill converter: {e}");
            }
            match child.try_wait() {
                Ok(Some(status)) => {
                    info!(target: LOG_TARGET, "converter stopped ({status})");
                    let _ = exit.send(Some(status));
                }
                _ => info!(target: LOG_TARGET, "converter stopped"),
            }
        }
    }
}

async fn forward_lines<R>(stream: R, level: log::Level)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => log::log!(target: LOG_TARGET, level, "{line}"),
            Ok(None) => break,
            Err(e) => {
                debug!("converter output closed: {e}");
                break;
            }
        }
    }
}

/// Polls `/health` until it answers, the child exits, or `timeout` passes.
pub async fn wait_ready(
    client: &ConverterClient,
    mut exit: watch::Receiver<Option<ExitStatus>>,
    timeout: Duration,
    interval: Duration,
) -> Readiness {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = *exit.borrow_and_update() {
            return Readiness::Exited(status.code());
        }
        if client.health().await {
            return Readiness::Ready;
        }
        let now = Instant::now();
        if now >= deadline {
            return Readiness::TimedOut;
        }
        let nap = interval.min(deadline - now);
        tokio::select! {
            _ = tokio::time::sleep(nap) => {}
            changed = exit.changed() => {
                if changed.is_err() {
                    // Supervisor gone without reporting a status.
                    return Readiness::Exited(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{dead_url, serve_once};

    #[test]
    fn dev_plan_runs_python_script() {
        let config = AppConfig::default();
        let plan = LaunchPlan::resolve(&config, true, None);
        assert_eq!(plan.program, "python");
        assert_eq!(plan.args.len(), 1);
        assert!(plan.args[0].ends_with("server.py"));
        assert!(plan
            .envs
            .contains(&("FLASK_ENV".to_string(), "development".to_string())));
        assert!(plan
            .envs
            .contains(&("MARKITDOWN_PORT".to_string(), "5678".to_string())));
    }

    #[test]
    fn packaged_plan_uses_resource_dir() {
        let config = AppConfig {
            port: 6001,
            ..AppConfig::default()
        };
        let plan = LaunchPlan::resolve(&config, false, Some(Path::new("/opt/app/resources")));
        let expected = Path::new("/opt/app/resources")
            .join("python")
            .join("markitdown-server");
        assert_eq!(plan.program, expected.display().to_string());
        assert!(plan.args.is_empty());
        assert!(plan
            .envs
            .contains(&("FLASK_ENV".to_string(), "production".to_string())));
        assert!(plan
            .envs
            .contains(&("MARKITDOWN_PORT".to_string(), "6001".to_string())));
    }

    #[test]
    fn config_overrides_plan() {
        let config = AppConfig {
            server_command: Some("/usr/local/bin/md-server".into()),
            server_args: Some(vec!["--threads".into(), "4".into()]),
            ..AppConfig::default()
        };
        let plan = LaunchPlan::resolve(&config, true, None);
        assert_eq!(plan.program, "/usr/local/bin/md-server");
        assert_eq!(plan.args, vec!["--threads", "4"]);
    }

    #[tokio::test]
    async fn spawn_failure_names_program() {
        let plan = LaunchPlan {
            program: "markitdown-server-not-on-path".into(),
            args: vec![],
            envs: vec![],
        };
        let err = ConverterServer::spawn(&plan).unwrap_err();
        assert!(matches!(err, AppError::Spawn { .. }));
        assert!(err.to_string().contains("markitdown-server-not-on-path"));
    }

    #[tokio::test]
    async fn missing_packaged_converter_is_reported() {
        let resources = tempfile::tempdir().expect("tempdir");
        let plan = LaunchPlan::resolve(&AppConfig::default(), false, Some(resources.path()));

        let err = ConverterServer::spawn(&plan).unwrap_err();
        match err {
            AppError::MissingConverter { path } => {
                assert_eq!(path, resources.path().join("python").join("markitdown-server"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn ready_when_health_answers() {
        let (url, server) = serve_once("200 OK", r#"{"status":"healthy"}"#).await;
        let client = ConverterClient::new(url).expect("client");
        let (_tx, rx) = watch::channel(None);
        let readiness = wait_ready(
            &client,
            rx,
            Duration::from_secs(5),
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(readiness, Readiness::Ready);
        server.await.expect("stub task");
    }

    #[tokio::test]
    async fn times_out_when_nothing_listens() {
        let client = ConverterClient::new(dead_url().await).expect("client");
        let (_tx, rx) = watch::channel(None);
        let readiness = wait_ready(
            &client,
            rx,
            Duration::from_millis(150),
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(readiness, Readiness::TimedOut);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn early_exit_stops_readiness_poll() {
        let plan = LaunchPlan {
            program: "sh".into(),
            args: vec!["-c".into(), "echo booting; exit 3".into()],
            envs: vec![],
        };
        let server = ConverterServer::spawn(&plan).expect("spawn");
        let client = ConverterClient::new(dead_url().await).expect("client");
        let readiness = wait_ready(
            &client,
            server.exit_watch(),
            Duration::from_secs(10),
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(readiness, Readiness::Exited(Some(3)));
        assert_eq!(server.exit_status().and_then(|s| s.code()), Some(3));
        server.shutdown().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shutdown_kills_running_child() {
        let plan = LaunchPlan {
            program: "sh".into(),
            args: vec!["-c".into(), "sleep 30".into()],
            envs: vec![],
        };
        let server = ConverterServer::spawn(&plan).expect("spawn");
        assert!(server.id().is_some());
        assert!(server.exit_status().is_none());

        let exit = server.exit_watch();
        let started = Instant::now();
        server.shutdown().await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(exit.borrow().is_some_and(|status| !status.success()));
    }
}
