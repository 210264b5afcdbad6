//! Bare OS processes on the local machine.
//!
//! `start` spawns `config.command` detached, as the leader of a new process
//! group, and records its pid. `stop` signals the whole group: SIGTERM
//! first, SIGKILL once the grace period is over. A service is only reported
//! stopped when no member of the group is left.

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use orbit_service::Service;
use orbit_state::{Liveness, PidLivenessProbe};
use orbit_types::{PlatformKind, PlatformResources};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use crate::error::{PlatformError, Result};
use crate::platform::{command_argv, tail_lines, OperationOutcome, Platform, PlatformContext};
use crate::runner::{CommandRunner, CommandSpec};

const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TAIL: usize = 100;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Process platform
pub struct ProcessPlatform {
    runner: Arc<dyn CommandRunner>,
}

impl ProcessPlatform {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn recorded_pid(ctx: &PlatformContext) -> Option<u32> {
        ctx.prior_resources().and_then(PlatformResources::pid)
    }

    fn log_file(service: &Service) -> Option<PathBuf> {
        service.log_sources().into_iter().next()
    }

    fn spec_for(service: &Service, argv: Vec<String>) -> Option<CommandSpec> {
        let mut argv = argv.into_iter();
        let program = argv.next()?;
        Some(
            CommandSpec::new(program)
                .args(argv)
                .envs(service.environment_variables())
                .cwd(service.working_dir()),
        )
    }

    /// Signal the process group led by `pid`, or the pid alone when it
    /// leads no group. Returns whether anything received the signal.
    fn signal(pid: u32, signal: Signal) -> Result<bool> {
        let raw = i32::try_from(pid).map_err(|_| PlatformError::Signal {
            pid,
            source: Errno::EINVAL,
        })?;
        match killpg(Pid::from_raw(raw), signal) {
            Ok(()) => return Ok(true),
            Err(Errno::ESRCH) => {}
            Err(source) => return Err(PlatformError::Signal { pid, source }),
        }
        match kill(Pid::from_raw(raw), signal) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(source) => Err(PlatformError::Signal { pid, source }),
        }
    }

    async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if PidLivenessProbe::probe_service(pid) == Liveness::Dead {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl Platform for ProcessPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Process
    }

    #[instrument(skip_all, fields(service = %service.name()))]
    async fn start(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        if let Some(pid) = Self::recorded_pid(ctx) {
            if PidLivenessProbe::probe_service(pid) == Liveness::Alive {
                let mut outcome = OperationOutcome::ok(json!({"pid": pid, "already_running": true}))
                    .with_warning(format!("{} is already running as pid {}", service.name(), pid));
                if let Some(resources) = ctx.prior_resources() {
                    outcome = outcome.with_resources(resources.clone());
                }
                if let Some(endpoint) = ctx.prior_state.as_ref().and_then(|s| s.endpoint.clone()) {
                    outcome = outcome.with_endpoint(endpoint);
                }
                return Ok(outcome);
            }
        }

        let Some(command) = service.config().get("command") else {
            return Ok(OperationOutcome::failed(format!(
                "no command configured for {}",
                service.name()
            )));
        };
        let mut argv = match command_argv(command) {
            Some(argv) => argv,
            None => {
                return Err(PlatformError::InvalidConfig {
                    service: service.name().to_string(),
                    reason: "command must be a non-empty string or list".to_string(),
                })
            }
        };
        // Explicit args only apply to list-form commands
        if !matches!(command, serde_json::Value::String(_)) {
            argv.extend(service.config_strings("args"));
        }

        let Some(spec) = Self::spec_for(service, argv) else {
            return Ok(OperationOutcome::failed("empty command"));
        };
        let log_file = Self::log_file(service);
        let pid = self.runner.spawn_detached(&spec, log_file.as_deref()).await?;
        info!(pid, command = %spec.display(), "started process");

        let port = service.port();
        let mut outcome = OperationOutcome::ok(json!({ "pid": pid, "port": port }))
            .with_resources(PlatformResources::Posix { pid, port })
            .with_metadata("command", spec.display());
        if let Some(port) = port {
            let host = service.config_str("host").unwrap_or("localhost");
            outcome = outcome.with_endpoint(format!("http://{}:{}", host, port));
        }
        if let Some(log_file) = log_file {
            outcome = outcome.with_metadata("log_file", log_file.display().to_string());
        }
        Ok(outcome)
    }

    #[instrument(skip_all, fields(service = %service.name()))]
    async fn stop(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        let Some(pid) = Self::recorded_pid(ctx) else {
            return Ok(OperationOutcome::ok(json!({"stopped": false, "was_running": false}))
                .with_warning(format!("no recorded process for {}", service.name())));
        };

        if !Self::signal(pid, Signal::SIGTERM)? {
            debug!(pid, "process already gone");
            return Ok(OperationOutcome::ok(json!({"stopped": true, "was_running": false})));
        }

        let timeout = ctx.timeout(DEFAULT_STOP_TIMEOUT_SECS);
        if Self::wait_for_exit(pid, timeout).await {
            return Ok(OperationOutcome::ok(json!({"stopped": true, "was_running": true})));
        }

        warn!(pid, ?timeout, "process ignored SIGTERM, sending SIGKILL");
        Self::signal(pid, Signal::SIGKILL)?;
        if Self::wait_for_exit(pid, Duration::from_secs(2)).await {
            Ok(OperationOutcome::ok(json!({"stopped": true, "was_running": true}))
                .with_warning(format!("pid {} was killed after {:?}", pid, timeout)))
        } else {
            Ok(OperationOutcome::failed(format!(
                "process group {} is still running after SIGKILL",
                pid
            )))
        }
    }

    async fn check(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        let endpoint = ctx.prior_state.as_ref().and_then(|s| s.endpoint.clone());
        let Some(pid) = Self::recorded_pid(ctx) else {
            return Ok(OperationOutcome::ok(json!({
                "running": false,
                "status": "not started",
            })));
        };

        let data = match PidLivenessProbe::probe_service(pid) {
            Liveness::Alive => json!({
                "running": true,
                "status": format!("running (pid {})", pid),
                "endpoint": endpoint,
            }),
            Liveness::Dead => json!({
                "running": false,
                "status": format!("exited (pid {})", pid),
            }),
            Liveness::Unknown => {
                return Ok(OperationOutcome::failed(format!(
                    "cannot determine whether pid {} of {} is alive",
                    pid,
                    service.name()
                )))
            }
        };
        Ok(OperationOutcome::ok(data))
    }

    async fn exec(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        let Some(argv) = ctx.options.get("command").and_then(command_argv) else {
            return Ok(OperationOutcome::failed("exec requires a command"));
        };
        let Some(spec) = Self::spec_for(service, argv) else {
            return Ok(OperationOutcome::failed("empty command"));
        };
        let output = self.runner.run(&spec).await?;

        let data = json!({
            "exit_code": output.status,
            "stdout": output.stdout,
            "stderr": output.stderr,
        });
        if output.success() {
            Ok(OperationOutcome::ok(data))
        } else {
            Ok(OperationOutcome::failed(output.error_message()).with_data(data))
        }
    }

    async fn test(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        let command = ctx
            .options
            .get("command")
            .or_else(|| service.config().get("test_command"));
        let Some(argv) = command.and_then(command_argv) else {
            return Ok(OperationOutcome::failed(format!(
                "no test command configured for {}",
                service.name()
            )));
        };
        let Some(spec) = Self::spec_for(service, argv) else {
            return Ok(OperationOutcome::failed("empty command"));
        };
        let output = self.runner.run(&spec).await?;

        let data = json!({
            "exit_code": output.status,
            "output": format!("{}{}", output.stdout, output.stderr),
        });
        if output.success() {
            Ok(OperationOutcome::ok(data))
        } else {
            Ok(OperationOutcome::failed(format!(
                "tests failed for {}: {}",
                service.name(),
                output.error_message()
            ))
            .with_data(data))
        }
    }

    async fn logs(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        let Some(path) = Self::log_file(service) else {
            return Ok(OperationOutcome::failed(format!(
                "no log file configured for {}",
                service.name()
            )));
        };
        let tail = ctx
            .option_u64("tail")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_TAIL);

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(OperationOutcome::failed(format!(
                    "log file {} does not exist",
                    path.display()
                )))
            }
            Err(e) => return Err(PlatformError::io(&path, e)),
        };

        Ok(OperationOutcome::ok(json!({
            "lines": tail_lines(&text, tail),
            "source": path.display().to_string(),
        })))
    }
}
