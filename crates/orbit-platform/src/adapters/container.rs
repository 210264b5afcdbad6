//! Containers driven through the `docker` CLI.

use async_trait::async_trait;
use chrono::Utc;
use orbit_service::Service;
use orbit_types::{PlatformKind, PlatformResources, ServiceKind};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::error::{PlatformError, Result};
use crate::platform::{command_argv, tail_lines, OperationOutcome, Platform, PlatformContext};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

const DOCKER: &str = "docker";
const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TAIL: u64 = 100;
const DEFAULT_BACKUP_DIR: &str = "backups";

/// Container platform
pub struct ContainerPlatform {
    runner: Arc<dyn CommandRunner>,
}

impl ContainerPlatform {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Name used for `docker run --name`
    pub fn container_name(service: &Service) -> String {
        service
            .config_str("container_name")
            .map(str::to_string)
            .unwrap_or_else(|| format!("orbit-{}-{}", service.environment(), service.name()))
    }

    /// Recorded container id, else the configured or derived name
    fn container_ref(service: &Service, ctx: &PlatformContext) -> String {
        match ctx.prior_resources() {
            Some(PlatformResources::Container { container_id, .. }) => container_id.clone(),
            _ => Self::container_name(service),
        }
    }

    fn image(service: &Service) -> Option<&str> {
        service.config_str("image")
    }

    async fn docker<I, S>(&self, args: I) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runner.run(&CommandSpec::new(DOCKER).args(args)).await
    }

    fn is_missing(output: &CommandOutput) -> bool {
        output.stderr.contains("No such container") || output.stderr.contains("No such object")
    }

    fn db_user(service: &Service) -> String {
        service
            .config_str("db_user")
            .or_else(|| service.requirements().environment.get("POSTGRES_USER").map(String::as_str))
            .unwrap_or("postgres")
            .to_string()
    }

    fn db_name(service: &Service) -> String {
        service
            .config_str("db_name")
            .or_else(|| service.requirements().environment.get("POSTGRES_DB").map(String::as_str))
            .unwrap_or("postgres")
            .to_string()
    }

    fn backup_dir(service: &Service) -> PathBuf {
        service.resolve(service.config_str("backup_dir").unwrap_or(DEFAULT_BACKUP_DIR))
    }

    /// Resolve a backup id (or `latest`) to a dump file
    async fn find_backup(service: &Service, backup: &str) -> Result<Option<(String, PathBuf)>> {
        let dir = Self::backup_dir(service);
        if backup != "latest" {
            let path = dir.join(format!("{}.sql", backup));
            return Ok(tokio::fs::try_exists(&path)
                .await
                .map_err(|e| PlatformError::io(&path, e))?
                .then(|| (backup.to_string(), path)));
        }

        let prefix = format!("{}-", service.name());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PlatformError::io(&dir, e)),
        };

        let mut newest: Option<String> = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PlatformError::io(&dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(".sql") {
                // Ids embed a sortable timestamp
                if stem.starts_with(&prefix) && newest.as_deref().map_or(true, |n| stem > n) {
                    newest = Some(stem.to_string());
                }
            }
        }

        Ok(newest.map(|id| {
            let path = dir.join(format!("{}.sql", id));
            (id, path)
        }))
    }
}

#[async_trait]
impl Platform for ContainerPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Container
    }

    #[instrument(skip_all, fields(service = %service.name()))]
    async fn start(&self, service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        let Some(image) = Self::image(service) else {
            return Ok(OperationOutcome::failed(format!(
                "no image configured for {}",
                service.name()
            )));
        };
        let name = Self::container_name(service);

        let mut args = vec!["run".to_string(), "-d".to_string(), "--name".to_string(), name.clone()];
        if let Some(port) = service.port() {
            let host_port = service.config_u64("host_port").unwrap_or(u64::from(port));
            args.push("-p".into());
            args.push(format!("{}:{}", host_port, port));
        }
        for (key, value) in service.environment_variables() {
            args.push("-e".into());
            args.push(format!("{}={}", key, value));
        }
        for volume in service.requirements().storage.iter().filter(|v| v.persistent) {
            args.push("-v".into());
            args.push(format!("{}-{}:{}", name, volume.name, volume.mount_path));
        }
        args.push(image.to_string());
        if let Some(argv) = service.config().get("command").and_then(command_argv) {
            args.extend(argv);
        }

        let output = self.docker(args).await?;
        if !output.success() {
            return Ok(OperationOutcome::failed(format!(
                "docker run failed for {}: {}",
                service.name(),
                output.error_message()
            )));
        }

        let container_id = output.stdout.trim().to_string();
        if container_id.is_empty() {
            return Err(PlatformError::unexpected(DOCKER, "docker run printed no container id"));
        }
        info!(container_id = %container_id, "started container");

        let mut outcome = OperationOutcome::ok(json!({"container_id": container_id}))
            .with_resources(PlatformResources::Container {
                container_id,
                container_name: Some(name),
                image: Some(image.to_string()),
            });
        if let Some(port) = service.port() {
            let host_port = service.config_u64("host_port").unwrap_or(u64::from(port));
            outcome = outcome.with_endpoint(format!("http://localhost:{}", host_port));
        }
        Ok(outcome)
    }

    #[instrument(skip_all, fields(service = %service.name()))]
    async fn stop(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        let target = Self::container_ref(service, ctx);
        let timeout = ctx.timeout(DEFAULT_STOP_TIMEOUT_SECS).as_secs().to_string();

        let output = self.docker(["stop", "-t", timeout.as_str(), target.as_str()]).await?;
        if !output.success() {
            if Self::is_missing(&output) {
                return Ok(OperationOutcome::ok(json!({"stopped": true, "was_running": false})));
            }
            return Ok(OperationOutcome::failed(format!(
                "docker stop failed for {}: {}",
                service.name(),
                output.error_message()
            )));
        }

        let mut outcome = OperationOutcome::ok(json!({"stopped": true, "was_running": true}));
        let removed = self.docker(["rm", target.as_str()]).await?;
        if !removed.success() {
            outcome = outcome.with_warning(format!(
                "container {} stopped but not removed: {}",
                target,
                removed.error_message()
            ));
        }
        Ok(outcome)
    }

    async fn check(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        let target = Self::container_ref(service, ctx);
        let output = self
            .docker(["inspect", "--format", "{{.State.Status}}", target.as_str()])
            .await?;

        if !output.success() {
            if Self::is_missing(&output) {
                return Ok(OperationOutcome::ok(json!({
                    "running": false,
                    "status": "not found",
                })));
            }
            return Ok(OperationOutcome::failed(output.error_message()));
        }

        let status = output.stdout.trim().to_string();
        let endpoint = ctx.prior_state.as_ref().and_then(|s| s.endpoint.clone());
        Ok(OperationOutcome::ok(json!({
            "running": status == "running",
            "status": status,
            "endpoint": endpoint,
        })))
    }

    async fn update(&self, service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        let Some(image) = Self::image(service) else {
            return Ok(OperationOutcome::failed(format!(
                "no image configured for {}",
                service.name()
            )));
        };
        let output = self.docker(["pull", image]).await?;
        if !output.success() {
            return Ok(OperationOutcome::failed(output.error_message()));
        }
        Ok(OperationOutcome::ok(json!({"image": image, "pulled": true}))
            .with_warning(format!("restart {} to run the new image", service.name())))
    }

    async fn exec(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        let Some(argv) = ctx.options.get("command").and_then(command_argv) else {
            return Ok(OperationOutcome::failed("exec requires a command"));
        };
        let target = Self::container_ref(service, ctx);
        let output = self
            .docker(["exec".to_string(), target].into_iter().chain(argv))
            .await?;

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

    async fn logs(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        let target = Self::container_ref(service, ctx);
        let tail = ctx.option_u64("tail").unwrap_or(DEFAULT_TAIL);
        let tail_arg = tail.to_string();
        let output = self
            .docker(["logs", "--tail", tail_arg.as_str(), target.as_str()])
            .await?;
        if !output.success() {
            return Ok(OperationOutcome::failed(output.error_message()));
        }

        // docker writes the container's stderr to ours
        let combined = format!("{}{}", output.stdout, output.stderr);
        let limit = usize::try_from(tail).unwrap_or(usize::MAX);
        Ok(OperationOutcome::ok(json!({
            "lines": tail_lines(&combined, limit),
            "source": format!("container:{}", target),
        })))
    }

    #[instrument(skip_all, fields(service = %service.name()))]
    async fn backup(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        if self.classify(service) != ServiceKind::Database {
            return Ok(self.unsupported(orbit_types::CommandKind::Backup));
        }

        let target = Self::container_ref(service, ctx);
        let output = self
            .docker([
                "exec".to_string(),
                target,
                "pg_dump".into(),
                "-U".into(),
                Self::db_user(service),
                Self::db_name(service),
            ])
            .await?;
        if !output.success() {
            return Ok(OperationOutcome::failed(format!(
                "pg_dump failed for {}: {}",
                service.name(),
                output.error_message()
            )));
        }

        let backup_id = format!("{}-{}", service.name(), Utc::now().format("%Y%m%dT%H%M%S%3fZ"));
        let dir = Self::backup_dir(service);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PlatformError::io(&dir, e))?;
        let path = dir.join(format!("{}.sql", backup_id));
        tokio::fs::write(&path, output.stdout.as_bytes())
            .await
            .map_err(|e| PlatformError::io(&path, e))?;

        info!(backup_id = %backup_id, path = %path.display(), "wrote backup");
        Ok(OperationOutcome::ok(json!({
            "backup_id": backup_id,
            "location": path.display().to_string(),
            "size_bytes": output.stdout.len(),
        })))
    }

    #[instrument(skip_all, fields(service = %service.name()))]
    async fn restore(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        if self.classify(service) != ServiceKind::Database {
            return Ok(self.unsupported(orbit_types::CommandKind::Restore));
        }

        let requested = ctx.option_str("backup").unwrap_or("latest");
        let Some((backup_id, path)) = Self::find_backup(service, requested).await? else {
            return Ok(OperationOutcome::failed(format!(
                "backup {} not found for {}",
                requested,
                service.name()
            )));
        };
        let dump = read_dump(&path).await?;

        let spec = CommandSpec::new(DOCKER)
            .args([
                "exec".to_string(),
                "-i".into(),
                Self::container_ref(service, ctx),
                "psql".into(),
                "-U".into(),
                Self::db_user(service),
                Self::db_name(service),
            ])
            .stdin(dump);
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Ok(OperationOutcome::failed(format!(
                "psql restore failed for {}: {}",
                service.name(),
                output.error_message()
            )));
        }

        Ok(OperationOutcome::ok(json!({
            "backup_id": backup_id,
            "source": path.display().to_string(),
        })))
    }
}

async fn read_dump(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| PlatformError::io(path, e))
}
