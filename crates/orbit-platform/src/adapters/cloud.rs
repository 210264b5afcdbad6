//! Managed cloud infrastructure driven through the `aws` CLI.
//!
//! Only the operations the CLI can express in one call are implemented:
//! ECS redeploys, status checks, RDS snapshots, ECS exec and S3 publishing.

use async_trait::async_trait;
use chrono::Utc;
use orbit_service::Service;
use orbit_types::{ConfigMap, PlatformKind, PlatformResources, ServiceKind};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{PlatformError, Result};
use crate::platform::{command_argv, OperationOutcome, Platform, PlatformContext};
use crate::runner::{CommandRunner, CommandSpec};

const AWS: &str = "aws";

/// Cloud platform
pub struct CloudPlatform {
    runner: Arc<dyn CommandRunner>,
}

impl CloudPlatform {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Build an `aws` invocation with region/profile flags and JSON output
    fn aws<I, S>(service: &Service, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = CommandSpec::new(AWS).args(args);
        if let Some(region) = service.config_str("region") {
            spec = spec.args(["--region", region]);
        }
        if let Some(profile) = service.config_str("aws_profile") {
            spec = spec.args(["--profile", profile]);
        }
        spec.args(["--output", "json"])
    }

    /// Run and parse JSON stdout; a non-zero exit is returned as `Err(message)`
    async fn aws_json(&self, spec: &CommandSpec) -> Result<std::result::Result<Value, String>> {
        let output = self.runner.run(spec).await?;
        if !output.success() {
            return Ok(Err(output.error_message()));
        }
        if output.stdout.trim().is_empty() {
            return Ok(Ok(Value::Null));
        }
        serde_json::from_str(&output.stdout)
            .map(Ok)
            .map_err(|e| PlatformError::unexpected(AWS, e.to_string()))
    }

    fn required<'a>(service: &'a Service, key: &str) -> Result<&'a str> {
        service
            .config_str(key)
            .ok_or_else(|| PlatformError::InvalidConfig {
                service: service.name().to_string(),
                reason: format!("`{}` is required on the cloud platform", key),
            })
    }

    fn ecs_service_name(service: &Service) -> &str {
        service.config_str("ecs_service").unwrap_or(service.name())
    }

    fn db_instance(service: &Service) -> &str {
        service.config_str("db_instance").unwrap_or(service.name())
    }

    async fn check_ecs(&self, service: &Service) -> Result<OperationOutcome> {
        let cluster = Self::required(service, "cluster")?;
        let name = Self::ecs_service_name(service);
        let spec = Self::aws(
            service,
            ["ecs", "describe-services", "--cluster", cluster, "--services", name],
        );
        let described = match self.aws_json(&spec).await? {
            Ok(value) => value,
            Err(message) => return Ok(OperationOutcome::failed(message)),
        };

        let Some(svc) = described["services"].as_array().and_then(|s| s.first()) else {
            return Ok(OperationOutcome::ok(json!({
                "running": false,
                "status": "not found",
            })));
        };
        let running = svc["runningCount"].as_u64().unwrap_or(0);
        let desired = svc["desiredCount"].as_u64().unwrap_or(0);
        let status = svc["status"].as_str().unwrap_or("UNKNOWN");

        Ok(OperationOutcome::ok(json!({
            "running": running > 0,
            "healthy": running > 0 && running == desired,
            "status": format!("{} ({}/{} tasks)", status, running, desired),
        })))
    }

    async fn check_database(&self, service: &Service) -> Result<OperationOutcome> {
        let instance = Self::db_instance(service);
        let spec = Self::aws(
            service,
            ["rds", "describe-db-instances", "--db-instance-identifier", instance],
        );
        let described = match self.aws_json(&spec).await? {
            Ok(value) => value,
            Err(message) => return Ok(OperationOutcome::failed(message)),
        };

        let status = described["DBInstances"][0]["DBInstanceStatus"]
            .as_str()
            .unwrap_or("unknown")
            .to_string();
        Ok(OperationOutcome::ok(json!({
            "running": status == "available",
            "healthy": status == "available",
            "status": status,
        })))
    }
}

#[async_trait]
impl Platform for CloudPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Cloud
    }

    /// A logical service may be backed by several managed products; config
    /// keys decide which one.
    fn classify(&self, service: &Service) -> ServiceKind {
        let declared = service.declared_kind();
        if declared != ServiceKind::Generic {
            return declared;
        }
        if service.config_str("function_name").is_some() {
            ServiceKind::Lambda
        } else if service.config_str("bucket").is_some() {
            ServiceKind::StaticSite
        } else if service.config_str("db_instance").is_some() {
            ServiceKind::Database
        } else {
            ServiceKind::EcsService
        }
    }

    /// Resolve a running task ARN for ECS exec.
    #[instrument(skip_all, fields(service = %service.name()))]
    async fn discover(&self, service: &Service, _ctx: &PlatformContext) -> Result<ConfigMap> {
        if self.classify(service) != ServiceKind::EcsService {
            return Ok(ConfigMap::new());
        }

        let cluster = Self::required(service, "cluster")?;
        let name = Self::ecs_service_name(service);
        let spec = Self::aws(
            service,
            [
                "ecs",
                "list-tasks",
                "--cluster",
                cluster,
                "--service-name",
                name,
                "--desired-status",
                "RUNNING",
            ],
        );
        let listed = self.aws_json(&spec).await?.map_err(|reason| PlatformError::Discovery {
            service: service.name().to_string(),
            reason,
        })?;

        let task_arn = listed["taskArns"]
            .as_array()
            .and_then(|arns| arns.first())
            .and_then(Value::as_str)
            .ok_or_else(|| PlatformError::Discovery {
                service: service.name().to_string(),
                reason: format!("no running tasks for {} in {}", name, cluster),
            })?;
        debug!(task_arn, "discovered task");

        let mut discovered = ConfigMap::new();
        discovered.insert("cluster".into(), json!(cluster));
        discovered.insert("task_arn".into(), json!(task_arn));
        Ok(discovered)
    }

    async fn check(&self, service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        match self.classify(service) {
            ServiceKind::EcsService => self.check_ecs(service).await,
            ServiceKind::Database => self.check_database(service).await,
            _ => Ok(self.unsupported(orbit_types::CommandKind::Check)),
        }
    }

    #[instrument(skip_all, fields(service = %service.name()))]
    async fn update(&self, service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        if self.classify(service) != ServiceKind::EcsService {
            return Ok(self.unsupported(orbit_types::CommandKind::Update));
        }

        let cluster = Self::required(service, "cluster")?;
        let name = Self::ecs_service_name(service);
        let spec = Self::aws(
            service,
            [
                "ecs",
                "update-service",
                "--cluster",
                cluster,
                "--service",
                name,
                "--force-new-deployment",
            ],
        );
        let updated = match self.aws_json(&spec).await? {
            Ok(value) => value,
            Err(message) => return Ok(OperationOutcome::failed(message)),
        };

        let service_arn = updated["service"]["serviceArn"].as_str().map(str::to_string);
        let mut outcome = OperationOutcome::ok(json!({
            "service_arn": service_arn,
            "deployment": "forced",
        }));
        outcome = outcome.with_resources(PlatformResources::Aws {
            cluster: Some(cluster.to_string()),
            service_arn,
            task_arn: None,
            function_arn: None,
            db_instance: None,
        });
        Ok(outcome)
    }

    #[instrument(skip_all, fields(service = %service.name()))]
    async fn backup(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        if self.classify(service) != ServiceKind::Database {
            return Ok(self.unsupported(orbit_types::CommandKind::Backup));
        }

        let instance = Self::db_instance(service);
        let snapshot_id = format!(
            "{}-{}-{}",
            service.name(),
            ctx.environment,
            Utc::now().format("%Y%m%d%H%M%S")
        );
        let spec = Self::aws(
            service,
            [
                "rds",
                "create-db-snapshot",
                "--db-instance-identifier",
                instance,
                "--db-snapshot-identifier",
                snapshot_id.as_str(),
            ],
        );
        match self.aws_json(&spec).await? {
            Ok(_) => Ok(OperationOutcome::ok(json!({
                "backup_id": snapshot_id,
                "location": format!("rds:{}", instance),
            }))),
            Err(message) => Ok(OperationOutcome::failed(format!(
                "snapshot of {} failed: {}",
                instance, message
            ))),
        }
    }

    #[instrument(skip_all, fields(service = %service.name()))]
    async fn exec(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        if self.classify(service) != ServiceKind::EcsService {
            return Ok(self.unsupported(orbit_types::CommandKind::Exec));
        }
        let Some(task_arn) = ctx.discovered_str("task_arn") else {
            return Ok(OperationOutcome::failed(format!(
                "no running task discovered for {}",
                service.name()
            )));
        };
        let Some(argv) = ctx.options.get("command").and_then(command_argv) else {
            return Ok(OperationOutcome::failed("exec requires a command"));
        };
        let cluster = Self::required(service, "cluster")?;
        let container = service.config_str("container").unwrap_or(service.name());

        let spec = Self::aws(
            service,
            [
                "ecs",
                "execute-command",
                "--cluster",
                cluster,
                "--task",
                task_arn,
                "--container",
                container,
                "--interactive",
                "--command",
                argv.join(" ").as_str(),
            ],
        );
        let output = self.runner.run(&spec).await?;
        let data = json!({
            "exit_code": output.status,
            "stdout": output.stdout,
            "stderr": output.stderr,
        });
        if output.success() {
            Ok(OperationOutcome::ok(data).with_metadata("task_arn", task_arn))
        } else {
            Ok(OperationOutcome::failed(output.error_message()).with_data(data))
        }
    }

    #[instrument(skip_all, fields(service = %service.name()))]
    async fn publish(&self, service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        if self.classify(service) != ServiceKind::StaticSite {
            return Ok(self.unsupported(orbit_types::CommandKind::Publish));
        }
        let bucket = Self::required(service, "bucket")?;
        let source = service.resolve(service.config_str("build_dir").unwrap_or("dist"));
        let source_arg = source.display().to_string();
        let destination = format!("s3://{}", bucket);

        let spec = Self::aws(
            service,
            ["s3", "sync", source_arg.as_str(), destination.as_str(), "--delete"],
        );
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Ok(OperationOutcome::failed(output.error_message()));
        }
        let uploaded = output.stdout.lines().filter(|l| l.starts_with("upload:")).count();
        Ok(OperationOutcome::ok(json!({
            "bucket": bucket,
            "source": source_arg,
            "uploaded": uploaded,
        })))
    }
}
