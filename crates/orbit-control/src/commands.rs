//! Command descriptors
//!
//! A [`CommandDescriptor`] is the static, command-level configuration the
//! dispatcher consumes: default options, hooks around the per-service loop,
//! option validation and the conversion from raw handler output to a typed
//! payload. [`descriptor_for`] returns the built-in descriptor of a command.

use orbit_types::{
    merge_config, CommandKind, CommandPayload, CommandResult, ConfigMap, HandlerOutput,
    PlatformKind, ServiceTarget,
};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use crate::context::CommandOptions;

/// Deepest nesting of virtual targets the expander follows
pub const MAX_VIRTUAL_DEPTH: usize = 8;

/// Default number of log lines for `logs`
pub const DEFAULT_LOG_TAIL: u64 = 100;

/// Default grace period for `stop`, in seconds
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

/// Per-service config computed from the target and options
pub type ConfigBuilder = Arc<dyn Fn(&ServiceTarget, &CommandOptions) -> ConfigMap + Send + Sync>;

/// Transforms the target list before the loop
pub type PreExecuteHook =
    Arc<dyn Fn(Vec<ServiceTarget>, &CommandOptions) -> Result<Vec<ServiceTarget>, String> + Send + Sync>;

/// Summarizes the full result list after the loop
pub type PostExecuteHook = Arc<dyn Fn(&[CommandResult]) -> Option<Value> + Send + Sync>;

/// Checks merged options before any service is touched
pub type OptionValidator = Arc<dyn Fn(&CommandOptions) -> Result<(), String> + Send + Sync>;

/// Converts raw handler output into the command's payload
pub type ResultBuilder = Arc<dyn Fn(CommandKind, &HandlerOutput) -> CommandPayload + Send + Sync>;

/// Static definition of a command
#[derive(Clone)]
pub struct CommandDescriptor {
    pub command: CommandKind,
    pub default_options: ConfigMap,
    pub config_builder: Option<ConfigBuilder>,
    pub pre_execute: Option<PreExecuteHook>,
    pub post_execute: Option<PostExecuteHook>,
    pub validate: Option<OptionValidator>,
    /// Keep going after a failed service
    pub continue_on_error: bool,
    pub result_builder: ResultBuilder,
}

impl CommandDescriptor {
    /// Bare descriptor: no hooks, continues on error, typed payloads
    pub fn new(command: CommandKind) -> Self {
        Self {
            command,
            default_options: ConfigMap::new(),
            config_builder: None,
            pre_execute: None,
            post_execute: None,
            validate: None,
            continue_on_error: true,
            result_builder: Arc::new(typed_payload),
        }
    }

    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_options.insert(key.into(), value.into());
        self
    }

    pub fn with_config_builder<F>(mut self, f: F) -> Self
    where
        F: Fn(&ServiceTarget, &CommandOptions) -> ConfigMap + Send + Sync + 'static,
    {
        self.config_builder = Some(Arc::new(f));
        self
    }

    pub fn with_pre_execute<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<ServiceTarget>, &CommandOptions) -> Result<Vec<ServiceTarget>, String>
            + Send
            + Sync
            + 'static,
    {
        self.pre_execute = Some(Arc::new(f));
        self
    }

    pub fn with_post_execute<F>(mut self, f: F) -> Self
    where
        F: Fn(&[CommandResult]) -> Option<Value> + Send + Sync + 'static,
    {
        self.post_execute = Some(Arc::new(f));
        self
    }

    pub fn with_validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&CommandOptions) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    pub fn with_result_builder<F>(mut self, f: F) -> Self
    where
        F: Fn(CommandKind, &HandlerOutput) -> CommandPayload + Send + Sync + 'static,
    {
        self.result_builder = Arc::new(f);
        self
    }

    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Caller options layered over the defaults
    pub fn merge_options(&self, caller: &CommandOptions) -> CommandOptions {
        caller.over(&self.default_options)
    }

    /// The descriptor flag, unless the caller set `continue_on_error`
    pub fn effective_continue_on_error(&self, options: &CommandOptions) -> bool {
        options
            .get_bool("continue_on_error")
            .unwrap_or(self.continue_on_error)
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("command", &self.command)
            .field("default_options", &self.default_options)
            .field("config_builder", &self.config_builder.is_some())
            .field("pre_execute", &self.pre_execute.is_some())
            .field("post_execute", &self.post_execute.is_some())
            .field("validate", &self.validate.is_some())
            .field("continue_on_error", &self.continue_on_error)
            .finish()
    }
}

/// Dry-run plans keep their raw shape
fn typed_payload(command: CommandKind, output: &HandlerOutput) -> CommandPayload {
    match &output.data {
        Value::Object(map) if map.get("dry_run") == Some(&Value::Bool(true)) => {
            CommandPayload::Generic(map.clone())
        }
        data => CommandPayload::from_data(command, data),
    }
}

/// Built-in descriptor for `command`
pub fn descriptor_for(command: CommandKind) -> CommandDescriptor {
    let base = CommandDescriptor::new(command)
        .with_pre_execute(|targets, _options| expand_virtual(targets));

    match command {
        CommandKind::Stop => base.with_default("timeout_secs", DEFAULT_STOP_TIMEOUT_SECS),
        CommandKind::Logs => base.with_default("tail", DEFAULT_LOG_TAIL),
        CommandKind::Exec => base.with_validator(require_exec_command),
        CommandKind::Update => base.with_config_builder(copy_options(&["image"])),
        CommandKind::Provision => base
            .with_config_builder(copy_options(&["requirements"]))
            .continue_on_error(false),
        CommandKind::Backup => base.with_post_execute(summarize_backups),
        CommandKind::Restore => base
            .with_validator(require_backup_id)
            .with_post_execute(summarize_restores)
            .continue_on_error(false),
        CommandKind::Start | CommandKind::Check | CommandKind::Publish | CommandKind::Test => base,
    }
}

/// Config builder copying the named options into service config
fn copy_options(
    keys: &'static [&'static str],
) -> impl Fn(&ServiceTarget, &CommandOptions) -> ConfigMap + Send + Sync + 'static {
    move |_target, options| {
        keys.iter()
            .filter_map(|key| options.get(key).map(|v| (key.to_string(), v.clone())))
            .collect()
    }
}

fn require_exec_command(options: &CommandOptions) -> Result<(), String> {
    let present = match options.get("command") {
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(parts)) => !parts.is_empty(),
        _ => false,
    };
    if present {
        Ok(())
    } else {
        Err("a non-empty `command` option is required".to_string())
    }
}

fn require_backup_id(options: &CommandOptions) -> Result<(), String> {
    match options.get_str("backup") {
        Some(id) if !id.trim().is_empty() => Ok(()),
        _ => Err("`backup` option is required (a backup id or \"latest\")".to_string()),
    }
}

fn summarize_backups(results: &[CommandResult]) -> Option<Value> {
    let backups: Vec<Value> = results
        .iter()
        .filter_map(|r| match &r.payload {
            CommandPayload::Backup(backup) if r.success => {
                Some(json!({"service": r.entity, "backup_id": backup.backup_id}))
            }
            _ => None,
        })
        .collect();
    Some(json!({ "backups": backups }))
}

fn summarize_restores(results: &[CommandResult]) -> Option<Value> {
    let (restored, failed): (Vec<&CommandResult>, Vec<&CommandResult>) =
        results.iter().partition(|r| r.success);
    Some(json!({
        "restored": restored.iter().map(|r| r.entity.as_str()).collect::<Vec<_>>(),
        "failed": failed.iter().map(|r| r.entity.as_str()).collect::<Vec<_>>(),
    }))
}

/// Replace virtual targets with their members, recursively.
///
/// A virtual target carries a `members` array. Each member is a service name
/// or an object with `name` and optional `platform`, plus config overrides.
/// Members inherit the parent's platform and config unless they override
/// them. Order is preserved.
pub fn expand_virtual(targets: Vec<ServiceTarget>) -> Result<Vec<ServiceTarget>, String> {
    let mut expanded = Vec::with_capacity(targets.len());
    for target in targets {
        expand_into(target, 0, &mut expanded)?;
    }
    Ok(expanded)
}

fn expand_into(target: ServiceTarget, depth: usize, out: &mut Vec<ServiceTarget>) -> Result<(), String> {
    if !target.is_virtual() {
        out.push(target);
        return Ok(());
    }
    if depth >= MAX_VIRTUAL_DEPTH {
        return Err(format!(
            "virtual target {} nests deeper than {} levels",
            target.name, MAX_VIRTUAL_DEPTH
        ));
    }

    let mut inherited = target.config.clone();
    let members = match inherited.remove("members") {
        Some(Value::Array(members)) => members,
        _ => Vec::new(),
    };

    for member in members {
        let child = member_target(&target, &inherited, member)?;
        expand_into(child, depth + 1, out)?;
    }
    Ok(())
}

fn member_target(parent: &ServiceTarget, inherited: &ConfigMap, member: Value) -> Result<ServiceTarget, String> {
    match member {
        Value::String(name) => Ok(ServiceTarget {
            name,
            platform: parent.platform,
            config: inherited.clone(),
        }),
        Value::Object(mut fields) => {
            let name = match fields.remove("name") {
                Some(Value::String(name)) if !name.is_empty() => name,
                _ => return Err(format!("member of {} has no name", parent.name)),
            };
            let platform = match fields.remove("platform") {
                Some(Value::String(p)) => p.parse::<PlatformKind>().map_err(|e| e.to_string())?,
                Some(other) => return Err(format!("member {} has invalid platform {}", name, other)),
                None => parent.platform,
            };
            Ok(ServiceTarget {
                name,
                platform,
                config: merge_config(inherited, &fields),
            })
        }
        other => Err(format!("invalid member of {}: {}", parent.name, other)),
    }
}
