//! Handler outputs and per-service command results

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{CommandKind, ConfigMap, PlatformKind, PlatformResources, ServiceKind};

/// Raw result returned by a handler
///
/// `data` carries command-specific fields; the command descriptor turns it
/// into a typed [`CommandPayload`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerOutput {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub data: Value,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl HandlerOutput {
    /// A successful output carrying `data`
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            ..Default::default()
        }
    }

    /// A failed output
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Why a per-service result failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The handler ran and reported failure
    CommandFailed,
    /// No handler registered for (command, platform, kind)
    HandlerNotFound,
    /// The target's platform has no registered implementation
    PlatformNotRegistered,
    /// The handler or platform faulted
    ExecutionFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CommandFailed => "command_failed",
            ErrorKind::HandlerNotFound => "handler_not_found",
            ErrorKind::PlatformNotRegistered => "platform_not_registered",
            ErrorKind::ExecutionFailure => "execution_failure",
        }
    }
}

/// Typed, command-specific part of a result
///
/// Serialized as `{"result_type": ..., "data": {...}}` so arbitrary
/// generic keys never meet the tag or the result's own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result_type", content = "data", rename_all = "snake_case")]
pub enum CommandPayload {
    Start(StartPayload),
    Stop(StopPayload),
    Check(CheckPayload),
    Backup(BackupPayload),
    Restore(RestorePayload),
    Exec(ExecPayload),
    Test(TestPayload),
    Logs(LogsPayload),
    Generic(ConfigMap),
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartPayload {
    pub endpoint: Option<String>,
    pub resources: Option<PlatformResources>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopPayload {
    pub stopped: bool,
    pub was_running: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckPayload {
    pub running: bool,
    pub healthy: Option<bool>,
    pub status: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupPayload {
    pub backup_id: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestorePayload {
    pub backup_id: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecPayload {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestPayload {
    pub exit_code: Option<i32>,
    pub passed: Option<u32>,
    pub failed: Option<u32>,
    pub output: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsPayload {
    pub lines: Vec<String>,
    pub source: Option<String>,
}

impl CommandPayload {
    /// Interpret raw handler data as the payload shape of `command`.
    ///
    /// Data that does not fit the typed shape is kept as [`CommandPayload::Generic`].
    pub fn from_data(command: CommandKind, data: &Value) -> CommandPayload {
        let object = match data {
            Value::Null => return CommandPayload::None,
            Value::Object(map) => map,
            other => {
                let mut map = ConfigMap::new();
                map.insert("value".into(), other.clone());
                return CommandPayload::Generic(map);
            }
        };

        let typed = match command {
            CommandKind::Start => typed(data, CommandPayload::Start),
            CommandKind::Stop => typed(data, CommandPayload::Stop),
            CommandKind::Check => typed(data, CommandPayload::Check),
            CommandKind::Backup => typed(data, CommandPayload::Backup),
            CommandKind::Restore => typed(data, CommandPayload::Restore),
            CommandKind::Exec => typed(data, CommandPayload::Exec),
            CommandKind::Test => typed(data, CommandPayload::Test),
            CommandKind::Logs => typed(data, CommandPayload::Logs),
            CommandKind::Update | CommandKind::Provision | CommandKind::Publish => None,
        };

        typed.unwrap_or_else(|| CommandPayload::Generic(object.clone()))
    }
}

fn typed<T, F>(data: &Value, wrap: F) -> Option<CommandPayload>
where
    T: serde::de::DeserializeOwned,
    F: FnOnce(T) -> CommandPayload,
{
    serde_json::from_value(data.clone()).ok().map(wrap)
}

/// Outcome of one command applied to one service
///
/// Invariant: `success == false` implies a non-empty `error`. All
/// constructors uphold it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Service name
    pub entity: String,

    /// Platform the command ran on
    pub platform: PlatformKind,

    /// Kind the platform classified the service as, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_kind: Option<ServiceKind>,

    pub success: bool,

    /// Command-specific fields
    pub payload: CommandPayload,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    /// Wall time spent on this service
    #[serde(default)]
    pub duration_ms: u64,
}

impl CommandResult {
    /// Build a result from a handler's output and an already-built payload
    pub fn from_output(
        command: CommandKind,
        entity: impl Into<String>,
        platform: PlatformKind,
        service_kind: ServiceKind,
        output: HandlerOutput,
        payload: CommandPayload,
    ) -> Self {
        let (error, error_kind) = if output.success {
            (None, None)
        } else {
            let message = output
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| format!("{} failed on {}", command, platform));
            (Some(message), Some(ErrorKind::CommandFailed))
        };

        Self {
            entity: entity.into(),
            platform,
            service_kind: Some(service_kind),
            success: output.success,
            payload,
            error,
            error_kind,
            warnings: output.warnings,
            metadata: output.metadata,
            duration_ms: 0,
        }
    }

    /// A failure that never reached a handler or platform
    pub fn failure(
        entity: impl Into<String>,
        platform: PlatformKind,
        service_kind: Option<ServiceKind>,
        kind: ErrorKind,
        error: impl Into<String>,
    ) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = kind.as_str().to_string();
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("error_kind".to_string(), kind.as_str().to_string());

        Self {
            entity: entity.into(),
            platform,
            service_kind,
            success: false,
            payload: CommandPayload::None,
            error: Some(error),
            error_kind: Some(kind),
            warnings: Vec::new(),
            metadata,
            duration_ms: 0,
        }
    }

    /// No handler was registered for the (command, platform, kind) triple
    pub fn handler_not_found(
        command: CommandKind,
        entity: impl Into<String>,
        platform: PlatformKind,
        service_kind: ServiceKind,
    ) -> Self {
        Self::failure(
            entity,
            platform,
            Some(service_kind),
            ErrorKind::HandlerNotFound,
            format!(
                "No {} handler for {} on {}",
                command, service_kind, platform
            ),
        )
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_output_without_message_gets_one() {
        let result = CommandResult::from_output(
            CommandKind::Stop,
            "backend",
            PlatformKind::Process,
            ServiceKind::Generic,
            HandlerOutput {
                success: false,
                error: Some("   ".into()),
                ..Default::default()
            },
            CommandPayload::None,
        );

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("stop failed on process"));
        assert_eq!(result.error_kind, Some(ErrorKind::CommandFailed));
    }

    #[test]
    fn test_successful_output_has_no_error() {
        let output = HandlerOutput::ok(json!({"stopped": true})).with_warning("slow shutdown");
        let payload = CommandPayload::from_data(CommandKind::Stop, &output.data);
        let result = CommandResult::from_output(
            CommandKind::Stop,
            "backend",
            PlatformKind::Process,
            ServiceKind::Generic,
            output,
            payload,
        );

        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.warnings, vec!["slow shutdown".to_string()]);
        assert!(matches!(result.payload, CommandPayload::Stop(StopPayload { stopped: true, .. })));
    }

    #[test]
    fn test_handler_not_found_message_names_triple() {
        let result = CommandResult::handler_not_found(
            CommandKind::Backup,
            "frontend",
            PlatformKind::External,
            ServiceKind::ExternalApi,
        );

        let error = result.error.unwrap();
        assert!(error.contains("backup"));
        assert!(error.contains("external-api"));
        assert!(error.contains("external"));
        assert_eq!(result.metadata["error_kind"], "handler_not_found");
    }

    #[test]
    fn test_payload_from_data_typed_and_generic() {
        let backup = CommandPayload::from_data(
            CommandKind::Backup,
            &json!({"backup_id": "snap-1", "size_bytes": 42}),
        );
        match backup {
            CommandPayload::Backup(p) => {
                assert_eq!(p.backup_id, "snap-1");
                assert_eq!(p.size_bytes, Some(42));
            }
            other => panic!("unexpected payload {:?}", other),
        }

        // Missing required backup_id falls back to Generic
        let generic = CommandPayload::from_data(CommandKind::Backup, &json!({"note": "queued"}));
        assert!(matches!(generic, CommandPayload::Generic(_)));

        assert_eq!(
            CommandPayload::from_data(CommandKind::Update, &Value::Null),
            CommandPayload::None
        );
    }

    #[test]
    fn test_result_nests_payload() {
        let result = CommandResult::from_output(
            CommandKind::Exec,
            "backend",
            PlatformKind::Container,
            ServiceKind::Generic,
            HandlerOutput::ok(json!({})),
            CommandPayload::Exec(ExecPayload {
                exit_code: Some(0),
                stdout: "ok".into(),
                stderr: String::new(),
            }),
        );

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["entity"], "backend");
        assert_eq!(value["payload"]["result_type"], "exec");
        assert_eq!(value["payload"]["data"]["exit_code"], 0);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_generic_keys_cannot_shadow_result_fields() {
        let data = json!({
            "entity": "impostor",
            "success": false,
            "error": "not really",
            "result_type": "stop",
        });
        let result = CommandResult::from_output(
            CommandKind::Update,
            "backend",
            PlatformKind::Cloud,
            ServiceKind::EcsService,
            HandlerOutput::ok(data.clone()),
            CommandPayload::from_data(CommandKind::Update, &data),
        );

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["entity"], "backend");
        assert_eq!(value["success"], true);
        assert!(value.get("error").is_none());
        assert_eq!(value["payload"]["result_type"], "generic");
        assert_eq!(value["payload"]["data"]["entity"], "impostor");

        let back: CommandResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }
}
