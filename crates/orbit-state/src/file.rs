//! File-backed state store.
//!
//! Layout: `<state_dir>/<environment>/<service>.json`. Writes go to a
//! sibling `.tmp` file and are renamed into place, so readers never see a
//! partially written document. There is no cross-process lock; concurrent
//! writers to the same key are last-writer-wins.

use async_trait::async_trait;
use orbit_types::ResourceState;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::error::{validate_key, Result, StateError};
use crate::store::ResourceStateStore;

const STATE_EXTENSION: &str = "json";

/// JSON-file state store rooted at a state directory.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root state directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the state file for (environment, service).
    pub fn state_path(&self, environment: &str, service: &str) -> PathBuf {
        self.root
            .join(environment)
            .join(format!("{}.{}", service, STATE_EXTENSION))
    }

    async fn read_state(path: &Path) -> Option<ResourceState> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable state file, treating as absent");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt state file, treating as absent");
                None
            }
        }
    }
}

#[async_trait]
impl ResourceStateStore for FileStateStore {
    #[instrument(skip(self, state), fields(environment = %state.environment, service = %state.entity))]
    async fn save(&self, state: &ResourceState) -> Result<()> {
        validate_key(&state.environment)?;
        validate_key(&state.entity)?;

        let path = self.state_path(&state.environment, &state.entity);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StateError::io(dir, e))?;
        }

        let json = serde_json::to_vec_pretty(state)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .await
            .map_err(|e| StateError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| StateError::io(&path, e))?;

        debug!(path = %path.display(), "saved state");
        Ok(())
    }

    async fn load(&self, environment: &str, service: &str) -> Option<ResourceState> {
        if validate_key(environment).is_err() || validate_key(service).is_err() {
            return None;
        }
        Self::read_state(&self.state_path(environment, service)).await
    }

    #[instrument(skip(self))]
    async fn clear(&self, environment: &str, service: &str) -> Result<()> {
        validate_key(environment)?;
        validate_key(service)?;

        let path = self.state_path(environment, service);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "cleared state");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateError::io(&path, e)),
        }
    }

    async fn list(&self, environment: &str) -> Result<Vec<ResourceState>> {
        if validate_key(environment).is_err() {
            return Ok(Vec::new());
        }

        let dir = self.root.join(environment);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StateError::io(&dir, e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StateError::io(&dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(STATE_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut states = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(state) = Self::read_state(&path).await {
                states.push(state);
            }
        }
        Ok(states)
    }

    #[instrument(skip(self))]
    async fn clear_environment(&self, environment: &str) -> Result<()> {
        validate_key(environment)?;

        let dir = self.root.join(environment);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateError::io(&dir, e)),
        }
    }

    async fn list_environments(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StateError::io(&self.root, e)),
        };

        let mut environments = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StateError::io(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                if let Some(name) = entry.file_name().to_str() {
                    environments.push(name.to_string());
                }
            }
        }
        environments.sort();
        Ok(environments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::PidLivenessProbe;
    use chrono::{TimeZone, Utc};
    use orbit_types::{PlatformKind, PlatformResources};

    fn posix_state(service: &str, env: &str, pid: u32) -> ResourceState {
        ResourceState::new(service, PlatformKind::Process, env)
            .with_resources(PlatformResources::Posix { pid, port: None })
    }

    fn dead_pid() -> u32 {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        pid
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        let mut state = posix_state("backend", "local", 4242)
            .with_endpoint("http://localhost:4000")
            .with_metadata("command", "node server.js");
        state.start_time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        store.save(&state).await.unwrap();
        assert!(dir.path().join("local/backend.json").exists());
        assert!(!dir.path().join("local/backend.json.tmp").exists());

        let loaded = store.load("local", "backend").await.unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_save_replaces_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        store
            .save(&posix_state("backend", "local", 1).with_metadata("old", "yes"))
            .await
            .unwrap();
        store.save(&posix_state("backend", "local", 2)).await.unwrap();

        let loaded = store.load("local", "backend").await.unwrap();
        assert_eq!(loaded.resources.and_then(|r| r.pid()), Some(2));
        assert!(loaded.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_absent_and_corrupt_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        assert!(store.load("local", "never-saved").await.is_none());
        assert!(store.load("..", "x").await.is_none());

        std::fs::create_dir_all(dir.path().join("local")).unwrap();
        std::fs::write(dir.path().join("local/broken.json"), b"{not json").unwrap();
        assert!(store.load("local", "broken").await.is_none());

        store.save(&posix_state("ok", "local", 1)).await.unwrap();
        let listed = store.list("local").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].entity, "ok");
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        store.clear("local", "never-saved").await.unwrap();
        store.save(&posix_state("db", "local", 1)).await.unwrap();
        store.clear("local", "db").await.unwrap();
        store.clear("local", "db").await.unwrap();
        assert!(store.load("local", "db").await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        let err = store
            .save(&posix_state("../escape", "local", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::InvalidKey { .. }));
        assert!(store.clear("", "db").await.is_err());
    }

    #[tokio::test]
    async fn test_clear_environment_and_list_environments() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        store.save(&posix_state("a", "local", 1)).await.unwrap();
        store.save(&posix_state("b", "staging", 1)).await.unwrap();
        assert_eq!(
            store.list_environments().await.unwrap(),
            vec!["local".to_string(), "staging".to_string()]
        );

        store.clear_environment("local").await.unwrap();
        store.clear_environment("local").await.unwrap();
        assert!(store.list("local").await.unwrap().is_empty());
        assert_eq!(store.list("staging").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_dead_pids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        store
            .save(&posix_state("alive", "local", std::process::id()))
            .await
            .unwrap();
        store.save(&posix_state("dead", "local", dead_pid())).await.unwrap();
        store
            .save(
                &ResourceState::new("external", PlatformKind::External, "local").with_resources(
                    PlatformResources::External {
                        endpoint: "https://api.example.com".into(),
                    },
                ),
            )
            .await
            .unwrap();

        let removed = store.cleanup("local", &PidLivenessProbe).await.unwrap();
        assert_eq!(removed, vec!["dead".to_string()]);

        let remaining: Vec<String> = store
            .list("local")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.entity)
            .collect();
        assert_eq!(remaining, vec!["alive".to_string(), "external".to_string()]);
    }
}
