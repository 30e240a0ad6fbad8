//! Tracked container state
//!
//! Persists every [`TrackedContainer`] of a project in
//! `.containerflow/state.json`. The previous file is kept as
//! `state.json.backup`, and `lock.json` serialises concurrent passes.

use crate::error::{CloudError, Result};
use crate::record::TrackedContainer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".containerflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_TEMP: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";

/// A lock older than this is considered abandoned
const STALE_LOCK_HOURS: i64 = 1;

/// Every tracked container of a project, keyed by document key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalState {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub containers: BTreeMap<String, TrackedContainer>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            containers: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&TrackedContainer> {
        self.containers.get(key)
    }

    /// Tracked entry for `key`, inserting an absent one
    pub fn entry(&mut self, key: &str) -> &mut TrackedContainer {
        self.updated_at = Utc::now();
        self.containers.entry(key.to_string()).or_default()
    }

    pub fn set(&mut self, key: impl Into<String>, tracked: TrackedContainer) {
        self.containers.insert(key.into(), tracked);
        self.updated_at = Utc::now();
    }

    pub fn remove(&mut self, key: &str) -> Option<TrackedContainer> {
        let removed = self.containers.remove(key);
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Drop entries that no longer have a remote identity
    pub fn prune_absent(&mut self) {
        self.containers.retain(|_, tracked| !tracked.is_absent());
    }

    /// Key already tracking `container_id`, if any
    pub fn key_for_id(&self, container_id: &str) -> Option<&str> {
        self.containers
            .iter()
            .find(|(_, t)| t.id.as_deref() == Some(container_id))
            .map(|(k, _)| k.as_str())
    }
}

/// Reads and writes the state file of one project
pub struct StateManager {
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !fs::try_exists(&dir).await? {
            fs::create_dir_all(&dir).await?;
            tracing::debug!(dir = %dir.display(), "Created state directory");
        }
        Ok(())
    }

    /// Load the state, or an empty one when no file exists yet
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        if !fs::try_exists(&path).await? {
            tracing::debug!("No state file, starting empty");
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: GlobalState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!(containers = state.containers.len(), "Loaded state");
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let temp = self.state_dir().join(STATE_TEMP);
        fs::write(&temp, serde_json::to_string_pretty(state)?).await?;

        if fs::try_exists(&path).await? {
            fs::copy(&path, self.backup_path()).await?;
        }
        fs::rename(&temp, &path).await?;

        tracing::debug!(containers = state.containers.len(), "Saved state");
        Ok(())
    }

    /// Take the project lock, replacing a stale one
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;
        let lock_path = self.lock_path();

        if fs::try_exists(&lock_path).await? {
            let content = fs::read_to_string(&lock_path).await?;
            match serde_json::from_str::<LockInfo>(&content) {
                Ok(info) if !info.is_stale() => {
                    return Err(CloudError::LockError(format!(
                        "State is locked by {} (pid {}) since {}",
                        info.holder, info.pid, info.acquired_at
                    )));
                }
                Ok(info) => tracing::warn!(holder = %info.holder, "Removing stale lock"),
                Err(e) => tracing::warn!(error = %e, "Removing unreadable lock"),
            }
            fs::remove_file(&lock_path).await?;
        }

        let info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .await
            .map_err(|e| CloudError::LockError(format!("{}: {}", lock_path.display(), e)))?;
        file.write_all(serde_json::to_string_pretty(&info)?.as_bytes())
            .await?;
        file.flush().await?;

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    #[serde(default)]
    pid: u32,
    acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn is_stale(&self) -> bool {
        Utc::now().signed_duration_since(self.acquired_at).num_hours() >= STALE_LOCK_HOURS
    }
}

/// Held project lock; removed on release or drop
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if fs::try_exists(&self.lock_path).await? {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LifecyclePhase;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_state_save_load() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.set("api", TrackedContainer::existing("bba1"));
        manager.save(&state).await.unwrap();

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.containers.len(), 1);
        assert_eq!(loaded.get("api").unwrap().id.as_deref(), Some("bba1"));
        assert_eq!(loaded.get("api").unwrap().phase, LifecyclePhase::Active);
    }

    #[tokio::test]
    async fn test_empty_state() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let state = manager.load().await.unwrap();
        assert!(state.containers.is_empty());
    }

    #[tokio::test]
    async fn test_save_keeps_backup() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.set("api", TrackedContainer::existing("bba1"));
        manager.save(&state).await.unwrap();
        state.set("worker", TrackedContainer::existing("bba2"));
        manager.save(&state).await.unwrap();

        let backup = std::fs::read_to_string(manager.backup_path()).unwrap();
        let previous: GlobalState = serde_json::from_str(&backup).unwrap();
        assert_eq!(previous.containers.len(), 1);
        assert_eq!(manager.load().await.unwrap().containers.len(), 2);
    }

    #[tokio::test]
    async fn test_newer_version_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.version = STATE_VERSION + 1;
        manager.save(&state).await.unwrap();

        assert!(matches!(
            manager.load().await,
            Err(CloudError::StateError(_))
        ));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let lock = manager.acquire_lock().await.unwrap();
        assert!(matches!(
            manager.acquire_lock().await,
            Err(CloudError::LockError(_))
        ));

        lock.release().await.unwrap();
        let again = manager.acquire_lock().await.unwrap();
        drop(again);
        assert!(!manager.lock_path().exists());
    }

    #[tokio::test]
    async fn test_stale_lock_is_replaced() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        manager.ensure_state_dir().await.unwrap();

        let stale = LockInfo {
            holder: "old-host".to_string(),
            pid: 1,
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        std::fs::write(manager.lock_path(), serde_json::to_string(&stale).unwrap()).unwrap();

        assert!(manager.acquire_lock().await.is_ok());
    }

    #[test]
    fn test_prune_and_lookup() {
        let mut state = GlobalState::new();
        state.set("api", TrackedContainer::existing("bba1"));
        state.entry("pending");

        assert_eq!(state.key_for_id("bba1"), Some("api"));
        state.prune_absent();
        assert!(state.get("pending").is_none());
        assert!(state.get("api").is_some());
    }
}
