//! Deployment state
//!
//! Manages `.siteflow/state.json`, which records the last outcome of every
//! stage and the outputs of the stacks it deployed, and `.siteflow/lock.json`,
//! which keeps two runs from interleaving.

use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::task::JoinHandle;
use uuid::Uuid;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".siteflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";
const STALE_LOCK_HOURS: i64 = 1;
const LOCK_HEARTBEAT: Duration = Duration::from_secs(5 * 60);

/// Persisted state of the whole site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteState {
    pub version: u32,

    pub updated_at: DateTime<Utc>,

    /// Stage records keyed by stage name
    pub stages: BTreeMap<String, StageRecord>,
}

impl Default for SiteState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            stages: BTreeMap::new(),
        }
    }
}

impl SiteState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stages.get(name)
    }

    /// Record for a stage, created empty on first use
    pub fn stage_mut(&mut self, name: &str) -> &mut StageRecord {
        self.updated_at = Utc::now();
        self.stages.entry(name.to_string()).or_default()
    }
}

/// Last known state of one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub status: StageStatus,

    /// Stacks deployed by this stage, keyed by stack name
    pub stacks: BTreeMap<String, StackState>,

    pub distribution_id: Option<String>,

    pub last_invalidation: Option<String>,

    /// Why the stage stopped, when it did not deploy
    pub message: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl Default for StageRecord {
    fn default() -> Self {
        Self {
            status: StageStatus::Pending,
            stacks: BTreeMap::new(),
            distribution_id: None,
            last_invalidation: None,
            message: None,
            updated_at: Utc::now(),
        }
    }
}

impl StageRecord {
    pub fn set_status(&mut self, status: StageStatus, message: Option<String>) {
        self.status = status;
        self.message = message;
        self.updated_at = Utc::now();
    }

    pub fn record_stack(&mut self, stack: StackState) {
        self.stacks.insert(stack.stack_name.clone(), stack);
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Deployed,
    Rejected,
    Failed,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Pending => write!(f, "pending"),
            StageStatus::InProgress => write!(f, "in progress"),
            StageStatus::Deployed => write!(f, "deployed"),
            StageStatus::Rejected => write!(f, "rejected"),
            StageStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Live stack status as reported by a provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderState {
    pub stacks: BTreeMap<String, StackState>,
}

impl ProviderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, stack: StackState) {
        self.stacks.insert(stack.stack_name.clone(), stack);
    }

    pub fn get(&self, stack_name: &str) -> Option<&StackState> {
        self.stacks.get(stack_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StackState)> {
        self.stacks.iter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackState {
    pub stack_name: String,

    pub region: String,

    pub status: StackStatus,

    pub outputs: BTreeMap<String, String>,

    pub updated_at: DateTime<Utc>,
}

impl StackState {
    pub fn new(
        stack_name: impl Into<String>,
        region: impl Into<String>,
        status: StackStatus,
    ) -> Self {
        Self {
            stack_name: stack_name.into(),
            region: region.into(),
            status,
            outputs: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.outputs.extend(outputs);
        self
    }
}

/// Coarse stack status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    InProgress,
    Complete,
    /// A create or update rolled back; the stack holds its previous template
    RolledBack,
    Failed,
    Deleted,
    NotFound,
    Unknown,
}

impl StackStatus {
    /// Map a CloudFormation status string (`UPDATE_COMPLETE`, ...)
    pub fn from_cloudformation(status: &str) -> Self {
        if status.ends_with("_IN_PROGRESS") {
            StackStatus::InProgress
        } else if status == "DELETE_COMPLETE" {
            StackStatus::Deleted
        } else if status.contains("ROLLBACK") && status.ends_with("_COMPLETE") {
            StackStatus::RolledBack
        } else if status.ends_with("_FAILED") {
            StackStatus::Failed
        } else if status.ends_with("_COMPLETE") {
            StackStatus::Complete
        } else {
            StackStatus::Unknown
        }
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackStatus::InProgress => write!(f, "in progress"),
            StackStatus::Complete => write!(f, "complete"),
            StackStatus::RolledBack => write!(f, "rolled back"),
            StackStatus::Failed => write!(f, "failed"),
            StackStatus::Deleted => write!(f, "deleted"),
            StackStatus::NotFound => write!(f, "not found"),
            StackStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Reads and writes the state directory under a project root
pub struct StateManager {
    project_root: PathBuf,
    heartbeat_interval: Duration,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            heartbeat_interval: LOCK_HEARTBEAT,
        }
    }

    /// How often a held lock is refreshed
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
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
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    pub async fn load(&self) -> Result<SiteState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(SiteState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: SiteState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} stages", state.stages.len());
        Ok(state)
    }

    /// Write the state, keeping the previous file as a backup
    pub async fn save(&self, state: &SiteState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state with {} stages", state.stages.len());
        Ok(())
    }

    /// Acquire the run lock. Locks not refreshed for an hour are treated as
    /// stale. The returned guard refreshes the lock in the background until it
    /// is released.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if let Some(lock_info) = read_lock(&lock_path).await? {
            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < STALE_LOCK_HOURS {
                return Err(CloudError::LockError(format!(
                    "State is locked by {} since {}",
                    lock_info.holder, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            token: Uuid::new_v4().to_string(),
            acquired_at: Utc::now(),
        };
        write_lock(&lock_path, &lock_info).await?;

        let heartbeat = tokio::spawn(heartbeat(
            lock_path.clone(),
            lock_info.token.clone(),
            self.heartbeat_interval,
        ));

        tracing::debug!(token = %lock_info.token, "Acquired state lock");
        Ok(StateLock {
            lock_path,
            token: lock_info.token,
            released: false,
            heartbeat,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    /// Identifies one acquisition; only its holder may refresh or remove it
    #[serde(default)]
    token: String,
    /// Time of acquisition or of the latest refresh
    acquired_at: DateTime<Utc>,
}

async fn read_lock(path: &Path) -> Result<Option<LockInfo>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Replace the lock file in one rename so readers never see a partial write
async fn write_lock(path: &Path, lock_info: &LockInfo) -> Result<()> {
    let content = serde_json::to_string_pretty(lock_info)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, content).await?;
    fs::rename(&staging, path).await?;
    Ok(())
}

/// Push `acquired_at` forward if the lock file still carries `token`
async fn refresh_lock(path: &Path, token: &str) -> Result<()> {
    match read_lock(path).await? {
        Some(mut lock_info) if lock_info.token == token => {
            lock_info.acquired_at = Utc::now();
            write_lock(path, &lock_info).await
        }
        Some(other) => Err(CloudError::LockError(format!(
            "State lock was taken over by {}",
            other.holder
        ))),
        None => Err(CloudError::LockError("State lock file disappeared".to_string())),
    }
}

async fn heartbeat(path: PathBuf, token: String, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        if let Err(e) = refresh_lock(&path, &token).await {
            tracing::warn!(error = %e, "Stopped refreshing state lock");
            return;
        }
        tracing::trace!("Refreshed state lock");
    }
}

/// Whether the lock file at `path` still belongs to `token`
fn owns_lock(path: &Path, token: &str) -> bool {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<LockInfo>(&content).ok())
        .is_some_and(|lock_info| lock_info.token == token)
}

/// RAII guard for the state lock
pub struct StateLock {
    lock_path: PathBuf,
    token: String,
    released: bool,
    heartbeat: JoinHandle<()>,
}

impl StateLock {
    /// Refresh the lock now, failing when another run has taken it over
    pub async fn refresh(&self) -> Result<()> {
        refresh_lock(&self.lock_path, &self.token).await
    }

    pub async fn release(mut self) -> Result<()> {
        self.heartbeat.abort();
        if !self.released {
            if owns_lock(&self.lock_path, &self.token) {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            } else {
                tracing::warn!("State lock is held by another run, leaving it in place");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        self.heartbeat.abort();
        if !self.released && owns_lock(&self.lock_path, &self.token) {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
