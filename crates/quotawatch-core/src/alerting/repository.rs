//! State storage for per-provider quota bookkeeping

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::Result;
use crate::models::{QuotaState, UsageProvider};

/// Loads and persists [`QuotaState`] per provider
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the last committed state, or the default state if none exists
    async fn load(&self, provider: UsageProvider) -> Result<QuotaState>;

    /// Commit state for a provider
    async fn persist(&self, provider: UsageProvider, state: &QuotaState) -> Result<()>;
}

/// In-process state store
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    states: Arc<RwLock<BTreeMap<UsageProvider, QuotaState>>>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, provider: UsageProvider) -> Result<QuotaState> {
        Ok(self
            .states
            .read()
            .await
            .get(&provider)
            .cloned()
            .unwrap_or_default())
    }

    async fn persist(&self, provider: UsageProvider, state: &QuotaState) -> Result<()> {
        self.states.write().await.insert(provider, state.clone());
        Ok(())
    }
}

/// JSON file holding the state of every provider, keyed by provider id
///
/// Writes go to a sibling temp file that is then renamed over the target.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStateStore {
    /// Create a store backed by `path`; the file is created on first persist
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<UsageProvider, QuotaState>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, provider: UsageProvider) -> Result<QuotaState> {
        let mut states = self.read_all().await?;
        Ok(states.remove(&provider).unwrap_or_default())
    }

    async fn persist(&self, provider: UsageProvider, state: &QuotaState) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut states = self.read_all().await?;
        states.insert(provider, state.clone());

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&states)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(
            provider = %provider,
            path = %self.path.display(),
            notified = ?state.notified_thresholds,
            "Persisted quota state"
        );
        Ok(())
    }
}
