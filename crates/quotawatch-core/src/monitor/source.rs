//! Usage sources feeding the monitor

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Observation, UsageProvider};

/// Produces the current quota observation for one provider
///
/// An `Err` means "no observation this cycle". It must never be turned into
/// a zero or depleted reading.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Provider this source reports on
    fn provider(&self) -> UsageProvider;

    /// Fetch the current observation
    async fn fetch(&self) -> Result<Observation>;
}

/// Reads an [`Observation`] JSON document written by another process
#[derive(Debug, Clone)]
pub struct SnapshotFileSource {
    provider: UsageProvider,
    path: PathBuf,
}

impl SnapshotFileSource {
    /// Create a source reading `path`
    pub fn new(provider: UsageProvider, path: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            path: path.into(),
        }
    }
}

#[async_trait]
impl UsageSource for SnapshotFileSource {
    fn provider(&self) -> UsageProvider {
        self.provider
    }

    async fn fetch(&self) -> Result<Observation> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::fetch(format!("{}: {e}", self.path.display())))?;
        let observation: Observation = serde_json::from_slice(&bytes)
            .map_err(|e| Error::fetch(format!("{}: {e}", self.path.display())))?;

        debug!(
            provider = %self.provider,
            remaining = ?observation.remaining_percent,
            "Read usage snapshot"
        );
        Ok(observation)
    }
}
