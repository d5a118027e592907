//! "Cached provider" marker.
//!
//! Records which wallet provider was last connected so the next start can
//! reconnect without prompting. Kept either in a small JSON file or in memory.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Serialize, Deserialize)]
struct Marker {
    provider: String,
}

#[derive(Debug)]
pub struct ProviderCache {
    path: Option<PathBuf>,
    memory: Mutex<Option<String>>,
}

impl ProviderCache {
    /// File-backed marker at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            memory: Mutex::new(None),
        }
    }

    /// Marker that lives only as long as this value.
    pub fn memory() -> Self {
        Self {
            path: None,
            memory: Mutex::new(None),
        }
    }

    /// The cached provider id, if any. Unreadable files count as absent.
    pub async fn load(&self) -> Option<String> {
        let Some(path) = &self.path else {
            return self
                .memory
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
        };

        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read provider cache");
                return None;
            }
        };
        match serde_json::from_str::<Marker>(&raw) {
            Ok(marker) => Some(marker.provider),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed provider cache");
                None
            }
        }
    }

    pub async fn store(&self, provider: &str) -> Result<()> {
        let Some(path) = &self.path else {
            *self.memory.lock().unwrap_or_else(PoisonError::into_inner) = Some(provider.into());
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string(&Marker {
            provider: provider.to_string(),
        })?;
        tokio::fs::write(path, body).await?;
        debug!(path = %path.display(), provider, "provider cache stored");
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        let Some(path) = &self.path else {
            *self.memory.lock().unwrap_or_else(PoisonError::into_inner) = None;
            return Ok(());
        };

        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for ProviderCache {
    fn default() -> Self {
        Self::memory()
    }
}
