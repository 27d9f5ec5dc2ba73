use anyhow::{Context, Result};
use flowdeck_core::Location;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    location: String,
}

/// Remembers the last location across restarts.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable sessions yield `None`.
    pub fn load(&self) -> Option<Location> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<SessionFile>(&content) {
            Ok(file) if !file.location.trim().is_empty() => Some(Location::parse(&file.location)),
            Ok(_) => None,
            Err(err) => {
                warn!("session_decode_failed: {} ({err})", self.path.display());
                None
            }
        }
    }

    pub fn save(&self, location: &Location) -> Result<()> {
        let file = SessionFile {
            location: location.to_string(),
        };
        let payload = serde_json::to_string_pretty(&file).context("Failed to encode session")?;
        write_atomic(&self.path, &payload)
    }
}

fn write_atomic(path: &Path, payload: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory {}", parent.display()))?;
    }

    let temp_path = match path.file_name() {
        Some(name) => path.with_file_name(format!("{}.tmp", name.to_string_lossy())),
        None => path.with_extension("tmp"),
    };

    std::fs::write(&temp_path, payload)
        .with_context(|| format!("Failed to write temp file {}", temp_path.display()))?;
    std::fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
