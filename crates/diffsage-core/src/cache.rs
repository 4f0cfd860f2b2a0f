//! Rendered reviews kept for the rest of the login session, keyed by diff URL.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub trait SessionCache: Send {
    fn get(&self, diff_url: &str) -> Option<String>;
    fn set(&mut self, diff_url: &str, html: &str) -> Result<()>;
    fn remove(&mut self, diff_url: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySessionCache {
    entries: HashMap<String, String>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SessionCache for MemorySessionCache {
    fn get(&self, diff_url: &str) -> Option<String> {
        self.entries.get(diff_url).cloned()
    }

    fn set(&mut self, diff_url: &str, html: &str) -> Result<()> {
        self.entries.insert(diff_url.to_string(), html.to_string());
        Ok(())
    }

    fn remove(&mut self, diff_url: &str) -> Result<()> {
        self.entries.remove(diff_url);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// A JSON map on disk. The default location is the per-login runtime
/// directory, which the OS empties when the session ends.
pub struct FileSessionCache {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl FileSessionCache {
    pub fn default_path() -> PathBuf {
        dirs::runtime_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("diffsage")
            .join("session-cache.json")
    }

    pub fn open_default() -> Self {
        Self::open(Self::default_path())
    }

    /// Open the cache at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable session cache {}: {}", path.display(), e);
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(&self.entries)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SessionCache for FileSessionCache {
    fn get(&self, diff_url: &str) -> Option<String> {
        self.entries.get(diff_url).cloned()
    }

    fn set(&mut self, diff_url: &str, html: &str) -> Result<()> {
        self.entries.insert(diff_url.to_string(), html.to_string());
        self.persist()
    }

    fn remove(&mut self, diff_url: &str) -> Result<()> {
        if self.entries.remove(diff_url).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.persist()
    }
}
