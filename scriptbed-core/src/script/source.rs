//! Where hook script bodies come from.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::RwLock;
use tokio::fs;

/// Fetches a script body by location.
///
/// Fetching is asynchronous so a source may sit behind disk or network I/O;
/// the turn engine awaits each fetch before running the script.
#[async_trait]
pub trait ScriptSource: Send + Sync {
    async fn fetch(&self, location: &str) -> io::Result<String>;
}

/// Scripts stored as files under a root directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ScriptSource for FileSource {
    async fn fetch(&self, location: &str) -> io::Result<String> {
        fs::read_to_string(self.root.join(location)).await
    }
}

/// Scripts held in memory; locations can be replaced at any time.
#[derive(Debug, Default)]
pub struct MemorySource {
    scripts: RwLock<HashMap<String, String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a script, builder style.
    pub fn with(self, location: impl Into<String>, body: impl Into<String>) -> Self {
        self.insert(location, body);
        self
    }

    pub fn insert(&self, location: impl Into<String>, body: impl Into<String>) {
        self.scripts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(location.into(), body.into());
    }

    pub fn remove(&self, location: &str) -> Option<String> {
        self.scripts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(location)
    }
}

#[async_trait]
impl ScriptSource for MemorySource {
    async fn fetch(&self, location: &str) -> io::Result<String> {
        self.scripts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(location)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no script at '{location}'")))
    }
}
