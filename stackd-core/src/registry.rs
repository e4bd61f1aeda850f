//! The runtime registry: which filesystem root belongs to which project.
//!
//! Provisioning only needs two questions answered: "does a runtime record
//! exist for this project id" and "what root directory is assigned". The
//! registry is a small JSON document keyed by project id.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeRegistry {
    #[serde(default)]
    pub runtimes: HashMap<u32, RuntimeRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RuntimeRecord {
    pub project_ref: String,
    pub root: PathBuf,
    #[serde(default = "SystemTime::now")]
    pub registered_at: SystemTime,
}

impl RuntimeRegistry {
    /// Load the registry from its default location.
    pub async fn load() -> Result<Self, RegistryError> {
        Self::load_from_path(Self::path()).await
    }

    /// Load the registry from a specific path.
    ///
    /// A missing or empty file yields an empty registry.
    pub async fn load_from_path(path: PathBuf) -> Result<Self, RegistryError> {
        if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            if content.trim().is_empty() {
                return Ok(Self::default());
            }
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the registry to its default location.
    pub async fn save(&self) -> Result<(), RegistryError> {
        self.save_to_path(Self::path()).await
    }

    /// Save the registry to a specific path.
    pub async fn save_to_path(&self, path: PathBuf) -> Result<(), RegistryError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// The default registry file location.
    #[must_use]
    pub fn path() -> PathBuf {
        directories::ProjectDirs::from("dev", "stackd", "stackd").map_or_else(
            || PathBuf::from("stackd-runtimes.json"),
            |dirs| dirs.data_local_dir().join("runtimes.json"),
        )
    }

    /// Record (or refresh) the runtime assignment for a project.
    pub fn register(&mut self, project_id: u32, project_ref: &str, root: &Path) {
        self.runtimes.insert(
            project_id,
            RuntimeRecord {
                project_ref: project_ref.to_string(),
                root: root.to_path_buf(),
                registered_at: SystemTime::now(),
            },
        );
    }

    /// The runtime record for a project, if one exists.
    #[must_use]
    pub fn record(&self, project_id: u32) -> Option<&RuntimeRecord> {
        self.runtimes.get(&project_id)
    }

    /// Whether a runtime record exists for a project.
    #[must_use]
    pub fn contains(&self, project_id: u32) -> bool {
        self.runtimes.contains_key(&project_id)
    }

    /// The root directory assigned to a project, if one exists.
    #[must_use]
    pub fn root_for(&self, project_id: u32) -> Option<&Path> {
        self.runtimes.get(&project_id).map(|record| record.root.as_path())
    }

    /// Forget a project's runtime record. Returns the removed record.
    pub fn remove(&mut self, project_id: u32) -> Option<RuntimeRecord> {
        self.runtimes.remove(&project_id)
    }

    /// Drop records whose root directory no longer exists on disk.
    ///
    /// Returns the number of removed records.
    pub fn prune_missing_roots(&mut self) -> usize {
        let before = self.runtimes.len();
        self.runtimes.retain(|_, record| record.root.exists());
        before - self.runtimes.len()
    }
}

/// Errors raised while loading or saving the registry.
#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("failed to read or write the runtime registry: {0}")]
    Io(#[from] std::io::Error),
    #[error("the runtime registry is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn registry_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("runtimes.json");

        let root = dir.path().join("proj-7");
        std::fs::create_dir(&root).unwrap();

        let mut registry = RuntimeRegistry::default();
        registry.register(7, "proj-seven", &root);
        registry.save_to_path(file_path.clone()).await.unwrap();

        let loaded = RuntimeRegistry::load_from_path(file_path).await.unwrap();
        assert!(loaded.contains(7));
        assert_eq!(loaded.root_for(7), Some(root.as_path()));
        assert_eq!(
            loaded.record(7).map(|r| r.project_ref.as_str()),
            Some("proj-seven")
        );
        assert!(!loaded.contains(8));
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempdir().unwrap();
        let registry = RuntimeRegistry::load_from_path(dir.path().join("nope.json"))
            .await
            .unwrap();
        assert!(registry.runtimes.is_empty());
    }

    #[test]
    fn prune_drops_records_with_missing_roots() {
        let dir = tempdir().unwrap();
        let existing = dir.path().join("exists");
        std::fs::create_dir(&existing).unwrap();

        let mut registry = RuntimeRegistry::default();
        registry.register(1, "one", &existing);
        registry.register(2, "two", &dir.path().join("missing"));

        assert_eq!(registry.prune_missing_roots(), 1);
        assert!(registry.contains(1));
        assert!(!registry.contains(2));
    }

    #[test]
    fn remove_returns_the_old_record() {
        let mut registry = RuntimeRegistry::default();
        registry.register(3, "three", Path::new("/tmp/three"));

        let removed = registry.remove(3).unwrap();
        assert_eq!(removed.project_ref, "three");
        assert!(registry.remove(3).is_none());
    }
}
