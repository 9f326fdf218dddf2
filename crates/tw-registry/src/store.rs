// SPDX-License-Identifier: MIT OR Apache-2.0
//! File-system backing store for the registry: `load/save/delete/list`
//! plus a `version_index` for dirty-detection.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tw_model::{Error, Result, ServiceDefinition};

/// Persists service definitions as `{id}.json` files under a root
/// directory, with a companion `version_index.json` mapping
/// `id → spec hash`.
#[derive(Debug)]
pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    /// Creates a store rooted at the given directory. The directory is not
    /// created until the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn service_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn version_index_path(&self) -> PathBuf {
        self.root.join("version_index.json")
    }

    /// Writes a service definition to disk and updates the version index.
    pub fn save(&self, service: &ServiceDefinition) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(service)?;
        std::fs::write(self.service_path(&service.id), json)?;

        let mut index = self.version_index().unwrap_or_default();
        index.insert(service.id.clone(), service.version.clone());
        std::fs::write(self.version_index_path(), serde_json::to_string_pretty(&index)?)?;
        Ok(())
    }

    /// Loads a service definition by id.
    pub fn load(&self, id: &str) -> Result<ServiceDefinition> {
        let path = self.service_path(id);
        let json = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(id.to_string())
            } else {
                Error::from(e)
            }
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Deletes a service definition and its version index entry.
    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.service_path(id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let mut index = self.version_index().unwrap_or_default();
        index.remove(id);
        if !index.is_empty() || self.version_index_path().exists() {
            std::fs::write(self.version_index_path(), serde_json::to_string_pretty(&index)?)?;
        }
        Ok(())
    }

    /// Lists every service id with a persisted definition.
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = match std::fs::read_dir(&self.root) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::from(e)),
        };
        let mut ids = Vec::new();
        for entry in dir {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if stem != "version_index" {
                        ids.push(stem.to_string());
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Reads the `id → spec hash` version index, used for dirty-detection
    /// without loading every full definition.
    pub fn version_index(&self) -> Result<BTreeMap<String, String>> {
        let path = self.version_index_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
