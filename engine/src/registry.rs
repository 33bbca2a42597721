//! Persisted state layout (§6): the `static-workspaces.json` registry of
//! known workspaces, plus per-workspace definition files. I/O goes through
//! the injected [`Platform`] rather than `std::fs` directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CResult, Error};
use crate::platform::Platform;

const REGISTRY_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRegistryEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, rename = "syncUrl", skip_serializing_if = "Option::is_none")]
    pub sync_url: Option<String>,
    #[serde(rename = "addedAt")]
    pub added_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    pub version: u8,
    pub workspaces: Vec<WorkspaceRegistryEntry>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry { version: REGISTRY_VERSION, workspaces: Vec::new() }
    }
}

pub struct RegistryStore {
    app_data_dir: PathBuf,
    platform: Arc<dyn Platform>,
}

impl RegistryStore {
    pub fn new(app_data_dir: impl Into<PathBuf>, platform: Arc<dyn Platform>) -> Self {
        RegistryStore { app_data_dir: app_data_dir.into(), platform }
    }

    fn registry_path(&self) -> PathBuf {
        self.app_data_dir.join("static-workspaces.json")
    }

    fn definition_path(&self, workspace_id: &str) -> PathBuf {
        self.app_data_dir.join("workspaces").join(format!("{workspace_id}.json"))
    }

    pub fn load(&self) -> CResult<Registry> {
        match self.platform.read_file(&self.registry_path())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Registry::default()),
        }
    }

    fn save(&self, registry: &Registry) -> CResult<()> {
        let bytes = serde_json::to_vec_pretty(registry)?;
        self.platform.write_file(&self.registry_path(), &bytes)
    }

    /// Appends a workspace to the registry. Rejects a duplicate `id`.
    pub fn add_workspace(&self, entry: WorkspaceRegistryEntry) -> CResult<()> {
        let mut registry = self.load()?;
        if registry.workspaces.iter().any(|w| w.id == entry.id) {
            return Err(Error::AlreadyExists(entry.id));
        }
        registry.workspaces.push(entry);
        self.save(&registry)
    }

    pub fn remove_workspace(&self, workspace_id: &str) -> CResult<()> {
        let mut registry = self.load()?;
        registry.workspaces.retain(|w| w.id != workspace_id);
        self.save(&registry)
    }

    pub fn save_definition(&self, workspace_id: &str, definition: &crate::client::WorkspaceDefinition) -> CResult<()> {
        let bytes = serde_json::to_vec_pretty(definition)?;
        self.platform.write_file(&self.definition_path(workspace_id), &bytes)
    }

    pub fn load_definition(&self, workspace_id: &str) -> CResult<Option<crate::client::WorkspaceDefinition>> {
        match self.platform.read_file(&self.definition_path(workspace_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

pub fn default_app_data_dir() -> PathBuf {
    Path::new(".").join(".workspace-engine")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::FakePlatform;

    #[test]
    fn add_workspace_then_reload() {
        let store = RegistryStore::new("/data", Arc::new(FakePlatform::new()));
        store
            .add_workspace(WorkspaceRegistryEntry {
                id: "w1".into(),
                name: Some("Notes".into()),
                icon: None,
                sync_url: None,
                added_at: "2026-01-01T00:00:00Z".into(),
            })
            .unwrap();
        assert_eq!(store.load().unwrap().workspaces.len(), 1);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let store = RegistryStore::new("/data", Arc::new(FakePlatform::new()));
        let entry = WorkspaceRegistryEntry { id: "w1".into(), name: None, icon: None, sync_url: None, added_at: "t".into() };
        store.add_workspace(entry.clone()).unwrap();
        assert!(store.add_workspace(entry).is_err());
    }
}
