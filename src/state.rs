//! Persisted pointers: which local repo is active and which model is
//! selected. One small JSON file in the config dir; a corrupt file reads as
//! the default state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AgentState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<String>,
}

impl AgentState {
    pub fn default_path() -> PathBuf {
        crate::config::config_base_dir().join("state.json")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .context("state path has no parent directory")?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let serialized = serde_json::to_string_pretty(self)?;
        let tmp_path = dir.join(format!(".state-{}.tmp", std::process::id()));
        fs::write(&tmp_path, serialized)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Set the active repo after checking the directory exists under the
    /// repos base. Returns false (without saving) when it does not.
    pub fn set_active_repo(&mut self, name: &str, repos_base: &Path) -> Result<bool> {
        if !repos_base.join(name).is_dir() {
            return Ok(false);
        }
        self.active_repo = Some(name.to_string());
        self.save()?;
        Ok(true)
    }

    pub fn clear_active_repo(&mut self) -> Result<()> {
        self.active_repo = None;
        self.save()
    }

    pub fn active_repo_path(&self, repos_base: &Path) -> Option<PathBuf> {
        self.active_repo.as_ref().map(|name| repos_base.join(name))
    }
}
