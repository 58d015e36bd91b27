//! State files written by the CLI
//!
//! One JSON file per managed resource: its type, id and attributes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::schema::ResourceData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub resource_type: String,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: ResourceData,
}

impl StateFile {
    pub fn new(resource_type: impl Into<String>, data: ResourceData) -> Self {
        Self {
            resource_type: resource_type.into(),
            updated_at: Utc::now(),
            data,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse state file {}", path.display()))
    }

    /// Load and check the file holds state for `resource_type`
    pub fn load_for(path: &Path, resource_type: &str) -> Result<Self> {
        let state = Self::load(path)?;
        if state.resource_type != resource_type {
            anyhow::bail!(
                "state file {} holds a {} resource, not {}",
                path.display(),
                state.resource_type,
                resource_type
            );
        }
        Ok(state)
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.updated_at = Utc::now();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create state directory")?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write state file {}", path.display()))
    }

    /// Remove the file once the resource is gone
    pub fn remove(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove state file {}", path.display()))
            }
        }
    }
}
