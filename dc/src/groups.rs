//! Named device groups
//!
//! Groups are stored as a JSON array of `{ "group": "@name", "devices": [...] }`
//! entries sorted by name. Group names start with `@` followed by at least one
//! non-whitespace character.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

const GROUP_NAME_PATTERN: &str = r"^@\S+$";

/// Errors from group registry operations
#[derive(Debug, Error)]
pub enum GroupError {
    #[error("Invalid group name '{0}': must be '@' followed by non-whitespace characters")]
    InvalidName(String),

    #[error("Group not found: {0}")]
    NotFound(String),

    #[error("Failed to access group file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse group file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

/// One group as listed or stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub group: String,
    pub devices: Vec<String>,
}

/// In-memory group registry with file persistence
#[derive(Debug, Clone)]
pub struct GroupRegistry {
    groups: BTreeMap<String, Vec<String>>,
    name_pattern: Regex,
}

impl GroupRegistry {
    pub fn new() -> Result<Self, GroupError> {
        Ok(Self {
            groups: BTreeMap::new(),
            name_pattern: Regex::new(GROUP_NAME_PATTERN)?,
        })
    }

    /// Load groups from `path`; a missing file yields an empty registry
    pub fn load_from_file(path: &Path) -> Result<Self, GroupError> {
        debug!(path = %path.display(), "GroupRegistry::load_from_file: called");
        let mut registry = Self::new()?;
        if !path.exists() {
            debug!(path = %path.display(), "Group file missing, starting empty");
            return Ok(registry);
        }

        let content = std::fs::read_to_string(path).map_err(|source| GroupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: Vec<GroupEntry> = serde_json::from_str(&content).map_err(|source| GroupError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        for entry in entries {
            registry.groups.insert(entry.group, entry.devices);
        }
        info!(path = %path.display(), groups = registry.groups.len(), "Loaded device groups");
        Ok(registry)
    }

    /// Write all groups to `path`, creating parent directories as needed
    pub fn save_to_file(&self, path: &Path) -> Result<(), GroupError> {
        debug!(path = %path.display(), "GroupRegistry::save_to_file: called");
        let io_err = |source| GroupError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(&self.group_list(None)?).map_err(|source| GroupError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json + "\n").map_err(io_err)?;
        Ok(())
    }

    pub fn validate_group_name(&self, name: &str) -> Result<(), GroupError> {
        if self.name_pattern.is_match(name) {
            Ok(())
        } else {
            Err(GroupError::InvalidName(name.to_string()))
        }
    }

    /// Add devices to a group, creating it if needed. Existing members are not duplicated.
    pub fn group_add(&mut self, name: &str, devices: &[String]) -> Result<(), GroupError> {
        debug!(%name, count = devices.len(), "GroupRegistry::group_add: called");
        self.validate_group_name(name)?;

        let members = self.groups.entry(name.to_string()).or_default();
        for device in devices {
            if !members.contains(device) {
                members.push(device.clone());
            }
        }
        Ok(())
    }

    /// Remove devices from a group; the group is deleted once it is empty
    pub fn group_remove(&mut self, name: &str, devices: &[String]) -> Result<(), GroupError> {
        debug!(%name, count = devices.len(), "GroupRegistry::group_remove: called");
        self.validate_group_name(name)?;

        let members = self
            .groups
            .get_mut(name)
            .ok_or_else(|| GroupError::NotFound(name.to_string()))?;
        if devices.is_empty() {
            return Ok(());
        }

        members.retain(|member| !devices.contains(member));
        if members.is_empty() {
            self.groups.remove(name);
        }
        Ok(())
    }

    pub fn group_delete(&mut self, name: &str) -> Result<(), GroupError> {
        debug!(%name, "GroupRegistry::group_delete: called");
        self.validate_group_name(name)?;

        self.groups
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| GroupError::NotFound(name.to_string()))
    }

    /// All groups sorted by name, or just `name` (empty when it does not exist)
    pub fn group_list(&self, name: Option<&str>) -> Result<Vec<GroupEntry>, GroupError> {
        if let Some(name) = name {
            self.validate_group_name(name)?;
            return Ok(self
                .groups
                .get(name)
                .map(|devices| GroupEntry {
                    group: name.to_string(),
                    devices: devices.clone(),
                })
                .into_iter()
                .collect());
        }

        Ok(self
            .groups
            .iter()
            .map(|(group, devices)| GroupEntry {
                group: group.clone(),
                devices: devices.clone(),
            })
            .collect())
    }

    pub fn devices_for_group(&self, name: &str) -> Option<&[String]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
