//! Configuration loading for trigger and pack definitions
//!
//! Definitions are loaded from TOML files in two locations:
//! - **Builtin**: Shipped with the application (read-only)
//! - **Custom**: User-created definitions (editable)
//!
//! Files are read in file-name order. A definition whose ID was already
//! loaded replaces the earlier one in place, so custom files override
//! builtins without changing declaration order.

use std::fs;
use std::path::{Path, PathBuf};

use tableau_types::{DefinitionConfig, TargetDefinitions, VisualTarget};
use thiserror::Error;

/// Merged definitions for both targets
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    config: DefinitionConfig,
}

impl DefinitionSet {
    /// Create an empty definition set
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a config into the set, returns IDs that replaced earlier definitions
    pub fn add_config(&mut self, config: DefinitionConfig) -> Vec<String> {
        let mut duplicates = Vec::new();
        for target in VisualTarget::ALL {
            merge_target(
                self.config.target_mut(target),
                config.target(target),
                target,
                &mut duplicates,
            );
        }
        duplicates
    }

    pub fn target(&self, target: VisualTarget) -> &TargetDefinitions {
        self.config.target(target)
    }

    pub fn config(&self) -> &DefinitionConfig {
        &self.config
    }

    pub fn into_config(self) -> DefinitionConfig {
        self.config
    }

    pub fn is_empty(&self) -> bool {
        self.config.sprite.is_empty() && self.config.background.is_empty()
    }
}

fn merge_target(
    into: &mut TargetDefinitions,
    from: &TargetDefinitions,
    target: VisualTarget,
    duplicates: &mut Vec<String>,
) {
    for trigger in &from.triggers {
        match into.triggers.iter_mut().find(|t| t.id == trigger.id) {
            Some(existing) => {
                duplicates.push(format!("{target}/trigger/{}", trigger.id));
                *existing = trigger.clone();
            }
            None => into.triggers.push(trigger.clone()),
        }
    }

    for pack in &from.packs {
        match into.packs.iter_mut().find(|p| p.id == pack.id) {
            Some(existing) => {
                duplicates.push(format!("{target}/pack/{}", pack.id));
                *existing = pack.clone();
            }
            None => into.packs.push(pack.clone()),
        }
    }

    for entry in &from.library {
        match into.library.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => {
                duplicates.push(format!("{target}/library/{}", entry.id));
                *existing = entry.clone();
            }
            None => into.library.push(entry.clone()),
        }
    }
}

/// Load definitions from builtin and custom config directories
///
/// # Arguments
/// * `builtin_dir` - Directory containing builtin TOML files (shipped with app)
/// * `custom_dir` - Directory containing user TOML files (optional)
///
/// # Returns
/// A `DefinitionSet` with all loaded definitions merged together.
/// Builtin definitions are loaded first, then custom definitions.
/// Custom definitions with the same ID will override builtins.
pub fn load_definitions(
    builtin_dir: Option<&Path>,
    custom_dir: Option<&Path>,
) -> Result<DefinitionSet, ConfigError> {
    let mut set = DefinitionSet::new();

    if let Some(dir) = builtin_dir
        && dir.exists()
    {
        load_directory(&mut set, dir, "builtin")?;
    }

    if let Some(dir) = custom_dir
        && dir.exists()
    {
        load_directory(&mut set, dir, "custom")?;
    }

    Ok(set)
}

/// Load all TOML files from a directory
fn load_directory(set: &mut DefinitionSet, dir: &Path, source: &str) -> Result<(), ConfigError> {
    let entries = fs::read_dir(dir).map_err(|e| ConfigError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    for path in paths {
        match load_file(&path) {
            Ok(config) => {
                let duplicates = set.add_config(config);
                if !duplicates.is_empty() {
                    tracing::warn!(
                        source,
                        file = ?path.file_name(),
                        ?duplicates,
                        "duplicate definition IDs, later file wins"
                    );
                }
            }
            Err(e) => {
                // keep loading the remaining files
                tracing::warn!(source, file = ?path.file_name(), error = %e, "failed to load definitions");
            }
        }
    }

    Ok(())
}

/// Load a single TOML config file
pub fn load_file(path: &Path) -> Result<DefinitionConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Save a config to a TOML file
pub fn save_file(path: &Path, config: &DefinitionConfig) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(config).map_err(|e| ConfigError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;

    fs::write(path, contents).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

/// Get the default builtin definitions directory
pub fn default_builtin_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("definitions").join("builtin")))
}

/// Get the default custom definitions directory
pub fn default_custom_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tableau").join("definitions"))
}

/// Errors that can occur during config loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("serialize error for {path:?}: {source}")]
    Serialize {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("settings error: {0}")]
    Settings(#[from] confy::ConfyError),
}
