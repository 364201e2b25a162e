//! Persisted engine settings
//!
//! Stored with `confy` under the `tableau` application name. Definition
//! files live elsewhere (see [`crate::config`]); these are the knobs that
//! apply to every session.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tableau_types::{DelimiterPair, VisualTarget};

use crate::config::ConfigError;
use crate::history::TriggerHistory;
use crate::visual::DefaultCollectionConfig;

const APP_NAME: &str = "tableau";
const CONFIG_NAME: &str = "settings";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Custom definitions directory (None = platform config dir)
    #[serde(default)]
    pub definitions_dir: Option<PathBuf>,

    #[serde(default)]
    pub delimiters: DelimiterPair,

    #[serde(default = "DefaultCollectionConfig::idle_sprite")]
    pub sprite_defaults: DefaultCollectionConfig,

    #[serde(default)]
    pub background_defaults: DefaultCollectionConfig,
}

fn default_history_capacity() -> usize {
    TriggerHistory::DEFAULT_CAPACITY
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            definitions_dir: None,
            delimiters: DelimiterPair::default(),
            sprite_defaults: DefaultCollectionConfig::idle_sprite(),
            background_defaults: DefaultCollectionConfig::default(),
        }
    }
}

impl EngineSettings {
    /// Load from the platform config location, creating defaults if absent
    pub fn load() -> Result<Self, ConfigError> {
        Ok(confy::load(APP_NAME, Some(CONFIG_NAME))?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        Ok(confy::store(APP_NAME, Some(CONFIG_NAME), self)?)
    }

    pub fn load_path(path: &Path) -> Result<Self, ConfigError> {
        Ok(confy::load_path(path)?)
    }

    pub fn save_path(&self, path: &Path) -> Result<(), ConfigError> {
        Ok(confy::store_path(path, self)?)
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(confy::get_configuration_file_path(APP_NAME, Some(CONFIG_NAME))?)
    }

    pub fn defaults_for(&self, target: VisualTarget) -> &DefaultCollectionConfig {
        match target {
            VisualTarget::Sprite => &self.sprite_defaults,
            VisualTarget::Background => &self.background_defaults,
        }
    }

    /// Custom definitions directory, falling back to the platform default
    pub fn custom_definitions_dir(&self) -> Option<PathBuf> {
        self.definitions_dir
            .clone()
            .or_else(crate::config::default_custom_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::DefaultMode;

    #[test]
    fn defaults_show_idle_sprite() {
        let settings = EngineSettings::default();
        assert_eq!(settings.delimiters, DelimiterPair::PIPE);
        assert_eq!(
            settings.defaults_for(VisualTarget::Sprite).principal,
            Some(tableau_types::AssetRef::idle())
        );
        assert!(settings.defaults_for(VisualTarget::Background).entries.is_empty());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let settings: EngineSettings = toml::from_str(
            r#"
history_capacity = 5

[delimiters]
open = "["
close = "]"

[background_defaults]
mode = "list"
entries = ["room.png", "garden.png"]
"#,
        )
        .unwrap();

        assert_eq!(settings.history_capacity, 5);
        assert_eq!(settings.delimiters, DelimiterPair::new('[', ']').unwrap());
        assert_eq!(settings.background_defaults.mode, DefaultMode::List);
        assert_eq!(settings.sprite_defaults, DefaultCollectionConfig::idle_sprite());
    }

    #[test]
    fn save_and_load_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let settings = EngineSettings {
            history_capacity: 7,
            definitions_dir: Some(dir.path().join("defs")),
            ..Default::default()
        };

        settings.save_path(&path).unwrap();
        assert_eq!(EngineSettings::load_path(&path).unwrap(), settings);
    }

    #[test]
    fn explicit_definitions_dir_wins() {
        let settings = EngineSettings {
            definitions_dir: Some(PathBuf::from("/srv/tableau/defs")),
            ..Default::default()
        };
        assert_eq!(
            settings.custom_definitions_dir(),
            Some(PathBuf::from("/srv/tableau/defs"))
        );
        assert_eq!(
            EngineSettings::default().custom_definitions_dir(),
            crate::config::default_custom_dir()
        );
    }
}
