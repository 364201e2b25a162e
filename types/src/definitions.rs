//! Trigger and pack definition types
//!
//! Definitions are authored in the character editor and loaded from TOML.
//! They describe which keywords select which asset, and how the selection
//! returns to the default afterwards.

use serde::{Deserialize, Serialize};

use crate::asset::AssetRef;

// ═══════════════════════════════════════════════════════════════════════════
// Return Behavior
// ═══════════════════════════════════════════════════════════════════════════

/// Where a target goes once its return timer elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnMode {
    /// Ask the idle/default collection for its current selection
    #[default]
    ToDefaultCollection,
    /// Go to the definition's `return_asset`
    ToCustomAsset,
}

// ═══════════════════════════════════════════════════════════════════════════
// Simple Triggers
// ═══════════════════════════════════════════════════════════════════════════

/// A keyword trigger: any keyword in the text selects `target_asset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDefinition {
    /// Unique identifier (e.g., "wave")
    pub id: String,

    /// Display name shown in the editor
    #[serde(default)]
    pub title: String,

    /// Whether this trigger participates in matching
    #[serde(default = "default_true")]
    pub active: bool,

    // ─── Matching ───────────────────────────────────────────────────────────
    /// Keywords with ANY semantics
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Only match keywords inside delimiter-bounded spans
    #[serde(default)]
    pub require_pipes: bool,

    #[serde(default)]
    pub case_sensitive: bool,

    // ─── Arbitration ────────────────────────────────────────────────────────
    /// Minimum milliseconds between two firings of this trigger
    #[serde(default)]
    pub cooldown_ms: u64,

    /// Higher wins when several definitions match at once
    #[serde(default)]
    pub priority: i32,

    // ─── Result ─────────────────────────────────────────────────────────────
    pub target_asset: AssetRef,

    /// Milliseconds before reverting (0 = stay until replaced)
    #[serde(default)]
    pub return_after_ms: u64,

    #[serde(default)]
    pub return_mode: ReturnMode,

    /// Destination for `ReturnMode::ToCustomAsset`
    #[serde(default)]
    pub return_asset: Option<AssetRef>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Packs
// ═══════════════════════════════════════════════════════════════════════════

/// A single selectable entry inside a pack.
///
/// Fires when the pack is activated and every required key is present.
/// Required keys are the composed library keys followed by the free-form keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackItem {
    pub id: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Library entry IDs, each contributing `prefix + name`
    #[serde(default)]
    pub library: Vec<String>,

    /// Free-form keys
    #[serde(default)]
    pub keys: Vec<String>,

    pub target_asset: AssetRef,

    /// Overrides the pack's `return_after_ms`
    #[serde(default)]
    pub return_after_ms: Option<u64>,

    /// Overrides the pack's `return_asset`
    #[serde(default)]
    pub return_asset: Option<AssetRef>,

    /// Item-scoped cooldown, checked in addition to the pack's
    #[serde(default)]
    pub cooldown_ms: Option<u64>,
}

/// A group of items sharing activation keywords, cooldown and priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackDefinition {
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default = "default_true")]
    pub active: bool,

    // ─── Matching ───────────────────────────────────────────────────────────
    /// Keywords with ANY semantics that open the pack
    #[serde(default)]
    pub activation_keywords: Vec<String>,

    #[serde(default)]
    pub require_pipes: bool,

    #[serde(default)]
    pub case_sensitive: bool,

    // ─── Arbitration ────────────────────────────────────────────────────────
    /// Gates every item of the pack
    #[serde(default)]
    pub cooldown_ms: u64,

    #[serde(default)]
    pub priority: i32,

    // ─── Return defaults (items may override) ───────────────────────────────
    #[serde(default)]
    pub return_after_ms: u64,

    #[serde(default)]
    pub return_mode: ReturnMode,

    #[serde(default)]
    pub return_asset: Option<AssetRef>,

    #[serde(default, rename = "item")]
    pub items: Vec<PackItem>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Library
// ═══════════════════════════════════════════════════════════════════════════

/// Reusable key fragment: `prefix + name` forms a pack item key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub prefix: String,
}

impl LibraryEntry {
    pub fn key(&self) -> String {
        format!("{}{}", self.prefix, self.name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Serde Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn default_true() -> bool {
    true
}

// ═══════════════════════════════════════════════════════════════════════════
// Config File Structure
// ═══════════════════════════════════════════════════════════════════════════

/// Definitions for a single visual target, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDefinitions {
    #[serde(default, rename = "trigger")]
    pub triggers: Vec<TriggerDefinition>,

    #[serde(default, rename = "pack")]
    pub packs: Vec<PackDefinition>,

    #[serde(default)]
    pub library: Vec<LibraryEntry>,
}

impl TargetDefinitions {
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty() && self.packs.is_empty() && self.library.is_empty()
    }

    pub fn library_entry(&self, id: &str) -> Option<&LibraryEntry> {
        self.library.iter().find(|entry| entry.id == id)
    }
}

/// Root structure of a definition file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionConfig {
    #[serde(default)]
    pub sprite: TargetDefinitions,

    #[serde(default)]
    pub background: TargetDefinitions,
}

impl DefinitionConfig {
    pub fn target(&self, target: crate::VisualTarget) -> &TargetDefinitions {
        match target {
            crate::VisualTarget::Sprite => &self.sprite,
            crate::VisualTarget::Background => &self.background,
        }
    }

    pub fn target_mut(&mut self, target: crate::VisualTarget) -> &mut TargetDefinitions {
        match target {
            crate::VisualTarget::Sprite => &mut self.sprite,
            crate::VisualTarget::Background => &mut self.background,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::StandardState;

    #[test]
    fn parses_trigger_with_defaults() {
        let toml = r#"
[[sprite.trigger]]
id = "wave"
keywords = ["wave", "waves"]
target_asset = "happy"
"#;

        let config: DefinitionConfig = toml::from_str(toml).unwrap();
        let trigger = &config.sprite.triggers[0];
        assert!(trigger.active);
        assert!(!trigger.require_pipes);
        assert_eq!(trigger.return_after_ms, 0);
        assert_eq!(trigger.return_mode, ReturnMode::ToDefaultCollection);
        assert_eq!(
            trigger.target_asset,
            AssetRef::Standard(StandardState::Happy)
        );
        assert!(config.background.is_empty());
    }

    #[test]
    fn parses_pack_with_items_and_library() {
        let toml = r#"
[[sprite.library]]
id = "wave"
prefix = "act-"
name = "wave"

[[sprite.pack]]
id = "moods"
activation_keywords = ["happy"]
require_pipes = true
cooldown_ms = 1000
return_after_ms = 3000

[[sprite.pack.item]]
id = "happy"
library = ["wave"]
keys = ["pose-sitting"]
target_asset = "happy.png"
return_after_ms = 500
"#;

        let config: DefinitionConfig = toml::from_str(toml).unwrap();
        let pack = &config.sprite.packs[0];
        assert_eq!(pack.cooldown_ms, 1000);
        assert_eq!(pack.items.len(), 1);
        assert_eq!(pack.items[0].return_after_ms, Some(500));
        assert_eq!(
            config.sprite.library_entry("wave").map(LibraryEntry::key),
            Some("act-wave".to_string())
        );
    }
}
