use chrono::NaiveDateTime;
use serde::Serialize;
use tableau_types::{AssetRef, VisualTarget};

/// Signals emitted by a session for the rendering layer and observers.
/// These represent "something visible happened" at a higher level than
/// individual keyword matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineSignal {
    // Arbitration result
    TriggerFired {
        target: VisualTarget,
        definition_id: String,
        item_id: Option<String>,
        matched_keywords: Vec<String>,
        matched_keys: Vec<String>,
        asset: AssetRef,
        timestamp: NaiveDateTime,
    },

    // Rendering
    /// `asset` is `None` when the default collection has nothing to offer
    AssetChanged {
        target: VisualTarget,
        asset: Option<AssetRef>,
        source_definition_id: Option<String>,
        timestamp: NaiveDateTime,
    },

    // Return timer
    ReturnedToDefault {
        target: VisualTarget,
        from_definition_id: String,
        timestamp: NaiveDateTime,
    },

    // Non-fatal configuration problems
    ConfigWarning {
        target: VisualTarget,
        definition_id: Option<String>,
        message: String,
    },
}

impl EngineSignal {
    pub fn target(&self) -> VisualTarget {
        match self {
            Self::TriggerFired { target, .. }
            | Self::AssetChanged { target, .. }
            | Self::ReturnedToDefault { target, .. }
            | Self::ConfigWarning { target, .. } => *target,
        }
    }

    pub fn is_asset_change(&self) -> bool {
        matches!(self, Self::AssetChanged { .. })
    }
}
