//! Asset references and visual targets.
//!
//! An asset reference names what the rendering layer should show. Sprites
//! have a fixed vocabulary of standard states, but characters may also carry
//! arbitrary custom states and images, so a reference is either one of the
//! known states or a validated custom key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a custom asset key, in characters.
pub const CUSTOM_KEY_MAX_LEN: usize = 128;

// ═══════════════════════════════════════════════════════════════════════════
// Visual Target
// ═══════════════════════════════════════════════════════════════════════════

/// Which visual surface an engine instance drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualTarget {
    /// Character sprite
    Sprite,
    /// Scene background image
    Background,
}

impl VisualTarget {
    pub const ALL: [VisualTarget; 2] = [VisualTarget::Sprite, VisualTarget::Background];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sprite => "sprite",
            Self::Background => "background",
        }
    }
}

impl fmt::Display for VisualTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Standard States
// ═══════════════════════════════════════════════════════════════════════════

/// Built-in sprite states every character pack understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardState {
    Idle,
    Talking,
    Happy,
    Sad,
    Angry,
    Surprised,
    Thinking,
    Embarrassed,
    Scared,
    Confused,
}

impl StandardState {
    pub const ALL: [StandardState; 10] = [
        Self::Idle,
        Self::Talking,
        Self::Happy,
        Self::Sad,
        Self::Angry,
        Self::Surprised,
        Self::Thinking,
        Self::Embarrassed,
        Self::Scared,
        Self::Confused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Talking => "talking",
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Surprised => "surprised",
            Self::Thinking => "thinking",
            Self::Embarrassed => "embarrassed",
            Self::Scared => "scared",
            Self::Confused => "confused",
        }
    }

    /// Look up a standard state by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(name))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Custom Keys
// ═══════════════════════════════════════════════════════════════════════════

/// Errors produced when validating an asset reference
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetRefError {
    #[error("asset reference is empty")]
    Empty,
    #[error("asset reference is {len} characters long (max {CUSTOM_KEY_MAX_LEN})")]
    TooLong { len: usize },
    #[error("asset reference {key:?} contains invalid character {ch:?}")]
    InvalidChar { key: String, ch: char },
}

/// A custom state or image key that passed validation.
///
/// Allowed characters are ASCII alphanumerics and `_ - . /`, which covers
/// state names like `"act-wave"` as well as file names like `"happy.png"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CustomKey(String);

impl CustomKey {
    pub fn new(key: impl Into<String>) -> Result<Self, AssetRefError> {
        let key = key.into();
        if key.is_empty() {
            return Err(AssetRefError::Empty);
        }
        let len = key.chars().count();
        if len > CUSTOM_KEY_MAX_LEN {
            return Err(AssetRefError::TooLong { len });
        }
        if let Some(ch) = key
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/')))
        {
            return Err(AssetRefError::InvalidChar { key, ch });
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Asset Reference
// ═══════════════════════════════════════════════════════════════════════════

/// Reference to a renderable asset.
///
/// Serialized as a plain string: standard state names deserialize to
/// `Standard`, anything else must be a valid [`CustomKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AssetRef {
    Standard(StandardState),
    Custom(CustomKey),
}

impl AssetRef {
    pub fn parse(raw: &str) -> Result<Self, AssetRefError> {
        let raw = raw.trim();
        match StandardState::from_name(raw) {
            Some(state) => Ok(Self::Standard(state)),
            None => CustomKey::new(raw).map(Self::Custom),
        }
    }

    pub fn idle() -> Self {
        Self::Standard(StandardState::Idle)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Standard(state) => state.as_str(),
            Self::Custom(key) => key.as_str(),
        }
    }

    pub fn is_standard(&self) -> bool {
        matches!(self, Self::Standard(_))
    }
}

impl FromStr for AssetRef {
    type Err = AssetRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AssetRef {
    type Error = AssetRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AssetRef> for String {
    fn from(value: AssetRef) -> Self {
        value.as_str().to_string()
    }
}

impl From<StandardState> for AssetRef {
    fn from(value: StandardState) -> Self {
        Self::Standard(value)
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
