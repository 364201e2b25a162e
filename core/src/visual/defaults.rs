//! Idle/default collection
//!
//! When a target returns to its default, the collection decides what that
//! default is. The controller only sees the [`DefaultResolver`] trait.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tableau_types::AssetRef;

pub trait DefaultResolver: Send {
    /// Asset to show when returning to the default (None = clear the target)
    fn select(&mut self) -> Option<AssetRef>;
}

/// How a default collection picks its entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultMode {
    /// Always the principal entry (or the first entry if none is set)
    #[default]
    Principal,
    /// Uniformly random entry each time
    Random,
    /// Round-robin through the entries
    List,
}

/// Persisted shape of a default collection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DefaultCollectionConfig {
    #[serde(default)]
    pub mode: DefaultMode,
    #[serde(default)]
    pub entries: Vec<AssetRef>,
    #[serde(default)]
    pub principal: Option<AssetRef>,
}

impl DefaultCollectionConfig {
    /// Sprite default: the standard idle state
    pub fn idle_sprite() -> Self {
        Self {
            mode: DefaultMode::Principal,
            entries: Vec::new(),
            principal: Some(AssetRef::idle()),
        }
    }
}

#[derive(Debug)]
pub struct DefaultCollection {
    config: DefaultCollectionConfig,
    cursor: usize,
    rng: StdRng,
}

impl DefaultCollection {
    pub fn new(config: DefaultCollectionConfig) -> Self {
        Self {
            config,
            cursor: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic random mode for tests and replays
    pub fn with_seed(config: DefaultCollectionConfig, seed: u64) -> Self {
        Self {
            config,
            cursor: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &DefaultCollectionConfig {
        &self.config
    }

    fn principal(&self) -> Option<AssetRef> {
        self.config
            .principal
            .clone()
            .or_else(|| self.config.entries.first().cloned())
    }
}

impl DefaultResolver for DefaultCollection {
    fn select(&mut self) -> Option<AssetRef> {
        match self.config.mode {
            DefaultMode::Principal => self.principal(),
            DefaultMode::Random => self
                .config
                .entries
                .choose(&mut self.rng)
                .cloned()
                .or_else(|| self.principal()),
            DefaultMode::List => {
                if self.config.entries.is_empty() {
                    return self.principal();
                }
                let entry = self.config.entries[self.cursor % self.config.entries.len()].clone();
                self.cursor = (self.cursor + 1) % self.config.entries.len();
                Some(entry)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::asset;

    fn config(mode: DefaultMode) -> DefaultCollectionConfig {
        DefaultCollectionConfig {
            mode,
            entries: vec![asset("room.png"), asset("garden.png"), asset("beach.png")],
            principal: Some(asset("garden.png")),
        }
    }

    #[test]
    fn principal_mode_is_stable() {
        let mut defaults = DefaultCollection::new(config(DefaultMode::Principal));
        assert_eq!(defaults.select(), Some(asset("garden.png")));
        assert_eq!(defaults.select(), Some(asset("garden.png")));
    }

    #[test]
    fn principal_falls_back_to_first_entry() {
        let mut cfg = config(DefaultMode::Principal);
        cfg.principal = None;
        let mut defaults = DefaultCollection::new(cfg);
        assert_eq!(defaults.select(), Some(asset("room.png")));
    }

    #[test]
    fn list_mode_round_robins() {
        let mut defaults = DefaultCollection::new(config(DefaultMode::List));
        let picks: Vec<_> = (0..4).filter_map(|_| defaults.select()).collect();
        assert_eq!(
            picks,
            vec![
                asset("room.png"),
                asset("garden.png"),
                asset("beach.png"),
                asset("room.png")
            ]
        );
    }

    #[test]
    fn random_mode_picks_members() {
        let cfg = config(DefaultMode::Random);
        let entries = cfg.entries.clone();
        let mut defaults = DefaultCollection::with_seed(cfg, 7);
        for _ in 0..20 {
            let pick = defaults.select().unwrap();
            assert!(entries.contains(&pick));
        }
    }

    #[test]
    fn empty_collection_selects_nothing() {
        let mut defaults = DefaultCollection::new(DefaultCollectionConfig::default());
        assert_eq!(defaults.select(), None);
    }
}
