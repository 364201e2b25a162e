//! Asset existence checks
//!
//! Asset storage belongs to the host. The controller only needs to know
//! whether a reference still points at something it can show.

use std::collections::HashSet;

use tableau_types::{AssetRef, VisualTarget};

pub trait AssetCatalog: Send + Sync {
    fn contains(&self, target: VisualTarget, asset: &AssetRef) -> bool;
}

/// Accepts every reference. Used when the host doesn't track assets.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyAsset;

impl AssetCatalog for AnyAsset {
    fn contains(&self, _target: VisualTarget, _asset: &AssetRef) -> bool {
        true
    }
}

impl AssetCatalog for HashSet<AssetRef> {
    fn contains(&self, _target: VisualTarget, asset: &AssetRef) -> bool {
        HashSet::contains(self, asset)
    }
}

impl AssetCatalog for hashbrown::HashSet<AssetRef> {
    fn contains(&self, _target: VisualTarget, asset: &AssetRef) -> bool {
        hashbrown::HashSet::contains(self, asset)
    }
}
