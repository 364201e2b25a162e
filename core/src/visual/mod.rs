//! Per-target visual state
//!
//! - **Controller**: applies winners and owns the return timer
//! - **Defaults**: what "return to default" resolves to
//! - **Catalog**: whether an asset still exists

mod catalog;
mod controller;
mod defaults;

pub use catalog::{AnyAsset, AssetCatalog};
pub use controller::{ActiveState, ReturnPlan, ReturnTimer, VisualState, VisualStateController};
pub use defaults::{DefaultCollection, DefaultCollectionConfig, DefaultMode, DefaultResolver};
