//! Shared configuration types for Tableau.
//!
//! Used by the engine crate and by anything that authors or validates
//! definition files.

pub mod asset;
pub mod definitions;
pub mod delimiters;

pub use asset::{AssetRef, AssetRefError, CustomKey, StandardState, VisualTarget};
pub use definitions::{
    DefinitionConfig, LibraryEntry, PackDefinition, PackItem, ReturnMode, TargetDefinitions,
    TriggerDefinition,
};
pub use delimiters::{DelimiterError, DelimiterPair};
