pub mod arbitration;
pub mod config;
pub mod events;
pub mod history;
pub mod matching;
pub mod service;
pub mod session;
pub mod settings;
pub mod visual;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use arbitration::{CooldownKey, CooldownLedger, Winner, select_winner};
pub use config::{ConfigError, DefinitionSet, load_definitions};
pub use events::{EngineSignal, SignalHandler};
pub use history::{HistoryEntry, SubscriptionId, TriggerHistory};
pub use matching::{Candidate, KeywordIndex, MatchResolver};
pub use service::{AnchoredClock, SessionHandle, SessionSnapshot, spawn_session};
pub use session::{EngineError, GenerationId, ReturnTicket, Session, TargetEngine};
pub use settings::EngineSettings;
pub use visual::{
    AnyAsset, AssetCatalog, DefaultCollection, DefaultCollectionConfig, DefaultMode,
    DefaultResolver, ReturnPlan, VisualState, VisualStateController,
};
