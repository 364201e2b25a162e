//! Keyword matching
//!
//! ```text
//! ┌──────────────────────────────┐      ┌──────────────────────────────┐
//! │  TargetDefinitions (config)  │ ───► │  KeywordIndex                │
//! │  triggers, packs, library    │      │  normalized key -> owners    │
//! └──────────────────────────────┘      └──────────────────────────────┘
//!                                                     │
//!                     text delta                      │
//!                         │                           ▼
//!                         └──────────────► MatchResolver (per turn)
//!                                                     │
//!                                                     ▼
//!                                          Vec<Candidate> → arbitration
//! ```

pub mod index;
pub mod resolver;
pub mod scanner;

pub use index::{IndexWarning, KeyId, KeywordIndex, MatchKey, MatchMode, Owner};
pub use resolver::{Candidate, MatchResolver};
pub use scanner::TextWindow;
