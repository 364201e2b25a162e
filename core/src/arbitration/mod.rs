//! Cooldown tracking and winner selection

pub mod arbiter;
pub mod cooldown;

pub use arbiter::{Winner, select_winner};
pub use cooldown::{CooldownKey, CooldownLedger};
