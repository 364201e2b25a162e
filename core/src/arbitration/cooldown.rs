//! Cooldown ledger
//!
//! Session-scoped record of when each definition last fired. Keys are typed
//! so a trigger and a pack sharing an ID never share a cooldown.

use chrono::NaiveDateTime;
use hashbrown::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CooldownKey {
    Trigger(String),
    Pack(String),
    Item { pack: String, item: String },
}

impl CooldownKey {
    pub fn trigger(id: &str) -> Self {
        Self::Trigger(id.to_string())
    }

    pub fn pack(id: &str) -> Self {
        Self::Pack(id.to_string())
    }

    pub fn item(pack: &str, item: &str) -> Self {
        Self::Item {
            pack: pack.to_string(),
            item: item.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CooldownLedger {
    last_fired: HashMap<CooldownKey, NaiveDateTime>,
}

impl CooldownLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if never fired, or at least `cooldown_ms` has elapsed since the
    /// last firing. Host clocks are not assumed monotonic: a `now` earlier
    /// than the last firing counts as cooled down.
    pub fn can_fire(&self, key: &CooldownKey, cooldown_ms: u64, now: NaiveDateTime) -> bool {
        let Some(last) = self.last_fired.get(key) else {
            return true;
        };
        let elapsed = (now - *last).num_milliseconds();
        if elapsed < 0 {
            tracing::debug!(?key, elapsed, "clock went backwards, cooldown lifted");
            return true;
        }
        elapsed as u64 >= cooldown_ms
    }

    pub fn record_fire(&mut self, key: CooldownKey, now: NaiveDateTime) {
        self.last_fired.insert(key, now);
    }

    pub fn last_fired(&self, key: &CooldownKey) -> Option<NaiveDateTime> {
        self.last_fired.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.last_fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_fired.is_empty()
    }

    pub fn clear(&mut self) {
        self.last_fired.clear();
    }
}
