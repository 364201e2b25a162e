//! Trigger history
//!
//! Bounded log of fired triggers, owned by a session. Observers register a
//! listener and get every new entry until they unsubscribe.

use std::collections::VecDeque;

use chrono::NaiveDateTime;
use serde::Serialize;
use tableau_types::{AssetRef, VisualTarget};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub target: VisualTarget,
    pub definition_id: String,
    pub item_id: Option<String>,
    pub matched_keywords: Vec<String>,
    pub matched_keys: Vec<String>,
    pub asset: AssetRef,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type HistoryListener = Box<dyn FnMut(&HistoryEntry) + Send>;

pub struct TriggerHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    listeners: Vec<(SubscriptionId, HistoryListener)>,
    next_id: u64,
}

impl std::fmt::Debug for TriggerHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerHistory")
            .field("entries", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for TriggerHistory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl TriggerHistory {
    pub const DEFAULT_CAPACITY: usize = 100;

    /// `capacity` of 0 keeps nothing but still notifies listeners
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(Self::DEFAULT_CAPACITY)),
            capacity,
            listeners: Vec::new(),
            next_id: 1,
        }
    }

    pub fn subscribe(&mut self, listener: HistoryListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        for (_, listener) in &mut self.listeners {
            listener(&entry);
        }
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Oldest first
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Drop recorded entries. Subscriptions survive.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
