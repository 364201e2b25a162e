//! Match resolution
//!
//! Turns the growing text of a streaming turn into candidate firings. The
//! resolver remembers which keys have matched so far; on each delta it only
//! looks for key occurrences that completed in the new suffix, then
//! re-evaluates every definition touching one of those keys. A keyword that
//! shows up again later in the turn re-evaluates its definition again;
//! cooldowns decide whether that fires.

use chrono::NaiveDateTime;
use hashbrown::{HashMap, HashSet};
use tableau_types::DelimiterPair;

use super::index::{KeyId, KeywordIndex, MatchMode, Owner};
use super::scanner::{Appended, TextWindow};

/// A definition or pack item satisfied by the current text window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub owner: Owner,
    /// Trigger ID, or pack ID for items
    pub definition_id: String,
    pub item_id: Option<String>,
    /// Trigger keywords or pack activation keywords that matched
    pub matched_keywords: Vec<String>,
    /// Item keys that matched (empty for simple triggers)
    pub matched_keys: Vec<String>,
    pub timestamp: NaiveDateTime,
    /// Byte offset where the latest contributing key ends
    pub match_end: usize,
}

/// Per-turn matching state for one target
#[derive(Debug, Clone, Default)]
pub struct MatchResolver {
    window: TextWindow,
    /// KeyId -> raw byte offset just past its latest occurrence
    matched: HashMap<KeyId, usize>,
}

impl MatchResolver {
    pub fn new(delimiters: DelimiterPair) -> Self {
        Self {
            window: TextWindow::new(delimiters),
            matched: HashMap::new(),
        }
    }

    /// Forget the current turn
    pub fn clear(&mut self) {
        self.window.clear();
        self.matched.clear();
    }

    pub fn window(&self) -> &TextWindow {
        &self.window
    }

    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }

    /// Append a delta and return the candidates it completed
    pub fn push(
        &mut self,
        index: &KeywordIndex,
        delta: &str,
        now: NaiveDateTime,
    ) -> Vec<Candidate> {
        if delta.is_empty() {
            return Vec::new();
        }

        let appended = self.window.append(delta);
        let fresh = self.match_new_occurrences(index, &appended);
        if fresh.is_empty() {
            return Vec::new();
        }

        tracing::trace!(count = fresh.len(), "keys occurred in delta");
        let owners = index.lookup(&fresh);
        self.evaluate(index, &owners, now)
    }

    /// Re-match the whole window against a new index without emitting
    /// candidates. Used after a configuration reload mid-turn.
    pub fn rebase(&mut self, index: &KeywordIndex) {
        self.matched.clear();
        let everything = Appended {
            raw_before: 0,
            folded_before: 0,
            new_tokens: 0..self.window.tokens().len(),
        };
        self.match_new_occurrences(index, &everything);
    }

    /// Record every key occurrence completed by `appended` and return the
    /// distinct keys that occurred
    fn match_new_occurrences(&mut self, index: &KeywordIndex, appended: &Appended) -> Vec<KeyId> {
        let mut fresh = Vec::new();

        // Delimited keys: look each new token up directly
        for token in &self.window.tokens()[appended.new_tokens.clone()] {
            for (text, case_sensitive) in [(&token.text, true), (&token.folded, false)] {
                let key = super::index::MatchKey {
                    text: text.clone(),
                    mode: MatchMode::Delimited,
                    case_sensitive,
                };
                if let Some(id) = index.key_id(&key) {
                    self.matched.insert(id, token.end);
                    if !fresh.contains(&id) {
                        fresh.push(id);
                    }
                }
            }
        }

        // Substring keys: search the boundary region
        for (id, key) in index.keys() {
            if key.mode != MatchMode::Substring {
                continue;
            }
            let folded = !key.case_sensitive;
            let min_start = if folded {
                appended.folded_before
            } else {
                appended.raw_before
            };
            if let Some(end) = self.window.find_from(&key.text, folded, min_start) {
                self.matched.insert(id, end);
                fresh.push(id);
            }
        }

        fresh
    }

    fn evaluate(
        &self,
        index: &KeywordIndex,
        owners: &[Owner],
        now: NaiveDateTime,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        let mut items_seen: HashSet<(usize, usize)> = HashSet::new();

        for &owner in owners {
            match owner {
                Owner::Trigger(t) => {
                    if let Some(c) = self.evaluate_trigger(index, t, now) {
                        candidates.push(c);
                    }
                }
                Owner::Pack(p) => {
                    let Some(pack) = index.pack(p) else { continue };
                    for i in 0..pack.items.len() {
                        if items_seen.insert((p, i))
                            && let Some(c) = self.evaluate_item(index, p, i, now)
                        {
                            candidates.push(c);
                        }
                    }
                }
                Owner::Item { pack, item } => {
                    if items_seen.insert((pack, item))
                        && let Some(c) = self.evaluate_item(index, pack, item, now)
                    {
                        candidates.push(c);
                    }
                }
            }
        }

        candidates.sort_by_key(|c| index.order_of(c.owner));
        candidates
    }

    fn evaluate_trigger(&self, index: &KeywordIndex, t: usize, now: NaiveDateTime) -> Option<Candidate> {
        let trigger = index.trigger(t)?;
        let (matched_keywords, match_end) = self.collect_matched(index, &trigger.keys);
        // ANY semantics: at least one keyword
        if matched_keywords.is_empty() {
            return None;
        }
        Some(Candidate {
            owner: Owner::Trigger(t),
            definition_id: trigger.definition.id.clone(),
            item_id: None,
            matched_keywords,
            matched_keys: Vec::new(),
            timestamp: now,
            match_end,
        })
    }

    fn evaluate_item(
        &self,
        index: &KeywordIndex,
        p: usize,
        i: usize,
        now: NaiveDateTime,
    ) -> Option<Candidate> {
        let (pack, item) = index.item(p, i)?;
        if !item.satisfiable {
            return None;
        }

        // Pack gate: ANY activation keyword
        let (matched_keywords, activation_end) = self.collect_matched(index, &pack.activation);
        if matched_keywords.is_empty() {
            return None;
        }

        // Item: ALL required keys
        if !item.keys.iter().all(|k| self.matched.contains_key(k)) {
            return None;
        }
        let (matched_keys, keys_end) = self.collect_matched(index, &item.keys);

        Some(Candidate {
            owner: Owner::Item { pack: p, item: i },
            definition_id: pack.definition.id.clone(),
            item_id: Some(item.item.id.clone()),
            matched_keywords,
            matched_keys,
            timestamp: now,
            match_end: activation_end.max(keys_end),
        })
    }

    fn collect_matched(&self, index: &KeywordIndex, keys: &[KeyId]) -> (Vec<String>, usize) {
        let mut labels = Vec::new();
        let mut latest = 0;
        for key in keys {
            if let Some(&end) = self.matched.get(key) {
                labels.push(index.key(*key).text.clone());
                latest = latest.max(end);
            }
        }
        (labels, latest)
    }
}
