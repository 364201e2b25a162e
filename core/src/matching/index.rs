//! Keyword index
//!
//! Flattens a target's trigger and pack definitions into a table of
//! normalized match keys, each pointing back at the definitions and items
//! that reference it. Rebuilt from scratch on every configuration change;
//! it holds no chat state.

use hashbrown::{HashMap, HashSet};
use tableau_types::{PackDefinition, PackItem, TargetDefinitions, TriggerDefinition};

/// How a key has to appear in the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    /// Exact token between a delimiter pair
    Delimited,
    /// Plain substring anywhere in the text
    Substring,
}

/// A normalized keyword together with the settings of its owner.
///
/// The same word used by a case-sensitive and a case-insensitive definition
/// produces two distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    pub text: String,
    pub mode: MatchMode,
    pub case_sensitive: bool,
}

impl MatchKey {
    /// Normalize a raw keyword. Returns `None` for blank keywords.
    pub fn normalize(raw: &str, require_pipes: bool, case_sensitive: bool) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let text = if case_sensitive {
            trimmed.to_string()
        } else {
            super::scanner::fold(trimmed)
        };
        let mode = if require_pipes {
            MatchMode::Delimited
        } else {
            MatchMode::Substring
        };
        Some(Self {
            text,
            mode,
            case_sensitive,
        })
    }
}

pub type KeyId = usize;

/// Something that owns keys in the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {
    /// Simple trigger, by position in `triggers()`
    Trigger(usize),
    /// Pack activation keywords, by position in `packs()`
    Pack(usize),
    /// Pack item required keys
    Item { pack: usize, item: usize },
}

/// Non-fatal problem found while indexing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexWarning {
    pub definition_id: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct IndexedTrigger {
    pub definition: TriggerDefinition,
    pub keys: Vec<KeyId>,
    /// Declaration ordinal across the whole target
    pub order: usize,
}

#[derive(Debug, Clone)]
pub struct IndexedItem {
    pub item: PackItem,
    pub keys: Vec<KeyId>,
    pub order: usize,
    /// False when a key set is empty or a library reference dangles
    pub satisfiable: bool,
}

#[derive(Debug, Clone)]
pub struct IndexedPack {
    pub definition: PackDefinition,
    pub activation: Vec<KeyId>,
    pub items: Vec<IndexedItem>,
    pub order: usize,
}

/// Lookup from normalized keys to the definitions referencing them
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    triggers: Vec<IndexedTrigger>,
    packs: Vec<IndexedPack>,

    // ─── Key table ───────────────────────────────────────────────────────────
    keys: Vec<MatchKey>,
    key_ids: HashMap<MatchKey, KeyId>,
    /// KeyId -> owners, in declaration order
    owners: Vec<Vec<Owner>>,

    warnings: Vec<IndexWarning>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index for one target's definitions.
    ///
    /// Inactive definitions and disabled items are left out. Triggers are
    /// ordered before packs for tie-breaking.
    pub fn rebuild(definitions: &TargetDefinitions) -> Self {
        let mut index = Self::new();
        let mut order = 0usize;

        for def in definitions.triggers.iter().filter(|d| d.active) {
            let position = index.triggers.len();
            let keys = index.intern_all(
                &def.keywords,
                def.require_pipes,
                def.case_sensitive,
                Owner::Trigger(position),
            );
            if keys.is_empty() {
                index.warn(&def.id, "trigger has no usable keywords and will never fire");
            }
            index.triggers.push(IndexedTrigger {
                definition: def.clone(),
                keys,
                order,
            });
            order += 1;
        }

        for def in definitions.packs.iter().filter(|d| d.active) {
            let pack_pos = index.packs.len();
            let activation = index.intern_all(
                &def.activation_keywords,
                def.require_pipes,
                def.case_sensitive,
                Owner::Pack(pack_pos),
            );
            if activation.is_empty() {
                index.warn(&def.id, "pack has no usable activation keywords and will never fire");
            }
            let pack_order = order;
            order += 1;

            let mut items = Vec::new();
            for item in def.items.iter().filter(|i| i.enabled) {
                let owner = Owner::Item {
                    pack: pack_pos,
                    item: items.len(),
                };
                let (raw_keys, dangling) = compose_required_keys(item, definitions);
                let mut satisfiable = true;
                for library_id in &dangling {
                    satisfiable = false;
                    index.warn(
                        &def.id,
                        &format!(
                            "item '{}' references unknown library entry '{}'",
                            item.id, library_id
                        ),
                    );
                }
                let keys =
                    index.intern_all(&raw_keys, def.require_pipes, def.case_sensitive, owner);
                if keys.is_empty() {
                    satisfiable = false;
                    index.warn(
                        &def.id,
                        &format!("item '{}' has no usable keys and will never fire", item.id),
                    );
                }
                items.push(IndexedItem {
                    item: item.clone(),
                    keys,
                    order,
                    satisfiable,
                });
                order += 1;
            }

            index.packs.push(IndexedPack {
                definition: def.clone(),
                activation,
                items,
                order: pack_order,
            });
        }

        index
    }

    fn warn(&mut self, definition_id: &str, message: &str) {
        tracing::warn!(definition_id, "{}", message);
        self.warnings.push(IndexWarning {
            definition_id: definition_id.to_string(),
            message: message.to_string(),
        });
    }

    /// Intern raw keywords for an owner. Duplicates collapse to one key.
    fn intern_all(
        &mut self,
        raw: &[String],
        require_pipes: bool,
        case_sensitive: bool,
        owner: Owner,
    ) -> Vec<KeyId> {
        let mut ids = Vec::with_capacity(raw.len());
        for word in raw {
            let Some(key) = MatchKey::normalize(word, require_pipes, case_sensitive) else {
                continue;
            };
            let id = match self.key_ids.get(&key) {
                Some(&id) => id,
                None => {
                    let id = self.keys.len();
                    self.key_ids.insert(key.clone(), id);
                    self.keys.push(key);
                    self.owners.push(Vec::new());
                    id
                }
            };
            if ids.contains(&id) {
                continue;
            }
            ids.push(id);
            self.owners[id].push(owner);
        }
        ids
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn triggers(&self) -> &[IndexedTrigger] {
        &self.triggers
    }

    pub fn packs(&self) -> &[IndexedPack] {
        &self.packs
    }

    pub fn trigger(&self, position: usize) -> Option<&IndexedTrigger> {
        self.triggers.get(position)
    }

    pub fn pack(&self, position: usize) -> Option<&IndexedPack> {
        self.packs.get(position)
    }

    pub fn item(&self, pack: usize, item: usize) -> Option<(&IndexedPack, &IndexedItem)> {
        let pack = self.packs.get(pack)?;
        pack.items.get(item).map(|i| (pack, i))
    }

    pub fn key(&self, id: KeyId) -> &MatchKey {
        &self.keys[id]
    }

    pub fn keys(&self) -> impl Iterator<Item = (KeyId, &MatchKey)> {
        self.keys.iter().enumerate()
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Find the id of an already normalized key
    pub fn key_id(&self, key: &MatchKey) -> Option<KeyId> {
        self.key_ids.get(key).copied()
    }

    pub fn warnings(&self) -> &[IndexWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty() && self.packs.is_empty()
    }

    /// Owners referencing any of the given keys, deduplicated, in declaration order
    pub fn lookup(&self, keys: &[KeyId]) -> Vec<Owner> {
        let mut seen: HashSet<Owner> = HashSet::new();
        let mut result: Vec<Owner> = keys
            .iter()
            .filter_map(|&id| self.owners.get(id))
            .flatten()
            .copied()
            .filter(|owner| seen.insert(*owner))
            .collect();
        result.sort_by_key(|owner| self.order_of(*owner));
        result
    }

    /// Declaration ordinal of an owner (lower = declared earlier)
    pub fn order_of(&self, owner: Owner) -> usize {
        match owner {
            Owner::Trigger(t) => self.triggers.get(t).map_or(usize::MAX, |d| d.order),
            Owner::Pack(p) => self.packs.get(p).map_or(usize::MAX, |d| d.order),
            Owner::Item { pack, item } => self
                .item(pack, item)
                .map_or(usize::MAX, |(_, i)| i.order),
        }
    }
}

/// Library keys first, then free-form keys. Returns dangling library IDs separately.
fn compose_required_keys(item: &PackItem, definitions: &TargetDefinitions) -> (Vec<String>, Vec<String>) {
    let mut keys = Vec::with_capacity(item.library.len() + item.keys.len());
    let mut dangling = Vec::new();
    for library_id in &item.library {
        match definitions.library_entry(library_id) {
            Some(entry) => keys.push(entry.key()),
            None => dangling.push(library_id.clone()),
        }
    }
    keys.extend(item.keys.iter().cloned());
    (keys, dangling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{item, pack, trigger};
    use tableau_types::LibraryEntry;

    #[test]
    fn normalizes_case_only_when_insensitive() {
        let insensitive = MatchKey::normalize("  Happy ", false, false).unwrap();
        assert_eq!(insensitive.text, "happy");
        let sensitive = MatchKey::normalize("Happy", true, true).unwrap();
        assert_eq!(sensitive.text, "Happy");
        assert_eq!(sensitive.mode, MatchMode::Delimited);
        assert!(MatchKey::normalize("   ", false, false).is_none());
    }

    #[test]
    fn shared_keywords_map_to_every_owner() {
        let defs = TargetDefinitions {
            triggers: vec![trigger("a", &["smile"], 0), trigger("b", &["Smile", "grin"], 0)],
            ..Default::default()
        };
        let index = KeywordIndex::rebuild(&defs);

        let smile = index
            .key_id(&MatchKey::normalize("smile", false, false).unwrap())
            .unwrap();
        assert_eq!(index.lookup(&[smile]), vec![Owner::Trigger(0), Owner::Trigger(1)]);
        assert_eq!(index.key_count(), 2);
    }

    #[test]
    fn inactive_definitions_are_skipped() {
        let mut inactive = trigger("off", &["smile"], 0);
        inactive.active = false;
        let defs = TargetDefinitions {
            triggers: vec![inactive, trigger("on", &["wave"], 0)],
            ..Default::default()
        };
        let index = KeywordIndex::rebuild(&defs);
        assert_eq!(index.triggers().len(), 1);
        assert_eq!(index.triggers()[0].definition.id, "on");
    }

    #[test]
    fn composes_library_keys_and_flags_dangling_refs() {
        let mut good = item("wave", &["pose-sitting"], "happy");
        good.library = vec!["wave".to_string()];
        let mut dangling = item("broken", &[], "sad");
        dangling.library = vec!["missing".to_string()];

        let defs = TargetDefinitions {
            packs: vec![pack("moods", &["happy"], vec![good, dangling])],
            library: vec![LibraryEntry {
                id: "wave".to_string(),
                name: "wave".to_string(),
                prefix: "act-".to_string(),
            }],
            ..Default::default()
        };
        let index = KeywordIndex::rebuild(&defs);
        let pack = &index.packs()[0];

        let labels: Vec<_> = pack.items[0]
            .keys
            .iter()
            .map(|&k| index.key(k).text.as_str())
            .collect();
        assert_eq!(labels, vec!["act-wave", "pose-sitting"]);
        assert!(pack.items[0].satisfiable);
        assert!(!pack.items[1].satisfiable);
        assert!(index
            .warnings()
            .iter()
            .any(|w| w.message.contains("unknown library entry 'missing'")));
    }

    #[test]
    fn empty_keyword_sets_are_indexed_but_warned() {
        let defs = TargetDefinitions {
            triggers: vec![trigger("blank", &["", "  "], 0)],
            ..Default::default()
        };
        let index = KeywordIndex::rebuild(&defs);
        assert!(index.triggers()[0].keys.is_empty());
        assert_eq!(index.warnings().len(), 1);
    }

    #[test]
    fn declaration_order_puts_triggers_before_packs() {
        let defs = TargetDefinitions {
            triggers: vec![trigger("t", &["x"], 0)],
            packs: vec![pack("p", &["x"], vec![item("i", &["x"], "happy")])],
            ..Default::default()
        };
        let index = KeywordIndex::rebuild(&defs);
        assert!(index.order_of(Owner::Trigger(0)) < index.order_of(Owner::Pack(0)));
        assert!(
            index.order_of(Owner::Pack(0)) < index.order_of(Owner::Item { pack: 0, item: 0 })
        );
    }
}
