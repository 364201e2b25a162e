//! Priority arbitration
//!
//! Picks at most one winner per target from a scan pass. Candidates whose
//! definition (or owning pack) is still cooling down are dropped first; the
//! rest compete on priority, then recency, then declaration order.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use tableau_types::{AssetRef, ReturnMode};

use crate::matching::{Candidate, KeywordIndex, Owner};
use crate::visual::ReturnPlan;

use super::{CooldownKey, CooldownLedger};

/// The candidate that gets to drive the target, with everything the
/// controller needs resolved from its definition
#[derive(Debug, Clone, PartialEq)]
pub struct Winner {
    pub candidate: Candidate,
    pub priority: i32,
    pub asset: AssetRef,
    pub return_plan: ReturnPlan,
}

impl Winner {
    /// ID reported as the source of the visual state: `pack/item` for items
    pub fn source_id(&self) -> String {
        match &self.candidate.item_id {
            Some(item) => format!("{}/{}", self.candidate.definition_id, item),
            None => self.candidate.definition_id.clone(),
        }
    }
}

/// A candidate with its definition settings looked up
struct Contender {
    candidate: Candidate,
    priority: i32,
    order: usize,
    asset: AssetRef,
    return_plan: ReturnPlan,
    /// Every cooldown that must be clear, and is recorded on a win
    gates: Vec<(CooldownKey, u64)>,
}

/// Choose the winner of a scan pass and record its firing in the ledger.
pub fn select_winner(
    candidates: Vec<Candidate>,
    index: &KeywordIndex,
    ledger: &mut CooldownLedger,
    now: NaiveDateTime,
) -> Option<Winner> {
    let winner = candidates
        .into_iter()
        .filter_map(|c| contender(c, index))
        .filter(|c| {
            let ready = c
                .gates
                .iter()
                .all(|(key, cooldown_ms)| ledger.can_fire(key, *cooldown_ms, now));
            if !ready {
                tracing::debug!(
                    definition_id = %c.candidate.definition_id,
                    item_id = ?c.candidate.item_id,
                    "candidate suppressed by cooldown"
                );
            }
            ready
        })
        .max_by(compare)?;

    for (key, _) in &winner.gates {
        ledger.record_fire(key.clone(), now);
    }

    Some(Winner {
        candidate: winner.candidate,
        priority: winner.priority,
        asset: winner.asset,
        return_plan: winner.return_plan,
    })
}

/// Higher priority, then later timestamp, then later match, then earlier declaration
fn compare(a: &Contender, b: &Contender) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then(a.candidate.timestamp.cmp(&b.candidate.timestamp))
        .then(a.candidate.match_end.cmp(&b.candidate.match_end))
        .then(b.order.cmp(&a.order))
}

fn contender(candidate: Candidate, index: &KeywordIndex) -> Option<Contender> {
    match candidate.owner {
        Owner::Trigger(t) => {
            let trigger = index.trigger(t)?;
            let def = &trigger.definition;
            Some(Contender {
                priority: def.priority,
                order: trigger.order,
                asset: def.target_asset.clone(),
                return_plan: ReturnPlan {
                    after_ms: def.return_after_ms,
                    mode: def.return_mode,
                    asset: def.return_asset.clone(),
                },
                gates: vec![(CooldownKey::trigger(&def.id), def.cooldown_ms)],
                candidate,
            })
        }
        Owner::Item { pack, item } => {
            let (pack, item) = index.item(pack, item)?;
            let def = &pack.definition;
            let mut gates = vec![(CooldownKey::pack(&def.id), def.cooldown_ms)];
            if let Some(item_cooldown) = item.item.cooldown_ms {
                gates.push((CooldownKey::item(&def.id, &item.item.id), item_cooldown));
            }
            // an item-level return asset implies returning to it
            let mode = if item.item.return_asset.is_some() {
                ReturnMode::ToCustomAsset
            } else {
                def.return_mode
            };
            Some(Contender {
                priority: def.priority,
                order: item.order,
                asset: item.item.target_asset.clone(),
                return_plan: ReturnPlan {
                    after_ms: item.item.return_after_ms.unwrap_or(def.return_after_ms),
                    mode,
                    asset: item
                        .item
                        .return_asset
                        .clone()
                        .or_else(|| def.return_asset.clone()),
                },
                gates,
                candidate,
            })
        }
        // pack activation alone never produces a candidate
        Owner::Pack(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::MatchResolver;
    use crate::test_support::{asset, at, item, pack, piped, trigger};
    use tableau_types::{DelimiterPair, TargetDefinitions};

    struct Fixture {
        index: KeywordIndex,
        resolver: MatchResolver,
        ledger: CooldownLedger,
    }

    impl Fixture {
        fn new(defs: TargetDefinitions) -> Self {
            Self {
                index: KeywordIndex::rebuild(&defs),
                resolver: MatchResolver::new(DelimiterPair::PIPE),
                ledger: CooldownLedger::new(),
            }
        }

        /// Run a whole turn in one delta
        fn turn(&mut self, text: &str, now: NaiveDateTime) -> Option<Winner> {
            self.resolver.clear();
            let candidates = self.resolver.push(&self.index, text, now);
            select_winner(candidates, &self.index, &mut self.ledger, now)
        }
    }

    #[test]
    fn highest_priority_wins_regardless_of_order() {
        for (first, second) in [(5, 10), (10, 5)] {
            let mut fx = Fixture::new(TargetDefinitions {
                triggers: vec![
                    trigger(&format!("p{first}"), &["smile"], first),
                    trigger(&format!("p{second}"), &["smile"], second),
                ],
                ..Default::default()
            });
            let winner = fx.turn("a smile", at(0)).unwrap();
            assert_eq!(winner.priority, 10);
            assert_eq!(winner.candidate.definition_id, "p10");
        }
    }

    #[test]
    fn ties_break_on_later_match_then_declaration() {
        let mut fx = Fixture::new(TargetDefinitions {
            triggers: vec![
                trigger("early", &["smile"], 1),
                trigger("late", &["wave"], 1),
                trigger("twin", &["wave"], 1),
            ],
            ..Default::default()
        });
        let winner = fx.turn("a smile and a wave", at(0)).unwrap();
        // "late" and "twin" end at the same offset; "late" is declared first
        assert_eq!(winner.candidate.definition_id, "late");
    }

    #[test]
    fn cooldown_blocks_until_elapsed() {
        let mut def = trigger("wave", &["wave"], 0);
        def.cooldown_ms = 1_000;
        let mut fx = Fixture::new(TargetDefinitions {
            triggers: vec![def],
            ..Default::default()
        });

        assert!(fx.turn("wave", at(0)).is_some());
        assert!(fx.turn("wave", at(999)).is_none());
        assert!(fx.turn("wave", at(1_000)).is_some());
    }

    #[test]
    fn cooled_down_winner_yields_to_next_best() {
        let mut hot = trigger("hot", &["wave"], 10);
        hot.cooldown_ms = 10_000;
        let mut fx = Fixture::new(TargetDefinitions {
            triggers: vec![hot, trigger("cold", &["wave"], 1)],
            ..Default::default()
        });

        assert_eq!(fx.turn("wave", at(0)).unwrap().candidate.definition_id, "hot");
        assert_eq!(fx.turn("wave", at(10)).unwrap().candidate.definition_id, "cold");
    }

    #[test]
    fn pack_cooldown_gates_every_item() {
        let mut moods = pack(
            "moods",
            &["mood"],
            vec![item("grin", &["grin"], "happy"), item("pout", &["pout"], "sad")],
        );
        moods.cooldown_ms = 1_000;
        let mut fx = Fixture::new(TargetDefinitions {
            packs: vec![moods],
            ..Default::default()
        });

        assert_eq!(
            fx.turn("mood: grin", at(0)).unwrap().candidate.item_id.as_deref(),
            Some("grin")
        );
        // different item, same pack: still gated
        assert!(fx.turn("mood: pout", at(500)).is_none());
        assert!(fx.turn("mood: pout", at(1_000)).is_some());
    }

    #[test]
    fn item_cooldown_applies_on_top_of_pack() {
        let mut grin = item("grin", &["grin"], "happy");
        grin.cooldown_ms = Some(5_000);
        let mut fx = Fixture::new(TargetDefinitions {
            packs: vec![pack("moods", &["mood"], vec![grin, item("pout", &["pout"], "sad")])],
            ..Default::default()
        });

        assert!(fx.turn("mood grin", at(0)).is_some());
        assert!(fx.turn("mood grin", at(1_000)).is_none());
        assert!(fx.turn("mood pout", at(1_000)).is_some());
    }

    #[test]
    fn item_inherits_and_overrides_return_settings() {
        let mut moods = pack(
            "moods",
            &["mood"],
            vec![item("grin", &["grin"], "happy"), item("pout", &["pout"], "sad")],
        );
        moods.return_after_ms = 3_000;
        moods.items[1].return_after_ms = Some(500);
        moods.items[1].return_asset = Some(asset("thinking"));
        let mut fx = Fixture::new(TargetDefinitions {
            packs: vec![moods],
            ..Default::default()
        });

        let grin = fx.turn("mood grin", at(0)).unwrap();
        assert_eq!(grin.return_plan.after_ms, 3_000);
        assert_eq!(grin.return_plan.mode, ReturnMode::ToDefaultCollection);
        assert_eq!(grin.source_id(), "moods/grin");

        let pout = fx.turn("mood pout", at(10)).unwrap();
        assert_eq!(pout.return_plan.after_ms, 500);
        assert_eq!(pout.return_plan.mode, ReturnMode::ToCustomAsset);
        assert_eq!(pout.return_plan.asset, Some(asset("thinking")));
    }

    #[test]
    fn winner_records_fire_for_pack_only_once() {
        let mut fx = Fixture::new(TargetDefinitions {
            triggers: vec![piped(trigger("t", &["x"], 0))],
            packs: vec![pack("p", &["y"], vec![item("i", &["y"], "happy")])],
            ..Default::default()
        });
        fx.turn("y", at(0)).unwrap();
        assert_eq!(fx.ledger.len(), 1);
        assert_eq!(fx.ledger.last_fired(&CooldownKey::pack("p")), Some(at(0)));
    }
}
