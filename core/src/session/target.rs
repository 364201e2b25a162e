use std::sync::Arc;

use chrono::NaiveDateTime;
use tableau_types::{DelimiterPair, TargetDefinitions, VisualTarget};

use crate::arbitration::{CooldownLedger, select_winner};
use crate::events::EngineSignal;
use crate::matching::{KeywordIndex, MatchResolver};
use crate::visual::{
    AssetCatalog, DefaultResolver, ReturnTimer, VisualState, VisualStateController,
};

/// Everything one target (sprite or background) needs to turn text into
/// visual state. Targets never share state.
#[derive(Debug)]
pub struct TargetEngine {
    target: VisualTarget,
    index: KeywordIndex,
    resolver: MatchResolver,
    ledger: CooldownLedger,
    controller: VisualStateController,
}

impl TargetEngine {
    pub fn new(
        target: VisualTarget,
        definitions: &TargetDefinitions,
        delimiters: DelimiterPair,
        defaults: Box<dyn DefaultResolver>,
        catalog: Arc<dyn AssetCatalog>,
    ) -> Self {
        Self {
            target,
            index: KeywordIndex::rebuild(definitions),
            resolver: MatchResolver::new(delimiters),
            ledger: CooldownLedger::new(),
            controller: VisualStateController::new(target, defaults, catalog),
        }
    }

    pub fn target(&self) -> VisualTarget {
        self.target
    }

    pub fn index(&self) -> &KeywordIndex {
        &self.index
    }

    pub fn ledger(&self) -> &CooldownLedger {
        &self.ledger
    }

    pub fn state(&self) -> &VisualState {
        self.controller.state()
    }

    pub fn pending_return(&self) -> Option<ReturnTimer> {
        self.controller.pending_return()
    }

    /// Start scanning a fresh turn. Ledger and visual state carry over.
    pub fn begin_turn(&mut self) {
        self.resolver.clear();
    }

    /// Scan a delta, arbitrate, and apply the winner if there is one.
    /// An elapsed return timer fires first so its revert is ordered before
    /// any new activation.
    pub fn push_delta(&mut self, delta: &str, now: NaiveDateTime) -> Vec<EngineSignal> {
        let mut signals = self.controller.tick(now);

        let candidates = self.resolver.push(&self.index, delta, now);
        if candidates.is_empty() {
            return signals;
        }

        let Some(winner) = select_winner(candidates, &self.index, &mut self.ledger, now) else {
            return signals;
        };

        tracing::info!(
            target_kind = %self.target,
            source_id = %winner.source_id(),
            priority = winner.priority,
            "trigger fired"
        );

        signals.push(EngineSignal::TriggerFired {
            target: self.target,
            definition_id: winner.candidate.definition_id.clone(),
            item_id: winner.candidate.item_id.clone(),
            matched_keywords: winner.candidate.matched_keywords.clone(),
            matched_keys: winner.candidate.matched_keys.clone(),
            asset: winner.asset.clone(),
            timestamp: now,
        });
        signals.extend(self.controller.apply(&winner, now));
        signals
    }

    pub fn tick(&mut self, now: NaiveDateTime) -> Vec<EngineSignal> {
        self.controller.tick(now)
    }

    pub fn fire_return(&mut self, token: u64, now: NaiveDateTime) -> Vec<EngineSignal> {
        self.controller.fire_return(token, now)
    }

    /// Swap in new definitions. Ledger, visual state and the pending timer
    /// are kept; the resolver re-bases on the current turn text silently.
    pub fn reload(&mut self, definitions: &TargetDefinitions) -> Vec<EngineSignal> {
        self.index = KeywordIndex::rebuild(definitions);
        self.resolver.rebase(&self.index);
        tracing::debug!(
            target_kind = %self.target,
            triggers = self.index.triggers().len(),
            packs = self.index.packs().len(),
            keys = self.index.key_count(),
            "definitions reloaded"
        );
        self.index_warnings()
    }

    /// Index warnings as signals
    pub fn index_warnings(&self) -> Vec<EngineSignal> {
        self.index
            .warnings()
            .iter()
            .map(|w| EngineSignal::ConfigWarning {
                target: self.target,
                definition_id: Some(w.definition_id.clone()),
                message: w.message.clone(),
            })
            .collect()
    }

    /// Tear down per-session state without emitting anything
    pub fn reset(&mut self) {
        self.resolver.clear();
        self.ledger.clear();
        self.controller.reset();
    }
}
