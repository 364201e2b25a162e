//! Chat session state
//!
//! A [`Session`] owns one [`TargetEngine`] per visual target plus the trigger
//! history. The host drives it turn by turn:
//!
//! ```text
//!   begin_turn(gen) ─► push_delta(gen, "…") ─► push_delta(gen, "…") ─► end_turn(gen)
//!                            │
//!                            ├─► sprite engine      ─┐
//!                            └─► background engine  ─┴─► Vec<EngineSignal> ─► handlers
//! ```
//!
//! Deltas tagged with any generation other than the current turn's are
//! rejected before they reach a resolver. Return timers outlive turns and are
//! fired through [`Session::tick`] or [`Session::fire_return`].

mod target;


use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tableau_types::{DefinitionConfig, VisualTarget};
use thiserror::Error;

use crate::events::{EngineSignal, SignalHandler};
use crate::history::{HistoryEntry, TriggerHistory};
use crate::settings::EngineSettings;
use crate::visual::{AnyAsset, AssetCatalog, DefaultCollection, VisualState};

pub use target::TargetEngine;

/// Tag identifying one streaming turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenerationId(pub u64);

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("delta for {received} rejected, current turn is {current}")]
    StaleGeneration {
        current: GenerationId,
        received: GenerationId,
    },
    #[error("delta for {received} rejected, no turn in progress")]
    NoActiveTurn { received: GenerationId },
    #[error("session service is no longer running")]
    ServiceClosed,
}

/// A pending return timer, stamped with the session epoch it was scheduled in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnTicket {
    pub epoch: u64,
    pub target: VisualTarget,
    pub token: u64,
    pub deadline: NaiveDateTime,
}

pub struct Session {
    sprite: TargetEngine,
    background: TargetEngine,
    history: TriggerHistory,
    turn: Option<GenerationId>,
    /// Bumped on reset so timers scheduled before it can't fire after it
    epoch: u64,
    signal_handlers: Vec<Box<dyn SignalHandler + Send>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("sprite", &self.sprite)
            .field("background", &self.background)
            .field("history", &self.history)
            .field("turn", &self.turn)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Session that treats every asset reference as present
    pub fn new(config: &DefinitionConfig, settings: &EngineSettings) -> Self {
        Self::with_catalog(config, settings, Arc::new(AnyAsset))
    }

    pub fn with_catalog(
        config: &DefinitionConfig,
        settings: &EngineSettings,
        catalog: Arc<dyn AssetCatalog>,
    ) -> Self {
        let engine = |target: VisualTarget| {
            TargetEngine::new(
                target,
                config.target(target),
                settings.delimiters,
                Box::new(DefaultCollection::new(settings.defaults_for(target).clone())),
                Arc::clone(&catalog),
            )
        };

        Self {
            sprite: engine(VisualTarget::Sprite),
            background: engine(VisualTarget::Background),
            history: TriggerHistory::new(settings.history_capacity),
            turn: None,
            epoch: 0,
            signal_handlers: Vec::new(),
        }
    }

    /// Register a signal handler to receive engine signals
    pub fn add_signal_handler(&mut self, handler: Box<dyn SignalHandler + Send>) {
        self.signal_handlers.push(handler);
    }

    /// Index warnings for the current definitions, without dispatching
    pub fn config_warnings(&self) -> Vec<EngineSignal> {
        let mut signals = self.sprite.index_warnings();
        signals.extend(self.background.index_warnings());
        signals
    }

    // ─── Turns ───────────────────────────────────────────────────────────────

    pub fn current_turn(&self) -> Option<GenerationId> {
        self.turn
    }

    /// Start a new streaming turn. Any turn still open is abandoned.
    pub fn begin_turn(&mut self, generation: GenerationId) {
        if let Some(previous) = self.turn
            && previous != generation
        {
            tracing::debug!(%previous, %generation, "abandoning unfinished turn");
        }
        self.turn = Some(generation);
        self.sprite.begin_turn();
        self.background.begin_turn();
    }

    /// Feed a text delta of the current turn to both targets
    pub fn push_delta(
        &mut self,
        generation: GenerationId,
        delta: &str,
        now: NaiveDateTime,
    ) -> Result<Vec<EngineSignal>, EngineError> {
        self.check_generation(generation)?;

        let mut signals = self.sprite.push_delta(delta, now);
        signals.extend(self.background.push_delta(delta, now));

        self.record_history(&signals);
        self.dispatch_signals(&signals);
        Ok(signals)
    }

    /// Close the current turn. Timers and visual state are unaffected.
    pub fn end_turn(&mut self, generation: GenerationId) -> Result<(), EngineError> {
        self.check_generation(generation)?;
        self.turn = None;
        Ok(())
    }

    fn check_generation(&self, received: GenerationId) -> Result<(), EngineError> {
        match self.turn {
            Some(current) if current == received => Ok(()),
            Some(current) => {
                tracing::debug!(%current, %received, "rejecting stale delta");
                Err(EngineError::StaleGeneration { current, received })
            }
            None => Err(EngineError::NoActiveTurn { received }),
        }
    }

    // ─── Timers ──────────────────────────────────────────────────────────────

    /// Fire every return timer whose deadline has passed
    pub fn tick(&mut self, now: NaiveDateTime) -> Vec<EngineSignal> {
        let mut signals = self.sprite.tick(now);
        signals.extend(self.background.tick(now));
        self.dispatch_signals(&signals);
        signals
    }

    /// Fire a specific timer. Tickets from before a reset, or for a timer
    /// that has since been replaced, do nothing.
    pub fn fire_return(&mut self, ticket: ReturnTicket, now: NaiveDateTime) -> Vec<EngineSignal> {
        if ticket.epoch != self.epoch {
            tracing::debug!(
                ticket_epoch = ticket.epoch,
                epoch = self.epoch,
                "ignoring return timer from a previous session"
            );
            return Vec::new();
        }
        let signals = self.engine_mut(ticket.target).fire_return(ticket.token, now);
        self.dispatch_signals(&signals);
        signals
    }

    /// The earliest pending return, if any
    pub fn next_return(&self) -> Option<ReturnTicket> {
        VisualTarget::ALL
            .into_iter()
            .filter_map(|target| {
                self.engine(target).pending_return().map(|timer| ReturnTicket {
                    epoch: self.epoch,
                    target,
                    token: timer.token,
                    deadline: timer.deadline,
                })
            })
            .min_by_key(|ticket| ticket.deadline)
    }

    // ─── Configuration ───────────────────────────────────────────────────────

    /// Hot-swap definitions. Cooldowns, visual state and pending timers are
    /// kept; text already seen in the current turn does not fire again.
    pub fn reload(&mut self, config: &DefinitionConfig) -> Vec<EngineSignal> {
        let mut signals = self.sprite.reload(&config.sprite);
        signals.extend(self.background.reload(&config.background));
        tracing::info!(warnings = signals.len(), "definitions reloaded");
        self.dispatch_signals(&signals);
        signals
    }

    /// Tear down all session state. Emits nothing; subscribers and handlers
    /// stay registered.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.turn = None;
        self.sprite.reset();
        self.background.reset();
        self.history.clear();
        tracing::debug!(epoch = self.epoch, "session reset");
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    pub fn state(&self, target: VisualTarget) -> &VisualState {
        self.engine(target).state()
    }

    pub fn engine(&self, target: VisualTarget) -> &TargetEngine {
        match target {
            VisualTarget::Sprite => &self.sprite,
            VisualTarget::Background => &self.background,
        }
    }

    fn engine_mut(&mut self, target: VisualTarget) -> &mut TargetEngine {
        match target {
            VisualTarget::Sprite => &mut self.sprite,
            VisualTarget::Background => &mut self.background,
        }
    }

    pub fn history(&self) -> &TriggerHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut TriggerHistory {
        &mut self.history
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn record_history(&mut self, signals: &[EngineSignal]) {
        for signal in signals {
            if let EngineSignal::TriggerFired {
                target,
                definition_id,
                item_id,
                matched_keywords,
                matched_keys,
                asset,
                timestamp,
            } = signal
            {
                self.history.record(HistoryEntry {
                    target: *target,
                    definition_id: definition_id.clone(),
                    item_id: item_id.clone(),
                    matched_keywords: matched_keywords.clone(),
                    matched_keys: matched_keys.clone(),
                    asset: asset.clone(),
                    timestamp: *timestamp,
                });
            }
        }
    }

    fn dispatch_signals(&mut self, signals: &[EngineSignal]) {
        if signals.is_empty() {
            return;
        }
        for handler in &mut self.signal_handlers {
            handler.handle_signals(signals);
        }
    }
}
