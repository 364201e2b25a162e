//! Visual state machine
//!
//! One controller per target. It applies arbitration winners, keeps the
//! single pending return timer, and reverts to the default collection when
//! that timer fires.
//!
//! ```text
//!            winner                     winner (pre-emption)
//!   Idle ────────────► Active ◄──────────────────┐
//!    ▲                   │  └────────────────────┘
//!    └───────────────────┘
//!      return timer / reset
//! ```
//!
//! Every scheduled timer carries a fresh token. A timer firing with a token
//! that is no longer pending is ignored, which covers replaced states and
//! resets alike.

use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use tableau_types::{AssetRef, ReturnMode, VisualTarget};

use crate::arbitration::Winner;
use crate::events::EngineSignal;

use super::{AssetCatalog, DefaultResolver};

/// How the active state ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnPlan {
    /// 0 = stay until replaced
    pub after_ms: u64,
    pub mode: ReturnMode,
    pub asset: Option<AssetRef>,
}

/// A scheduled single-shot return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnTimer {
    pub token: u64,
    pub deadline: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveState {
    /// Trigger ID, or `pack/item`
    pub source_id: String,
    pub asset: AssetRef,
    pub activated_at: NaiveDateTime,
    pub return_plan: ReturnPlan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisualState {
    /// Showing the default (None = nothing selected yet)
    Idle { asset: Option<AssetRef> },
    Active(ActiveState),
}

impl Default for VisualState {
    fn default() -> Self {
        Self::Idle { asset: None }
    }
}

impl VisualState {
    pub fn current_asset(&self) -> Option<&AssetRef> {
        match self {
            Self::Idle { asset } => asset.as_ref(),
            Self::Active(active) => Some(&active.asset),
        }
    }

    pub fn source_id(&self) -> Option<&str> {
        match self {
            Self::Idle { .. } => None,
            Self::Active(active) => Some(&active.source_id),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

pub struct VisualStateController {
    target: VisualTarget,
    state: VisualState,
    pending: Option<ReturnTimer>,
    next_token: u64,
    defaults: Box<dyn DefaultResolver>,
    catalog: Arc<dyn AssetCatalog>,
}

impl std::fmt::Debug for VisualStateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualStateController")
            .field("target", &self.target)
            .field("state", &self.state)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl VisualStateController {
    pub fn new(
        target: VisualTarget,
        defaults: Box<dyn DefaultResolver>,
        catalog: Arc<dyn AssetCatalog>,
    ) -> Self {
        Self {
            target,
            state: VisualState::default(),
            pending: None,
            next_token: 1,
            defaults,
            catalog,
        }
    }

    pub fn target(&self) -> VisualTarget {
        self.target
    }

    pub fn state(&self) -> &VisualState {
        &self.state
    }

    pub fn pending_return(&self) -> Option<ReturnTimer> {
        self.pending
    }

    /// Apply an arbitration winner, replacing whatever is showing
    pub fn apply(&mut self, winner: &Winner, now: NaiveDateTime) -> Vec<EngineSignal> {
        let mut signals = Vec::new();

        if let Some(stale) = self.pending.take() {
            tracing::debug!(target_kind = %self.target, token = stale.token, "cancelled pending return");
        }

        let source_id = winner.source_id();

        if !self.catalog.contains(self.target, &winner.asset) {
            tracing::warn!(
                target_kind = %self.target,
                source_id = %source_id,
                asset = %winner.asset,
                "target asset missing, falling back to default"
            );
            signals.push(EngineSignal::ConfigWarning {
                target: self.target,
                definition_id: Some(source_id),
                message: format!("asset '{}' not found, showing default", winner.asset),
            });
            let asset = self.defaults.select();
            self.state = VisualState::Idle {
                asset: asset.clone(),
            };
            signals.push(EngineSignal::AssetChanged {
                target: self.target,
                asset,
                source_definition_id: None,
                timestamp: now,
            });
            return signals;
        }

        tracing::debug!(
            target_kind = %self.target,
            source_id = %source_id,
            asset = %winner.asset,
            "visual state activated"
        );

        self.state = VisualState::Active(ActiveState {
            source_id: source_id.clone(),
            asset: winner.asset.clone(),
            activated_at: now,
            return_plan: winner.return_plan.clone(),
        });
        signals.push(EngineSignal::AssetChanged {
            target: self.target,
            asset: Some(winner.asset.clone()),
            source_definition_id: Some(source_id),
            timestamp: now,
        });

        if winner.return_plan.after_ms > 0 {
            let deadline = i64::try_from(winner.return_plan.after_ms)
                .ok()
                .and_then(TimeDelta::try_milliseconds)
                .and_then(|delay| now.checked_add_signed(delay));
            match deadline {
                Some(deadline) => {
                    let token = self.next_token;
                    self.next_token += 1;
                    self.pending = Some(ReturnTimer { token, deadline });
                }
                None => {
                    tracing::warn!(
                        after_ms = winner.return_plan.after_ms,
                        "return delay out of range, state will not auto-return"
                    );
                }
            }
        }

        signals
    }

    /// Fire the return timer identified by `token`. Stale tokens are no-ops.
    pub fn fire_return(&mut self, token: u64, now: NaiveDateTime) -> Vec<EngineSignal> {
        match self.pending {
            Some(timer) if timer.token == token => self.pending = None,
            _ => {
                tracing::debug!(target_kind = %self.target, token, "ignoring stale return timer");
                return Vec::new();
            }
        }

        let VisualState::Active(active) = &self.state else {
            return Vec::new();
        };
        let from = active.source_id.clone();
        let plan = active.return_plan.clone();

        let mut signals = Vec::new();
        let asset = self.resolve_return(&plan, &from, &mut signals);

        tracing::debug!(target_kind = %self.target, from = %from, "returned to default");

        self.state = VisualState::Idle {
            asset: asset.clone(),
        };
        signals.push(EngineSignal::ReturnedToDefault {
            target: self.target,
            from_definition_id: from,
            timestamp: now,
        });
        signals.push(EngineSignal::AssetChanged {
            target: self.target,
            asset,
            source_definition_id: None,
            timestamp: now,
        });
        signals
    }

    /// Fire the pending timer if its deadline has passed
    pub fn tick(&mut self, now: NaiveDateTime) -> Vec<EngineSignal> {
        match self.pending {
            Some(timer) if timer.deadline <= now => self.fire_return(timer.token, now),
            _ => Vec::new(),
        }
    }

    /// Drop the pending timer and forget the current state, without signals
    pub fn reset(&mut self) {
        self.pending = None;
        self.state = VisualState::default();
    }

    fn resolve_return(
        &mut self,
        plan: &ReturnPlan,
        from: &str,
        signals: &mut Vec<EngineSignal>,
    ) -> Option<AssetRef> {
        if plan.mode == ReturnMode::ToCustomAsset {
            let message = match &plan.asset {
                Some(asset) if self.catalog.contains(self.target, asset) => {
                    return Some(asset.clone());
                }
                Some(asset) => format!("return asset '{asset}' not found, showing default"),
                None => "return mode is to_custom_asset but no return asset is set".to_string(),
            };
            tracing::warn!(target_kind = %self.target, source_id = %from, "{}", message);
            signals.push(EngineSignal::ConfigWarning {
                target: self.target,
                definition_id: Some(from.to_string()),
                message,
            });
        }
        self.defaults.select()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::matching::{Candidate, Owner};
    use crate::test_support::{asset, at};
    use crate::visual::{AnyAsset, DefaultCollection, DefaultCollectionConfig};

    fn controller() -> VisualStateController {
        VisualStateController::new(
            VisualTarget::Sprite,
            Box::new(DefaultCollection::new(DefaultCollectionConfig::idle_sprite())),
            Arc::new(AnyAsset),
        )
    }

    fn winner(id: &str, target: &str, after_ms: u64) -> Winner {
        Winner {
            candidate: Candidate {
                owner: Owner::Trigger(0),
                definition_id: id.to_string(),
                item_id: None,
                matched_keywords: vec![id.to_string()],
                matched_keys: Vec::new(),
                timestamp: at(0),
                match_end: 0,
            },
            priority: 0,
            asset: asset(target),
            return_plan: ReturnPlan {
                after_ms,
                mode: ReturnMode::ToDefaultCollection,
                asset: None,
            },
        }
    }

    #[test]
    fn activation_schedules_return_from_activation_time() {
        let mut ctl = controller();
        let signals = ctl.apply(&winner("wave", "happy", 3_000), at(100));

        assert_eq!(signals.len(), 1);
        assert!(ctl.state().is_active());
        assert_eq!(ctl.pending_return().map(|t| t.deadline), Some(at(3_100)));
    }

    #[test]
    fn zero_return_never_schedules() {
        let mut ctl = controller();
        ctl.apply(&winner("wave", "happy", 0), at(0));
        assert!(ctl.pending_return().is_none());
        assert!(ctl.tick(at(1_000_000)).is_empty());
        assert!(ctl.state().is_active());
    }

    #[test]
    fn tick_reverts_to_default_collection() {
        let mut ctl = controller();
        ctl.apply(&winner("wave", "happy", 3_000), at(0));

        assert!(ctl.tick(at(2_999)).is_empty());
        let signals = ctl.tick(at(3_000));
        assert!(matches!(
            &signals[..],
            [
                EngineSignal::ReturnedToDefault { from_definition_id, .. },
                EngineSignal::AssetChanged { asset: Some(a), source_definition_id: None, .. },
            ] if from_definition_id == "wave" && *a == AssetRef::idle()
        ));
        assert_eq!(ctl.state(), &VisualState::Idle { asset: Some(AssetRef::idle()) });
    }

    #[test]
    fn preemption_invalidates_previous_timer() {
        let mut ctl = controller();
        ctl.apply(&winner("wave", "happy", 1_000), at(0));
        let first = ctl.pending_return().unwrap();

        ctl.apply(&winner("frown", "sad", 5_000), at(500));
        assert!(ctl.fire_return(first.token, at(1_000)).is_empty());
        assert_eq!(ctl.state().source_id(), Some("frown"));

        let second = ctl.pending_return().unwrap();
        assert_eq!(second.deadline, at(5_500));
        assert!(!ctl.fire_return(second.token, at(5_500)).is_empty());
    }

    #[test]
    fn reset_cancels_pending_timer() {
        let mut ctl = controller();
        ctl.apply(&winner("wave", "happy", 1_000), at(0));
        let timer = ctl.pending_return().unwrap();

        ctl.reset();
        assert!(ctl.fire_return(timer.token, at(1_000)).is_empty());
        assert!(ctl.tick(at(2_000)).is_empty());
        assert_eq!(ctl.state(), &VisualState::Idle { asset: None });
    }

    #[test]
    fn missing_asset_falls_back_with_warning() {
        let catalog: HashSet<AssetRef> = [asset("happy")].into_iter().collect();
        let mut ctl = VisualStateController::new(
            VisualTarget::Background,
            Box::new(DefaultCollection::new(DefaultCollectionConfig {
                principal: Some(asset("room.png")),
                ..Default::default()
            })),
            Arc::new(catalog),
        );

        let signals = ctl.apply(&winner("beach", "beach.png", 1_000), at(0));
        assert!(matches!(signals[0], EngineSignal::ConfigWarning { .. }));
        assert!(matches!(
            &signals[1],
            EngineSignal::AssetChanged { asset: Some(a), .. } if *a == asset("room.png")
        ));
        assert!(!ctl.state().is_active());
        assert!(ctl.pending_return().is_none());
    }

    #[test]
    fn custom_return_asset_is_used() {
        let mut ctl = controller();
        let mut w = winner("wave", "happy", 1_000);
        w.return_plan.mode = ReturnMode::ToCustomAsset;
        w.return_plan.asset = Some(asset("thinking"));
        ctl.apply(&w, at(0));

        ctl.tick(at(1_000));
        assert_eq!(ctl.state().current_asset(), Some(&asset("thinking")));
    }

    #[test]
    fn custom_return_without_asset_warns_and_uses_default() {
        let mut ctl = controller();
        let mut w = winner("wave", "happy", 1_000);
        w.return_plan.mode = ReturnMode::ToCustomAsset;
        ctl.apply(&w, at(0));

        let signals = ctl.tick(at(1_000));
        assert!(matches!(signals[0], EngineSignal::ConfigWarning { .. }));
        assert_eq!(ctl.state().current_asset(), Some(&AssetRef::idle()));
    }
}
