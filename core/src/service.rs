//! Session service
//!
//! Runs a [`Session`] inside one tokio task. Hosts talk to it through a
//! cloneable [`SessionHandle`]; signals come out of an mpsc channel. Return
//! timers become a single sleep on the earliest pending deadline, recomputed
//! after every command.

use std::time::Duration;

use chrono::{Local, NaiveDateTime, TimeDelta};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use tableau_types::DefinitionConfig;

use crate::events::EngineSignal;
use crate::session::{EngineError, GenerationId, Session};
use crate::visual::VisualState;

const COMMAND_BUFFER: usize = 64;

/// Maps the runtime's monotonic clock onto wall-clock timestamps
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    instant: Instant,
    wall: NaiveDateTime,
}

impl AnchoredClock {
    pub fn new(wall: NaiveDateTime) -> Self {
        Self {
            instant: Instant::now(),
            wall,
        }
    }

    pub fn now_local() -> Self {
        Self::new(Local::now().naive_local())
    }

    pub fn now(&self) -> NaiveDateTime {
        let elapsed = TimeDelta::from_std(self.instant.elapsed()).unwrap_or(TimeDelta::zero());
        self.wall + elapsed
    }

    /// Instant at which `at` is reached. Past timestamps map to the anchor.
    pub fn instant_for(&self, at: NaiveDateTime) -> Instant {
        let offset = (at - self.wall).to_std().unwrap_or(Duration::ZERO);
        self.instant + offset
    }
}

/// Point-in-time view of a running session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub sprite: VisualState,
    pub background: VisualState,
    pub turn: Option<GenerationId>,
    pub history_len: usize,
}

#[derive(Debug)]
pub enum SessionCommand {
    BeginTurn(GenerationId),
    Delta {
        generation: GenerationId,
        text: String,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    EndTurn {
        generation: GenerationId,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Reload(Box<DefinitionConfig>),
    Reset,
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

/// Handle to communicate with a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    async fn send(&self, command: SessionCommand) -> Result<(), EngineError> {
        self.cmd_tx
            .send(command)
            .await
            .map_err(|_| EngineError::ServiceClosed)
    }

    pub async fn begin_turn(&self, generation: GenerationId) -> Result<(), EngineError> {
        self.send(SessionCommand::BeginTurn(generation)).await
    }

    pub async fn push_delta(
        &self,
        generation: GenerationId,
        text: impl Into<String>,
    ) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Delta {
            generation,
            text: text.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| EngineError::ServiceClosed)?
    }

    pub async fn end_turn(&self, generation: GenerationId) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::EndTurn { generation, reply }).await?;
        rx.await.map_err(|_| EngineError::ServiceClosed)?
    }

    pub async fn reload(&self, config: DefinitionConfig) -> Result<(), EngineError> {
        self.send(SessionCommand::Reload(Box::new(config))).await
    }

    pub async fn reset(&self) -> Result<(), EngineError> {
        self.send(SessionCommand::Reset).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| EngineError::ServiceClosed)
    }

    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.send(SessionCommand::Shutdown).await
    }
}

/// Spawn the session task. The join handle yields the session back once the
/// task stops (shutdown, or every handle dropped).
pub fn spawn_session(
    session: Session,
    signals: mpsc::Sender<EngineSignal>,
) -> (SessionHandle, JoinHandle<Session>) {
    spawn_session_with_clock(session, signals, AnchoredClock::now_local())
}

pub fn spawn_session_with_clock(
    session: Session,
    signals: mpsc::Sender<EngineSignal>,
    clock: AnchoredClock,
) -> (SessionHandle, JoinHandle<Session>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let task = tokio::spawn(run_session(session, cmd_rx, signals, clock));
    (SessionHandle { cmd_tx }, task)
}

async fn run_session(
    mut session: Session,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    signals: mpsc::Sender<EngineSignal>,
    clock: AnchoredClock,
) -> Session {
    tracing::debug!("session service started");

    loop {
        let next = session.next_return();
        let wake = next
            .map(|ticket| clock.instant_for(ticket.deadline))
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

        let produced = tokio::select! {
            command = cmd_rx.recv() => {
                let Some(command) = command else {
                    break;
                };
                match handle_command(&mut session, command, &clock) {
                    Some(produced) => produced,
                    None => break,
                }
            }
            _ = tokio::time::sleep_until(wake), if next.is_some() => {
                match next {
                    Some(ticket) => session.fire_return(ticket, clock.now()),
                    None => Vec::new(),
                }
            }
        };

        for signal in produced {
            if signals.send(signal).await.is_err() {
                tracing::debug!("signal receiver dropped");
                break;
            }
        }
    }

    tracing::debug!("session service stopped");
    session
}

/// Apply one command. None = stop the service.
fn handle_command(
    session: &mut Session,
    command: SessionCommand,
    clock: &AnchoredClock,
) -> Option<Vec<EngineSignal>> {
    let produced = match command {
        SessionCommand::BeginTurn(generation) => {
            session.begin_turn(generation);
            Vec::new()
        }
        SessionCommand::Delta {
            generation,
            text,
            reply,
        } => {
            let (result, produced) = match session.push_delta(generation, &text, clock.now()) {
                Ok(produced) => (Ok(()), produced),
                Err(e) => (Err(e), Vec::new()),
            };
            let _ = reply.send(result);
            produced
        }
        SessionCommand::EndTurn { generation, reply } => {
            let _ = reply.send(session.end_turn(generation));
            Vec::new()
        }
        SessionCommand::Reload(config) => session.reload(&config),
        SessionCommand::Reset => {
            session.reset();
            Vec::new()
        }
        SessionCommand::Snapshot(reply) => {
            let _ = reply.send(SessionSnapshot {
                sprite: session.state(tableau_types::VisualTarget::Sprite).clone(),
                background: session.state(tableau_types::VisualTarget::Background).clone(),
                turn: session.current_turn(),
                history_len: session.history().len(),
            });
            Vec::new()
        }
        SessionCommand::Shutdown => return None,
    };
    Some(produced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::EngineSettings;
    use crate::test_support::{at, trigger};
    use tableau_types::TargetDefinitions;

    const GEN: GenerationId = GenerationId(1);

    fn spawn(return_after_ms: u64) -> (SessionHandle, JoinHandle<Session>, mpsc::Receiver<EngineSignal>) {
        let mut wave = trigger("wave", &["wave"], 0);
        wave.return_after_ms = return_after_ms;
        let config = DefinitionConfig {
            sprite: TargetDefinitions {
                triggers: vec![wave],
                ..Default::default()
            },
            ..Default::default()
        };
        let session = Session::new(&config, &EngineSettings::default());
        let (tx, rx) = mpsc::channel(32);
        let (handle, task) = spawn_session_with_clock(session, tx, AnchoredClock::new(at(0)));
        (handle, task, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn return_timer_fires_after_delay() {
        let (handle, _task, mut rx) = spawn(3_000);

        handle.begin_turn(GEN).await.unwrap();
        handle.push_delta(GEN, "wave").await.unwrap();

        let fired_at = match rx.recv().await {
            Some(EngineSignal::TriggerFired { timestamp, .. }) => timestamp,
            other => panic!("expected TriggerFired, got {other:?}"),
        };
        assert!(matches!(rx.recv().await, Some(EngineSignal::AssetChanged { .. })));

        match rx.recv().await {
            Some(EngineSignal::ReturnedToDefault { timestamp, .. }) => {
                let waited = (timestamp - fired_at).num_milliseconds();
                assert!((3_000..3_100).contains(&waited), "waited {waited}ms");
            }
            other => panic!("expected ReturnedToDefault, got {other:?}"),
        }

        let snapshot = handle.snapshot().await.unwrap();
        assert!(!snapshot.sprite.is_active());
        assert_eq!(snapshot.history_len, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_scheduled_return() {
        let (handle, task, mut rx) = spawn(1_000);

        handle.begin_turn(GEN).await.unwrap();
        handle.push_delta(GEN, "wave").await.unwrap();
        handle.reset().await.unwrap();
        handle.snapshot().await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        handle.shutdown().await.unwrap();
        let session = task.await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            kinds.push(signal);
        }
        assert!(kinds.iter().all(|s| !matches!(s, EngineSignal::ReturnedToDefault { .. })));
        assert!(session.next_return().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_delta_is_reported_to_caller() {
        let (handle, _task, _rx) = spawn(0);

        handle.begin_turn(GenerationId(2)).await.unwrap();
        assert_eq!(
            handle.push_delta(GEN, "wave").await,
            Err(EngineError::StaleGeneration {
                current: GenerationId(2),
                received: GEN
            })
        );
        assert_eq!(
            handle.end_turn(GEN).await,
            Err(EngineError::StaleGeneration {
                current: GenerationId(2),
                received: GEN
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn handle_reports_closed_service() {
        let (handle, task, _rx) = spawn(0);
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert_eq!(handle.begin_turn(GEN).await, Err(EngineError::ServiceClosed));
        assert_eq!(handle.snapshot().await, Err(EngineError::ServiceClosed));
    }
}
