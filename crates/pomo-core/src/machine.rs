//! Session state machine

use chrono::{DateTime, Local};
use pomo_api::{Phase, SessionEndReason, SessionSnapshot};
use pomo_config::{LONG_BREAK_FACTOR, RuleSet};
use pomo_util::SessionId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use crate::{CancelSignal, CoreEvent};

/// One tick of the session clock
pub const TICK: Duration = Duration::from_secs(1);

/// Result of a single [`SessionMachine::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Paused or already finished; the tick had no effect
    Skipped,
    /// Clock advanced within the current phase
    Advanced,
    /// Clock advanced and the phase flipped
    PhaseChanged {
        phase: Phase,
        work_count: u32,
        break_count: u32,
        is_long_break: bool,
    },
    /// The long break ran out and the session terminated
    Finished,
}

impl TickOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, TickOutcome::Finished)
    }
}

/// How the advancement task exited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Completed,
    Cancelled,
}

/// Mutable session fields. Only ever touched through the machine's lock.
#[derive(Debug, Clone, Default)]
struct SessionState {
    elapsed: Duration,
    remaining: Duration,
    started_at: Option<DateTime<Local>>,
    finished_at: Option<DateTime<Local>>,
    running: bool,
    started: bool,
    finished: bool,
    phase: Phase,
    work_count: u32,
    break_count: u32,
    is_long_break: bool,
}

impl SessionState {
    fn finish(&mut self, now: DateTime<Local>) {
        self.running = false;
        self.started = false;
        self.finished = true;
        self.finished_at = Some(now);
    }

    fn phase_changed(&self) -> TickOutcome {
        TickOutcome::PhaseChanged {
            phase: self.phase,
            work_count: self.work_count,
            break_count: self.break_count,
            is_long_break: self.is_long_break,
        }
    }

    fn advance(&mut self, rules: &RuleSet) -> TickOutcome {
        if !self.running || self.finished {
            return TickOutcome::Skipped;
        }

        self.elapsed += TICK;

        match self.phase {
            Phase::Working => {
                self.remaining = rules.work.duration.saturating_sub(self.elapsed);

                if self.elapsed >= rules.work.duration {
                    self.work_count += 1;
                    self.is_long_break = self.work_count == rules.work.rounds;
                    self.phase = Phase::Break;
                    self.elapsed = Duration::ZERO;
                    return self.phase_changed();
                }
            }
            Phase::Break if self.is_long_break => {
                // Countdown is based on the work duration, the threshold on the break duration
                self.remaining =
                    rules.work.duration.saturating_mul(LONG_BREAK_FACTOR).saturating_sub(self.elapsed);

                if self.elapsed >= rules.long_break_duration() {
                    self.finish(pomo_util::now());
                    return TickOutcome::Finished;
                }
            }
            Phase::Break => {
                if self.elapsed >= rules.breaks.duration {
                    self.break_count += 1;
                    self.phase = Phase::Working;
                    self.elapsed = Duration::ZERO;
                    self.remaining = rules.breaks.duration - self.elapsed;
                    return self.phase_changed();
                }
            }
        }

        TickOutcome::Advanced
    }
}

/// A single pomodoro session.
///
/// All mutable state sits behind one reader/writer lock: `update`, `toggle`,
/// `start` and `terminate` take it exclusively, `snapshot` takes it shared.
/// The rule set is immutable and read without locking.
#[derive(Debug)]
pub struct SessionMachine {
    id: SessionId,
    rules: Arc<RuleSet>,
    state: RwLock<SessionState>,
    cancel: CancelSignal,
}

impl SessionMachine {
    /// Create a fresh, not yet started session bound to `rules`
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self {
            id: SessionId::new(),
            rules,
            state: RwLock::new(SessionState::default()),
            cancel: CancelSignal::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Mark the session started in the Working phase.
    ///
    /// Does not set `running`; that is left to [`run`](Self::run). Calling it
    /// twice re-stamps `started_at`, so callers must check `started` first.
    pub async fn start(&self) -> DateTime<Local> {
        let now = pomo_util::now();

        let mut state = self.state.write().await;
        state.started_at = Some(now);
        state.started = true;
        state.phase = Phase::Working;

        info!(
            session_id = %self.id,
            work_rounds = self.rules.work.rounds,
            work_secs = self.rules.work.duration.as_secs(),
            break_secs = self.rules.breaks.duration.as_secs(),
            "Session started"
        );

        now
    }

    /// Flip between running and paused. Returns the new `running` value.
    pub async fn toggle(&self) -> bool {
        let mut state = self.state.write().await;
        state.running = !state.running;

        info!(
            session_id = %self.id,
            running = state.running,
            "Session toggled"
        );

        state.running
    }

    /// Move to the terminal state. Re-terminating only re-stamps `finished_at`.
    pub async fn terminate(&self) {
        let mut state = self.state.write().await;
        state.finish(pomo_util::now());

        info!(session_id = %self.id, "Session terminated");
    }

    /// Advance the session clock by one tick
    pub async fn update(&self) -> TickOutcome {
        let mut state = self.state.write().await;
        let outcome = state.advance(&self.rules);

        match outcome {
            TickOutcome::Skipped => {}
            TickOutcome::Advanced => {
                debug!(
                    session_id = %self.id,
                    phase = ?state.phase,
                    elapsed_secs = state.elapsed.as_secs(),
                    "Tick"
                );
            }
            TickOutcome::PhaseChanged {
                phase: Phase::Break,
                is_long_break: true,
                work_count,
                ..
            } => {
                info!(session_id = %self.id, work_count, "Last round done, take a long break");
            }
            TickOutcome::PhaseChanged {
                phase: Phase::Break,
                work_count,
                ..
            } => {
                info!(session_id = %self.id, work_count, "Take a short break");
            }
            TickOutcome::PhaseChanged {
                phase: Phase::Working,
                break_count,
                ..
            } => {
                info!(session_id = %self.id, break_count, "Back to work");
            }
            TickOutcome::Finished => {
                info!(
                    session_id = %self.id,
                    work_count = state.work_count,
                    break_count = state.break_count,
                    "Session finished"
                );
            }
        }

        outcome
    }

    /// Copy of every session field, taken under the shared lock
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;

        SessionSnapshot {
            session_id: self.id.clone(),
            elapsed: state.elapsed,
            remaining: state.remaining,
            started_at: state.started_at,
            finished_at: state.finished_at,
            running: state.running,
            started: state.started,
            finished: state.finished,
            phase: state.phase,
            work_count: state.work_count,
            break_count: state.break_count,
            is_long_break: state.is_long_break,
            rules: *self.rules,
        }
    }

    pub async fn is_started(&self) -> bool {
        self.state.read().await.started
    }

    /// Ask the advancement task to stop. Only the first call has an effect.
    pub fn cancel(&self) -> bool {
        let fired = self.cancel.cancel();
        if fired {
            debug!(session_id = %self.id, "Cancellation requested");
        }
        fired
    }

    /// The advancement task: tick once per second until the session finishes
    /// or is cancelled.
    ///
    /// Cancellation exits without calling [`terminate`](Self::terminate), so
    /// a cancelled session keeps its `started`/`finished` flags as they were.
    pub async fn run(&self, events: mpsc::UnboundedSender<CoreEvent>) -> RunExit {
        self.begin_running().await;
        self.drive(events).await
    }

    /// Force `running` on. This is the only place it is set outside `toggle`.
    pub async fn begin_running(&self) {
        self.state.write().await.running = true;
    }

    /// The tick loop of [`run`](Self::run), without forcing `running` on.
    ///
    /// For callers that already called [`begin_running`](Self::begin_running)
    /// and must not have a later toggle overwritten when the task first polls.
    pub async fn drive(&self, events: mpsc::UnboundedSender<CoreEvent>) -> RunExit {
        let mut ticker = interval_at(Instant::now() + TICK, TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(session_id = %self.id, "Advancement task running");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    info!(session_id = %self.id, "Session cancelled");
                    let _ = events.send(CoreEvent::SessionEnded {
                        session_id: self.id.clone(),
                        reason: SessionEndReason::Cancelled,
                    });
                    return RunExit::Cancelled;
                }

                _ = ticker.tick() => {
                    match self.update().await {
                        TickOutcome::PhaseChanged {
                            phase,
                            work_count,
                            break_count,
                            is_long_break,
                        } => {
                            let _ = events.send(CoreEvent::PhaseChanged {
                                session_id: self.id.clone(),
                                phase,
                                work_count,
                                break_count,
                                is_long_break,
                            });
                        }
                        TickOutcome::Finished => {
                            let _ = events.send(CoreEvent::SessionEnded {
                                session_id: self.id.clone(),
                                reason: SessionEndReason::Completed,
                            });
                            return RunExit::Completed;
                        }
                        TickOutcome::Skipped | TickOutcome::Advanced => {}
                    }
                }
            }
        }
    }
}
