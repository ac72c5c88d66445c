//! Ownership of "the current session"

use pomo_api::SessionSnapshot;
use pomo_config::RuleSet;
use pomo_util::{PomoError, Result};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{CoreEvent, RunExit, SessionMachine};

/// A session together with its advancement task
#[derive(Debug)]
struct ActiveSession {
    machine: Arc<SessionMachine>,
    task: JoinHandle<RunExit>,
}

/// Holds at most one session and implements the create / read / toggle /
/// delete operations clients use.
///
/// The registry is owned by the daemon and passed to whoever needs it; there
/// is no global session.
pub struct SessionRegistry {
    rules: Arc<RuleSet>,
    current: RwLock<Option<ActiveSession>>,
    events: mpsc::UnboundedSender<CoreEvent>,
}

impl SessionRegistry {
    /// Create an empty registry. Every session it creates is bound to `rules`.
    pub fn new(rules: RuleSet, events: mpsc::UnboundedSender<CoreEvent>) -> Self {
        info!(
            work_rounds = rules.work.rounds,
            work_secs = rules.work.duration.as_secs(),
            break_rounds = rules.breaks.rounds,
            break_secs = rules.breaks.duration.as_secs(),
            total_secs = rules.total_duration().as_secs(),
            "Session registry initialized"
        );

        Self {
            rules: Arc::new(rules),
            current: RwLock::new(None),
            events,
        }
    }

    /// Start a fresh session and launch its advancement task.
    ///
    /// Fails with [`PomoError::SessionAlreadyActive`] while a started session
    /// exists. A finished session is replaced.
    pub async fn create(&self) -> Result<SessionSnapshot> {
        let mut current = self.current.write().await;

        if let Some(active) = current.as_ref()
            && active.machine.is_started().await
        {
            return Err(PomoError::SessionAlreadyActive);
        }

        let machine = Arc::new(SessionMachine::new(self.rules.clone()));
        let started_at = machine.start().await;
        machine.begin_running().await;

        let task = {
            let machine = machine.clone();
            let events = self.events.clone();
            tokio::spawn(async move { machine.drive(events).await })
        };

        let _ = self.events.send(CoreEvent::SessionStarted {
            session_id: machine.id().clone(),
            started_at,
        });

        let snapshot = machine.snapshot().await;
        *current = Some(ActiveSession { machine, task });

        Ok(snapshot)
    }

    /// Snapshot of the started session
    pub async fn read(&self) -> Result<SessionSnapshot> {
        let current = self.current.read().await;
        let active = current.as_ref().ok_or(PomoError::NoActiveSession)?;

        let snapshot = active.machine.snapshot().await;
        if !snapshot.started {
            return Err(PomoError::NoActiveSession);
        }

        Ok(snapshot)
    }

    /// Pause or resume the started session
    pub async fn toggle(&self) -> Result<SessionSnapshot> {
        let machine = self.started_machine().await?;

        let running = machine.toggle().await;
        let _ = self.events.send(CoreEvent::RunStateChanged {
            session_id: machine.id().clone(),
            running,
        });

        Ok(machine.snapshot().await)
    }

    /// Cancel the started session and discard it
    pub async fn delete(&self) -> Result<()> {
        let mut current = self.current.write().await;

        let started = match current.as_ref() {
            Some(active) => active.machine.is_started().await,
            None => false,
        };
        if !started {
            return Err(PomoError::NoActiveSession);
        }

        if let Some(active) = current.take() {
            active.machine.cancel();
            info!(session_id = %active.machine.id(), "Session deleted");
            // The task observes the cancellation on its own; nothing to await
            drop(active.task);
        }

        Ok(())
    }

    /// Whether a started session exists
    pub async fn has_active_session(&self) -> bool {
        self.read().await.is_ok()
    }

    /// Cancel whatever session is held and wait for its task to exit
    pub async fn shutdown(&self) {
        let active = self.current.write().await.take();

        if let Some(active) = active {
            active.machine.cancel();
            match active.task.await {
                Ok(exit) => {
                    info!(session_id = %active.machine.id(), exit = ?exit, "Session task stopped")
                }
                Err(e) => warn!(error = %e, "Session task failed"),
            }
        }
    }

    async fn started_machine(&self) -> Result<Arc<SessionMachine>> {
        let current = self.current.read().await;
        let active = current.as_ref().ok_or(PomoError::NoActiveSession)?;

        if !active.machine.is_started().await {
            return Err(PomoError::NoActiveSession);
        }

        Ok(active.machine.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomo_api::{Phase, SessionEndReason};
    use std::time::Duration;

    fn make_registry() -> (SessionRegistry, mpsc::UnboundedReceiver<CoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionRegistry::new(RuleSet::test(), tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<CoreEvent>) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_empty_registry_reports_not_found() {
        let (registry, _rx) = make_registry();

        assert!(matches!(registry.read().await, Err(PomoError::NoActiveSession)));
        assert!(matches!(registry.toggle().await, Err(PomoError::NoActiveSession)));
        assert!(matches!(registry.delete().await, Err(PomoError::NoActiveSession)));
        assert!(!registry.has_active_session().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_starts_session() {
        let (registry, mut rx) = make_registry();

        let snap = registry.create().await.unwrap();
        assert!(snap.started);
        assert!(snap.running);
        assert!(!snap.finished);
        assert_eq!(snap.phase, Phase::Working);
        assert_eq!(snap.rules, RuleSet::test());

        assert!(matches!(
            rx.try_recv(),
            Ok(CoreEvent::SessionStarted { ref session_id, .. }) if *session_id == snap.session_id
        ));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let snap = registry.read().await.unwrap();
        assert!(snap.running);
        assert_eq!(snap.elapsed, Duration::from_secs(1));

        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_create_conflicts() {
        let (registry, _rx) = make_registry();

        let first = registry.create().await.unwrap();
        assert!(matches!(
            registry.create().await,
            Err(PomoError::SessionAlreadyActive)
        ));

        // The first session is untouched
        assert_eq!(registry.read().await.unwrap().session_id, first.session_id);

        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_pauses_and_resumes() {
        let (registry, mut rx) = make_registry();
        registry.create().await.unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let snap = registry.toggle().await.unwrap();
        assert!(!snap.running);
        assert_eq!(snap.elapsed, Duration::from_secs(2));

        tokio::time::sleep(Duration::from_secs(3)).await;
        let snap = registry.read().await.unwrap();
        assert_eq!(snap.elapsed, Duration::from_secs(2));
        assert_eq!(snap.phase, Phase::Working);

        let snap = registry.toggle().await.unwrap();
        assert!(snap.running);

        let toggles: Vec<bool> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                CoreEvent::RunStateChanged { running, .. } => Some(running),
                _ => None,
            })
            .collect();
        assert_eq!(toggles, vec![false, true]);

        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_right_after_create_sticks() {
        let (registry, _rx) = make_registry();
        registry.create().await.unwrap();

        // The advancement task has not been polled yet
        assert!(!registry.toggle().await.unwrap().running);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let snap = registry.read().await.unwrap();
        assert!(!snap.running);
        assert_eq!(snap.elapsed, Duration::ZERO);

        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_cancels_and_frees_slot() {
        let (registry, mut rx) = make_registry();
        let first = registry.create().await.unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        registry.delete().await.unwrap();

        assert!(matches!(registry.read().await, Err(PomoError::NoActiveSession)));
        assert!(matches!(registry.delete().await, Err(PomoError::NoActiveSession)));

        // Let the cancelled task observe the signal
        tokio::time::sleep(Duration::from_millis(10)).await;
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            CoreEvent::SessionEnded { session_id, reason: SessionEndReason::Cancelled }
                if *session_id == first.session_id
        )));

        // A new session can be created right away
        let second = registry.create().await.unwrap();
        assert_ne!(second.session_id, first.session_id);
        assert_eq!(second.work_count, 0);

        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_session_can_be_replaced() {
        let (registry, mut rx) = make_registry();
        let first = registry.create().await.unwrap();

        // A full test session lasts 55 ticks
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(matches!(registry.read().await, Err(PomoError::NoActiveSession)));
        assert!(drain(&mut rx).iter().any(|e| matches!(
            e,
            CoreEvent::SessionEnded { reason: SessionEndReason::Completed, .. }
        )));

        let second = registry.create().await.unwrap();
        assert_ne!(second.session_id, first.session_id);

        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let (registry, mut rx) = make_registry();
        registry.create().await.unwrap();

        registry.shutdown().await;

        assert!(!registry.has_active_session().await);
        assert!(drain(&mut rx).iter().any(|e| matches!(
            e,
            CoreEvent::SessionEnded { reason: SessionEndReason::Cancelled, .. }
        )));
    }
}
