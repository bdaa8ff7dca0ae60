//! Identity and Created → Running → Stopped lifecycle shared by producers and consumers

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use tokio_util::sync::CancellationToken;

/// Unique participant identifier (UUID v7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Last 8 hex chars; the random tail, unlike the timestamp prefix
    pub fn short(&self) -> String {
        let simple = self.0.simple().to_string();
        simple[simple.len() - 8..].to_string()
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of the queue a participant works
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Producer,
    Consumer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Producer => write!(f, "producer"),
            Role::Consumer => write!(f, "consumer"),
        }
    }
}

/// Lifecycle state; Stopped is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    Created,
    Running,
    Stopped,
}

/// Returned by a participant's task when it exits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantReport {
    pub id: ParticipantId,
    pub role: Role,
    /// Values enqueued (producer) or dequeued (consumer)
    pub processed: u64,
}

enum Slot {
    Created,
    Running(JoinHandle<ParticipantReport>),
    Stopped(Option<JoinHandle<ParticipantReport>>),
}

/// Owns the single background task of a participant
pub(crate) struct Lifecycle {
    id: ParticipantId,
    role: Role,
    stop: CancellationToken,
    slot: Mutex<Slot>,
}

impl Lifecycle {
    /// `parent` is the session-wide signal; stopping this participant never cancels it
    pub(crate) fn new(role: Role, parent: Option<&CancellationToken>) -> Self {
        let id = ParticipantId::new();
        debug!(%id, %role, "Lifecycle::new: called");
        Self {
            id,
            role,
            stop: parent.map(CancellationToken::child_token).unwrap_or_default(),
            slot: Mutex::new(Slot::Created),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn id(&self) -> ParticipantId {
        self.id
    }

    /// Spawn the task built by `make_task`; false unless Created with its signal unfired
    pub(crate) fn launch<F, Fut>(&self, make_task: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ParticipantReport> + Send + 'static,
    {
        debug!(id = %self.id, role = %self.role, "Lifecycle::launch: called");
        let mut slot = self.slot();

        if !matches!(*slot, Slot::Created) {
            debug!(id = %self.id, "Lifecycle::launch: already started, rejecting");
            return false;
        }

        if self.stop.is_cancelled() {
            debug!(id = %self.id, "Lifecycle::launch: signal already fired, rejecting");
            *slot = Slot::Stopped(None);
            return false;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(id = %self.id, role = %self.role, error = %e, "Cannot start outside a tokio runtime");
                return false;
            }
        };

        *slot = Slot::Running(runtime.spawn(make_task(self.stop.clone())));
        info!(id = %self.id, role = %self.role, "Participant started");
        true
    }

    pub(crate) fn state(&self) -> ParticipantState {
        match &*self.slot() {
            Slot::Created if !self.stop.is_cancelled() => ParticipantState::Created,
            Slot::Running(handle) if !handle.is_finished() && !self.stop.is_cancelled() => ParticipantState::Running,
            Slot::Created | Slot::Running(_) | Slot::Stopped(_) => ParticipantState::Stopped,
        }
    }

    /// Request the task to exit; idempotent
    pub(crate) fn stop(&self) {
        debug!(id = %self.id, role = %self.role, "Lifecycle::stop: called");
        self.stop.cancel();

        let mut slot = self.slot();
        *slot = match std::mem::replace(&mut *slot, Slot::Stopped(None)) {
            Slot::Created => Slot::Stopped(None),
            Slot::Running(handle) => {
                info!(id = %self.id, role = %self.role, "Participant stop requested");
                Slot::Stopped(Some(handle))
            }
            stopped @ Slot::Stopped(_) => stopped,
        };
    }

    /// Wait for the task to exit
    ///
    /// Returns `None` if the task was never started, was already joined, or
    /// panicked. Joining a participant that was not stopped waits until its
    /// cancellation signal fires.
    pub(crate) async fn join(&self) -> Option<ParticipantReport> {
        debug!(id = %self.id, role = %self.role, "Lifecycle::join: called");
        let handle = {
            let mut slot = self.slot();
            match std::mem::replace(&mut *slot, Slot::Stopped(None)) {
                Slot::Created => {
                    *slot = Slot::Created;
                    None
                }
                Slot::Running(handle) | Slot::Stopped(Some(handle)) => Some(handle),
                Slot::Stopped(None) => None,
            }
        }?;

        match handle.await {
            Ok(report) => {
                info!(id = %report.id, role = %report.role, processed = report.processed, "Participant stopped");
                Some(report)
            }
            Err(e) => {
                error!(id = %self.id, role = %self.role, error = %e, "Participant task panicked");
                None
            }
        }
    }
}

impl Drop for Lifecycle {
    // A dropped participant must not leave an orphaned task mutating the queue.
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
