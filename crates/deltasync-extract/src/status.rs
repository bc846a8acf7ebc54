//! Worker status state machine
//!
//! ```text
//! RUNNING ──failure──▶ ERROR
//!    │
//!    └──clean exit──▶ DONE
//! ```
//!
//! Both terminal states are sticky. The cell is a watch channel so a
//! supervisor can poll or await it while the run is in progress.

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkerStatus {
    Running,
    Error,
    Done,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Running => "RUNNING",
            WorkerStatus::Error => "ERROR",
            WorkerStatus::Done => "DONE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerStatus::Running)
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owned by the run; readers hold a [`watch::Receiver`]
#[derive(Debug)]
pub struct StatusCell {
    tx: watch::Sender<WorkerStatus>,
}

impl StatusCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(WorkerStatus::Running);
        Self { tx }
    }

    pub fn get(&self) -> WorkerStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerStatus> {
        self.tx.subscribe()
    }

    /// RUNNING -> ERROR. Returns whether the status changed.
    pub fn mark_error(&self) -> bool {
        self.transition(WorkerStatus::Error)
    }

    /// RUNNING -> DONE. A run that already failed stays ERROR.
    pub fn complete(&self) -> bool {
        self.transition(WorkerStatus::Done)
    }

    fn transition(&self, to: WorkerStatus) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == WorkerStatus::Running {
                *current = to;
                true
            } else {
                false
            }
        })
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}
