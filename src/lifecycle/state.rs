//! Run state machine.
//!
//! ```text
//! Created → Registering → Running → Draining → Stopped
//!                 └──────────────────↗
//! ```
//! Startup failures go Registering → Draining; nothing reaches Stopped without Draining.

use std::fmt;

use tokio::sync::watch;

use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RunState {
    Created = 0,
    Registering = 1,
    Running = 2,
    Draining = 3,
    Stopped = 4,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Created, Registering)
                | (Registering, Running)
                | (Registering, Draining)
                | (Running, Draining)
                | (Draining, Stopped)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Created => "created",
            RunState::Registering => "registering",
            RunState::Running => "running",
            RunState::Draining => "draining",
            RunState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Shared, observable run state.
#[derive(Debug)]
pub struct StateCell {
    tx: watch::Sender<RunState>,
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(RunState::Created);
        Self { tx }
    }

    pub fn current(&self) -> RunState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.tx.subscribe()
    }

    /// Move to `next` if the transition is allowed. Returns whether it happened.
    pub fn transition(&self, next: RunState) -> bool {
        let mut from = None;
        let changed = self.tx.send_if_modified(|current| {
            if current.can_transition_to(next) {
                from = Some(*current);
                *current = next;
                true
            } else {
                false
            }
        });

        if changed {
            tracing::debug!(from = ?from, to = %next, "Run state changed");
            metrics::record_run_state(next);
        } else {
            tracing::warn!(current = %self.current(), requested = %next, "Rejected run state transition");
        }
        changed
    }
}
