// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::engine::scheduler::ReadyQueue;
use crate::errors::RuntimeError;
use crate::utils::sync::lock;

/// How often the controller re-checks for cancellation while it waits.
const SETTLE_POLL: Duration = Duration::from_millis(5);

/// Lifecycle phase of a graph context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Created,
    Launching,
    Running,
    Finalizing,
    Finished,
    Failed,
    Aborted,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::Launching => "launching",
            Phase::Running => "running",
            Phase::Finalizing => "finalizing",
            Phase::Finished => "finished",
            Phase::Failed => "failed",
            Phase::Aborted => "aborted",
        }
    }

    /// Whether environment puts and prescriptions are still accepted.
    fn accepts_work(&self) -> bool {
        matches!(self, Phase::Launching | Phase::Running)
    }
}

struct LifecycleState {
    phase: Phase,
    failure: Option<(RuntimeError, Phase)>,
    abort_reason: Option<String>,
}

pub(crate) struct Lifecycle {
    state: Mutex<LifecycleState>,
    changed: Condvar,
    halted: AtomicBool,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState {
                phase: Phase::Created,
                failure: None,
                abort_reason: None,
            }),
            changed: Condvar::new(),
            halted: AtomicBool::new(false),
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        lock(&self.state).phase
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        lock(&self.state).phase = phase;
        self.changed.notify_all();
    }

    pub(crate) fn begin_launch(&self) -> Result<(), RuntimeError> {
        let mut state = lock(&self.state);
        if state.phase != Phase::Created {
            return Err(RuntimeError::internal(format!(
                "launch called while {}",
                state.phase.as_str()
            )));
        }
        state.phase = Phase::Launching;
        Ok(())
    }

    /// Record a fatal error. Only the first one is kept; returns the phase
    /// it was observed in if this call recorded it.
    pub(crate) fn record_failure(&self, error: RuntimeError) -> Option<Phase> {
        let recorded = {
            let mut state = lock(&self.state);
            if state.failure.is_some() {
                None
            } else {
                let phase = state.phase;
                state.failure = Some((error, phase));
                Some(phase)
            }
        };
        self.halted.store(true, Ordering::Release);
        self.changed.notify_all();
        recorded
    }

    /// Request an abort. Returns false if one was already requested.
    pub(crate) fn request_abort(&self, reason: &str) -> bool {
        let first = {
            let mut state = lock(&self.state);
            if state.abort_reason.is_some() {
                false
            } else {
                state.abort_reason = Some(reason.to_string());
                true
            }
        };
        self.halted.store(true, Ordering::Release);
        self.changed.notify_all();
        first
    }

    pub(crate) fn failure(&self) -> Option<RuntimeError> {
        lock(&self.state).failure.as_ref().map(|(err, _)| err.clone())
    }

    pub(crate) fn abort_reason(&self) -> Option<String> {
        lock(&self.state).abort_reason.clone()
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    pub(crate) fn notify(&self) {
        let _state = lock(&self.state);
        self.changed.notify_all();
    }

    /// Count one environment operation in flight, unless the graph stopped
    /// accepting work.
    pub(crate) fn admit(&self, operation: &str, queue: &ReadyQueue) -> Result<(), RuntimeError> {
        let state = lock(&self.state);
        if !state.phase.accepts_work() || self.is_halted() {
            return Err(RuntimeError::GraphClosed {
                operation: operation.to_string(),
            });
        }
        queue.add_in_flight(1);
        Ok(())
    }

    /// Block until nothing is in flight or the graph halted, then move to
    /// `Finalizing`. `between` runs before every check; single-threaded
    /// contexts use it to execute queued steps on this thread.
    pub(crate) fn settle(
        &self,
        queue: &ReadyQueue,
        cancelled: impl Fn() -> bool,
        mut between: impl FnMut(),
    ) {
        loop {
            between();
            let mut state = lock(&self.state);
            if queue.in_flight() == 0 || self.is_halted() || cancelled() {
                state.phase = Phase::Finalizing;
                return;
            }
            let _ = self
                .changed
                .wait_timeout(state, SETTLE_POLL)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}
