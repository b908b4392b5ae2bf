// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the lifecycle of a graph context.
//!
//! This module contains message types for logging events related to:
//! * Context creation and launch
//! * Worker pool start and shutdown
//! * Quiescence and finalization
//! * Completion, failure and abort

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A context was created from a definition.
///
/// # Log Level
/// `debug!` - Context construction detail
pub struct GraphCreated<'a> {
    pub graph: &'a str,
    pub item_collections: usize,
    pub step_collections: usize,
}

impl Display for GraphCreated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Created context for graph '{}': {} item collections, {} step collections",
            self.graph, self.item_collections, self.step_collections
        )
    }
}

impl StructuredLog for GraphCreated<'_> {
    fn log(&self) {
        tracing::debug!(
            graph = self.graph,
            item_collections = self.item_collections,
            step_collections = self.step_collections,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "graph_created",
            span_name = name,
            graph = self.graph,
        )
    }
}

/// The initializer is about to run.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_cncwood::observability::messages::lifecycle::GraphLaunched;
///
/// let msg = GraphLaunched {
///     graph: "SimpleDemand",
///     mode: "single_threaded",
///     workers: 1,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct GraphLaunched<'a> {
    pub graph: &'a str,
    pub mode: &'a str,
    pub workers: usize,
}

impl Display for GraphLaunched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Launching graph '{}' in {} mode with {} workers",
            self.graph, self.mode, self.workers
        )
    }
}

impl StructuredLog for GraphLaunched<'_> {
    fn log(&self) {
        tracing::info!(
            graph = self.graph,
            mode = self.mode,
            workers = self.workers,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "graph",
            span_name = name,
            graph = self.graph,
            mode = self.mode,
            workers = self.workers,
        )
    }
}

/// Worker threads were started.
///
/// # Log Level
/// `debug!` - Scheduler detail
pub struct WorkersStarted<'a> {
    pub graph: &'a str,
    pub workers: usize,
}

impl Display for WorkersStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Started {} workers for graph '{}'", self.workers, self.graph)
    }
}

impl StructuredLog for WorkersStarted<'_> {
    fn log(&self) {
        tracing::debug!(graph = self.graph, workers = self.workers, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "workers",
            span_name = name,
            graph = self.graph,
            workers = self.workers,
        )
    }
}

/// Worker threads were stopped and joined.
///
/// # Log Level
/// `debug!` - Scheduler detail
pub struct WorkersJoined<'a> {
    pub graph: &'a str,
    pub workers: usize,
}

impl Display for WorkersJoined<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Joined {} workers of graph '{}'", self.workers, self.graph)
    }
}

impl StructuredLog for WorkersJoined<'_> {
    fn log(&self) {
        tracing::debug!(graph = self.graph, workers = self.workers, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("workers_joined", span_name = name, graph = self.graph)
    }
}

/// No step is ready or running.
///
/// # Log Level
/// `debug!` - Lifecycle detail
pub struct QuiescenceReached<'a> {
    pub graph: &'a str,
    pub completed: u64,
    pub waiting: usize,
}

impl Display for QuiescenceReached<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph '{}' reached quiescence: {} steps completed, {} still waiting",
            self.graph, self.completed, self.waiting
        )
    }
}

impl StructuredLog for QuiescenceReached<'_> {
    fn log(&self) {
        tracing::debug!(
            graph = self.graph,
            completed = self.completed,
            waiting = self.waiting,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("quiescence", span_name = name, graph = self.graph)
    }
}

/// The finalizer is about to run.
///
/// # Log Level
/// `debug!` - Lifecycle detail
pub struct FinalizerInvoked<'a> {
    pub graph: &'a str,
    pub finalizer: &'a str,
    pub inputs: usize,
}

impl Display for FinalizerInvoked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Running {} of graph '{}' with {} inputs",
            self.finalizer, self.graph, self.inputs
        )
    }
}

impl StructuredLog for FinalizerInvoked<'_> {
    fn log(&self) {
        tracing::debug!(
            graph = self.graph,
            finalizer = self.finalizer,
            inputs = self.inputs,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "finalizer",
            span_name = name,
            graph = self.graph,
            finalizer = self.finalizer,
        )
    }
}

/// The graph finished and its finalizer returned.
///
/// # Log Level
/// `info!` - Important operational event
pub struct GraphCompleted<'a> {
    pub graph: &'a str,
    pub steps_completed: u64,
    pub items_put: u64,
    pub duration: Duration,
}

impl Display for GraphCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph '{}' completed: {} steps, {} items in {:?}",
            self.graph, self.steps_completed, self.items_put, self.duration
        )
    }
}

impl StructuredLog for GraphCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            graph = self.graph,
            steps_completed = self.steps_completed,
            items_put = self.items_put,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "graph_completed",
            span_name = name,
            graph = self.graph,
            duration = ?self.duration,
        )
    }
}

/// The graph failed.
///
/// # Log Level
/// `error!` - Fatal runtime error, with the lifecycle phase it was seen in
pub struct GraphFailed<'a> {
    pub graph: &'a str,
    pub phase: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for GraphFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph '{}' failed during {}: {}",
            self.graph, self.phase, self.error
        )
    }
}

impl StructuredLog for GraphFailed<'_> {
    fn log(&self) {
        tracing::error!(
            graph = self.graph,
            phase = self.phase,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "graph_failed",
            span_name = name,
            graph = self.graph,
            phase = self.phase,
        )
    }
}

/// The graph was aborted before it finished.
///
/// # Log Level
/// `warn!` - Requested termination
pub struct GraphAborted<'a> {
    pub graph: &'a str,
    pub reason: &'a str,
}

impl Display for GraphAborted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Graph '{}' aborted: {}", self.graph, self.reason)
    }
}

impl StructuredLog for GraphAborted<'_> {
    fn log(&self) {
        tracing::warn!(graph = self.graph, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("graph_aborted", span_name = name, graph = self.graph)
    }
}
