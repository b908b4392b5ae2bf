// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Graph contexts and their lifecycle.
//!
//! A context is one execution of a graph definition:
//!
//! ```text
//! create -> launch(args) -> [steps run] -> quiescence -> finalizer -> teardown
//! ```
//!
//! `launch` runs the initializer on the caller's thread and starts the
//! workers. `shutdown_on_finish` (or `finish`) blocks until the graph is
//! quiescent, failed or aborted, stops the workers, runs the finalizer on
//! the calling thread and reclaims every item.

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::config::{default_workers, ExecutionMode};
use crate::engine::lifecycle::Phase;
use crate::engine::report::RunReport;
use crate::engine::runtime::GraphRuntime;
use crate::engine::scheduler::{drain_inline, WorkerPool};
use crate::errors::RuntimeError;
use crate::graph::definition::FINALIZER_NAME;
use crate::graph::{GraphDefinition, ItemCollection, StepCollection, Tag};
use crate::observability::messages::lifecycle::{
    GraphAborted, GraphCompleted, GraphCreated, GraphFailed, GraphLaunched,
};
use crate::observability::messages::StructuredLog;
use crate::store::ItemLookup;
use crate::traits::Initializer;

/// Origin label of outputs produced by the initializer.
const INITIALIZER: &str = "initializer";
/// Origin label of outputs produced through a `GraphHandle`.
const ENVIRONMENT: &str = "environment";

/// Execution options of one context.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub mode: ExecutionMode,
    /// Worker threads in parallel mode. Ignored in single-threaded mode.
    pub workers: usize,
    /// Prescribe declared producers of absent inputs on demand.
    pub auto_prescribe: bool,
    /// Upper bound for `StepContext::item_alloc`.
    pub max_item_bytes: Option<usize>,
    /// External cancellation; cancelling it aborts the graph.
    pub cancellation: Option<CancellationToken>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Parallel,
            workers: default_workers(),
            auto_prescribe: true,
            max_item_bytes: None,
            cancellation: None,
        }
    }
}

impl ContextOptions {
    pub fn single_threaded() -> Self {
        Self {
            mode: ExecutionMode::SingleThreaded,
            workers: 1,
            ..Self::default()
        }
    }

    pub fn parallel(workers: usize) -> Self {
        Self {
            mode: ExecutionMode::Parallel,
            workers,
            ..Self::default()
        }
    }

    pub fn with_auto_prescribe(mut self, enabled: bool) -> Self {
        self.auto_prescribe = enabled;
        self
    }

    pub fn with_max_item_bytes(mut self, limit: usize) -> Self {
        self.max_item_bytes = Some(limit);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Number of threads that execute steps.
    pub fn effective_workers(&self) -> usize {
        match self.mode {
            ExecutionMode::SingleThreaded => 1,
            ExecutionMode::Parallel => self.workers.max(1),
        }
    }
}

/// Result of a finished context together with its statistics.
#[derive(Debug)]
pub struct GraphRun<R> {
    pub result: Result<R, RuntimeError>,
    pub report: RunReport,
}

/// One execution of a graph definition.
pub struct GraphContext<A, R> {
    runtime: Arc<GraphRuntime>,
    initializer: Arc<dyn Initializer<A>>,
    pool: Option<WorkerPool>,
    started: Option<Instant>,
    _result: PhantomData<fn() -> R>,
}

impl<A: Send + 'static, R: Send + 'static> GraphContext<A, R> {
    /// Create a context with default options.
    pub fn create(definition: &GraphDefinition<A, R>) -> Self {
        Self::create_with(definition, ContextOptions::default())
    }

    pub fn create_with(definition: &GraphDefinition<A, R>, options: ContextOptions) -> Self {
        let runtime = Arc::new(GraphRuntime::new(definition.shape.clone(), options));
        GraphCreated {
            graph: runtime.name(),
            item_collections: definition.shape.items.len(),
            step_collections: definition.shape.steps.len(),
        }
        .log();
        Self {
            runtime,
            initializer: definition.initializer.clone(),
            pool: None,
            started: None,
            _result: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.runtime.name()
    }

    pub fn phase(&self) -> Phase {
        self.runtime.lifecycle().phase()
    }

    /// Handle for putting items and prescribing steps from outside the graph.
    pub fn handle(&self) -> GraphHandle {
        GraphHandle {
            runtime: self.runtime.clone(),
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            runtime: self.runtime.clone(),
        }
    }

    /// Run the initializer with `args`, commit its outputs and start the
    /// workers. Returns the initializer's error, if any; the graph is then
    /// already failed and `finish` reports the same error.
    pub fn launch(&mut self, args: A) -> Result<(), RuntimeError> {
        let runtime = self.runtime.clone();
        runtime.lifecycle().begin_launch()?;
        self.started = Some(Instant::now());
        let workers = runtime.options().effective_workers();
        GraphLaunched {
            graph: runtime.name(),
            mode: runtime.options().mode.as_str(),
            workers,
        }
        .log();

        // Launch guard: the graph cannot look quiescent before the
        // initializer's outputs are committed.
        runtime.queue().add_in_flight(1);
        let initializer = self.initializer.clone();
        let result = runtime.apply_external(INITIALIZER, move |ctx| {
            initializer
                .initialize(args, ctx)
                .map_err(|err| err.into_runtime(INITIALIZER))
        });
        runtime.lifecycle().set_phase(Phase::Running);

        let started = if runtime.is_single_threaded() {
            Ok(())
        } else {
            WorkerPool::start(runtime.clone(), workers).map(|pool| self.pool = Some(pool))
        };
        if let Err(err) = &started {
            runtime.fail(err.clone());
        }
        runtime.finish_one();
        result.and(started)
    }

    /// Wait for the graph to finish and return the finalizer's result.
    pub fn shutdown_on_finish(self) -> Result<R, RuntimeError> {
        self.finish().result
    }

    /// Wait for the graph to finish and return the result with run
    /// statistics.
    pub fn finish(mut self) -> GraphRun<R> {
        let runtime = self.runtime.clone();
        let started = self.started.unwrap_or_else(Instant::now);
        let outcome = if runtime.lifecycle().phase() == Phase::Created {
            Err(RuntimeError::internal("shutdown requested before launch"))
        } else {
            self.settle_and_conclude()
        };
        runtime.teardown();

        let duration = started.elapsed();
        let report = runtime.report(&outcome, runtime.options().effective_workers(), duration);
        let result = outcome.and_then(|value| {
            value
                .downcast::<R>()
                .map(|value| *value)
                .map_err(|_| RuntimeError::TypeMismatch {
                    collection: FINALIZER_NAME.to_string(),
                    expected: type_name::<R>(),
                })
        });
        self.record_outcome(&result, &report, duration);
        GraphRun { result, report }
    }

    /// `shutdown_on_finish` on tokio's blocking pool.
    pub async fn shutdown_on_finish_async(self) -> Result<R, RuntimeError> {
        self.finish_async().await.result
    }

    /// `finish` on tokio's blocking pool.
    pub async fn finish_async(self) -> GraphRun<R> {
        let runtime = self.runtime.clone();
        match tokio::task::spawn_blocking(move || self.finish()).await {
            Ok(run) => run,
            Err(err) => {
                let error = RuntimeError::internal(format!("controller task failed: {}", err));
                let report = runtime.report(
                    &Err(error.clone()),
                    runtime.options().effective_workers(),
                    Duration::ZERO,
                );
                GraphRun {
                    result: Err(error),
                    report,
                }
            }
        }
    }

    fn settle_and_conclude(&mut self) -> Result<Box<dyn std::any::Any + Send>, RuntimeError> {
        let runtime = self.runtime.clone();
        let single = runtime.is_single_threaded();
        runtime.lifecycle().settle(
            runtime.queue(),
            || runtime.cancellation().is_cancelled(),
            || {
                if single {
                    drain_inline(&runtime);
                }
            },
        );
        match self.pool.take() {
            Some(pool) => pool.stop_and_join(&runtime),
            None => runtime.queue().stop(),
        }
        runtime.conclude()
    }

    fn record_outcome(&self, result: &Result<R, RuntimeError>, report: &RunReport, duration: Duration) {
        let runtime = &self.runtime;
        match result {
            Ok(_) => {
                runtime.lifecycle().set_phase(Phase::Finished);
                GraphCompleted {
                    graph: runtime.name(),
                    steps_completed: report.steps_completed,
                    items_put: report.items_put,
                    duration,
                }
                .log();
            }
            Err(RuntimeError::Cancelled { reason }) => {
                if runtime.lifecycle().abort_reason().is_none() {
                    GraphAborted {
                        graph: runtime.name(),
                        reason,
                    }
                    .log();
                }
                runtime.lifecycle().set_phase(Phase::Aborted);
            }
            Err(err) => {
                if runtime.lifecycle().failure().is_none() {
                    GraphFailed {
                        graph: runtime.name(),
                        phase: Phase::Finalizing.as_str(),
                        error: err,
                    }
                    .log();
                }
                runtime.lifecycle().set_phase(Phase::Failed);
            }
        }
    }
}

impl<A, R> Drop for GraphContext<A, R> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            self.runtime.abort("context dropped before shutdown");
            pool.stop_and_join(&self.runtime);
        }
        self.runtime.teardown();
    }
}

impl<A, R> std::fmt::Debug for GraphContext<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphContext")
            .field("graph", &self.runtime.name())
            .field("phase", &self.runtime.lifecycle().phase())
            .field("workers", &self.pool.as_ref().map(WorkerPool::len))
            .finish()
    }
}

/// Access to a running graph from outside its steps.
///
/// Puts and prescriptions are committed immediately. Once the controller
/// starts finalizing they fail with `GraphClosed`.
#[derive(Clone)]
pub struct GraphHandle {
    runtime: Arc<GraphRuntime>,
}

impl GraphHandle {
    pub fn graph_name(&self) -> &str {
        self.runtime.name()
    }

    pub fn put<K: Tag, V: Send + Sync + 'static>(
        &self,
        items: &ItemCollection<K, V>,
        tag: K,
        value: impl Into<Arc<V>>,
    ) -> Result<(), RuntimeError> {
        self.external("put", |ctx| ctx.put(items, tag, value))
    }

    pub fn prescribe<K: Tag>(&self, step: &StepCollection<K>, tag: K) -> Result<(), RuntimeError> {
        self.external("prescribe", |ctx| ctx.prescribe(step, tag))
    }

    pub fn is_prescribed<K: Tag>(&self, step: &StepCollection<K>, tag: &K) -> Result<bool, RuntimeError> {
        Ok(self.runtime.step_table::<K>(step.id())?.is_prescribed(tag))
    }

    /// Non-blocking read of `items[tag]`.
    pub fn get<K: Tag, V: Send + Sync + 'static>(
        &self,
        items: &ItemCollection<K, V>,
        tag: &K,
    ) -> Result<ItemLookup<V>, RuntimeError> {
        Ok(self.runtime.store().table::<K, V>(items.id())?.get(tag))
    }

    fn external(
        &self,
        operation: &str,
        f: impl FnOnce(&mut crate::engine::StepContext<'_>) -> Result<(), RuntimeError>,
    ) -> Result<(), RuntimeError> {
        self.runtime.lifecycle().admit(operation, self.runtime.queue())?;
        let result = self.runtime.apply_external(ENVIRONMENT, f);
        self.runtime.finish_one();
        result
    }
}

impl std::fmt::Debug for GraphHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphHandle")
            .field("graph", &self.runtime.name())
            .finish()
    }
}

/// Cancels a running graph. Pending steps are discarded, the finalizer is
/// skipped and the result is `RuntimeError::Cancelled`.
#[derive(Clone)]
pub struct AbortHandle {
    runtime: Arc<GraphRuntime>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.abort_with("aborted by request");
    }

    pub fn abort_with(&self, reason: &str) {
        self.runtime.abort(reason);
    }

    pub fn is_aborted(&self) -> bool {
        self.runtime.cancellation().is_cancelled()
    }
}

impl std::fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortHandle")
            .field("graph", &self.runtime.name())
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
