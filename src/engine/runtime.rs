// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The shared state of one running graph.
//!
//! `GraphRuntime` is not generic: the finalizer's result is carried as
//! `Box<dyn Any + Send>` and recovered by the typed `GraphContext`. Workers,
//! environment handles and the controller all hold it through an `Arc`.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::config::ExecutionMode;
use crate::engine::context::ContextOptions;
use crate::engine::lifecycle::{Lifecycle, Phase};
use crate::engine::registry::{
    ErasedStepTable, InstanceKind, InstanceState, Prescription, StepInstance, StepTable,
};
use crate::engine::report::RunReport;
use crate::engine::scheduler::ReadyQueue;
use crate::engine::step_context::Staged;
use crate::engine::tracker::DependenceTracker;
use crate::engine::{StepContext, StepInputs};
use crate::errors::RuntimeError;
use crate::graph::definition::GraphShape;
use crate::graph::tag::AnyTag;
use crate::graph::{StepId, Tag};
use crate::observability::messages::lifecycle::{
    FinalizerInvoked, GraphAborted, GraphFailed, QuiescenceReached,
};
use crate::observability::messages::step::{StepCompleted, StepDemanded, StepPrescribed, StepStarted};
use crate::observability::messages::StructuredLog;
use crate::store::{Demand, ItemStore};
use crate::utils::sync::{guarded, lock};

/// A prescription waiting to be applied.
struct PendingPrescription {
    step: StepId,
    tag: AnyTag,
    /// Label of the absent item that caused a demand prescription.
    demanded_by: Option<String>,
}

#[derive(Default)]
struct RunStats {
    prescribed: AtomicU64,
    demanded: AtomicU64,
    completed: AtomicU64,
}

pub(crate) struct GraphRuntime {
    shape: Arc<GraphShape>,
    options: ContextOptions,
    store: ItemStore,
    steps: Vec<Box<dyn ErasedStepTable>>,
    finalizer: Mutex<Option<Arc<StepInstance>>>,
    queue: ReadyQueue,
    lifecycle: Lifecycle,
    cancel: CancellationToken,
    stats: RunStats,
}

impl GraphRuntime {
    pub(crate) fn new(shape: Arc<GraphShape>, options: ContextOptions) -> Self {
        let store = ItemStore::new(&shape.items);
        let steps = shape
            .steps
            .iter()
            .map(|spec| spec.clone().instantiate())
            .collect();
        let cancel = options.cancellation.clone().unwrap_or_default();
        Self {
            shape,
            options,
            store,
            steps,
            finalizer: Mutex::new(None),
            queue: ReadyQueue::new(),
            lifecycle: Lifecycle::new(),
            cancel,
            stats: RunStats::default(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.shape.name
    }

    pub(crate) fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub(crate) fn store(&self) -> &ItemStore {
        &self.store
    }

    pub(crate) fn queue(&self) -> &ReadyQueue {
        &self.queue
    }

    pub(crate) fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub(crate) fn step_table<K: Tag>(&self, id: StepId) -> Result<&StepTable<K>, RuntimeError> {
        let erased = self.erased_step(id)?;
        erased
            .as_any()
            .downcast_ref::<StepTable<K>>()
            .ok_or_else(|| RuntimeError::TypeMismatch {
                collection: erased.name().to_string(),
                expected: std::any::type_name::<K>(),
            })
    }

    fn erased_step(&self, id: StepId) -> Result<&dyn ErasedStepTable, RuntimeError> {
        self.steps
            .get(id.index())
            .map(|table| table.as_ref())
            .ok_or_else(|| RuntimeError::internal(format!("unknown step collection #{}", id.index())))
    }

    pub(crate) fn finalizer_accepts(&self, tag: &dyn Any) -> bool {
        self.shape.finalizer.accepts(tag)
    }

    pub(crate) fn finalizer_tag_type(&self) -> &'static str {
        self.shape.finalizer.tag_type()
    }

    pub(crate) fn finalizer_registered(&self) -> bool {
        lock(&self.finalizer).is_some()
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.lifecycle.is_halted() || self.cancel.is_cancelled()
    }

    /// Apply staged outputs: puts, then prescriptions, then the await.
    /// Returns the instances that became ready, already counted in flight.
    pub(crate) fn commit(&self, staged: Staged) -> Result<Vec<Arc<StepInstance>>, RuntimeError> {
        let mut ready = Vec::new();
        for put in staged.puts {
            let waiters = put.apply(&self.store)?;
            ready.extend(DependenceTracker::notify(waiters));
        }

        let mut worklist: VecDeque<PendingPrescription> = staged
            .prescriptions
            .into_iter()
            .map(|(step, tag)| PendingPrescription {
                step,
                tag,
                demanded_by: None,
            })
            .collect();
        self.drain_worklist(&mut worklist, &mut ready)?;

        if let Some(tag) = staged.awaited {
            self.register_finalizer(tag, &mut worklist)?;
            self.drain_worklist(&mut worklist, &mut ready)?;
        }

        self.queue.add_in_flight(ready.len());
        Ok(ready)
    }

    /// Prescribe everything on the worklist, including the producers that
    /// new subscriptions demand. Iterative, so demand chains of any length
    /// use constant stack.
    fn drain_worklist(
        &self,
        worklist: &mut VecDeque<PendingPrescription>,
        ready: &mut Vec<Arc<StepInstance>>,
    ) -> Result<(), RuntimeError> {
        while let Some(pending) = worklist.pop_front() {
            let table = self.erased_step(pending.step)?;
            let instance = match table.prescribe_any(pending.tag)? {
                Prescription::Created(instance) => instance,
                Prescription::Existing => continue,
            };
            self.stats.prescribed.fetch_add(1, Ordering::Relaxed);
            if let Some(item) = &pending.demanded_by {
                self.stats.demanded.fetch_add(1, Ordering::Relaxed);
                StepDemanded {
                    step: instance.label(),
                    item,
                }
                .log();
            }

            let inputs = table.dependencies(&instance, &self.store)?;
            StepPrescribed {
                step: instance.label(),
                inputs: inputs.len(),
            }
            .log();
            let registration = DependenceTracker::register(&self.store, &instance, inputs)?;
            if registration.ready {
                ready.push(instance);
            }
            self.queue_demands(registration.demands, worklist);
        }
        Ok(())
    }

    fn queue_demands(
        &self,
        demands: Vec<(Demand, String)>,
        worklist: &mut VecDeque<PendingPrescription>,
    ) {
        if !self.options.auto_prescribe {
            return;
        }
        worklist.extend(demands.into_iter().map(|(demand, item)| PendingPrescription {
            step: demand.step,
            tag: demand.tag,
            demanded_by: Some(item),
        }));
    }

    fn register_finalizer(
        &self,
        tag: AnyTag,
        worklist: &mut VecDeque<PendingPrescription>,
    ) -> Result<(), RuntimeError> {
        let mut slot = lock(&self.finalizer);
        if slot.is_some() {
            return Err(RuntimeError::DuplicateAwait {
                graph: self.name().to_string(),
            });
        }
        let label = self.shape.finalizer.label(tag.as_ref());
        let instance = Arc::new(StepInstance::new(InstanceKind::Finalizer, label, tag));
        let inputs = self.shape.finalizer.dependencies(instance.tag(), &self.store)?;
        let registration = DependenceTracker::register(&self.store, &instance, inputs)?;
        *slot = Some(instance);
        drop(slot);
        self.queue_demands(registration.demands, worklist);
        Ok(())
    }

    /// Run one ready instance and commit its outputs. Errors fail the
    /// graph; the returned instances are the ones it made ready.
    ///
    /// Graph-author callbacks also run during the commit; a panic anywhere
    /// in here is reported as `StepPanicked` for this instance.
    pub(crate) fn execute(&self, instance: Arc<StepInstance>) -> Vec<Arc<StepInstance>> {
        if self.is_halted() {
            return Vec::new();
        }
        match guarded(instance.label(), || self.try_execute(&instance)) {
            Ok(ready) => ready,
            Err(err) => {
                self.fail(err);
                Vec::new()
            }
        }
    }

    fn try_execute(&self, instance: &Arc<StepInstance>) -> Result<Vec<Arc<StepInstance>>, RuntimeError> {
        let InstanceKind::Step(step) = instance.kind() else {
            return Err(RuntimeError::internal("finalizer dispatched as a step"));
        };
        if !instance.advance(InstanceState::Ready, InstanceState::Running) {
            return Err(RuntimeError::internal(format!(
                "{} dispatched twice",
                instance.label()
            )));
        }
        let table = self.erased_step(step)?;
        let inputs = StepInputs::resolve(&self.store, instance.label(), instance.inputs())?;

        let started = StepStarted {
            step: instance.label(),
            inputs: inputs.len(),
        };
        let span = started.span("step");
        let _guard = span.enter();
        started.log();
        let start = Instant::now();

        let mut ctx = StepContext::new(self, instance.label());
        table
            .run(instance, &inputs, &mut ctx)
            .map_err(|err| err.into_runtime(instance.label()))?;
        if let Some(item) = table.missing_output(instance, &ctx) {
            return Err(RuntimeError::MissingOutput {
                step: instance.label().to_string(),
                item,
            });
        }

        let puts = ctx.staged_puts();
        let prescriptions = ctx.staged_prescriptions();
        let ready = self.commit(ctx.into_staged())?;

        drop(inputs);
        instance.advance(InstanceState::Running, InstanceState::Complete);
        DependenceTracker::complete(&self.store, instance);
        self.stats.completed.fetch_add(1, Ordering::Relaxed);
        StepCompleted {
            step: instance.label(),
            puts,
            prescriptions,
            duration: start.elapsed(),
        }
        .log();
        Ok(ready)
    }

    /// Apply an operation from outside the graph (the initializer or a
    /// `GraphHandle`) and queue whatever it made ready.
    pub(crate) fn apply_external<T>(
        &self,
        origin: &str,
        operation: impl FnOnce(&mut StepContext<'_>) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        let result = guarded(origin, || {
            let mut ctx = StepContext::new(self, origin);
            let value = operation(&mut ctx)?;
            let ready = self.commit(ctx.into_staged())?;
            self.queue.push(ready);
            Ok(value)
        });
        if let Err(err) = &result {
            self.fail(err.clone());
        }
        result
    }

    /// Release one unit of in-flight work, waking the controller when
    /// nothing is left.
    pub(crate) fn finish_one(&self) {
        if self.queue.complete_one() {
            self.lifecycle.notify();
        }
    }

    /// Record a fatal error and stop accepting work.
    pub(crate) fn fail(&self, error: RuntimeError) {
        if let Some(phase) = self.lifecycle.record_failure(error.clone()) {
            GraphFailed {
                graph: self.name(),
                phase: phase.as_str(),
                error: &error,
            }
            .log();
        }
    }

    /// Request cancellation of the graph.
    pub(crate) fn abort(&self, reason: &str) {
        if self.lifecycle.request_abort(reason) {
            GraphAborted {
                graph: self.name(),
                reason,
            }
            .log();
        }
        self.cancel.cancel();
    }

    /// Decide the outcome once the graph settled and all workers stopped:
    /// the first failure, cancellation, deadlock, or the finalizer's result.
    pub(crate) fn conclude(&self) -> Result<Box<dyn Any + Send>, RuntimeError> {
        guarded(self.name(), || self.try_conclude())
    }

    fn try_conclude(&self) -> Result<Box<dyn Any + Send>, RuntimeError> {
        if let Some(err) = self.lifecycle.failure() {
            return Err(err);
        }
        if self.is_halted() {
            let reason = self
                .lifecycle
                .abort_reason()
                .unwrap_or_else(|| "cancellation requested".to_string());
            return Err(RuntimeError::Cancelled { reason });
        }

        let waiting: Vec<Arc<StepInstance>> =
            self.steps.iter().flat_map(|table| table.waiting()).collect();
        QuiescenceReached {
            graph: self.name(),
            completed: self.stats.completed.load(Ordering::Relaxed),
            waiting: waiting.len(),
        }
        .log();

        let finalizer = lock(&self.finalizer).clone();
        if !waiting.is_empty() {
            return Err(self.stalled(&waiting, finalizer.as_ref()));
        }
        let Some(finalizer) = finalizer else {
            return Err(RuntimeError::FinalizerNotAwaited {
                graph: self.name().to_string(),
            });
        };
        if finalizer.pending() > 0 {
            return Err(self.stalled(&[], Some(&finalizer)));
        }
        self.run_finalizer(&finalizer)
    }

    fn run_finalizer(&self, finalizer: &StepInstance) -> Result<Box<dyn Any + Send>, RuntimeError> {
        let inputs = StepInputs::resolve(&self.store, finalizer.label(), finalizer.inputs())?;
        let invoked = FinalizerInvoked {
            graph: self.name(),
            finalizer: finalizer.label(),
            inputs: inputs.len(),
        };
        let span = invoked.span("finalizer");
        let _guard = span.enter();
        invoked.log();

        let outcome = guarded(finalizer.label(), || {
            self.shape
                .finalizer
                .run(finalizer.tag(), &inputs)
                .map_err(|err| err.into_runtime(finalizer.label()))
        });
        drop(inputs);
        DependenceTracker::complete(&self.store, finalizer);
        outcome
    }

    /// Diagnose a quiescent graph whose waiting instances can never run.
    fn stalled(
        &self,
        waiting: &[Arc<StepInstance>],
        finalizer: Option<&Arc<StepInstance>>,
    ) -> RuntimeError {
        let mut missing = Vec::new();
        let mut unprescribed = Vec::new();
        for instance in waiting.iter().chain(finalizer) {
            for input in DependenceTracker::missing_inputs(&self.store, instance) {
                if let Some(demand) = &input.producer {
                    if let Ok(table) = self.erased_step(demand.step) {
                        if !table.is_prescribed_any(demand.tag.as_ref()) {
                            unprescribed
                                .push((input.item.clone(), table.label_any(demand.tag.as_ref())));
                        }
                    }
                }
                missing.push(input.item);
            }
        }
        unprescribed.sort();
        missing.sort();
        missing.dedup();

        if let Some((item, producer)) = unprescribed.into_iter().next() {
            RuntimeError::UnprescribedProducer { item, producer }
        } else if missing.is_empty() {
            RuntimeError::internal("quiescent with waiting steps but no absent inputs")
        } else {
            RuntimeError::Deadlock { missing }
        }
    }

    /// Reclaim every item and drop every instance. Returns the number of
    /// items reclaimed here.
    pub(crate) fn teardown(&self) -> usize {
        lock(&self.finalizer).take();
        for table in &self.steps {
            table.clear();
        }
        self.store.reclaim_all()
    }

    pub(crate) fn report(
        &self,
        outcome: &Result<Box<dyn Any + Send>, RuntimeError>,
        workers: usize,
        duration: Duration,
    ) -> RunReport {
        RunReport {
            graph: self.name().to_string(),
            mode: self.options.mode.as_str().to_string(),
            workers,
            steps_prescribed: self.stats.prescribed.load(Ordering::Relaxed),
            steps_demanded: self.stats.demanded.load(Ordering::Relaxed),
            steps_completed: self.stats.completed.load(Ordering::Relaxed),
            items_put: self.store.total_puts(),
            items_reclaimed: self.store.total_reclaimed(),
            collections: self.store.reports(),
            outcome: match outcome {
                Ok(_) => Phase::Finished.as_str().to_string(),
                Err(err) => err.to_string(),
            },
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub(crate) fn is_single_threaded(&self) -> bool {
        self.options.mode == ExecutionMode::SingleThreaded
    }
}
