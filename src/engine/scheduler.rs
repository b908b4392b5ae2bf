// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Scheduler: runs ready step instances.
//!
//! In parallel mode every worker owns a FIFO deque. Instances made ready by
//! a step go to the deque of the worker that ran it; instances made ready
//! by the initializer or the environment go to the shared injector. An idle
//! worker takes from its own deque, then the injector, then steals from
//! its siblings, and parks on the wake signal when all are empty.
//!
//! In single-threaded mode there are no workers: the controller thread
//! drains the injector in FIFO order, which makes runs deterministic.
//!
//! The in-flight counter covers every instance that is ready or running,
//! plus the launch and environment operations in progress. It only drops
//! after an instance's successors were counted, so reaching zero means
//! quiescence.

use std::iter;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::deque::{Injector, Steal, Stealer, Worker};

use crate::engine::registry::StepInstance;
use crate::engine::runtime::GraphRuntime;
use crate::errors::RuntimeError;
use crate::observability::messages::lifecycle::{WorkersJoined, WorkersStarted};
use crate::observability::messages::StructuredLog;
use crate::utils::sync::{lock, panic_message};

/// Upper bound on how long an idle worker sleeps before re-checking.
const IDLE_POLL: Duration = Duration::from_millis(50);

type Task = Arc<StepInstance>;

/// Epoch-stamped condvar. A worker reads the epoch before looking for
/// work and only sleeps while it is unchanged, so a push between the
/// look and the sleep is never missed.
struct WakeSignal {
    epoch: Mutex<u64>,
    changed: Condvar,
}

impl WakeSignal {
    fn new() -> Self {
        Self {
            epoch: Mutex::new(0),
            changed: Condvar::new(),
        }
    }

    fn epoch(&self) -> u64 {
        *lock(&self.epoch)
    }

    fn notify(&self) {
        *lock(&self.epoch) += 1;
        self.changed.notify_all();
    }

    fn wait(&self, seen: u64, stopped: &AtomicBool) {
        let guard = lock(&self.epoch);
        if *guard != seen || stopped.load(Ordering::Acquire) {
            return;
        }
        let _ = self
            .changed
            .wait_timeout(guard, IDLE_POLL)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

pub(crate) struct ReadyQueue {
    injector: Injector<Task>,
    signal: WakeSignal,
    in_flight: AtomicUsize,
    stopped: AtomicBool,
}

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        Self {
            injector: Injector::new(),
            signal: WakeSignal::new(),
            in_flight: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    /// Queue instances that were already counted in flight.
    pub(crate) fn push(&self, ready: Vec<Task>) {
        if ready.is_empty() {
            return;
        }
        for task in ready {
            self.injector.push(task);
        }
        self.signal.notify();
    }

    pub(crate) fn pop_global(&self) -> Option<Task> {
        loop {
            match self.injector.steal() {
                Steal::Success(task) => return Some(task),
                Steal::Empty => return None,
                Steal::Retry => continue,
            }
        }
    }

    pub(crate) fn add_in_flight(&self, n: usize) {
        if n > 0 {
            self.in_flight.fetch_add(n, Ordering::AcqRel);
        }
    }

    /// Drop one unit of in-flight work. True when nothing is left.
    pub(crate) fn complete_one(&self) -> bool {
        self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.signal.notify();
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Run every queued instance on the calling thread, in FIFO order, until
/// the queue is empty or the graph halts.
pub(crate) fn drain_inline(runtime: &GraphRuntime) {
    while !runtime.is_halted() {
        let Some(task) = runtime.queue().pop_global() else {
            break;
        };
        let ready = run_task(runtime, task);
        runtime.queue().push(ready);
        runtime.finish_one();
    }
}

/// Execute one task. A panic that escapes `execute` fails the graph rather
/// than the thread, so the task's in-flight unit is still released by the
/// caller.
fn run_task(runtime: &GraphRuntime, task: Task) -> Vec<Task> {
    let instance = task.clone();
    catch_unwind(AssertUnwindSafe(|| runtime.execute(task))).unwrap_or_else(|payload| {
        runtime.fail(RuntimeError::StepPanicked {
            step: instance.label().to_string(),
            message: panic_message(payload.as_ref()),
        });
        Vec::new()
    })
}

pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn start(runtime: Arc<GraphRuntime>, workers: usize) -> Result<Self, RuntimeError> {
        let locals: Vec<Worker<Task>> = (0..workers).map(|_| Worker::new_fifo()).collect();
        let stealers: Arc<Vec<Stealer<Task>>> =
            Arc::new(locals.iter().map(Worker::stealer).collect());

        let mut pool = Self {
            handles: Vec::with_capacity(workers),
        };
        for (index, local) in locals.into_iter().enumerate() {
            let runtime_for_worker = runtime.clone();
            let stealers = stealers.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-worker-{}", runtime.name(), index))
                .spawn(move || run_worker(index, local, &stealers, &runtime_for_worker));
            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(err) => {
                    runtime.queue().stop();
                    pool.join(&runtime);
                    return Err(RuntimeError::internal(format!(
                        "failed to spawn worker {}: {}",
                        index, err
                    )));
                }
            }
        }

        WorkersStarted {
            graph: runtime.name(),
            workers,
        }
        .log();
        Ok(pool)
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    /// Stop every worker and wait for it. A worker that died is reported
    /// as a graph failure.
    pub(crate) fn stop_and_join(mut self, runtime: &GraphRuntime) {
        runtime.queue().stop();
        self.join(runtime);
    }

    fn join(&mut self, runtime: &GraphRuntime) {
        let workers = self.handles.len();
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if let Err(payload) = handle.join() {
                runtime.fail(RuntimeError::internal(format!(
                    "{} died: {}",
                    name,
                    panic_message(payload.as_ref())
                )));
            }
        }
        WorkersJoined {
            graph: runtime.name(),
            workers,
        }
        .log();
    }
}

fn run_worker(index: usize, local: Worker<Task>, stealers: &[Stealer<Task>], runtime: &GraphRuntime) {
    let queue = runtime.queue();
    let span = tracing::debug_span!("worker", graph = runtime.name(), index);
    let _guard = span.enter();

    while !queue.is_stopped() {
        let seen = queue.signal.epoch();
        match find_task(&local, &queue.injector, stealers) {
            Some(task) => {
                let ready = run_task(runtime, task);
                if !ready.is_empty() {
                    for task in ready {
                        local.push(task);
                    }
                    queue.signal.notify();
                }
                runtime.finish_one();
            }
            None => queue.signal.wait(seen, &queue.stopped),
        }
    }
}

fn find_task(local: &Worker<Task>, injector: &Injector<Task>, stealers: &[Stealer<Task>]) -> Option<Task> {
    local.pop().or_else(|| {
        iter::repeat_with(|| {
            injector
                .steal_batch_and_pop(local)
                .or_else(|| stealers.iter().map(Stealer::steal).collect())
        })
        .find(|steal| !steal.is_retry())
        .and_then(Steal::success)
    })
}
