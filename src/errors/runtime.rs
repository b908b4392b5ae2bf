// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Fatal runtime errors raised while a graph executes.
//!
//! Every variant carries the diagnostics needed to locate the problem: the
//! collection name and tag rendered as `Name[tag]` for items and
//! `Name(tag)` for step instances. The lifecycle phase in which the failure
//! was observed is attached by the `GraphFailed` log message.

use thiserror::Error;

/// Process exit code for a graph that finished normally.
pub const EXIT_OK: i32 = 0;
/// Exit code for deadlock at quiescence.
pub const EXIT_DEADLOCK: i32 = 2;
/// Exit code for a second put to the same item.
pub const EXIT_DOUBLE_PUT: i32 = 3;
/// Exit code for an input whose producer was never prescribed.
pub const EXIT_UNPRESCRIBED_PRODUCER: i32 = 4;
/// Exit code for the remaining contract violations.
pub const EXIT_CONTRACT_VIOLATION: i32 = 5;
/// Exit code for item allocation failure.
pub const EXIT_ALLOCATION_FAILURE: i32 = 6;
/// Exit code for internal assertion failures (panics, worker failures).
pub const EXIT_INTERNAL: i32 = 70;
/// Exit code for a cancelled graph.
pub const EXIT_CANCELLED: i32 = 130;

/// Coarse classification of a [`RuntimeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The graph author broke a rule of the runtime (double put, missing output, ...).
    ContractViolation,
    /// Quiescence was reached with required inputs still absent.
    Deadlock,
    /// The graph was aborted on request.
    Cancelled,
    /// `item_alloc` could not provide a buffer.
    AllocationFailure,
    /// The runtime itself failed (panicking step, dead worker, broken invariant).
    Internal,
}

/// Errors that terminate a graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A second value was put for an item that already has one.
    #[error("double put: {item}")]
    DoublePut { item: String },

    /// Quiescence was reached while inputs were still absent.
    #[error("deadlock: {} absent at quiescence", .missing.join(", "))]
    Deadlock { missing: Vec<String> },

    /// An input stayed absent because its declared producer was never prescribed.
    #[error("unprescribed producer: {producer} was never prescribed to produce {item}")]
    UnprescribedProducer { item: String, producer: String },

    /// A step returned without putting one of its declared outputs.
    #[error("missing output: {step} returned without putting {item}")]
    MissingOutput { step: String, item: String },

    /// A step body read an item it did not declare as an input.
    #[error("undeclared input: {step} read {item} which is not in its dependence list")]
    UndeclaredInput { step: String, item: String },

    /// An item was subscribed to after its payload was reclaimed.
    #[error("read after reclaim: {item}")]
    ReadAfterReclaim { item: String },

    /// A put or prescribe arrived after the graph started shutting down.
    #[error("graph closed: {operation} after shutdown")]
    GraphClosed { operation: String },

    /// A step body reported failure.
    #[error("step failed: {step}: {reason}")]
    StepFailed { step: String, reason: String },

    /// A step body panicked.
    #[error("step panicked: {step}: {message}")]
    StepPanicked { step: String, message: String },

    /// `item_alloc` could not provide the requested buffer.
    #[error("allocation failure: {requested} bytes requested{}", .limit.map(|l| format!(" (limit {l})")).unwrap_or_default())]
    AllocationFailed { requested: usize, limit: Option<usize> },

    /// The graph finished without ever registering its finalizer.
    #[error("finalizer not awaited: graph '{graph}' reached quiescence without await")]
    FinalizerNotAwaited { graph: String },

    /// `await` was called a second time.
    #[error("duplicate await: graph '{graph}' already registered its finalizer")]
    DuplicateAwait { graph: String },

    /// A handle was used with a context whose collection has different types.
    #[error("type mismatch: collection '{collection}' does not hold {expected}")]
    TypeMismatch {
        collection: String,
        expected: &'static str,
    },

    /// The graph was aborted before it finished.
    #[error("cancelled: {reason}")]
    Cancelled { reason: String },

    /// The runtime broke one of its own invariants.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl RuntimeError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Deadlock { .. } | RuntimeError::UnprescribedProducer { .. } => {
                ErrorKind::Deadlock
            }
            RuntimeError::Cancelled { .. } => ErrorKind::Cancelled,
            RuntimeError::AllocationFailed { .. } => ErrorKind::AllocationFailure,
            RuntimeError::StepPanicked { .. } | RuntimeError::Internal { .. } => {
                ErrorKind::Internal
            }
            _ => ErrorKind::ContractViolation,
        }
    }

    /// Process exit code reported by `cncwood` for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            RuntimeError::Deadlock { .. } => EXIT_DEADLOCK,
            RuntimeError::DoublePut { .. } => EXIT_DOUBLE_PUT,
            RuntimeError::UnprescribedProducer { .. } => EXIT_UNPRESCRIBED_PRODUCER,
            RuntimeError::AllocationFailed { .. } => EXIT_ALLOCATION_FAILURE,
            RuntimeError::Cancelled { .. } => EXIT_CANCELLED,
            RuntimeError::StepPanicked { .. } | RuntimeError::Internal { .. } => EXIT_INTERNAL,
            _ => EXIT_CONTRACT_VIOLATION,
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        RuntimeError::Internal {
            message: message.into(),
        }
    }
}
