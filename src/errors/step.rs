// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::RuntimeError;
use thiserror::Error;

/// Error returned by step, initializer and finalizer bodies.
///
/// Runtime errors (double put, allocation failure, undeclared input) are
/// propagated unchanged with `?`. Anything else a body wants to report goes
/// through `Failed` and aborts the graph as `RuntimeError::StepFailed`.
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl StepError {
    /// Build a failure from a plain message.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        StepError::Failed(anyhow::anyhow!("{}", message))
    }

    /// Convert into the runtime error that terminates the graph, naming the
    /// step instance (or phase) that failed.
    pub(crate) fn into_runtime(self, step: &str) -> RuntimeError {
        match self {
            StepError::Runtime(err) => err,
            StepError::Failed(err) => RuntimeError::StepFailed {
                step: step.to_string(),
                reason: format!("{:#}", err),
            },
        }
    }
}

/// Result type of step bodies and initializers.
pub type StepResult = Result<(), StepError>;
