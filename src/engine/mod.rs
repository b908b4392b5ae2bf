// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Execution engine: prescription registry, dependence tracker, scheduler
//! and the context lifecycle built on top of them.

pub mod context;
mod inputs;
pub mod lifecycle;
pub(crate) mod registry;
pub mod report;
pub(crate) mod runtime;
pub(crate) mod scheduler;
mod step_context;
pub(crate) mod tracker;

#[cfg(test)]
mod integration_tests;

pub use context::{AbortHandle, ContextOptions, GraphContext, GraphHandle, GraphRun};
pub use inputs::StepInputs;
pub use lifecycle::Phase;
pub use report::RunReport;
pub use step_context::StepContext;
