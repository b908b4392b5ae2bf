// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A tag-driven dataflow runtime.
//!
//! A graph is made of item collections (single-assignment values keyed by
//! tags) and step collections (computations keyed by tags). Prescribed step
//! instances fire once every input item named by their dependence function
//! has been put. When nothing is left to run, the finalizer produces the
//! graph's result.

pub mod config;     // runtime configuration
pub mod demos;      // demo graphs
pub mod engine;     // contexts, scheduling, dependence tracking
pub mod errors;     // error handling
pub mod graph;      // graph definitions
pub mod observability;
pub mod store;      // item tables
pub mod traits;     // step and program abstractions
mod utils;

pub use engine::{ContextOptions, GraphContext, StepContext, StepInputs};
pub use errors::{DefinitionError, RuntimeError, StepError, StepResult};
pub use graph::{GraphBuilder, GraphDefinition, ItemCollection, StepCollection, Tag};
pub use traits::GraphProgram;
