// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod program;
pub mod step;

pub use program::GraphProgram;
pub(crate) use step::FnBody;
pub use step::{FinalizerBody, Initializer, StepBody};
