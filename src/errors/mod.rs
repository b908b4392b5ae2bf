// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod definition;
pub mod runtime;
mod step;

pub use config::{ConfigError, ValidationError};
pub use definition::DefinitionError;
pub use runtime::{ErrorKind, RuntimeError};
pub use step::{StepError, StepResult};
