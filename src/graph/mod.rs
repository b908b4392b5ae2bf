// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Graph definitions: collections, steps, the initializer and the finalizer.

mod builder;
pub(crate) mod definition;
mod dependencies;
mod handles;
pub(crate) mod tag;

pub use builder::{GraphBuilder, StepDefinition};
pub use definition::GraphDefinition;
pub use dependencies::Dependencies;
pub use handles::{CollectionId, ItemCollection, StepCollection, StepId};
pub use tag::Tag;
