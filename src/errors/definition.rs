// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors found while building a graph definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// Two collections (item or step) share a name.
    #[error("Duplicate collection name: '{name}'")]
    DuplicateCollection { name: String },

    /// A step collection was declared but never given a body.
    #[error("Step collection '{step}' has no body")]
    MissingBody { step: String },

    /// A step collection was defined twice.
    #[error("Step collection '{step}' is already defined")]
    StepRedefined { step: String },

    /// The graph has no initializer.
    #[error("Graph '{graph}' has no initializer")]
    MissingInitializer { graph: String },

    /// The graph has no finalizer.
    #[error("Graph '{graph}' has no finalizer")]
    MissingFinalizer { graph: String },

    /// An item collection was given more than one producer.
    #[error("Item collection '{collection}' already has a producer")]
    DuplicateProducer { collection: String },

    /// A handle from another builder was used.
    #[error("Unknown collection handle #{index} in graph '{graph}'")]
    UnknownHandle { graph: String, index: usize },
}
