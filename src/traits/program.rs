// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::DefinitionError;
use crate::graph::{GraphBuilder, GraphDefinition};

/// A named dataflow program.
///
/// Implementors declare their collections, steps, initializer and finalizer
/// on the builder; `definition` validates the result. One definition can
/// back any number of concurrently running contexts.
pub trait GraphProgram: Send + Sync {
    /// Arguments handed to the initializer at launch.
    type Args: Send + 'static;
    /// Value produced by the finalizer.
    type Output: Send + 'static;

    fn name(&self) -> &str;

    fn define(&self, graph: &mut GraphBuilder<Self::Args, Self::Output>);

    fn definition(&self) -> Result<GraphDefinition<Self::Args, Self::Output>, DefinitionError> {
        let mut graph = GraphBuilder::new(self.name());
        self.define(&mut graph);
        graph.build()
    }
}
