// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::{StepContext, StepInputs};
use crate::errors::{StepError, StepResult};
use crate::graph::Tag;

/// Computation run once per prescribed step instance.
///
/// `inputs` holds exactly the items named by the collection's dependence
/// function for `tag`, all present. Everything the body puts, prescribes or
/// awaits through `ctx` is committed after it returns `Ok`; on `Err` nothing
/// is committed and the graph fails.
pub trait StepBody<K: Tag>: Send + Sync + 'static {
    fn execute(&self, tag: &K, inputs: &StepInputs<'_>, ctx: &mut StepContext<'_>) -> StepResult;
}

/// Runs once, at quiescence, and produces the result of the graph.
pub trait FinalizerBody<F: Tag, R>: Send + Sync + 'static {
    fn finalize(&self, tag: &F, inputs: &StepInputs<'_>) -> Result<R, StepError>;
}

/// Seeds a graph from its launch arguments.
pub trait Initializer<A>: Send + Sync + 'static {
    fn initialize(&self, args: A, ctx: &mut StepContext<'_>) -> StepResult;
}

/// Adapter that lets plain closures act as bodies.
pub(crate) struct FnBody<F>(pub(crate) F);

impl<K, F> StepBody<K> for FnBody<F>
where
    K: Tag,
    F: Fn(&K, &StepInputs<'_>, &mut StepContext<'_>) -> StepResult + Send + Sync + 'static,
{
    fn execute(&self, tag: &K, inputs: &StepInputs<'_>, ctx: &mut StepContext<'_>) -> StepResult {
        (self.0)(tag, inputs, ctx)
    }
}

impl<F, R, B> FinalizerBody<F, R> for FnBody<B>
where
    F: Tag,
    B: Fn(&F, &StepInputs<'_>) -> Result<R, StepError> + Send + Sync + 'static,
{
    fn finalize(&self, tag: &F, inputs: &StepInputs<'_>) -> Result<R, StepError> {
        (self.0)(tag, inputs)
    }
}

impl<A, F> Initializer<A> for FnBody<F>
where
    F: Fn(A, &mut StepContext<'_>) -> StepResult + Send + Sync + 'static,
{
    fn initialize(&self, args: A, ctx: &mut StepContext<'_>) -> StepResult {
        (self.0)(args, ctx)
    }
}
