// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Immutable description of a graph, shared by every context created from it.
//!
//! Collection specs are stored type-erased so that one definition can hold
//! collections of arbitrary tag and value types. Each context instantiates
//! its own tables from the specs; nothing here is mutated after `build()`.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::engine::registry::{ErasedStepTable, StepTable};
use crate::engine::{StepContext, StepInputs};
use crate::errors::{RuntimeError, StepError};
use crate::graph::tag::{step_label, AnyTag};
use crate::graph::{Dependencies, StepId, Tag};
use crate::store::{ErasedItemTable, InputRef, ItemStore, ItemTable};
use crate::traits::{FinalizerBody, Initializer, StepBody};

/// Dependence function: names the input items of one instance.
pub(crate) type DependenceFn<K> = Arc<dyn Fn(&K, &mut Dependencies<'_>) + Send + Sync>;

/// Declared-output check: returns the label of the first declared output
/// the step has not staged.
pub(crate) type OutputCheck<K> = Arc<dyn Fn(&K, &StepContext<'_>) -> Option<String> + Send + Sync>;

/// Demand mapping from an item tag to the step instance that produces it.
pub(crate) struct Producer<K> {
    pub(crate) step: StepId,
    pub(crate) tag_of: Arc<dyn Fn(&K) -> Option<AnyTag> + Send + Sync>,
}

pub(crate) struct ItemSpec<K, V> {
    pub(crate) name: String,
    pub(crate) get_count: Option<Arc<dyn Fn(&K) -> usize + Send + Sync>>,
    pub(crate) producer: Option<Producer<K>>,
    _value: PhantomData<fn() -> V>,
}

impl<K: Tag, V: Send + Sync + 'static> ItemSpec<K, V> {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            get_count: None,
            producer: None,
            _value: PhantomData,
        }
    }
}

pub(crate) trait ItemSpecErased: Send + Sync {
    fn name(&self) -> &str;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn instantiate(self: Arc<Self>) -> Arc<dyn ErasedItemTable>;
}

impl<K: Tag, V: Send + Sync + 'static> ItemSpecErased for ItemSpec<K, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn instantiate(self: Arc<Self>) -> Arc<dyn ErasedItemTable> {
        Arc::new(ItemTable::new(self))
    }
}

pub(crate) struct StepSpec<K> {
    pub(crate) id: StepId,
    pub(crate) name: String,
    pub(crate) dependencies: Option<DependenceFn<K>>,
    pub(crate) outputs: Vec<OutputCheck<K>>,
    pub(crate) body: Option<Arc<dyn StepBody<K>>>,
}

impl<K: Tag> StepSpec<K> {
    pub(crate) fn new(id: StepId, name: String) -> Self {
        Self {
            id,
            name,
            dependencies: None,
            outputs: Vec::new(),
            body: None,
        }
    }
}

pub(crate) trait StepSpecErased: Send + Sync {
    fn name(&self) -> &str;
    fn has_body(&self) -> bool;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn instantiate(self: Arc<Self>) -> Box<dyn ErasedStepTable>;
}

impl<K: Tag> StepSpecErased for StepSpec<K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_body(&self) -> bool {
        self.body.is_some()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn instantiate(self: Arc<Self>) -> Box<dyn ErasedStepTable> {
        Box::new(StepTable::new(self))
    }
}

/// Label of the finalizer instance in diagnostics.
pub(crate) const FINALIZER_NAME: &str = "finalizer";

pub(crate) struct FinalizerSpec<F, R> {
    pub(crate) dependencies: Option<DependenceFn<F>>,
    pub(crate) body: Arc<dyn FinalizerBody<F, R>>,
}

/// The finalizer with its tag and result types erased.
pub(crate) trait ErasedFinalizer: Send + Sync {
    fn accepts(&self, tag: &dyn Any) -> bool;
    fn tag_type(&self) -> &'static str;
    fn label(&self, tag: &dyn Any) -> String;
    fn dependencies(
        &self,
        tag: &dyn Any,
        store: &ItemStore,
    ) -> Result<Vec<Box<dyn InputRef>>, RuntimeError>;
    fn run(&self, tag: &dyn Any, inputs: &StepInputs<'_>) -> Result<Box<dyn Any + Send>, StepError>;
}

impl<F: Tag, R: Send + 'static> FinalizerSpec<F, R> {
    fn typed<'t>(&self, tag: &'t dyn Any) -> Result<&'t F, RuntimeError> {
        tag.downcast_ref::<F>().ok_or(RuntimeError::TypeMismatch {
            collection: FINALIZER_NAME.to_string(),
            expected: std::any::type_name::<F>(),
        })
    }
}

impl<F: Tag, R: Send + 'static> ErasedFinalizer for FinalizerSpec<F, R> {
    fn accepts(&self, tag: &dyn Any) -> bool {
        tag.is::<F>()
    }

    fn tag_type(&self) -> &'static str {
        std::any::type_name::<F>()
    }

    fn label(&self, tag: &dyn Any) -> String {
        match tag.downcast_ref::<F>() {
            Some(tag) => step_label(FINALIZER_NAME, tag),
            None => format!("{}(?)", FINALIZER_NAME),
        }
    }

    fn dependencies(
        &self,
        tag: &dyn Any,
        store: &ItemStore,
    ) -> Result<Vec<Box<dyn InputRef>>, RuntimeError> {
        let tag = self.typed(tag)?;
        let mut deps = Dependencies::new(store);
        if let Some(f) = &self.dependencies {
            f(tag, &mut deps);
        }
        deps.finish()
    }

    fn run(&self, tag: &dyn Any, inputs: &StepInputs<'_>) -> Result<Box<dyn Any + Send>, StepError> {
        let tag = self.typed(tag)?;
        let result = self.body.finalize(tag, inputs)?;
        Ok(Box::new(result))
    }
}

/// Everything about a graph except its argument and result types.
pub(crate) struct GraphShape {
    pub(crate) name: String,
    pub(crate) items: Vec<Arc<dyn ItemSpecErased>>,
    pub(crate) steps: Vec<Arc<dyn StepSpecErased>>,
    pub(crate) finalizer: Arc<dyn ErasedFinalizer>,
}

/// A validated, immutable graph.
///
/// Cloning is cheap; every clone refers to the same specs. Create a
/// [`GraphContext`](crate::engine::GraphContext) to run it.
pub struct GraphDefinition<A, R> {
    pub(crate) shape: Arc<GraphShape>,
    pub(crate) initializer: Arc<dyn Initializer<A>>,
    _result: PhantomData<fn() -> R>,
}

impl<A, R> GraphDefinition<A, R> {
    pub(crate) fn new(shape: GraphShape, initializer: Arc<dyn Initializer<A>>) -> Self {
        Self {
            shape: Arc::new(shape),
            initializer,
            _result: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.shape.name
    }

    /// Names of the item collections, in declaration order.
    pub fn item_collections(&self) -> Vec<&str> {
        self.shape.items.iter().map(|spec| spec.name()).collect()
    }

    /// Names of the step collections, in declaration order.
    pub fn step_collections(&self) -> Vec<&str> {
        self.shape.steps.iter().map(|spec| spec.name()).collect()
    }
}

impl<A, R> Clone for GraphDefinition<A, R> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            initializer: self.initializer.clone(),
            _result: PhantomData,
        }
    }
}

impl<A, R> std::fmt::Debug for GraphDefinition<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphDefinition")
            .field("name", &self.shape.name)
            .field("items", &self.item_collections())
            .field("steps", &self.step_collections())
            .finish()
    }
}
