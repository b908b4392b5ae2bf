// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Builder for graph definitions.
//!
//! Collections are declared first and return typed handles; step
//! collections are declared and defined separately so that a step body can
//! prescribe instances of its own collection.
//!
//! ```
//! use the_cncwood::graph::GraphBuilder;
//!
//! let mut g = GraphBuilder::<i64, i64>::new("Doubler");
//! let x = g.item_collection::<i64, i64>("X");
//! let s = g.step_collection::<i64>("S");
//! g.step(&s)
//!     .dependencies(move |i, deps| {
//!         deps.item(&x, *i);
//!     })
//!     .produces(&x, |i| vec![i + 1])
//!     .body_fn(move |i, inputs, ctx| {
//!         let v = *inputs.get(&x, i)?;
//!         x.put(ctx, i + 1, 2 * v)?;
//!         Ok(())
//!     });
//! g.initializer(move |seed, ctx| {
//!     x.put(ctx, 0, seed)?;
//!     s.prescribe(ctx, 0)?;
//!     Ok(())
//! });
//! g.finalizer(
//!     move |_: &(), deps| {
//!         deps.item(&x, 1);
//!     },
//!     move |_, inputs| Ok(*inputs.get(&x, &1)?),
//! );
//! let definition = g.build().unwrap();
//! assert_eq!(definition.step_collections(), vec!["S"]);
//! ```

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::engine::{StepContext, StepInputs};
use crate::errors::{DefinitionError, StepError, StepResult};
use crate::graph::definition::{
    ErasedFinalizer, FinalizerSpec, GraphShape, ItemSpec, ItemSpecErased, Producer, StepSpec,
    StepSpecErased,
};
use crate::graph::tag::AnyTag;
use crate::graph::{
    CollectionId, Dependencies, GraphDefinition, ItemCollection, StepCollection, StepId, Tag,
};
use crate::traits::{FinalizerBody, FnBody, Initializer, StepBody};

pub struct GraphBuilder<A, R> {
    name: String,
    names: HashSet<String>,
    items: Vec<Box<dyn ItemSpecErased>>,
    steps: Vec<Box<dyn StepSpecErased>>,
    defined: HashSet<usize>,
    initializer: Option<Arc<dyn Initializer<A>>>,
    finalizer: Option<Arc<dyn ErasedFinalizer>>,
    errors: Vec<DefinitionError>,
    _result: PhantomData<fn() -> R>,
}

impl<A: Send + 'static, R: Send + 'static> GraphBuilder<A, R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            names: HashSet::new(),
            items: Vec::new(),
            steps: Vec::new(),
            defined: HashSet::new(),
            initializer: None,
            finalizer: None,
            errors: Vec::new(),
            _result: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare an item collection.
    pub fn item_collection<K: Tag, V: Send + Sync + 'static>(
        &mut self,
        name: &str,
    ) -> ItemCollection<K, V> {
        self.claim_name(name);
        let id = CollectionId(self.items.len());
        self.items
            .push(Box::new(ItemSpec::<K, V>::new(name.to_string())));
        ItemCollection::new(id)
    }

    /// Declare a step collection. Define it with [`GraphBuilder::step`].
    pub fn step_collection<K: Tag>(&mut self, name: &str) -> StepCollection<K> {
        self.claim_name(name);
        let id = StepId(self.steps.len());
        self.steps
            .push(Box::new(StepSpec::<K>::new(id, name.to_string())));
        StepCollection::new(id)
    }

    /// Define the dependence function, declared outputs and body of a
    /// previously declared step collection.
    pub fn step<K: Tag>(&mut self, step: &StepCollection<K>) -> StepDefinition<'_, K> {
        let index = step.id().index();
        if !self.defined.insert(index) {
            let name = self
                .steps
                .get(index)
                .map(|spec| spec.name().to_string())
                .unwrap_or_default();
            self.errors.push(DefinitionError::StepRedefined { step: name });
            return StepDefinition { spec: None };
        }
        let spec = self
            .steps
            .get_mut(index)
            .and_then(|spec| spec.as_any_mut().downcast_mut::<StepSpec<K>>());
        if spec.is_none() {
            self.errors.push(DefinitionError::UnknownHandle {
                graph: self.name.clone(),
                index,
            });
        }
        StepDefinition { spec }
    }

    /// Declare which step instance produces each item of `items`, enabling
    /// demand-driven prescription. `tag_of` maps an item tag to the
    /// producing step tag, or `None` for items no step produces.
    pub fn produced_by<K, V, S, F>(
        &mut self,
        items: &ItemCollection<K, V>,
        step: &StepCollection<S>,
        tag_of: F,
    ) -> &mut Self
    where
        K: Tag,
        V: Send + Sync + 'static,
        S: Tag,
        F: Fn(&K) -> Option<S> + Send + Sync + 'static,
    {
        if step.id().index() >= self.steps.len() {
            self.errors.push(DefinitionError::UnknownHandle {
                graph: self.name.clone(),
                index: step.id().index(),
            });
            return self;
        }
        let Some(spec) = self.item_spec(items) else {
            return self;
        };
        if spec.producer.is_some() {
            let collection = spec.name.clone();
            self.errors
                .push(DefinitionError::DuplicateProducer { collection });
            return self;
        }
        spec.producer = Some(Producer {
            step: step.id(),
            tag_of: Arc::new(move |tag: &K| tag_of(tag).map(|t| Box::new(t) as AnyTag)),
        });
        self
    }

    /// Declare how many steps read each item of `items`. An item is
    /// reclaimed as soon as that many readers completed; items without a
    /// count are reclaimed when the graph shuts down.
    pub fn get_count<K, V, F>(&mut self, items: &ItemCollection<K, V>, count: F) -> &mut Self
    where
        K: Tag,
        V: Send + Sync + 'static,
        F: Fn(&K) -> usize + Send + Sync + 'static,
    {
        if let Some(spec) = self.item_spec(items) {
            spec.get_count = Some(Arc::new(count));
        }
        self
    }

    pub fn initializer<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(A, &mut StepContext<'_>) -> StepResult + Send + Sync + 'static,
    {
        self.initializer_body(FnBody(f))
    }

    pub fn initializer_body(&mut self, body: impl Initializer<A>) -> &mut Self {
        self.initializer = Some(Arc::new(body));
        self
    }

    /// Set the finalizer. Its tag type `F` is the type later passed to
    /// `StepContext::await_finalizer`.
    pub fn finalizer<F, D, B>(&mut self, dependencies: D, body: B) -> &mut Self
    where
        F: Tag,
        D: Fn(&F, &mut Dependencies<'_>) + Send + Sync + 'static,
        B: Fn(&F, &StepInputs<'_>) -> Result<R, StepError> + Send + Sync + 'static,
    {
        self.finalizer_body(dependencies, FnBody(body))
    }

    pub fn finalizer_body<F, D>(&mut self, dependencies: D, body: impl FinalizerBody<F, R>) -> &mut Self
    where
        F: Tag,
        D: Fn(&F, &mut Dependencies<'_>) + Send + Sync + 'static,
    {
        self.finalizer = Some(Arc::new(FinalizerSpec::<F, R> {
            dependencies: Some(Arc::new(dependencies)),
            body: Arc::new(body),
        }));
        self
    }

    /// Validate and freeze the definition.
    pub fn build(self) -> Result<GraphDefinition<A, R>, DefinitionError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }
        if let Some(spec) = self.steps.iter().find(|spec| !spec.has_body()) {
            return Err(DefinitionError::MissingBody {
                step: spec.name().to_string(),
            });
        }
        let initializer = self
            .initializer
            .ok_or_else(|| DefinitionError::MissingInitializer {
                graph: self.name.clone(),
            })?;
        let finalizer = self
            .finalizer
            .ok_or_else(|| DefinitionError::MissingFinalizer {
                graph: self.name.clone(),
            })?;

        let shape = GraphShape {
            name: self.name,
            items: self.items.into_iter().map(Arc::from).collect(),
            steps: self.steps.into_iter().map(Arc::from).collect(),
            finalizer,
        };
        Ok(GraphDefinition::new(shape, initializer))
    }

    fn claim_name(&mut self, name: &str) {
        if !self.names.insert(name.to_string()) {
            self.errors.push(DefinitionError::DuplicateCollection {
                name: name.to_string(),
            });
        }
    }

    fn item_spec<K: Tag, V: Send + Sync + 'static>(
        &mut self,
        items: &ItemCollection<K, V>,
    ) -> Option<&mut ItemSpec<K, V>> {
        let index = items.id().index();
        let found = self
            .items
            .get_mut(index)
            .and_then(|spec| spec.as_any_mut().downcast_mut::<ItemSpec<K, V>>());
        if found.is_none() {
            self.errors.push(DefinitionError::UnknownHandle {
                graph: self.name.clone(),
                index,
            });
        }
        found
    }
}

/// Definition of one step collection, returned by [`GraphBuilder::step`].
pub struct StepDefinition<'a, K: Tag> {
    spec: Option<&'a mut StepSpec<K>>,
}

impl<'a, K: Tag> StepDefinition<'a, K> {
    /// Set the dependence function. It must be pure: it is evaluated once,
    /// when an instance is prescribed, and names every item the body reads.
    pub fn dependencies<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, &mut Dependencies<'_>) + Send + Sync + 'static,
    {
        if let Some(spec) = self.spec.as_mut() {
            spec.dependencies = Some(Arc::new(f));
        }
        self
    }

    /// Declare that every instance puts `items[t]` for each `t` in
    /// `tags(instance_tag)`. Returning without doing so fails the graph.
    pub fn produces<OK, V, F>(mut self, items: &ItemCollection<OK, V>, tags: F) -> Self
    where
        OK: Tag,
        V: Send + Sync + 'static,
        F: Fn(&K) -> Vec<OK> + Send + Sync + 'static,
    {
        let items = *items;
        if let Some(spec) = self.spec.as_mut() {
            spec.outputs
                .push(Arc::new(move |tag: &K, ctx: &StepContext<'_>| {
                    tags(tag)
                        .into_iter()
                        .find(|out| !ctx.has_put(&items, out))
                        .map(|out| ctx.item_label(&items, &out))
                }));
        }
        self
    }

    pub fn body(self, body: impl StepBody<K>) {
        if let Some(spec) = self.spec {
            spec.body = Some(Arc::new(body));
        }
    }

    pub fn body_fn<F>(self, f: F)
    where
        F: Fn(&K, &StepInputs<'_>, &mut StepContext<'_>) -> StepResult + Send + Sync + 'static,
    {
        self.body(FnBody(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(g: &mut GraphBuilder<(), ()>) {
        g.initializer(|_, _| Ok(()));
        g.finalizer(|_: &(), _| {}, |_, _| Ok(()));
    }

    #[test]
    fn test_build_minimal_graph() {
        let mut g = GraphBuilder::<(), ()>::new("Empty");
        finished(&mut g);
        let def = g.build().unwrap();
        assert_eq!(def.name(), "Empty");
        assert!(def.item_collections().is_empty());
    }

    #[test]
    fn test_duplicate_collection_names() {
        let mut g = GraphBuilder::<(), ()>::new("Dup");
        let _x = g.item_collection::<i64, i64>("X");
        let _s = g.step_collection::<i64>("X");
        finished(&mut g);
        assert_eq!(
            g.build().unwrap_err(),
            DefinitionError::DuplicateCollection { name: "X".into() }
        );
    }

    #[test]
    fn test_step_without_body() {
        let mut g = GraphBuilder::<(), ()>::new("NoBody");
        let _s = g.step_collection::<i64>("S");
        finished(&mut g);
        assert_eq!(
            g.build().unwrap_err(),
            DefinitionError::MissingBody { step: "S".into() }
        );
    }

    #[test]
    fn test_step_defined_twice() {
        let mut g = GraphBuilder::<(), ()>::new("Twice");
        let s = g.step_collection::<i64>("S");
        g.step(&s).body_fn(|_, _, _| Ok(()));
        g.step(&s).body_fn(|_, _, _| Ok(()));
        finished(&mut g);
        assert_eq!(
            g.build().unwrap_err(),
            DefinitionError::StepRedefined { step: "S".into() }
        );
    }

    #[test]
    fn test_missing_initializer_and_finalizer() {
        let g = GraphBuilder::<(), ()>::new("Bare");
        assert_eq!(
            g.build().unwrap_err(),
            DefinitionError::MissingInitializer {
                graph: "Bare".into()
            }
        );

        let mut g = GraphBuilder::<(), ()>::new("Bare");
        g.initializer(|_, _| Ok(()));
        assert_eq!(
            g.build().unwrap_err(),
            DefinitionError::MissingFinalizer {
                graph: "Bare".into()
            }
        );
    }

    #[test]
    fn test_duplicate_producer() {
        let mut g = GraphBuilder::<(), ()>::new("Producers");
        let v = g.item_collection::<i64, i64>("V");
        let t = g.step_collection::<i64>("T");
        g.step(&t).body_fn(|_, _, _| Ok(()));
        g.produced_by(&v, &t, |i| Some(*i));
        g.produced_by(&v, &t, |i| Some(*i));
        finished(&mut g);
        assert_eq!(
            g.build().unwrap_err(),
            DefinitionError::DuplicateProducer {
                collection: "V".into()
            }
        );
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let mut other = GraphBuilder::<(), ()>::new("Other");
        let _a = other.item_collection::<i64, i64>("A");
        let foreign = other.item_collection::<i64, i64>("B");

        let mut g = GraphBuilder::<(), ()>::new("Mine");
        g.get_count(&foreign, |_| 1);
        finished(&mut g);
        assert_eq!(
            g.build().unwrap_err(),
            DefinitionError::UnknownHandle {
                graph: "Mine".into(),
                index: 1
            }
        );
    }
}
