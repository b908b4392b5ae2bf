// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Output staging for one step execution.
//!
//! A body never touches the store directly. Its puts, prescriptions and
//! the finalizer await are recorded here and committed together after the
//! body returned `Ok`, in that order, so other steps observe all of a
//! step's outputs or none of them.

use std::any::Any;
use std::sync::Arc;

use crate::engine::runtime::GraphRuntime;
use crate::errors::RuntimeError;
use crate::graph::definition::FINALIZER_NAME;
use crate::graph::tag::AnyTag;
use crate::graph::{CollectionId, ItemCollection, StepCollection, StepId, Tag};
use crate::store::{allocate_bytes, ItemBuffer, ItemStore, Waiter};

/// A put waiting to be committed.
pub(crate) trait StagedPut: Send {
    fn collection(&self) -> CollectionId;
    fn tag_any(&self) -> &dyn Any;
    fn apply(self: Box<Self>, store: &ItemStore) -> Result<Vec<Waiter>, RuntimeError>;
}

struct TypedPut<K, V> {
    collection: CollectionId,
    tag: K,
    value: Arc<V>,
}

impl<K: Tag, V: Send + Sync + 'static> StagedPut for TypedPut<K, V> {
    fn collection(&self) -> CollectionId {
        self.collection
    }

    fn tag_any(&self) -> &dyn Any {
        &self.tag
    }

    fn apply(self: Box<Self>, store: &ItemStore) -> Result<Vec<Waiter>, RuntimeError> {
        let this = *self;
        store
            .table::<K, V>(this.collection)?
            .put(this.tag, this.value)
    }
}

/// Outputs of one execution, ready to commit.
#[derive(Default)]
pub(crate) struct Staged {
    pub(crate) puts: Vec<Box<dyn StagedPut>>,
    pub(crate) prescriptions: Vec<(StepId, AnyTag)>,
    pub(crate) awaited: Option<AnyTag>,
}

/// Handle a step body (or the initializer) uses to produce output.
pub struct StepContext<'a> {
    runtime: &'a GraphRuntime,
    origin: &'a str,
    staged: Staged,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(runtime: &'a GraphRuntime, origin: &'a str) -> Self {
        Self {
            runtime,
            origin,
            staged: Staged::default(),
        }
    }

    /// Name of the running graph.
    pub fn graph_name(&self) -> &str {
        self.runtime.name()
    }

    /// Label of the instance this context belongs to, such as `S(3)`.
    pub fn origin(&self) -> &str {
        self.origin
    }

    /// Stage a put of `items[tag]`. Fails immediately if the item already
    /// has a value or this step already staged one.
    pub fn put<K: Tag, V: Send + Sync + 'static>(
        &mut self,
        items: &ItemCollection<K, V>,
        tag: K,
        value: impl Into<Arc<V>>,
    ) -> Result<(), RuntimeError> {
        let table = self.runtime.store().table::<K, V>(items.id())?;
        if table.was_put(&tag) || self.has_put(items, &tag) {
            return Err(RuntimeError::DoublePut {
                item: table.label(&tag),
            });
        }
        self.staged.puts.push(Box::new(TypedPut {
            collection: items.id(),
            tag,
            value: value.into(),
        }));
        Ok(())
    }

    /// Stage a prescription of `step(tag)`.
    pub fn prescribe<K: Tag>(&mut self, step: &StepCollection<K>, tag: K) -> Result<(), RuntimeError> {
        self.runtime.step_table::<K>(step.id())?;
        self.staged.prescriptions.push((step.id(), Box::new(tag)));
        Ok(())
    }

    /// Register the finalizer for `tag`. The call does not block: the
    /// finalizer runs once the graph is quiescent. Only one await is
    /// allowed per graph.
    pub fn await_finalizer<F: Tag>(&mut self, tag: F) -> Result<(), RuntimeError> {
        if !self.runtime.finalizer_accepts(&tag) {
            return Err(RuntimeError::TypeMismatch {
                collection: FINALIZER_NAME.to_string(),
                expected: self.runtime.finalizer_tag_type(),
            });
        }
        if self.staged.awaited.is_some() || self.runtime.finalizer_registered() {
            return Err(RuntimeError::DuplicateAwait {
                graph: self.runtime.name().to_string(),
            });
        }
        self.staged.awaited = Some(Box::new(tag));
        Ok(())
    }

    /// Allocate a zero-filled byte buffer for an item value, honoring the
    /// configured per-item limit.
    pub fn item_alloc(&self, size: usize) -> Result<ItemBuffer<Vec<u8>>, RuntimeError> {
        allocate_bytes(size, self.runtime.options().max_item_bytes)
    }

    /// Whether this execution already staged a put of `items[tag]`.
    pub fn has_put<K: Tag, V>(&self, items: &ItemCollection<K, V>, tag: &K) -> bool {
        self.staged.puts.iter().any(|put| {
            put.collection() == items.id() && put.tag_any().downcast_ref::<K>() == Some(tag)
        })
    }

    pub(crate) fn item_label<K: Tag, V: Send + Sync + 'static>(
        &self,
        items: &ItemCollection<K, V>,
        tag: &K,
    ) -> String {
        match self.runtime.store().table::<K, V>(items.id()) {
            Ok(table) => table.label(tag),
            Err(_) => format!("{}[{:?}]", self.runtime.store().name(items.id()), tag),
        }
    }

    pub(crate) fn staged_puts(&self) -> usize {
        self.staged.puts.len()
    }

    pub(crate) fn staged_prescriptions(&self) -> usize {
        self.staged.prescriptions.len()
    }

    pub(crate) fn into_staged(self) -> Staged {
        self.staged
    }
}
