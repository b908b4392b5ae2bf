// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed handles to the collections of a graph definition.
//!
//! A handle is only an index into the definition plus the collection's
//! types. It is `Copy`, can be captured freely by step closures, and is
//! resolved against the per-context tables at every use.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::engine::StepContext;
use crate::errors::RuntimeError;
use crate::graph::Tag;

/// Index of an item collection within its graph definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(pub(crate) usize);

/// Index of a step collection within its graph definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(pub(crate) usize);

impl CollectionId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl StepId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Handle to an item collection: single-assignment values of type `V`
/// keyed by tags of type `K`.
pub struct ItemCollection<K, V> {
    id: CollectionId,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> ItemCollection<K, V> {
    pub(crate) fn new(id: CollectionId) -> Self {
        Self {
            id,
            _types: PhantomData,
        }
    }

    pub fn id(&self) -> CollectionId {
        self.id
    }
}

impl<K: Tag, V: Send + Sync + 'static> ItemCollection<K, V> {
    /// Stage a put of `value` under `tag`; it becomes visible when the
    /// calling step returns successfully.
    pub fn put(
        &self,
        ctx: &mut StepContext<'_>,
        tag: K,
        value: impl Into<Arc<V>>,
    ) -> Result<(), RuntimeError> {
        ctx.put(self, tag, value)
    }
}

impl<K, V> Clone for ItemCollection<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for ItemCollection<K, V> {}

impl<K, V> PartialEq for ItemCollection<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K, V> Eq for ItemCollection<K, V> {}

impl<K, V> fmt::Debug for ItemCollection<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemCollection")
            .field("id", &self.id.0)
            .field("tag", &std::any::type_name::<K>())
            .field("value", &std::any::type_name::<V>())
            .finish()
    }
}

/// Handle to a step collection whose instances are keyed by tags of type `K`.
pub struct StepCollection<K> {
    id: StepId,
    _tag: PhantomData<fn() -> K>,
}

impl<K> StepCollection<K> {
    pub(crate) fn new(id: StepId) -> Self {
        Self {
            id,
            _tag: PhantomData,
        }
    }

    pub fn id(&self) -> StepId {
        self.id
    }
}

impl<K: Tag> StepCollection<K> {
    /// Stage a prescription of the instance `tag`. Prescribing an instance
    /// that already exists is a no-op.
    pub fn prescribe(&self, ctx: &mut StepContext<'_>, tag: K) -> Result<(), RuntimeError> {
        ctx.prescribe(self, tag)
    }
}

impl<K> Clone for StepCollection<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for StepCollection<K> {}

impl<K> PartialEq for StepCollection<K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K> Eq for StepCollection<K> {}

impl<K> fmt::Debug for StepCollection<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepCollection")
            .field("id", &self.id.0)
            .field("tag", &std::any::type_name::<K>())
            .finish()
    }
}
