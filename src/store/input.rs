// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::errors::RuntimeError;
use crate::graph::{CollectionId, Tag};
use crate::store::item_table::{Demand, Subscription, Waiter};
use crate::store::ItemStore;

/// One declared input of a step instance: a collection and a tag.
///
/// Inputs hold no reference to the tables; every operation resolves the
/// table through the store of the running context.
pub(crate) trait InputRef: Send + Sync {
    fn collection(&self) -> CollectionId;
    fn tag_any(&self) -> &dyn Any;
    fn label(&self, store: &ItemStore) -> String;
    fn subscribe(&self, store: &ItemStore, waiter: &Waiter) -> Result<Subscription, RuntimeError>;
    fn fetch(&self, store: &ItemStore) -> Option<Arc<dyn Any + Send + Sync>>;
    fn is_present(&self, store: &ItemStore) -> bool;
    fn release(&self, store: &ItemStore) -> bool;
    fn producer(&self, store: &ItemStore) -> Option<Demand>;
}

pub(crate) struct TypedInput<K, V> {
    collection: CollectionId,
    tag: K,
    _value: PhantomData<fn() -> V>,
}

impl<K: Tag, V: Send + Sync + 'static> TypedInput<K, V> {
    pub(crate) fn new(collection: CollectionId, tag: K) -> Self {
        Self {
            collection,
            tag,
            _value: PhantomData,
        }
    }
}

impl<K: Tag, V: Send + Sync + 'static> InputRef for TypedInput<K, V> {
    fn collection(&self) -> CollectionId {
        self.collection
    }

    fn tag_any(&self) -> &dyn Any {
        &self.tag
    }

    fn label(&self, store: &ItemStore) -> String {
        match store.table::<K, V>(self.collection) {
            Ok(table) => table.label(&self.tag),
            Err(_) => format!("#{}[{:?}]", self.collection.index(), self.tag),
        }
    }

    fn subscribe(&self, store: &ItemStore, waiter: &Waiter) -> Result<Subscription, RuntimeError> {
        store
            .table::<K, V>(self.collection)?
            .subscribe(&self.tag, waiter)
    }

    fn fetch(&self, store: &ItemStore) -> Option<Arc<dyn Any + Send + Sync>> {
        let table = store.table::<K, V>(self.collection).ok()?;
        table
            .fetch(&self.tag)
            .map(|value| value as Arc<dyn Any + Send + Sync>)
    }

    fn is_present(&self, store: &ItemStore) -> bool {
        store
            .table::<K, V>(self.collection)
            .map(|table| table.get(&self.tag).is_present())
            .unwrap_or(false)
    }

    fn release(&self, store: &ItemStore) -> bool {
        store
            .table::<K, V>(self.collection)
            .map(|table| table.release(&self.tag))
            .unwrap_or(false)
    }

    fn producer(&self, store: &ItemStore) -> Option<Demand> {
        store
            .table::<K, V>(self.collection)
            .ok()?
            .producer(&self.tag)
    }
}
