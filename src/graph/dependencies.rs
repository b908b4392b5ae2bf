// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::RuntimeError;
use crate::graph::{ItemCollection, Tag};
use crate::store::{InputRef, ItemStore, TypedInput};

/// Input list collected by a dependence function.
///
/// A dependence function receives the instance tag and names each item the
/// instance reads:
///
/// ```ignore
/// graph.step(&s).dependencies(move |i: &i64, deps| {
///     deps.item(&x, *i);
/// });
/// ```
pub struct Dependencies<'a> {
    store: &'a ItemStore,
    inputs: Vec<Box<dyn InputRef>>,
    error: Option<RuntimeError>,
}

impl<'a> Dependencies<'a> {
    pub(crate) fn new(store: &'a ItemStore) -> Self {
        Self {
            store,
            inputs: Vec::new(),
            error: None,
        }
    }

    /// Declare `items[tag]` as an input.
    pub fn item<K: Tag, V: Send + Sync + 'static>(
        &mut self,
        items: &ItemCollection<K, V>,
        tag: K,
    ) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        match self.store.table::<K, V>(items.id()) {
            Ok(_) => self
                .inputs
                .push(Box::new(TypedInput::<K, V>::new(items.id(), tag))),
            Err(err) => self.error = Some(err),
        }
        self
    }

    /// Declare every `items[tag]` for `tag` in `tags` as an input.
    pub fn items<K: Tag, V: Send + Sync + 'static>(
        &mut self,
        items: &ItemCollection<K, V>,
        tags: impl IntoIterator<Item = K>,
    ) -> &mut Self {
        for tag in tags {
            self.item(items, tag);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub(crate) fn finish(self) -> Result<Vec<Box<dyn InputRef>>, RuntimeError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.inputs),
        }
    }
}
