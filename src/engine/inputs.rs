// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::any::Any;
use std::sync::Arc;

use crate::errors::RuntimeError;
use crate::graph::{ItemCollection, Tag};
use crate::store::{InputRef, ItemStore};

/// The input items of one step instance, all present.
///
/// Only items named by the instance's dependence function can be read;
/// anything else is an `UndeclaredInput` error.
pub struct StepInputs<'a> {
    store: &'a ItemStore,
    owner: &'a str,
    entries: Vec<(&'a dyn InputRef, Arc<dyn Any + Send + Sync>)>,
}

impl<'a> StepInputs<'a> {
    pub(crate) fn resolve(
        store: &'a ItemStore,
        owner: &'a str,
        inputs: &'a [Box<dyn InputRef>],
    ) -> Result<Self, RuntimeError> {
        let entries = inputs
            .iter()
            .map(|input| {
                input
                    .fetch(store)
                    .map(|value| (input.as_ref(), value))
                    .ok_or_else(|| {
                        RuntimeError::internal(format!(
                            "{} dispatched while {} is absent",
                            owner,
                            input.label(store)
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            store,
            owner,
            entries,
        })
    }

    /// Read the input `items[tag]`.
    pub fn get<K: Tag, V: Send + Sync + 'static>(
        &self,
        items: &ItemCollection<K, V>,
        tag: &K,
    ) -> Result<&V, RuntimeError> {
        self.find(items, tag)
            .and_then(|value| (**value).downcast_ref::<V>())
            .ok_or_else(|| self.undeclared(items, tag))
    }

    /// Shared handle to the input `items[tag]`, for values the step keeps
    /// beyond its own execution.
    pub fn shared<K: Tag, V: Send + Sync + 'static>(
        &self,
        items: &ItemCollection<K, V>,
        tag: &K,
    ) -> Result<Arc<V>, RuntimeError> {
        self.find(items, tag)
            .and_then(|value| value.clone().downcast::<V>().ok())
            .ok_or_else(|| self.undeclared(items, tag))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find<K: Tag, V>(
        &self,
        items: &ItemCollection<K, V>,
        tag: &K,
    ) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.entries
            .iter()
            .find(|(input, _)| {
                input.collection() == items.id() && input.tag_any().downcast_ref::<K>() == Some(tag)
            })
            .map(|(_, value)| value)
    }

    fn undeclared<K: Tag, V: Send + Sync + 'static>(
        &self,
        items: &ItemCollection<K, V>,
        tag: &K,
    ) -> RuntimeError {
        let item = match self.store.table::<K, V>(items.id()) {
            Ok(table) => table.label(tag),
            Err(err) => return err,
        };
        RuntimeError::UndeclaredInput {
            step: self.owner.to_string(),
            item,
        }
    }
}
