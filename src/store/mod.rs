// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Tag & item store: the item tables of one running context.
//!
//! Each collection has its own table and its own lock, so puts and reads
//! on different collections never contend.

mod buffer;
mod input;
mod item_table;

use std::sync::Arc;

use serde::Serialize;

use crate::errors::RuntimeError;
use crate::graph::definition::ItemSpecErased;
use crate::graph::{CollectionId, Tag};

pub use buffer::ItemBuffer;
pub(crate) use buffer::allocate_bytes;
pub(crate) use input::{InputRef, TypedInput};
pub use item_table::ItemLookup;
pub(crate) use item_table::{Demand, ErasedItemTable, ItemTable, Subscription, Waiter};

/// Put and reclaim counters of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionReport {
    pub name: String,
    pub puts: u64,
    pub reclaimed: u64,
}

pub(crate) struct ItemStore {
    tables: Vec<Arc<dyn ErasedItemTable>>,
}

impl ItemStore {
    pub(crate) fn new(specs: &[Arc<dyn ItemSpecErased>]) -> Self {
        Self {
            tables: specs.iter().map(|spec| spec.clone().instantiate()).collect(),
        }
    }

    /// Resolve a typed table.
    pub(crate) fn table<K: Tag, V: Send + Sync + 'static>(
        &self,
        id: CollectionId,
    ) -> Result<&ItemTable<K, V>, RuntimeError> {
        let erased = self.tables.get(id.index()).ok_or_else(|| {
            RuntimeError::internal(format!("unknown item collection #{}", id.index()))
        })?;
        erased
            .as_any()
            .downcast_ref::<ItemTable<K, V>>()
            .ok_or_else(|| RuntimeError::TypeMismatch {
                collection: erased.name().to_string(),
                expected: std::any::type_name::<ItemTable<K, V>>(),
            })
    }

    pub(crate) fn name(&self, id: CollectionId) -> &str {
        self.tables
            .get(id.index())
            .map(|table| table.name())
            .unwrap_or("?")
    }

    pub(crate) fn total_puts(&self) -> u64 {
        self.tables.iter().map(|table| table.puts()).sum()
    }

    pub(crate) fn total_reclaimed(&self) -> u64 {
        self.tables.iter().map(|table| table.reclaimed()).sum()
    }

    /// Reclaim every remaining item of every collection.
    pub(crate) fn reclaim_all(&self) -> usize {
        self.tables.iter().map(|table| table.reclaim_all()).sum()
    }

    pub(crate) fn reports(&self) -> Vec<CollectionReport> {
        self.tables
            .iter()
            .map(|table| CollectionReport {
                name: table.name().to_string(),
                puts: table.puts(),
                reclaimed: table.reclaimed(),
            })
            .collect()
    }
}
