// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Single-assignment item table of one collection.
//!
//! Every entry moves through `Absent -> Present -> Reclaimed` and never
//! back. Readers that arrive while an entry is absent are parked on it as
//! waiters and handed back to the caller of `put`, in registration order,
//! exactly once. Payloads are dropped outside the table lock.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::engine::registry::StepInstance;
use crate::errors::RuntimeError;
use crate::graph::definition::ItemSpec;
use crate::graph::tag::{item_label, AnyTag};
use crate::graph::{StepId, Tag};
use crate::observability::messages::item::{ItemPut, ItemReclaimed};
use crate::observability::messages::StructuredLog;
use crate::utils::sync::lock;

/// A step instance parked on an absent item.
pub(crate) type Waiter = Arc<StepInstance>;

/// Result of a non-blocking lookup.
#[derive(Debug)]
pub enum ItemLookup<V> {
    Present(Arc<V>),
    Absent,
    Reclaimed,
}

impl<V> ItemLookup<V> {
    pub fn is_present(&self) -> bool {
        matches!(self, ItemLookup::Present(_))
    }

    pub fn value(self) -> Option<Arc<V>> {
        match self {
            ItemLookup::Present(value) => Some(value),
            _ => None,
        }
    }
}

/// Outcome of a subscription.
pub(crate) enum Subscription {
    /// The item is present; the subscriber does not wait.
    Satisfied,
    /// The subscriber was parked on the absent item. `demand` names the
    /// declared producer instance, if the collection has one.
    Waiting { demand: Option<Demand> },
}

/// A step instance that would produce a missing item.
pub(crate) struct Demand {
    pub(crate) step: StepId,
    pub(crate) tag: AnyTag,
}

enum ItemState<V> {
    Absent { waiters: Vec<Waiter> },
    Present(Arc<V>),
    Reclaimed,
}

struct ItemEntry<V> {
    state: ItemState<V>,
    consumers: usize,
    reads: usize,
}

impl<V> ItemEntry<V> {
    fn absent() -> Self {
        Self {
            state: ItemState::Absent {
                waiters: Vec::new(),
            },
            consumers: 0,
            reads: 0,
        }
    }
}

pub(crate) struct ItemTable<K, V> {
    spec: Arc<ItemSpec<K, V>>,
    entries: Mutex<HashMap<K, ItemEntry<V>>>,
    puts: AtomicU64,
    reclaimed: AtomicU64,
}

impl<K: Tag, V: Send + Sync + 'static> ItemTable<K, V> {
    pub(crate) fn new(spec: Arc<ItemSpec<K, V>>) -> Self {
        Self {
            spec,
            entries: Mutex::new(HashMap::new()),
            puts: AtomicU64::new(0),
            reclaimed: AtomicU64::new(0),
        }
    }

    pub(crate) fn label(&self, tag: &K) -> String {
        item_label(&self.spec.name, tag)
    }

    /// Store `value` under `tag` and return the instances that were waiting
    /// for it. A second put for the same tag fails, whatever the state of
    /// the first value.
    pub(crate) fn put(&self, tag: K, value: Arc<V>) -> Result<Vec<Waiter>, RuntimeError> {
        let zero_readers = self.expected_reads(&tag) == Some(0);
        let (waiters, dropped) = {
            let mut entries = lock(&self.entries);
            let entry = entries.entry(tag.clone()).or_insert_with(ItemEntry::absent);
            let waiters = match &mut entry.state {
                ItemState::Absent { waiters } => std::mem::take(waiters),
                _ => {
                    return Err(RuntimeError::DoublePut {
                        item: self.label(&tag),
                    })
                }
            };
            if zero_readers && waiters.is_empty() && entry.consumers == 0 {
                entry.state = ItemState::Reclaimed;
                (waiters, Some(value))
            } else {
                entry.state = ItemState::Present(value);
                (waiters, None)
            }
        };
        self.puts.fetch_add(1, Ordering::Relaxed);
        ItemPut {
            collection: &self.spec.name,
            tag: &tag,
            waiters: waiters.len(),
        }
        .log();
        if let Some(value) = dropped {
            drop(value);
            self.record_reclaim(&tag);
        }
        Ok(waiters)
    }

    pub(crate) fn get(&self, tag: &K) -> ItemLookup<V> {
        match lock(&self.entries).get(tag).map(|entry| &entry.state) {
            Some(ItemState::Present(value)) => ItemLookup::Present(value.clone()),
            Some(ItemState::Reclaimed) => ItemLookup::Reclaimed,
            Some(ItemState::Absent { .. }) | None => ItemLookup::Absent,
        }
    }

    /// Whether a value was ever put under `tag`.
    pub(crate) fn was_put(&self, tag: &K) -> bool {
        !matches!(self.get(tag), ItemLookup::Absent)
    }

    /// Read-or-subscribe, atomically with respect to `put`. Counts one
    /// outstanding consumer in either case.
    pub(crate) fn subscribe(&self, tag: &K, waiter: &Waiter) -> Result<Subscription, RuntimeError> {
        {
            let mut entries = lock(&self.entries);
            let entry = entries.entry(tag.clone()).or_insert_with(ItemEntry::absent);
            match &mut entry.state {
                ItemState::Present(_) => {
                    entry.consumers += 1;
                    return Ok(Subscription::Satisfied);
                }
                ItemState::Absent { waiters } => {
                    waiters.push(waiter.clone());
                    entry.consumers += 1;
                }
                ItemState::Reclaimed => {
                    return Err(RuntimeError::ReadAfterReclaim {
                        item: self.label(tag),
                    })
                }
            }
        }
        Ok(Subscription::Waiting {
            demand: self.producer(tag),
        })
    }

    /// Value of a present item.
    pub(crate) fn fetch(&self, tag: &K) -> Option<Arc<V>> {
        self.get(tag).value()
    }

    /// One consumer completed its read. Returns true if that reclaimed the
    /// entry.
    pub(crate) fn release(&self, tag: &K) -> bool {
        let expected = self.expected_reads(tag);
        let dropped = {
            let mut entries = lock(&self.entries);
            let Some(entry) = entries.get_mut(tag) else {
                return false;
            };
            entry.consumers = entry.consumers.saturating_sub(1);
            entry.reads += 1;
            match expected {
                Some(count) if entry.consumers == 0 && entry.reads >= count => {
                    Self::take_value(entry)
                }
                _ => None,
            }
        };
        self.finish_reclaim(tag, dropped)
    }

    /// Reclaim a present entry that has no outstanding consumers.
    pub(crate) fn reclaim(&self, tag: &K) -> bool {
        let dropped = {
            let mut entries = lock(&self.entries);
            match entries.get_mut(tag) {
                Some(entry) if entry.consumers == 0 => Self::take_value(entry),
                _ => None,
            }
        };
        self.finish_reclaim(tag, dropped)
    }

    /// Reclaim every remaining entry and drop every waiter. Used at
    /// teardown, when no step can read any more, so outstanding consumers
    /// are abandoned first.
    pub(crate) fn reclaim_all(&self) -> usize {
        let tags: Vec<K> = {
            let mut entries = lock(&self.entries);
            entries.values_mut().for_each(|entry| entry.consumers = 0);
            entries.keys().cloned().collect()
        };
        let count = tags.iter().filter(|tag| self.reclaim(tag)).count();
        let drained: Vec<(K, ItemEntry<V>)> = lock(&self.entries).drain().collect();
        drop(drained);
        count
    }

    /// The producing instance declared for `tag`, if any.
    pub(crate) fn producer(&self, tag: &K) -> Option<Demand> {
        let producer = self.spec.producer.as_ref()?;
        (producer.tag_of)(tag).map(|step_tag| Demand {
            step: producer.step,
            tag: step_tag,
        })
    }

    pub(crate) fn puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub(crate) fn reclaimed(&self) -> u64 {
        self.reclaimed.load(Ordering::Relaxed)
    }

    fn expected_reads(&self, tag: &K) -> Option<usize> {
        self.spec.get_count.as_ref().map(|count| count(tag))
    }

    fn take_value(entry: &mut ItemEntry<V>) -> Option<Arc<V>> {
        match std::mem::replace(&mut entry.state, ItemState::Reclaimed) {
            ItemState::Present(value) => Some(value),
            other => {
                entry.state = other;
                None
            }
        }
    }

    fn finish_reclaim(&self, tag: &K, dropped: Option<Arc<V>>) -> bool {
        match dropped {
            Some(value) => {
                drop(value);
                self.record_reclaim(tag);
                true
            }
            None => false,
        }
    }

    fn record_reclaim(&self, tag: &K) {
        self.reclaimed.fetch_add(1, Ordering::Relaxed);
        ItemReclaimed {
            collection: &self.spec.name,
            tag,
        }
        .log();
    }
}

/// An item table with its tag and value types erased.
pub(crate) trait ErasedItemTable: Send + Sync {
    fn name(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
    fn puts(&self) -> u64;
    fn reclaimed(&self) -> u64;
    fn reclaim_all(&self) -> usize;
}

impl<K: Tag, V: Send + Sync + 'static> ErasedItemTable for ItemTable<K, V> {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn puts(&self) -> u64 {
        ItemTable::puts(self)
    }

    fn reclaimed(&self) -> u64 {
        ItemTable::reclaimed(self)
    }

    fn reclaim_all(&self) -> usize {
        ItemTable::reclaim_all(self)
    }
}
