// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for items.

use crate::observability::messages::StructuredLog;
use std::fmt::{Debug, Display, Formatter};
use tracing::Span;

/// A value was put.
///
/// # Log Level
/// `trace!` - Per-item event
pub struct ItemPut<'a> {
    pub collection: &'a str,
    pub tag: &'a dyn Debug,
    pub waiters: usize,
}

impl Display for ItemPut<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Put {}[{:?}], waking {} waiters",
            self.collection, self.tag, self.waiters
        )
    }
}

impl StructuredLog for ItemPut<'_> {
    fn log(&self) {
        tracing::trace!(
            collection = self.collection,
            tag = ?self.tag,
            waiters = self.waiters,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "item_put",
            span_name = name,
            collection = self.collection,
            tag = ?self.tag,
        )
    }
}

/// A step instance subscribed to an absent item.
///
/// # Log Level
/// `trace!` - Per-item event
pub struct ItemAwaited<'a> {
    pub item: &'a str,
    pub step: &'a str,
}

impl Display for ItemAwaited<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} waits for {}", self.step, self.item)
    }
}

impl StructuredLog for ItemAwaited<'_> {
    fn log(&self) {
        tracing::trace!(item = self.item, step = self.step, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("item_awaited", span_name = name, item = self.item)
    }
}

/// An item's payload was released.
///
/// # Log Level
/// `trace!` - Per-item event
pub struct ItemReclaimed<'a> {
    pub collection: &'a str,
    pub tag: &'a dyn Debug,
}

impl Display for ItemReclaimed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Reclaimed {}[{:?}]", self.collection, self.tag)
    }
}

impl StructuredLog for ItemReclaimed<'_> {
    fn log(&self) {
        tracing::trace!(
            collection = self.collection,
            tag = ?self.tag,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "item_reclaimed",
            span_name = name,
            collection = self.collection,
        )
    }
}
