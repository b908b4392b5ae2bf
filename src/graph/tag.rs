// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::any::Any;
use std::fmt::Debug;
use std::hash::Hash;

/// Key identifying an instance within a collection.
///
/// The runtime never looks inside a tag: it only hashes, compares, clones
/// and prints it. Integers, tuples of integers and small strings all work.
pub trait Tag: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> Tag for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Type-erased tag as it travels between collections of different tag types.
pub(crate) type AnyTag = Box<dyn Any + Send + Sync>;

/// `Name[tag]`, the rendering used for items in every diagnostic.
pub(crate) fn item_label<K: Debug>(collection: &str, tag: &K) -> String {
    format!("{}[{:?}]", collection, tag)
}

/// `Name(tag)`, the rendering used for step instances.
pub(crate) fn step_label<K: Debug>(collection: &str, tag: &K) -> String {
    format!("{}({:?})", collection, tag)
}
