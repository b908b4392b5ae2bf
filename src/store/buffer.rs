// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::errors::RuntimeError;

/// An item value under construction.
///
/// The producing step owns the buffer and may mutate it freely; putting it
/// moves it into the store, after which it is immutable and shared.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ItemBuffer<V> {
    value: V,
}

impl<V> ItemBuffer<V> {
    pub fn new(value: V) -> Self {
        Self { value }
    }

    pub fn into_inner(self) -> V {
        self.value
    }
}

impl<V> Deref for ItemBuffer<V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.value
    }
}

impl<V> DerefMut for ItemBuffer<V> {
    fn deref_mut(&mut self) -> &mut V {
        &mut self.value
    }
}

impl<V> From<ItemBuffer<V>> for Arc<V> {
    fn from(buffer: ItemBuffer<V>) -> Self {
        Arc::new(buffer.value)
    }
}

/// Allocate a zero-filled byte buffer of `size` bytes.
///
/// Fails with `AllocationFailed` when `size` exceeds `limit` or the
/// allocator cannot satisfy the request.
pub(crate) fn allocate_bytes(
    size: usize,
    limit: Option<usize>,
) -> Result<ItemBuffer<Vec<u8>>, RuntimeError> {
    let failed = || RuntimeError::AllocationFailed {
        requested: size,
        limit,
    };
    if limit.is_some_and(|limit| size > limit) {
        return Err(failed());
    }
    let mut bytes = Vec::new();
    bytes.try_reserve_exact(size).map_err(|_| failed())?;
    bytes.resize(size, 0u8);
    Ok(ItemBuffer::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_zeroed() {
        let buffer = allocate_bytes(16, None).unwrap();
        assert_eq!(buffer.len(), 16);
        assert!(buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_allocation_above_limit_fails() {
        let err = allocate_bytes(64, Some(32)).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::AllocationFailed {
                requested: 64,
                limit: Some(32)
            }
        );
        assert!(allocate_bytes(32, Some(32)).is_ok());
    }

    #[test]
    fn test_impossible_allocation_fails() {
        assert!(allocate_bytes(usize::MAX, None).is_err());
    }

    #[test]
    fn test_buffer_moves_into_arc() {
        let mut buffer = ItemBuffer::<Vec<i32>>::default();
        buffer.push(4);
        let shared: Arc<Vec<i32>> = buffer.into();
        assert_eq!(*shared, vec![4]);
    }
}
