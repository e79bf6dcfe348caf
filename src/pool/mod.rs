//! A slot based object pool with stable `u32` handles.
//!
//! Erased slots are threaded onto an intrusive free chain that lives in the
//! vacant slot itself, so freed storage is reused before the backing vector
//! grows and no other handle is ever invalidated.

use core::ops::{Index, IndexMut};
use rust_alloc::vec::Vec;

use crate::list::NULL;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone)]
enum Slot<T> {
    Occupied(T),
    // head of the free chain at the time this slot was erased
    Vacant(u32),
}

/// A pool mapping dense `u32` handles to values.
///
/// Handles stay valid until they are explicitly erased. Indexing or erasing
/// a handle that is not live is a caller bug and panics.
#[derive(Debug, Clone)]
pub struct IndexedPool<T> {
    slots: Vec<Slot<T>>,
    unused: u32,
    len: usize,
}

impl<T> Default for IndexedPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IndexedPool<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            unused: NULL,
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            unused: NULL,
            len: 0,
        }
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The handle the next call to [`IndexedPool::emplace`] will return.
    pub fn next_handle(&self) -> u32 {
        if self.unused != NULL {
            self.unused
        } else {
            self.slots.len() as u32
        }
    }

    /// Stores `value` and returns its handle.
    pub fn emplace(&mut self, value: T) -> u32 {
        if self.unused != NULL {
            let index = self.unused;
            let slot = &mut self.slots[index as usize];
            let Slot::Vacant(next) = *slot else {
                unreachable!("free chain points at an occupied slot {index}");
            };
            *slot = Slot::Occupied(value);
            self.unused = next;
            self.len += 1;
            index
        } else {
            let index = self.slots.len();
            assert!(index < NULL as usize, "pool handle space exhausted");
            self.slots.push(Slot::Occupied(value));
            self.len += 1;
            index as u32
        }
    }

    /// Removes the value at `index` and returns it.
    ///
    /// Panics if `index` is not live.
    pub fn erase(&mut self, index: u32) -> T {
        let slot = &mut self.slots[index as usize];
        match core::mem::replace(slot, Slot::Vacant(self.unused)) {
            Slot::Occupied(value) => {
                self.unused = index;
                self.len -= 1;
                value
            }
            Slot::Vacant(next) => {
                // restore the chain before reporting the double erase
                *slot = Slot::Vacant(next);
                panic!("erasing vacant pool slot {index}");
            }
        }
    }

    pub fn contains(&self, index: u32) -> bool {
        matches!(self.slots.get(index as usize), Some(Slot::Occupied(_)))
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        match self.slots.get(index as usize) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        match self.slots.get_mut(index as usize) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    /// Iterates live `(handle, value)` pairs in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied(value) => Some((index as u32, value)),
                Slot::Vacant(_) => None,
            })
    }
}

impl<T> Index<u32> for IndexedPool<T> {
    type Output = T;

    fn index(&self, index: u32) -> &T {
        match &self.slots[index as usize] {
            Slot::Occupied(value) => value,
            Slot::Vacant(_) => panic!("indexing vacant pool slot {index}"),
        }
    }
}

impl<T> IndexMut<u32> for IndexedPool<T> {
    fn index_mut(&mut self, index: u32) -> &mut T {
        match &mut self.slots[index as usize] {
            Slot::Occupied(value) => value,
            Slot::Vacant(_) => panic!("indexing vacant pool slot {index}"),
        }
    }
}
