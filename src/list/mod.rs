//! An intrusive doubly linked list over [`IndexedPool`] handles.
//!
//! Nodes live in the pool and carry their own [`ListNode`] links; the list
//! only remembers its ends. An [`Accessor`] picks which link field of the
//! value a given list threads through, so one value type can sit in several
//! lists at once.

use core::{fmt, marker::PhantomData};

use crate::pool::IndexedPool;

#[cfg(test)]
mod tests;

/// End of list / absent handle.
pub const NULL: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListNode {
    pub prev: u32,
    pub next: u32,
}

impl ListNode {
    pub const fn unlinked() -> Self {
        Self {
            prev: NULL,
            next: NULL,
        }
    }
}

impl Default for ListNode {
    fn default() -> Self {
        Self::unlinked()
    }
}

/// Selects the link pair a list uses inside its pooled values.
pub trait Accessor {
    type Value;

    fn links(value: &Self::Value) -> &ListNode;
    fn links_mut(value: &mut Self::Value) -> &mut ListNode;
}

pub struct IndexList<A> {
    first: u32,
    last: u32,
    _marker: PhantomData<fn() -> A>,
}

impl<A> fmt::Debug for IndexList<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexList")
            .field("first", &self.first)
            .field("last", &self.last)
            .finish()
    }
}

impl<A> Clone for IndexList<A> {
    fn clone(&self) -> Self {
        Self {
            first: self.first,
            last: self.last,
            _marker: PhantomData,
        }
    }
}

impl<A> Default for IndexList<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> IndexList<A> {
    pub const fn new() -> Self {
        Self {
            first: NULL,
            last: NULL,
            _marker: PhantomData,
        }
    }

    pub fn first(&self) -> Option<u32> {
        (self.first != NULL).then_some(self.first)
    }

    pub fn last(&self) -> Option<u32> {
        (self.last != NULL).then_some(self.last)
    }

    pub fn is_empty(&self) -> bool {
        self.first == NULL
    }
}

impl<A: Accessor> IndexList<A> {
    pub fn next(&self, pool: &IndexedPool<A::Value>, node: u32) -> Option<u32> {
        let next = A::links(&pool[node]).next;
        (next != NULL).then_some(next)
    }

    pub fn prev(&self, pool: &IndexedPool<A::Value>, node: u32) -> Option<u32> {
        let prev = A::links(&pool[node]).prev;
        (prev != NULL).then_some(prev)
    }

    /// Links `node` in front of `location`, or at the back when `location`
    /// is [`NULL`].
    pub fn insert_before(&mut self, pool: &mut IndexedPool<A::Value>, location: u32, node: u32) {
        if location == NULL {
            if self.last != NULL {
                A::links_mut(&mut pool[self.last]).next = node;
            } else {
                self.first = node;
            }
            *A::links_mut(&mut pool[node]) = ListNode {
                prev: self.last,
                next: NULL,
            };
            self.last = node;
            return;
        }

        let prev = A::links(&pool[location]).prev;
        if prev != NULL {
            A::links_mut(&mut pool[prev]).next = node;
        } else {
            self.first = node;
        }
        A::links_mut(&mut pool[location]).prev = node;
        *A::links_mut(&mut pool[node]) = ListNode {
            prev,
            next: location,
        };
    }

    pub fn push_back(&mut self, pool: &mut IndexedPool<A::Value>, node: u32) {
        self.insert_before(pool, NULL, node);
    }

    /// Unlinks `node`. The value stays in the pool.
    pub fn erase(&mut self, pool: &mut IndexedPool<A::Value>, node: u32) {
        let ListNode { prev, next } = *A::links(&pool[node]);

        if prev != NULL {
            A::links_mut(&mut pool[prev]).next = next;
        } else {
            self.first = next;
        }

        if next != NULL {
            A::links_mut(&mut pool[next]).prev = prev;
        } else {
            self.last = prev;
        }

        *A::links_mut(&mut pool[node]) = ListNode::unlinked();
    }

    /// Unlinks every node and erases it from the pool.
    pub fn clear(&mut self, pool: &mut IndexedPool<A::Value>) {
        let mut current = self.first;
        while current != NULL {
            let next = A::links(&pool[current]).next;
            pool.erase(current);
            current = next;
        }
        self.first = NULL;
        self.last = NULL;
    }

    pub fn iter<'a>(&self, pool: &'a IndexedPool<A::Value>) -> Iter<'a, A> {
        Iter {
            pool,
            front: self.first,
            back: self.last,
        }
    }
}

/// Handles of a list from front to back.
pub struct Iter<'a, A: Accessor> {
    pool: &'a IndexedPool<A::Value>,
    front: u32,
    back: u32,
}

impl<A: Accessor> Iterator for Iter<'_, A> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.front == NULL {
            return None;
        }
        let current = self.front;
        if current == self.back {
            self.front = NULL;
            self.back = NULL;
        } else {
            self.front = A::links(&self.pool[current]).next;
        }
        Some(current)
    }
}

impl<A: Accessor> DoubleEndedIterator for Iter<'_, A> {
    fn next_back(&mut self) -> Option<u32> {
        if self.back == NULL {
            return None;
        }
        let current = self.back;
        if current == self.front {
            self.front = NULL;
            self.back = NULL;
        } else {
            self.back = A::links(&self.pool[current]).prev;
        }
        Some(current)
    }
}
