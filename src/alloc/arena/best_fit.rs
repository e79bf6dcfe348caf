//! Best fit free index.
//!
//! Free blocks of every arena sit in one vector sorted by ascending size, so
//! the smallest block that fits is a lower bound search away. Size changes
//! caused by splits and merges move an entry by shifting the slice between
//! its old and new position instead of removing and re-inserting it.

use rust_alloc::vec::Vec;

use super::block::{ArenaBank, BlockBank, split_block};

/// The free block index used by an [`ArenaAllocator`](super::ArenaAllocator).
///
/// Implementations own the set of free blocks and keep each block's
/// `is_free` flag in agreement with membership.
pub trait AllocStrategy: Default {
    /// Where a fitting free block was found.
    type Position: Copy;

    /// Finds a free block of at least `size` bytes.
    fn try_find(&self, blocks: &BlockBank, size: usize) -> Option<Self::Position>;

    /// Takes the block at `found` out of the index, splitting off and
    /// re-indexing any bytes beyond `size`. Returns the now occupied block.
    fn commit<H>(
        &mut self,
        blocks: &mut BlockBank,
        arenas: &mut ArenaBank<H>,
        found: Self::Position,
        size: usize,
    ) -> u32;

    /// Indexes a block that just became free.
    fn add_free(&mut self, blocks: &mut BlockBank, block: u32);

    /// Replaces the indexed `block` with `new_block` resized to `new_size`.
    /// `block` and `new_block` may be the same handle.
    fn replace(&mut self, blocks: &mut BlockBank, block: u32, new_block: u32, new_size: usize);

    /// Drops `block` from the index without touching its flag.
    fn erase(&mut self, blocks: &mut BlockBank, block: u32);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the largest free block, or 0.
    fn max_free_size(&self, blocks: &BlockBank) -> usize;

    /// Free block handles in index order.
    fn iter(&self) -> impl Iterator<Item = u32> + '_;
}

#[derive(Debug, Default, Clone)]
pub struct BestFit {
    free_ordering: Vec<u32>,
}

impl BestFit {
    // first position in `range` whose block is at least `size` bytes
    fn find_free(&self, blocks: &BlockBank, start: usize, end: usize, size: usize) -> usize {
        start
            + self.free_ordering[start..end].partition_point(|&block| blocks[block].size < size)
    }

    fn locate(&self, blocks: &BlockBank, block: u32) -> usize {
        let size = blocks[block].size;
        let start = self.find_free(blocks, 0, self.free_ordering.len(), size);
        let found = self.free_ordering[start..]
            .iter()
            .position(|&entry| entry == block);
        match found {
            Some(index) => start + index,
            None => panic!("block {block} of size {size} is not in the free list"),
        }
    }

    // `node` replaces the entry at `of` and is no larger than it was
    fn reinsert_left(&mut self, blocks: &BlockBank, of: usize, node: u32) -> usize {
        let it = self.find_free(blocks, 0, of, blocks[node].size);
        self.free_ordering.copy_within(it..of, it + 1);
        self.free_ordering[it] = node;
        it
    }

    // `node` replaces the entry at `of` and is no smaller than it was
    fn reinsert_right(&mut self, blocks: &BlockBank, of: usize, node: u32) -> usize {
        let next = of + 1;
        let it = self.find_free(blocks, next, self.free_ordering.len(), blocks[node].size);
        self.free_ordering.copy_within(next..it, of);
        self.free_ordering[it - 1] = node;
        it - 1
    }
}

impl AllocStrategy for BestFit {
    type Position = usize;

    fn try_find(&self, blocks: &BlockBank, size: usize) -> Option<usize> {
        debug_assert!(size > 0, "zero sized request reached the free list");
        let &largest = self.free_ordering.last()?;
        if blocks[largest].size < size {
            return None;
        }
        Some(self.find_free(blocks, 0, self.free_ordering.len(), size))
    }

    fn commit<H>(
        &mut self,
        blocks: &mut BlockBank,
        arenas: &mut ArenaBank<H>,
        found: usize,
        size: usize,
    ) -> u32 {
        let free_node = self.free_ordering[found];
        let remaining = blocks[free_node].size - size;
        blocks[free_node].is_free = false;

        if remaining > 0 {
            let remainder = split_block(blocks, arenas, free_node, size);
            // the remainder is smaller than the block it came from
            self.reinsert_left(blocks, found, remainder);
        } else {
            self.free_ordering.remove(found);
        }
        free_node
    }

    fn add_free(&mut self, blocks: &mut BlockBank, block: u32) {
        blocks[block].is_free = true;
        let it = self.find_free(blocks, 0, self.free_ordering.len(), blocks[block].size);
        self.free_ordering.insert(it, block);
    }

    fn replace(&mut self, blocks: &mut BlockBank, block: u32, new_block: u32, new_size: usize) {
        let size = blocks[block].size;
        if size == new_size && block == new_block {
            return;
        }

        let it = self.locate(blocks, block);
        blocks[new_block].size = new_size;
        blocks[new_block].is_free = true;

        if size < new_size {
            self.reinsert_right(blocks, it, new_block);
        } else if size > new_size {
            self.reinsert_left(blocks, it, new_block);
        } else {
            self.free_ordering[it] = new_block;
        }
    }

    fn erase(&mut self, blocks: &mut BlockBank, block: u32) {
        let it = self.locate(blocks, block);
        self.free_ordering.remove(it);
    }

    fn len(&self) -> usize {
        self.free_ordering.len()
    }

    fn max_free_size(&self, blocks: &BlockBank) -> usize {
        self.free_ordering
            .last()
            .map_or(0, |&block| blocks[block].size)
    }

    fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.free_ordering.iter().copied()
    }
}
