//! Bookkeeping shared by allocation, deallocation and defragmentation.

use hashbrown::HashSet;
use rustc_hash::FxBuildHasher;

use super::{
    ArenaId, BlockId, IntegrityError, UserHandle,
    best_fit::AllocStrategy,
    block::{Arena, ArenaBank, ArenaList, Block, BlockBank},
};
use crate::list::NULL;

/// Blocks, arenas and the free index of one allocator.
///
/// Defragmentation builds a second `State` next to the live one and swaps it
/// in when every block has been placed.
#[derive(Debug)]
pub(crate) struct State<H, St> {
    pub(crate) blocks: BlockBank,
    pub(crate) arenas: ArenaBank<H>,
    pub(crate) arena_order: ArenaList<H>,
    pub(crate) strategy: St,
    pub(crate) free_size: usize,
}

impl<H: Copy, St: AllocStrategy> State<H, St> {
    pub(crate) fn new() -> Self {
        Self {
            blocks: BlockBank::new(),
            arenas: ArenaBank::new(),
            arena_order: ArenaList::new(),
            strategy: St::default(),
            free_size: 0,
        }
    }

    /// Creates an arena covered by a single block, either free or occupied,
    /// and returns that block.
    pub(crate) fn add_arena(&mut self, id: ArenaId, owner: H, size: usize, free: bool) -> u32 {
        debug_assert!(size > 0, "zero sized arena");
        let arena = self.arenas.emplace(Arena::new(id, owner, size));
        self.arena_order.push_back(&mut self.arenas, arena);

        let block = if free {
            Block::free(0, size, arena)
        } else {
            Block::occupied(0, size, arena, UserHandle::NULL)
        };
        let block = self.blocks.emplace(block);
        let sentinel = self.blocks.emplace(Block::sentinel(size, arena));
        let list = &mut self.arenas[arena].blocks;
        list.push_back(&mut self.blocks, block);
        list.push_back(&mut self.blocks, sentinel);

        if free {
            self.arenas[arena].free = size;
            self.free_size += size;
            self.strategy.add_free(&mut self.blocks, block);
        }
        block
    }

    /// Carves `size` bytes out of the best fitting free block.
    pub(crate) fn try_allocate(&mut self, size: usize) -> Option<u32> {
        let found = self.strategy.try_find(&self.blocks, size)?;
        let block = self
            .strategy
            .commit(&mut self.blocks, &mut self.arenas, found, size);
        let arena = self.blocks[block].arena;
        self.arenas[arena].free -= size;
        self.free_size -= size;
        Some(block)
    }

    /// Hands `block` to `user` and returns its aligned offset.
    pub(crate) fn occupy(&mut self, block: u32, user: UserHandle, alignment_bits: u8) -> usize {
        let block = &mut self.blocks[block];
        debug_assert!(!block.is_free, "occupying a free block");
        block.user = user;
        block.alignment_bits = alignment_bits;
        block.aligned_offset()
    }

    pub(crate) fn owner_of(&self, block: u32) -> H {
        self.arenas[self.blocks[block].arena].owner
    }

    /// Frees `node`, merging it with free neighbours. When the arena ends up
    /// empty and `drop_arena` agrees, the whole arena is released instead.
    ///
    /// Returns the freed block size.
    pub(crate) fn deallocate(&mut self, node: u32, drop_arena: impl FnOnce(&H) -> bool) -> usize {
        let Block {
            size,
            arena,
            order,
            is_free,
            ..
        } = self.blocks[node];
        debug_assert!(!is_free, "double free of block {node}");
        debug_assert!(size > 0, "deallocating the sentinel of arena {arena}");

        self.free_size += size;
        self.arenas[arena].free += size;
        self.blocks[node].user = UserHandle::NULL;
        self.blocks[node].alignment_bits = 0;

        let left = order.prev;
        let right = order.next;
        let left_free = left != NULL && self.blocks[left].is_free;
        // the sentinel is never free
        let right_free = self.blocks[right].is_free;

        let Arena {
            id,
            size: arena_size,
            free: arena_free,
            owner,
            ..
        } = self.arenas[arena];
        if arena_free == arena_size && drop_arena(&owner) {
            if left_free {
                self.strategy.erase(&mut self.blocks, left);
            }
            if right_free {
                self.strategy.erase(&mut self.blocks, right);
            }
            self.free_size -= arena_size;
            self.arenas[arena].blocks.clear(&mut self.blocks);
            self.arena_order.erase(&mut self.arenas, arena);
            self.arenas.erase(arena);
            log::debug!("dropped empty arena {} of {arena_size} bytes", id.0);
            return size;
        }

        match (left_free, right_free) {
            (false, false) => {
                self.strategy.add_free(&mut self.blocks, node);
            }
            (true, false) => {
                let merged = self.blocks[left].size + size;
                self.strategy.replace(&mut self.blocks, left, left, merged);
                self.release(arena, node);
            }
            (false, true) => {
                let merged = size + self.blocks[right].size;
                self.strategy.replace(&mut self.blocks, right, node, merged);
                self.release(arena, right);
            }
            (true, true) => {
                self.strategy.erase(&mut self.blocks, right);
                let merged = self.blocks[left].size + size + self.blocks[right].size;
                self.strategy.replace(&mut self.blocks, left, left, merged);
                self.release(arena, node);
                self.release(arena, right);
            }
        }
        log::trace!("freed block {node} of {size} bytes in arena {arena}");
        size
    }

    // unlinks a block absorbed by a merge and returns its slot to the pool
    fn release(&mut self, arena: u32, block: u32) {
        self.arenas[arena].blocks.erase(&mut self.blocks, block);
        self.blocks.erase(block);
    }

    /// Walks every arena and the free index and reports the first
    /// inconsistency between them.
    pub(crate) fn validate(&self) -> Result<(), IntegrityError> {
        let mut linked_arenas = 0;
        let mut physical_free_blocks = 0;
        let mut arena_free_total = 0;

        for arena_handle in self.arena_order.iter(&self.arenas) {
            let arena = &self.arenas[arena_handle];
            let id = arena.id;
            linked_arenas += 1;

            let mut expected = 0;
            let mut free_bytes = 0;
            let mut previous_free = false;
            let mut sentinel = None;

            for handle in arena.blocks.iter(&self.blocks) {
                let block = &self.blocks[handle];
                if sentinel.is_some() {
                    return Err(IntegrityError::BadSentinel { arena: id });
                }
                if block.arena != arena_handle {
                    return Err(IntegrityError::ForeignBlock {
                        arena: id,
                        block: BlockId(handle),
                    });
                }
                if block.offset != expected {
                    return Err(IntegrityError::Gap {
                        arena: id,
                        block: BlockId(handle),
                        expected,
                        found: block.offset,
                    });
                }
                if block.is_sentinel() {
                    if block.is_free || block.offset != arena.size {
                        return Err(IntegrityError::BadSentinel { arena: id });
                    }
                    sentinel = Some(handle);
                    continue;
                }
                if block.is_free {
                    if previous_free {
                        return Err(IntegrityError::AdjacentFree {
                            arena: id,
                            block: BlockId(handle),
                        });
                    }
                    free_bytes += block.size;
                    physical_free_blocks += 1;
                }
                previous_free = block.is_free;
                expected += block.size;
            }

            if sentinel.is_none() {
                return Err(IntegrityError::BadSentinel { arena: id });
            }
            if free_bytes != arena.free {
                return Err(IntegrityError::ArenaFree {
                    arena: id,
                    recorded: arena.free,
                    counted: free_bytes,
                });
            }
            arena_free_total += arena.free;
        }

        if linked_arenas != self.arenas.len() {
            return Err(IntegrityError::ArenaCount {
                linked: linked_arenas,
                pooled: self.arenas.len(),
            });
        }

        let mut seen: HashSet<u32, FxBuildHasher> =
            HashSet::with_capacity_and_hasher(self.strategy.len(), FxBuildHasher);
        let mut indexed_bytes = 0;
        let mut previous_size = 0;
        for handle in self.strategy.iter() {
            let block = match self.blocks.get(handle) {
                Some(block) if block.is_free => block,
                _ => return Err(IntegrityError::NotFree { block: BlockId(handle) }),
            };
            if !seen.insert(handle) {
                return Err(IntegrityError::DuplicateFree { block: BlockId(handle) });
            }
            if block.size < previous_size {
                return Err(IntegrityError::Unsorted { block: BlockId(handle) });
            }
            previous_size = block.size;
            indexed_bytes += block.size;
        }

        if seen.len() != physical_free_blocks {
            return Err(IntegrityError::FreeCount {
                indexed: seen.len(),
                physical: physical_free_blocks,
            });
        }
        if indexed_bytes != self.free_size || arena_free_total != self.free_size {
            return Err(IntegrityError::FreeBytes {
                recorded: self.free_size,
                indexed: indexed_bytes,
                arenas: arena_free_total,
            });
        }
        Ok(())
    }
}
