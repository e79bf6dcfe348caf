//! Block and arena records.
//!
//! Every arena owns a physical chain of blocks covering `[0, size)` in offset
//! order, closed by a zero sized sentinel at `size` that is never free. The
//! sentinel gives every real block a right neighbour, which keeps the merge
//! logic free of end-of-list special cases.

use core::marker::PhantomData;

use crate::{
    list::{Accessor, IndexList, ListNode, NULL},
    pool::IndexedPool,
};

use super::{ArenaId, UserHandle};

pub(crate) type BlockBank = IndexedPool<Block>;
pub(crate) type ArenaBank<H> = IndexedPool<Arena<H>>;
pub(crate) type BlockList = IndexList<BlockOrder>;
pub(crate) type ArenaList<H> = IndexList<ArenaOrder<H>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub(crate) offset: usize,
    pub(crate) size: usize,
    pub(crate) user: UserHandle,
    pub(crate) arena: u32,
    pub(crate) order: ListNode,
    pub(crate) is_free: bool,
    pub(crate) alignment_bits: u8,
}

impl Block {
    pub(crate) fn free(offset: usize, size: usize, arena: u32) -> Self {
        Self {
            offset,
            size,
            user: UserHandle::NULL,
            arena,
            order: ListNode::unlinked(),
            is_free: true,
            alignment_bits: 0,
        }
    }

    pub(crate) fn occupied(offset: usize, size: usize, arena: u32, user: UserHandle) -> Self {
        Self {
            user,
            is_free: false,
            ..Self::free(offset, size, arena)
        }
    }

    pub(crate) fn sentinel(arena_size: usize, arena: u32) -> Self {
        Self::occupied(arena_size, 0, arena, UserHandle::NULL)
    }

    /// Start of the block inside its arena, before alignment.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Reserved length, including any alignment slack.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn user(&self) -> UserHandle {
        self.user
    }

    pub fn is_free(&self) -> bool {
        self.is_free
    }

    pub fn alignment_mask(&self) -> usize {
        (1usize << self.alignment_bits) - 1
    }

    /// The offset handed out to the owner of this block.
    pub fn aligned_offset(&self) -> usize {
        let mask = self.alignment_mask();
        (self.offset + mask) & !mask
    }

    pub(crate) fn is_sentinel(&self) -> bool {
        self.size == 0
    }
}

#[derive(Debug, Clone)]
pub struct Arena<H> {
    pub(crate) id: ArenaId,
    pub(crate) blocks: BlockList,
    pub(crate) order: ListNode,
    pub(crate) size: usize,
    pub(crate) free: usize,
    pub(crate) owner: H,
}

impl<H> Arena<H> {
    pub(crate) fn new(id: ArenaId, owner: H, size: usize) -> Self {
        Self {
            id,
            blocks: BlockList::new(),
            order: ListNode::unlinked(),
            size,
            free: 0,
            owner,
        }
    }
}

/// Physical order of the blocks inside one arena.
pub(crate) struct BlockOrder;

impl Accessor for BlockOrder {
    type Value = Block;

    fn links(value: &Block) -> &ListNode {
        &value.order
    }

    fn links_mut(value: &mut Block) -> &mut ListNode {
        &mut value.order
    }
}

/// Creation order of the arenas of one allocator.
pub(crate) struct ArenaOrder<H>(PhantomData<H>);

impl<H> Accessor for ArenaOrder<H> {
    type Value = Arena<H>;

    fn links(value: &Arena<H>) -> &ListNode {
        &value.order
    }

    fn links_mut(value: &mut Arena<H>) -> &mut ListNode {
        &mut value.order
    }
}

/// Shrinks `block` to `size` and links a free block holding the rest right
/// behind it. Returns the remainder's handle.
///
/// The remainder is not registered with any free index.
pub(crate) fn split_block<H>(
    blocks: &mut BlockBank,
    arenas: &mut ArenaBank<H>,
    block: u32,
    size: usize,
) -> u32 {
    let Block {
        offset,
        size: total,
        arena,
        order,
        ..
    } = blocks[block];
    debug_assert!(total > size, "split of {total} bytes at {size}");
    debug_assert_ne!(order.next, NULL, "block {block} is missing its sentinel");

    blocks[block].size = size;
    let remainder = blocks.emplace(Block::free(offset + size, total - size, arena));
    arenas[arena].blocks.insert_before(blocks, order.next, remainder);
    remainder
}
