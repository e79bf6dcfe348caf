//! A best fit arena allocator over caller owned memory.
//!
//! design: every arena is a chain of blocks in offset order, all free blocks
//! of all arenas share one size sorted index. Allocation takes the smallest
//! free block that fits and splits off the rest, deallocation merges with
//! free neighbours. When no block fits, the allocator either compacts every
//! live block into fresh arenas (see [`ArenaAllocator::defragment`]) or asks
//! the [`ArenaManager`] for another arena.

use core::{fmt, marker::PhantomData, ops::BitOr};

mod best_fit;
mod block;
mod defrag;
mod manager;
mod state;

pub use best_fit::{AllocStrategy, BestFit};
pub use block::Block;
pub use manager::{ArenaManager, IdentityManager};

use state::State;

use crate::stats::{NoStats, Statistics};


pub const DEFAULT_ARENA_SIZE: usize = 64 * 1024;

/// Caller supplied identity of an allocation, echoed back on rebinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserHandle(pub u32);

impl UserHandle {
    pub const NULL: Self = Self(u32::MAX);
}

/// Handle to an allocated block, returned by `allocate` and consumed by
/// `deallocate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Allocator side identity of an arena, passed to
/// [`ArenaManager::add_arena`]. Ids are never handed out twice by the same
/// allocator, defragmentation included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArenaId(pub u32);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocFlags(u8);

impl AllocFlags {
    pub const NONE: Self = Self(0);
    /// Compact the allocator before growing it.
    pub const DEFRAG: Self = Self(1);
    /// Place the allocation in an arena of its own.
    pub const DEDICATED_ARENA: Self = Self(1 << 1);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AllocFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// An allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocDesc {
    pub size: usize,
    /// A power of two, or 0 for none.
    pub alignment: usize,
    pub user: UserHandle,
    pub flags: AllocFlags,
}

impl AllocDesc {
    pub fn new(size: usize, user: UserHandle) -> Self {
        Self {
            size,
            alignment: 0,
            user,
            flags: AllocFlags::NONE,
        }
    }

    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_flags(mut self, flags: AllocFlags) -> Self {
        self.flags = flags;
        self
    }

    fn alignment_mask(&self) -> usize {
        self.alignment.saturating_sub(1)
    }

    fn alignment_bits(&self) -> u8 {
        if self.alignment > 1 {
            self.alignment.trailing_zeros() as u8
        } else {
            0
        }
    }

    // bytes to reserve so that any alignment fixup still fits
    fn adjusted_size(&self, merge_padding: bool) -> usize {
        self.size + self.alignment_mask() + usize::from(merge_padding)
    }
}

/// Where an allocation lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocInfo<H> {
    /// Owner handle of the arena, as returned by the manager.
    pub arena: H,
    /// Aligned offset of the allocation inside the arena.
    pub offset: usize,
    pub block: BlockId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaInfo<H> {
    pub id: ArenaId,
    pub owner: H,
    pub size: usize,
    pub free: usize,
}

#[derive(Debug, Clone)]
pub enum ArenaAllocError<E> {
    /// The request does not fit a standard arena and was not flagged
    /// [`AllocFlags::DEDICATED_ARENA`].
    ExceedsArenaSize { requested: usize, arena_size: usize },
    Manager(E),
}

impl<E: fmt::Display> fmt::Display for ArenaAllocError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExceedsArenaSize {
                requested,
                arena_size,
            } => write!(
                f,
                "allocation of {requested} bytes does not fit an arena of {arena_size} bytes"
            ),
            Self::Manager(e) => write!(f, "arena manager failed: {e}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> core::error::Error for ArenaAllocError<E> {}

/// First inconsistency found by [`ArenaAllocator::validate_integrity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityError {
    Gap {
        arena: ArenaId,
        block: BlockId,
        expected: usize,
        found: usize,
    },
    ForeignBlock { arena: ArenaId, block: BlockId },
    BadSentinel { arena: ArenaId },
    AdjacentFree { arena: ArenaId, block: BlockId },
    ArenaFree {
        arena: ArenaId,
        recorded: usize,
        counted: usize,
    },
    ArenaCount { linked: usize, pooled: usize },
    NotFree { block: BlockId },
    DuplicateFree { block: BlockId },
    Unsorted { block: BlockId },
    FreeCount { indexed: usize, physical: usize },
    FreeBytes {
        recorded: usize,
        indexed: usize,
        arenas: usize,
    },
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gap {
                arena,
                block,
                expected,
                found,
            } => write!(
                f,
                "block {} of arena {} starts at {found}, expected {expected}",
                block.0, arena.0
            ),
            Self::ForeignBlock { arena, block } => write!(
                f,
                "block {} is linked into arena {} it does not belong to",
                block.0, arena.0
            ),
            Self::BadSentinel { arena } => {
                write!(f, "arena {} does not end with its sentinel", arena.0)
            }
            Self::AdjacentFree { arena, block } => write!(
                f,
                "free block {} of arena {} follows another free block",
                block.0, arena.0
            ),
            Self::ArenaFree {
                arena,
                recorded,
                counted,
            } => write!(
                f,
                "arena {} records {recorded} free bytes but its free blocks hold {counted}",
                arena.0
            ),
            Self::ArenaCount { linked, pooled } => {
                write!(f, "{linked} arenas are linked but {pooled} are allocated")
            }
            Self::NotFree { block } => {
                write!(f, "free index holds block {} which is not free", block.0)
            }
            Self::DuplicateFree { block } => {
                write!(f, "block {} appears in the free index twice", block.0)
            }
            Self::Unsorted { block } => {
                write!(f, "free index is out of order at block {}", block.0)
            }
            Self::FreeCount { indexed, physical } => {
                write!(f, "{indexed} indexed free blocks but {physical} in the arenas")
            }
            Self::FreeBytes {
                recorded,
                indexed,
                arenas,
            } => write!(
                f,
                "free bytes disagree: {recorded} recorded, {indexed} indexed, {arenas} in arenas"
            ),
        }
    }
}

impl core::error::Error for IntegrityError {}

/// Best fit allocator handing out offsets into arenas provided by an
/// [`ArenaManager`].
///
/// The manager is not owned: every call that may need new storage or move
/// memory takes it as an argument.
pub struct ArenaAllocator<M: ArenaManager, S = NoStats, St = BestFit> {
    pub(crate) state: State<M::Handle, St>,
    pub(crate) arena_size: usize,
    pub(crate) merge_padding: bool,
    pub(crate) stats: S,
    // next id for `ArenaManager::add_arena`, survives state swaps
    pub(crate) next_arena_id: u32,
    _manager: PhantomData<fn(&mut M)>,
}

impl<M: ArenaManager, S: Statistics + Default, St: AllocStrategy> Default
    for ArenaAllocator<M, S, St>
{
    fn default() -> Self {
        Self {
            state: State::new(),
            arena_size: DEFAULT_ARENA_SIZE,
            merge_padding: false,
            stats: S::default(),
            next_arena_id: 0,
            _manager: PhantomData,
        }
    }
}

impl<M: ArenaManager, S, St> fmt::Debug for ArenaAllocator<M, S, St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaAllocator")
            .field("arena_size", &self.arena_size)
            .field("merge_padding", &self.merge_padding)
            .field("arenas", &self.state.arenas.len())
            .field("free_size", &self.state.free_size)
            .finish()
    }
}

impl<M: ArenaManager, S: Statistics, St: AllocStrategy> ArenaAllocator<M, S, St> {
    pub fn with_arena_size(mut self, arena_size: usize) -> Self {
        debug_assert!(arena_size > 0, "arenas must hold at least one byte");
        self.arena_size = arena_size;
        self
    }

    /// Reserve one extra byte per allocation, which leaves small gaps that
    /// later merge into larger free blocks.
    pub fn with_merge_padding(mut self, merge_padding: bool) -> Self {
        self.merge_padding = merge_padding;
        self
    }

    pub fn with_statistics<S2: Statistics>(self, stats: S2) -> ArenaAllocator<M, S2, St> {
        ArenaAllocator {
            state: self.state,
            arena_size: self.arena_size,
            merge_padding: self.merge_padding,
            stats,
            next_arena_id: self.next_arena_id,
            _manager: PhantomData,
        }
    }

    pub fn arena_size(&self) -> usize {
        self.arena_size
    }

    pub fn stats(&self) -> &S {
        &self.stats
    }

    pub fn arenas_len(&self) -> usize {
        self.state.arenas.len()
    }

    /// Free bytes across all arenas.
    pub fn free_size(&self) -> usize {
        self.state.free_size
    }

    pub fn max_free_block_size(&self) -> usize {
        self.state.strategy.max_free_size(&self.state.blocks)
    }

    /// Share of the free bytes that lie outside the largest free block: 0.0
    /// when all free memory is one block, approaching 1.0 as it scatters.
    pub fn fragmentation(&self) -> f32 {
        if self.state.free_size == 0 {
            return 0.0;
        }
        1.0 - self.max_free_block_size() as f32 / self.state.free_size as f32
    }

    /// Arenas in creation order.
    pub fn arenas(&self) -> impl Iterator<Item = ArenaInfo<M::Handle>> + '_ {
        self.state
            .arena_order
            .iter(&self.state.arenas)
            .map(|handle| {
                let arena = &self.state.arenas[handle];
                ArenaInfo {
                    id: arena.id,
                    owner: arena.owner,
                    size: arena.size,
                    free: arena.free,
                }
            })
    }

    pub fn block(&self, block: BlockId) -> Option<&Block> {
        self.state.blocks.get(block.0)
    }

    pub fn allocate(
        &mut self,
        manager: &mut M,
        desc: &AllocDesc,
    ) -> Result<AllocInfo<M::Handle>, ArenaAllocError<M::Error>> {
        debug_assert!(desc.size > 0, "zero sized allocation");
        debug_assert_ne!(desc.user, UserHandle::NULL, "allocation without a user handle");
        debug_assert!(
            desc.alignment == 0 || desc.alignment.is_power_of_two(),
            "alignment {} is not a power of two",
            desc.alignment
        );

        if desc.flags.contains(AllocFlags::DEDICATED_ARENA) || desc.size >= self.arena_size {
            return self.allocate_dedicated(manager, desc);
        }

        let size = desc.adjusted_size(self.merge_padding);
        let block = match self.state.try_allocate(size) {
            Some(block) => block,
            None => self.grow_and_allocate(manager, desc, size)?,
        };
        Ok(self.occupy(block, desc))
    }

    fn allocate_dedicated(
        &mut self,
        manager: &mut M,
        desc: &AllocDesc,
    ) -> Result<AllocInfo<M::Handle>, ArenaAllocError<M::Error>> {
        // offset 0 is aligned, the slack only keeps the block relocatable
        let size = desc.size + desc.alignment_mask();
        let id = self.take_arena_id();
        let owner = manager.add_arena(id, size).map_err(ArenaAllocError::Manager)?;
        let block = self.state.add_arena(id, owner, size, false);
        self.stats.report_new_arena();
        log::debug!("added dedicated arena of {size} bytes");
        Ok(self.occupy(block, desc))
    }

    pub(crate) fn take_arena_id(&mut self) -> ArenaId {
        let id = ArenaId(self.next_arena_id);
        self.next_arena_id += 1;
        id
    }

    fn grow_and_allocate(
        &mut self,
        manager: &mut M,
        desc: &AllocDesc,
        size: usize,
    ) -> Result<u32, ArenaAllocError<M::Error>> {
        if desc.flags.contains(AllocFlags::DEFRAG) {
            self.defragment(manager)?;
            if let Some(block) = self.state.try_allocate(size) {
                return Ok(block);
            }
        }

        // slack pushed the request past a standard arena and no larger
        // retained arena had room for it
        if size > self.arena_size {
            return Err(ArenaAllocError::ExceedsArenaSize {
                requested: desc.size,
                arena_size: self.arena_size,
            });
        }

        let id = self.take_arena_id();
        let owner = manager
            .add_arena(id, self.arena_size)
            .map_err(ArenaAllocError::Manager)?;
        self.state.add_arena(id, owner, self.arena_size, true);
        self.stats.report_new_arena();
        log::debug!(
            "added arena of {} bytes, {} arenas in use",
            self.arena_size,
            self.state.arenas.len()
        );

        self.state
            .try_allocate(size)
            .ok_or(ArenaAllocError::ExceedsArenaSize {
                requested: desc.size,
                arena_size: self.arena_size,
            })
    }

    fn occupy(&mut self, block: u32, desc: &AllocDesc) -> AllocInfo<M::Handle> {
        let offset = self.state.occupy(block, desc.user, desc.alignment_bits());
        let size = self.state.blocks[block].size;
        self.stats.report_allocate(size);
        log::trace!(
            "allocated {} bytes as block {block} at offset {offset}",
            desc.size
        );
        AllocInfo {
            arena: self.state.owner_of(block),
            offset,
            block: BlockId(block),
        }
    }

    /// Frees `block`. An arena left without live blocks is offered back to
    /// the manager through [`ArenaManager::drop_arena`].
    pub fn deallocate(&mut self, manager: &mut M, block: BlockId) {
        let size = self
            .state
            .deallocate(block.0, |owner| manager.drop_arena(owner));
        self.stats.report_deallocate(size);
    }

    /// Checks that the arenas and the free index agree with each other.
    pub fn validate_integrity(&self) -> Result<(), IntegrityError> {
        self.state.validate()
    }
}
