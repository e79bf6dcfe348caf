use core::{convert::Infallible, fmt::Debug, hash::Hash};

use super::{AllocInfo, ArenaId, UserHandle};

/// Owner of the memory behind an [`ArenaAllocator`](super::ArenaAllocator).
///
/// The allocator only deals in offsets. Whenever it needs storage created,
/// released, or physically relocated it calls back into the manager that the
/// caller passes to `allocate`, `deallocate` and `defragment`. Callbacks must
/// not re-enter the allocator.
pub trait ArenaManager {
    /// Opaque value identifying one backing region. It is stored in the arena
    /// record and echoed back on every later callback about that arena.
    type Handle: Copy + Eq + Hash + Debug;
    type Error;

    /// Provides backing storage of at least `size` bytes for arena `id`.
    fn add_arena(&mut self, id: ArenaId, size: usize) -> Result<Self::Handle, Self::Error>;

    /// Called once an arena holds no live block. Returning `true` lets the
    /// allocator forget the arena, so the storage may be released. Returning
    /// `false` keeps it around as one free block.
    fn drop_arena(&mut self, arena: &Self::Handle) -> bool;

    fn begin_defragment(&mut self) {}

    fn end_defragment(&mut self) {}

    /// Copies `size` bytes from `from` in `src` to `to` in `dst`. The ranges
    /// may overlap when `src == dst`.
    fn move_memory(
        &mut self,
        src: Self::Handle,
        dst: Self::Handle,
        from: usize,
        to: usize,
        size: usize,
    ) -> Result<(), Self::Error>;

    /// The allocation owned by `user` now lives at `info`.
    fn rebind_alloc(
        &mut self,
        user: UserHandle,
        info: AllocInfo<Self::Handle>,
    ) -> Result<(), Self::Error>;
}

/// A manager for callers that track memory themselves, or not at all.
///
/// Arena handles are the allocator's own arena ids, empty arenas are always
/// dropped and relocations are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityManager;

impl ArenaManager for IdentityManager {
    type Handle = ArenaId;
    type Error = Infallible;

    fn add_arena(&mut self, id: ArenaId, _size: usize) -> Result<ArenaId, Infallible> {
        Ok(id)
    }

    fn drop_arena(&mut self, _arena: &ArenaId) -> bool {
        true
    }

    fn move_memory(
        &mut self,
        _src: ArenaId,
        _dst: ArenaId,
        _from: usize,
        _to: usize,
        _size: usize,
    ) -> Result<(), Infallible> {
        Ok(())
    }

    fn rebind_alloc(
        &mut self,
        _user: UserHandle,
        _info: AllocInfo<ArenaId>,
    ) -> Result<(), Infallible> {
        Ok(())
    }
}
