//! Compaction of all live blocks into a freshly packed state.
//!
//! Live blocks are replayed in arena creation order and physical order into
//! an empty [`State`]. Arenas are recreated on demand, reusing the owner
//! handle of the arena the block came from the first time it is needed, so
//! the manager's storage is packed in place. Since a fresh arena only ever
//! fills from the front, every block lands at or before its old position in
//! a reused arena, and copying in walk order never overwrites bytes that are
//! still to be read.
//!
//! Defragmentation is not transactional. If a manager callback fails the
//! error is returned right away, without `end_defragment`, and memory that
//! was already moved is not restored.

use hashbrown::HashSet;
use rust_alloc::vec::Vec;
use rustc_hash::FxBuildHasher;

use super::{
    AllocInfo, ArenaAllocError, ArenaAllocator, ArenaId, ArenaManager, BlockId,
    best_fit::AllocStrategy,
    state::State,
};
use crate::stats::Statistics;

/// A pending copy of `size` bytes between two arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MemoryMove<H> {
    pub(crate) src: H,
    pub(crate) dst: H,
    pub(crate) from: usize,
    pub(crate) to: usize,
    pub(crate) size: usize,
}

/// Appends `next`, extending the last move instead when both ranges
/// continue it.
pub(crate) fn push_move<H: Eq>(moves: &mut Vec<MemoryMove<H>>, next: MemoryMove<H>) {
    if let Some(last) = moves.last_mut() {
        if last.src == next.src
            && last.dst == next.dst
            && last.from + last.size == next.from
            && last.to + last.size == next.to
        {
            last.size += next.size;
            return;
        }
    }
    moves.push(next);
}

impl<M: ArenaManager, S: Statistics, St: AllocStrategy> ArenaAllocator<M, S, St> {
    /// Relocates every live allocation into as few arenas as possible.
    ///
    /// The manager sees, in order: `begin_defragment`, any `add_arena` calls
    /// for extra storage, the coalesced `move_memory` calls, one
    /// `rebind_alloc` per live allocation, `drop_arena` for every old arena
    /// that is no longer used, and `end_defragment`.
    pub fn defragment(&mut self, manager: &mut M) -> Result<(), ArenaAllocError<M::Error>> {
        manager.begin_defragment();

        let old = &self.state;
        let mut fresh: State<M::Handle, St> = State::new();
        let mut reused: HashSet<M::Handle, FxBuildHasher> = HashSet::with_hasher(FxBuildHasher);
        let mut moves = Vec::new();
        let mut placed = Vec::with_capacity(old.blocks.len());

        for arena_handle in old.arena_order.iter(&old.arenas) {
            let arena = &old.arenas[arena_handle];
            for handle in arena.blocks.iter(&old.blocks) {
                let block = &old.blocks[handle];
                if block.is_free || block.is_sentinel() {
                    continue;
                }

                let target = match fresh.try_allocate(block.size) {
                    Some(target) => target,
                    None => {
                        if reused.insert(arena.owner) {
                            fresh.add_arena(arena.id, arena.owner, arena.size, true);
                        } else {
                            let id = ArenaId(self.next_arena_id);
                            self.next_arena_id += 1;
                            let owner = manager
                                .add_arena(id, arena.size)
                                .map_err(ArenaAllocError::Manager)?;
                            reused.insert(owner);
                            self.stats.report_new_arena();
                            fresh.add_arena(id, owner, arena.size, true);
                        }
                        fresh.try_allocate(block.size).ok_or(
                            ArenaAllocError::ExceedsArenaSize {
                                requested: block.size,
                                arena_size: arena.size,
                            },
                        )?
                    }
                };

                let to = fresh.occupy(target, block.user, block.alignment_bits);
                push_move(
                    &mut moves,
                    MemoryMove {
                        src: arena.owner,
                        dst: fresh.owner_of(target),
                        from: block.aligned_offset(),
                        to,
                        size: block.size - block.alignment_mask(),
                    },
                );
                placed.push(target);
            }
        }

        for step in &moves {
            if step.src == step.dst && step.from == step.to {
                continue;
            }
            manager
                .move_memory(step.src, step.dst, step.from, step.to, step.size)
                .map_err(ArenaAllocError::Manager)?;
        }

        for &target in &placed {
            let block = &fresh.blocks[target];
            let info = AllocInfo {
                arena: fresh.owner_of(target),
                offset: block.aligned_offset(),
                block: BlockId(target),
            };
            manager
                .rebind_alloc(block.user, info)
                .map_err(ArenaAllocError::Manager)?;
        }

        let mut dropped = 0;
        for arena_handle in old.arena_order.iter(&old.arenas) {
            let arena = &old.arenas[arena_handle];
            if reused.contains(&arena.owner) {
                continue;
            }
            if manager.drop_arena(&arena.owner) {
                dropped += 1;
            } else {
                fresh.add_arena(arena.id, arena.owner, arena.size, true);
            }
        }

        log::debug!(
            "defragmented {} blocks with {} moves into {} arenas, {dropped} dropped",
            placed.len(),
            moves.len(),
            fresh.arenas.len()
        );
        self.state = fresh;
        manager.end_defragment();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_alloc::vec;

    use super::{MemoryMove, push_move};

    fn step(src: u32, dst: u32, from: usize, to: usize, size: usize) -> MemoryMove<u32> {
        MemoryMove {
            src,
            dst,
            from,
            to,
            size,
        }
    }

    #[test]
    fn contiguous_moves_coalesce() {
        let mut moves = vec![];
        push_move(&mut moves, step(0, 0, 100, 0, 50));
        push_move(&mut moves, step(0, 0, 150, 50, 30));
        assert_eq!(moves, [step(0, 0, 100, 0, 80)]);
    }

    #[test]
    fn broken_ranges_stay_separate() {
        let mut moves = vec![];
        push_move(&mut moves, step(0, 0, 100, 0, 50));
        // gap in the source
        push_move(&mut moves, step(0, 0, 160, 50, 10));
        // other destination arena
        push_move(&mut moves, step(0, 1, 170, 60, 10));
        // other source arena
        push_move(&mut moves, step(1, 1, 180, 70, 10));
        assert_eq!(moves.len(), 4);
    }
}
