//! Offset based memory allocators.
//!
//! The allocators in here never touch memory themselves. They hand out
//! `(arena, offset)` pairs inside arenas whose backing storage is owned by the
//! caller, which makes them usable for GPU heaps, mapped files or plain byte
//! buffers alike.

#![no_std]

extern crate alloc as rust_alloc;

pub mod alloc;
pub mod list;
pub mod pool;
pub mod stats;

pub use alloc::arena::{
    AllocDesc, AllocFlags, AllocInfo, AllocStrategy, ArenaAllocError, ArenaAllocator, ArenaId,
    ArenaInfo, ArenaManager, BestFit, Block, BlockId, DEFAULT_ARENA_SIZE, IdentityManager,
    IntegrityError, UserHandle,
};
pub use stats::{CountingStats, NoStats, Statistics};
