//! This module provides the offset based allocators

pub mod arena;
