//! Allocation statistics.
//!
//! Allocators report into a [`Statistics`] collaborator they own. The
//! default [`NoStats`] compiles every report away.

/// Receiver for allocator events. All methods default to doing nothing.
pub trait Statistics {
    fn report_new_arena(&mut self) {}

    fn report_allocate(&mut self, _size: usize) {}

    fn report_deallocate(&mut self, _size: usize) {}
}

/// Statistics disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStats;

impl Statistics for NoStats {}

/// Plain counters over the lifetime of an allocator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CountingStats {
    pub arenas_allocated: u32,
    pub allocation: usize,
    pub peak_allocation: usize,
    pub allocation_count: u64,
    pub deallocation_count: u64,
}

impl Statistics for CountingStats {
    fn report_new_arena(&mut self) {
        self.arenas_allocated += 1;
    }

    fn report_allocate(&mut self, size: usize) {
        self.allocation_count += 1;
        self.allocation += size;
        self.peak_allocation = self.peak_allocation.max(self.allocation);
    }

    fn report_deallocate(&mut self, size: usize) {
        self.deallocation_count += 1;
        self.allocation = self.allocation.saturating_sub(size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_stats_track_peak() {
        let mut stats = CountingStats::default();
        stats.report_new_arena();
        stats.report_allocate(100);
        stats.report_allocate(50);
        stats.report_deallocate(100);
        stats.report_allocate(10);

        assert_eq!(stats.arenas_allocated, 1);
        assert_eq!(stats.allocation, 60);
        assert_eq!(stats.peak_allocation, 150);
        assert_eq!(stats.allocation_count, 3);
        assert_eq!(stats.deallocation_count, 1);
    }
}
