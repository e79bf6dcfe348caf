use arenalloc::{AllocDesc, AllocFlags, ArenaAllocator, BlockId, IdentityManager, UserHandle};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

const ARENA_SIZE: usize = 256 * 1024;

fn sizes(count: usize) -> Vec<usize> {
    // deterministic mix of small and medium requests
    (0..count).map(|i| 16 + (i * 7919) % 1024).collect()
}

fn bench_alloc_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_free");

    for count in [100, 1_000, 10_000] {
        let sizes = sizes(count);
        group.bench_with_input(BenchmarkId::new("best_fit", count), &sizes, |b, sizes| {
            b.iter(|| {
                let mut manager = IdentityManager;
                let mut allocator =
                    ArenaAllocator::<IdentityManager>::default().with_arena_size(ARENA_SIZE);
                let mut blocks: Vec<BlockId> = Vec::with_capacity(sizes.len());
                for (user, &size) in sizes.iter().enumerate() {
                    let desc = AllocDesc::new(size, UserHandle(user as u32)).with_alignment(16);
                    blocks.push(allocator.allocate(&mut manager, &desc).unwrap().block);
                }
                // free every other block first to exercise merging on the rest
                for &block in blocks.iter().step_by(2) {
                    allocator.deallocate(&mut manager, block);
                }
                for &block in blocks.iter().skip(1).step_by(2) {
                    allocator.deallocate(&mut manager, block);
                }
                black_box(allocator.arenas_len())
            });
        });
    }

    group.finish();
}

fn bench_defragment(c: &mut Criterion) {
    let mut group = c.benchmark_group("defragment");

    for count in [1_000, 10_000] {
        let sizes = sizes(count);
        group.bench_with_input(BenchmarkId::new("half_free", count), &sizes, |b, sizes| {
            b.iter_with_setup(
                || {
                    let mut manager = IdentityManager;
                    let mut allocator =
                        ArenaAllocator::<IdentityManager>::default().with_arena_size(ARENA_SIZE);
                    let blocks: Vec<BlockId> = sizes
                        .iter()
                        .enumerate()
                        .map(|(user, &size)| {
                            let desc = AllocDesc::new(size, UserHandle(user as u32))
                                .with_flags(AllocFlags::NONE);
                            allocator.allocate(&mut manager, &desc).unwrap().block
                        })
                        .collect();
                    for &block in blocks.iter().step_by(2) {
                        allocator.deallocate(&mut manager, block);
                    }
                    allocator
                },
                |mut allocator| {
                    allocator.defragment(&mut IdentityManager).unwrap();
                    black_box(allocator.free_size())
                },
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_alloc_free, bench_defragment);
criterion_main!(benches);
