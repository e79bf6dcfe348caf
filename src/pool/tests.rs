use rust_alloc::vec::Vec;

use super::IndexedPool;

#[test]
fn emplace_and_index() {
    let mut pool = IndexedPool::new();
    let a = pool.emplace(10u64);
    let b = pool.emplace(20u64);

    assert_eq!(a, 0);
    assert_eq!(b, 1);
    assert_eq!(pool[a], 10);
    assert_eq!(pool[b], 20);
    assert_eq!(pool.len(), 2);

    pool[a] += 5;
    assert_eq!(pool[a], 15);
}

#[test]
fn erased_slots_are_reused_last_in_first_out() {
    let mut pool = IndexedPool::new();
    let handles: Vec<u32> = (0..8).map(|i| pool.emplace(i)).collect();

    assert_eq!(pool.erase(handles[2]), 2);
    assert_eq!(pool.erase(handles[5]), 5);
    assert_eq!(pool.len(), 6);

    // the free chain hands back the most recently erased slot first
    assert_eq!(pool.next_handle(), handles[5]);
    assert_eq!(pool.emplace(50), handles[5]);
    assert_eq!(pool.emplace(20), handles[2]);
    assert_eq!(pool.next_handle(), 8);
    assert_eq!(pool.emplace(80), 8);
}

#[test]
fn handles_survive_unrelated_churn() {
    let mut pool = IndexedPool::new();
    let keep = pool.emplace("keep");
    for _ in 0..100 {
        let tmp = pool.emplace("tmp");
        pool.erase(tmp);
    }
    assert_eq!(pool[keep], "keep");
    assert_eq!(pool.len(), 1);
    // churn never needed more than one extra slot
    assert_eq!(pool.next_handle(), 1);
}

#[test]
fn get_and_contains() {
    let mut pool = IndexedPool::new();
    let a = pool.emplace('a');
    let b = pool.emplace('b');
    pool.erase(a);

    assert!(!pool.contains(a));
    assert!(pool.contains(b));
    assert_eq!(pool.get(a), None);
    assert_eq!(pool.get(b), Some(&'b'));
    assert_eq!(pool.get(99), None);

    let live: Vec<(u32, char)> = pool.iter().map(|(h, v)| (h, *v)).collect();
    assert_eq!(live, [(b, 'b')]);
}

#[test]
#[should_panic]
fn double_erase_panics() {
    let mut pool = IndexedPool::new();
    let a = pool.emplace(1);
    pool.erase(a);
    pool.erase(a);
}

#[test]
#[should_panic]
fn indexing_vacant_slot_panics() {
    let mut pool = IndexedPool::new();
    let a = pool.emplace(1);
    pool.erase(a);
    let _ = pool[a];
}
