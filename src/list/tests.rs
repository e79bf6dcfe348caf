use rust_alloc::vec::Vec;

use super::{Accessor, IndexList, ListNode, NULL};
use crate::pool::IndexedPool;

// a value threaded through two independent lists
#[derive(Debug, Default)]
struct Item {
    value: u32,
    primary: ListNode,
    secondary: ListNode,
}

struct Primary;

impl Accessor for Primary {
    type Value = Item;

    fn links(value: &Item) -> &ListNode {
        &value.primary
    }

    fn links_mut(value: &mut Item) -> &mut ListNode {
        &mut value.primary
    }
}

struct Secondary;

impl Accessor for Secondary {
    type Value = Item;

    fn links(value: &Item) -> &ListNode {
        &value.secondary
    }

    fn links_mut(value: &mut Item) -> &mut ListNode {
        &mut value.secondary
    }
}

fn item(pool: &mut IndexedPool<Item>, value: u32) -> u32 {
    pool.emplace(Item {
        value,
        ..Item::default()
    })
}

fn values(list: &IndexList<Primary>, pool: &IndexedPool<Item>) -> Vec<u32> {
    list.iter(pool).map(|h| pool[h].value).collect()
}

#[test]
fn push_back_and_iterate() {
    let mut pool = IndexedPool::new();
    let mut list = IndexList::<Primary>::new();
    assert!(list.is_empty());

    for v in 0..4 {
        let h = item(&mut pool, v);
        list.push_back(&mut pool, h);
    }

    assert_eq!(values(&list, &pool), [0, 1, 2, 3]);
    let backwards: Vec<u32> = list.iter(&pool).rev().map(|h| pool[h].value).collect();
    assert_eq!(backwards, [3, 2, 1, 0]);
    assert_eq!(list.first(), Some(0));
    assert_eq!(list.last(), Some(3));
}

#[test]
fn insert_before_front_and_middle() {
    let mut pool = IndexedPool::new();
    let mut list = IndexList::<Primary>::new();
    let a = item(&mut pool, 1);
    let c = item(&mut pool, 3);
    list.push_back(&mut pool, a);
    list.push_back(&mut pool, c);

    let b = item(&mut pool, 2);
    list.insert_before(&mut pool, c, b);
    let z = item(&mut pool, 0);
    list.insert_before(&mut pool, a, z);

    assert_eq!(values(&list, &pool), [0, 1, 2, 3]);
    assert_eq!(list.first(), Some(z));
    assert_eq!(list.next(&pool, a), Some(b));
    assert_eq!(list.prev(&pool, c), Some(b));
    assert_eq!(list.prev(&pool, z), None);
    assert_eq!(list.next(&pool, c), None);
}

#[test]
fn erase_ends_and_middle() {
    let mut pool = IndexedPool::new();
    let mut list = IndexList::<Primary>::new();
    let handles: Vec<u32> = (0..5)
        .map(|v| {
            let h = item(&mut pool, v);
            list.push_back(&mut pool, h);
            h
        })
        .collect();

    list.erase(&mut pool, handles[0]);
    list.erase(&mut pool, handles[4]);
    list.erase(&mut pool, handles[2]);

    assert_eq!(values(&list, &pool), [1, 3]);
    assert_eq!(list.first(), Some(handles[1]));
    assert_eq!(list.last(), Some(handles[3]));
    // erased nodes are unlinked but still pooled
    assert_eq!(pool[handles[2]].primary, ListNode::unlinked());

    list.erase(&mut pool, handles[1]);
    list.erase(&mut pool, handles[3]);
    assert!(list.is_empty());
    assert_eq!(list.last(), None);
}

#[test]
fn same_values_in_two_lists() {
    let mut pool = IndexedPool::new();
    let mut primary = IndexList::<Primary>::new();
    let mut secondary = IndexList::<Secondary>::new();

    let handles: Vec<u32> = (0..3).map(|v| item(&mut pool, v)).collect();
    for &h in &handles {
        primary.push_back(&mut pool, h);
        secondary.insert_before(&mut pool, secondary.first().unwrap_or(NULL), h);
    }

    assert_eq!(values(&primary, &pool), [0, 1, 2]);
    let reversed: Vec<u32> = secondary.iter(&pool).map(|h| pool[h].value).collect();
    assert_eq!(reversed, [2, 1, 0]);
}

#[test]
fn clear_releases_pool_slots() {
    let mut pool = IndexedPool::new();
    let mut list = IndexList::<Primary>::new();
    let outside = item(&mut pool, 99);
    for v in 0..3 {
        let h = item(&mut pool, v);
        list.push_back(&mut pool, h);
    }

    list.clear(&mut pool);
    assert!(list.is_empty());
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[outside].value, 99);
}

#[test]
fn double_ended_iteration_meets_in_the_middle() {
    let mut pool = IndexedPool::new();
    let mut list = IndexList::<Primary>::new();
    for v in 0..3 {
        let h = item(&mut pool, v);
        list.push_back(&mut pool, h);
    }

    let mut iter = list.iter(&pool);
    assert_eq!(iter.next(), Some(0));
    assert_eq!(iter.next_back(), Some(2));
    assert_eq!(iter.next(), Some(1));
    assert_eq!(iter.next_back(), None);
    assert_eq!(iter.next(), None);
}
