//! Uso da KStl como um driver usaria: só a API pública.

use kstl::klib::tree::{NonPagedLookasideMap, PagedPoolSet};
use kstl::klib::{NonPagedPoolList, NonPagedPoolQueue, PagedPoolVector};
use kstl::mm::pool::pool_tag;
use kstl::mm::{NonPagedPoolAllocator, PoolType, TaggedPoolAllocator};
use kstl::{AutoPtr, KError, SharedPtr};

const DRV_TAG: u32 = pool_tag(b"vrDT");

kstl::define_pool!(DriverPool: NonPagedPool, "DriverPool", 8 * 1024);

#[test]
fn vector_reports_capacity_exceeded_instead_of_panicking() {
    let mut v = PagedPoolVector::<u8>::new();
    assert_eq!(v.resize(0x8000_0000, 0), Err(KError::CapacityExceeded));
    assert!(v.is_empty());
    v.push_back(1).unwrap();
    assert_eq!(v.as_slice(), &[1]);
}

#[test]
fn small_private_pool_runs_dry_without_panicking() {
    let mut v = kstl::Vector::<u64, TaggedPoolAllocator<u64, DriverPool, DRV_TAG>>::new();
    let mut pushed = 0usize;
    while v.push_back(pushed as u64).is_ok() {
        pushed += 1;
        assert!(pushed < 8 * 1024, "pool nunca esgotou");
    }
    assert!(pushed > 0);
    assert_eq!(v.len(), pushed);
    v.cleanup();
    assert_eq!(DriverPool::pool().usage().live_blocks(), 0);
}

#[test]
fn list_and_queue_share_the_allocator_family() {
    let mut list = NonPagedPoolList::<u32>::with_allocator(&NonPagedPoolAllocator::default());
    let mut queue = NonPagedPoolQueue::<u32>::new();
    for i in 0..10 {
        list.insert_last(i).unwrap();
        queue.push(i).unwrap();
    }
    let from_list: Vec<u32> = list.iter().copied().collect();
    let from_queue: Vec<u32> = core::iter::from_fn(|| queue.pop()).collect();
    assert_eq!(from_list, from_queue);
}

#[test]
fn set_and_lookaside_map_work_side_by_side() {
    let mut set = PagedPoolSet::<u32>::new();
    let mut map = NonPagedLookasideMap::<u32, u32, DRV_TAG>::new();
    assert!(map.is_valid());

    for k in [30, 10, 20] {
        set.insert(k).unwrap();
        *map.get_or_insert_default(k) = k * 2;
    }
    assert_eq!(set.insert(10), Err(KError::AlreadyExists));
    assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![10, 20, 30]);
    assert_eq!(
        map.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
        vec![(10, 20), (20, 40), (30, 60)]
    );
}

#[test]
fn pointers_release_into_the_kernel_pools() {
    let shared = SharedPtr::<u64>::new(5);
    let copy = shared.clone();
    assert_eq!(copy.ref_count(), 2);
    drop(shared);
    assert_eq!(copy.ref_count(), 1);

    let mut owner = AutoPtr::new([0u8; 32]);
    let moved = AutoPtr::take_from(&mut owner);
    assert!(owner.is_null());
    assert_eq!(moved.as_ref().map(|a| a.len()), Some(32));
}

#[test]
fn paged_map_is_shared_between_threads() {
    use std::sync::Arc;
    use kstl::klib::tree::PagedPoolMap;

    let map = Arc::new(PagedPoolMap::<u32, u32>::new());
    let workers: Vec<_> = (0..4u32)
        .map(|t| {
            let map = map.clone();
            std::thread::spawn(move || {
                for k in 0..200u32 {
                    // Chaves repetidas entre threads: só a primeira inserção vence
                    let _ = map.insert(k, t);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(map.len(), 200);
    let mut keys = Vec::new();
    map.for_each(|k, v| {
        assert!(*v < 4);
        keys.push(*k);
    });
    assert_eq!(keys, (0..200).collect::<Vec<_>>());
}
