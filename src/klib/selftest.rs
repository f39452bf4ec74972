//! Autoteste dos containers sobre os pools globais.
//!
//! Roda no boot (feature `self_test`) antes de qualquer driver usar a KStl.
//! Nenhum caso entra em pânico: falhas viram `TestResult::Failed`.

use super::test_framework::{run_test_suite, SuiteSummary, TestCase, TestResult};
use super::tree::{NonPagedPoolMap, NonPagedPoolSet};
use super::{NonPagedPoolForwardList, NonPagedPoolList, NonPagedPoolQueue, NonPagedPoolVector};
use crate::mm::allocator::{KAllocator, NonPagedLookasideAllocator};
use crate::mm::pool::pool_tag;
use crate::ptr::{AutoPtr, SharedPtr};

const SELFTEST_TAG: u32 = pool_tag(b"TlsK");

const CONTAINER_TESTS: &[TestCase] = &[
    TestCase::new("vector: crescimento e encolhimento", test_vector_growth),
    TestCase::new("list: ordem nas duas pontas", test_list_order),
    TestCase::new("forward_list: push e pop", test_forward_list),
    TestCase::new("queue: FIFO", test_queue_fifo),
    TestCase::new("set: ordem e duplicatas", test_set_order),
    TestCase::new("map: indexação", test_map_index),
    TestCase::new("auto_ptr: transferência", test_auto_ptr_transfer),
    TestCase::new("shared_ptr: contagem", test_shared_ptr_count),
    TestCase::new("lookaside: validade", test_lookaside_valid),
];

/// Executa a suite de containers
pub fn run_container_tests() -> SuiteSummary {
    run_test_suite("kstl containers", CONTAINER_TESTS)
}

fn test_vector_growth() -> TestResult {
    let mut v = NonPagedPoolVector::<u32>::new();
    for i in 0..5 {
        if v.push_back(i).is_err() {
            return TestResult::Failed;
        }
    }
    if v.len() != 5 || v.capacity() != 8 {
        return TestResult::Failed;
    }
    while v.pop_back().is_some() {}
    TestResult::check(v.is_empty() && v.capacity() == 1)
}

fn test_list_order() -> TestResult {
    let mut list = NonPagedPoolList::<u32>::new();
    if list.insert_last(2).is_err() || list.insert_first(1).is_err() || list.insert_last(3).is_err() {
        return TestResult::Failed;
    }
    let mut expected = 1;
    for value in list.iter() {
        if *value != expected {
            return TestResult::Failed;
        }
        expected += 1;
    }
    TestResult::check(list.remove_last() == Some(3) && list.remove_first() == Some(1))
}

fn test_forward_list() -> TestResult {
    let mut list = NonPagedPoolForwardList::<u32>::new();
    if list.push(2).is_err() || list.push(1).is_err() || list.push_back(3).is_err() {
        return TestResult::Failed;
    }
    let ok = list.pop() == Some(1) && list.pop() == Some(2) && list.pop() == Some(3);
    TestResult::check(ok && list.pop().is_none())
}

fn test_queue_fifo() -> TestResult {
    let mut queue = NonPagedPoolQueue::<u64>::new();
    for i in 0..16 {
        if queue.push(i).is_err() {
            return TestResult::Failed;
        }
    }
    for i in 0..16 {
        if queue.pop() != Some(i) {
            return TestResult::Failed;
        }
    }
    TestResult::check(queue.is_empty())
}

fn test_set_order() -> TestResult {
    let mut set = NonPagedPoolSet::<u32>::new();
    if !set.is_valid() {
        return TestResult::Skipped;
    }
    for v in [5, 1, 9, 3, 7] {
        if set.insert(v).is_err() {
            return TestResult::Failed;
        }
    }
    if set.insert(3).is_ok() {
        return TestResult::Failed;
    }
    let mut prev = 0;
    for v in set.iter() {
        if *v <= prev {
            return TestResult::Failed;
        }
        prev = *v;
    }
    TestResult::check(set.len() == 5 && set.erase(&9) && !set.contains(&9))
}

fn test_map_index() -> TestResult {
    let mut map = NonPagedPoolMap::<u32, u64>::new();
    *map.get_or_insert_default(7) += 70;
    *map.get_or_insert_default(7) += 1;
    TestResult::check(map.get(&7) == Some(71) && map.len() == 1)
}

fn test_auto_ptr_transfer() -> TestResult {
    let mut first = AutoPtr::new(42u32);
    if first.is_null() {
        return TestResult::Skipped;
    }
    let second = AutoPtr::take_from(&mut first);
    TestResult::check(first.is_null() && second.as_ref() == Some(&42))
}

fn test_shared_ptr_count() -> TestResult {
    let a = SharedPtr::<u32>::new(9);
    if !a.is_valid() {
        return TestResult::Skipped;
    }
    let b = a.clone();
    if a.ref_count() != 2 {
        return TestResult::Failed;
    }
    drop(b);
    TestResult::check(a.ref_count() == 1 && a.as_ref() == Some(&9))
}

fn test_lookaside_valid() -> TestResult {
    let mut alloc = NonPagedLookasideAllocator::<u64, SELFTEST_TAG>::new();
    if !alloc.is_valid() {
        return TestResult::Failed;
    }
    let Some(block) = alloc.allocate(core::mem::size_of::<u64>()) else {
        return TestResult::Failed;
    };
    // SAFETY: bloco veio deste alocador
    unsafe { alloc.deallocate(block.as_ptr()) };
    TestResult::check(alloc.stats().is_some())
}
