//! Fila FIFO sobre a lista dupla.

use crate::error::KResult;
use crate::klib::list::linked::{self, List};
use crate::mm::allocator::{
    KAllocator, NonPagedLookasideAllocator, NonPagedPoolAllocator, PagedLookasideAllocator,
    PagedPoolAllocator, TaggedNonPagedPoolAllocator, TaggedPagedPoolAllocator,
};

/// Fila: `push` no fim, `pop` no início.
pub struct Queue<T, A: KAllocator<Value = T>> {
    holder: List<T, A>,
}

impl<T, A: KAllocator<Value = T>> Queue<T, A> {
    pub fn new() -> Self {
        Self { holder: List::new() }
    }

    pub fn with_allocator(allocator: &A) -> Self {
        Self {
            holder: List::with_allocator(allocator),
        }
    }

    pub fn push(&mut self, value: T) -> KResult<()> {
        self.holder.insert_last(value)
    }

    pub fn pop(&mut self) -> Option<T> {
        self.holder.remove_first()
    }

    /// Próximo a sair
    pub fn front(&self) -> Option<&T> {
        self.holder.front()
    }

    pub fn len(&self) -> usize {
        self.holder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holder.is_empty()
    }

    pub fn cleanup(&mut self) {
        self.holder.cleanup();
    }

    /// Percorre do mais antigo ao mais novo
    pub fn iter(&self) -> linked::Iter<'_, T> {
        self.holder.iter()
    }
}

impl<T, A: KAllocator<Value = T>> Default for Queue<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

pub type PagedPoolQueue<T> = Queue<T, PagedPoolAllocator<T>>;
pub type NonPagedPoolQueue<T> = Queue<T, NonPagedPoolAllocator<T>>;
pub type TaggedPagedPoolQueue<T, const TAG: u32> = Queue<T, TaggedPagedPoolAllocator<T, TAG>>;
pub type TaggedNonPagedPoolQueue<T, const TAG: u32> = Queue<T, TaggedNonPagedPoolAllocator<T, TAG>>;
pub type PagedLookasideQueue<T, const TAG: u32> = Queue<T, PagedLookasideAllocator<T, TAG>>;
pub type NonPagedLookasideQueue<T, const TAG: u32> = Queue<T, NonPagedLookasideAllocator<T, TAG>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KError;
    use crate::klib::list::linked::ListNode;
    use crate::mm::allocator::LookasideAllocator;
    use crate::mm::pool::{pool_tag, PoolFlags, PoolType};
    use core::mem::size_of;
    use core::ptr::NonNull;
    use std::vec::Vec;

    const TAG: u32 = pool_tag(b"QuTs");

    crate::define_pool!(QueuePool: NonPagedPool, "QueuePool", 4096);
    crate::define_pool!(BarePool: PagedPool, "BarePool", 4096);

    type StarvedQueue = Queue<u64, LookasideAllocator<u64, QueuePool, TAG>>;
    type BareQueue = Queue<u64, LookasideAllocator<u64, BarePool, TAG>>;

    /// Ocupa o pool com blocos do tamanho de um nó até esgotá-lo
    fn exhaust<P: PoolType>() -> Vec<NonNull<u8>> {
        let node = size_of::<ListNode<u64>>();
        let mut hog = Vec::new();
        while let Some(p) = P::pool().allocate(node, 16, 0, PoolFlags::empty()) {
            hog.push(p);
        }
        hog
    }

    #[test]
    fn pops_in_push_order() {
        let mut q = NonPagedPoolQueue::<u32>::new();
        for v in 1..=3 {
            q.push(v).unwrap();
        }
        assert_eq!(q.front(), Some(&1));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        q.push(4).unwrap();
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), [3, 4]);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn empty_pop_is_none() {
        let mut q = PagedLookasideQueue::<u8, TAG>::new();
        assert_eq!(q.pop(), None);
        assert_eq!(q.front(), None);
        q.push(1).unwrap();
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), None);
        q.push(2).unwrap();
        q.cleanup();
        assert!(q.is_empty());
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn interleaved_push_and_pop_keep_fifo_order() {
        let mut q = TaggedPagedPoolQueue::<u32, TAG>::new();
        let mut expected = 0;
        let mut next = 0;
        for round in 1..=20 {
            for _ in 0..round % 4 + 1 {
                q.push(next).unwrap();
                next += 1;
            }
            for _ in 0..round % 3 {
                match q.pop() {
                    Some(v) => {
                        assert_eq!(v, expected);
                        expected += 1;
                    }
                    None => assert_eq!(expected, next),
                }
            }
            assert_eq!(q.len() as u32, next - expected);
        }
        while let Some(v) = q.pop() {
            assert_eq!(v, expected);
            expected += 1;
        }
        assert_eq!(expected, next);
    }

    #[test]
    fn push_fails_when_the_pool_runs_dry() {
        let pool = QueuePool::pool();
        let mut q = StarvedQueue::new();
        let mut hog = exhaust::<QueuePool>();

        assert_eq!(q.push(1), Err(KError::OutOfMemory));
        assert!(q.is_empty());

        let last = hog.pop().unwrap();
        unsafe { pool.free(last) };
        q.push(1).unwrap();
        assert_eq!(q.push(2), Err(KError::OutOfMemory));
        assert_eq!(q.len(), 1);

        // o nó liberado fica na lookaside e volta no próximo push
        assert_eq!(q.pop(), Some(1));
        q.push(3).unwrap();
        assert_eq!(q.pop(), Some(3));

        drop(q);
        for p in hog {
            unsafe { pool.free(p) };
        }
    }

    #[test]
    fn invalid_lookaside_rejects_push() {
        let pool = BarePool::pool();
        let hog = exhaust::<BarePool>();
        let mut q = BareQueue::new();
        assert_eq!(q.push(1), Err(KError::InvalidAllocator));
        assert_eq!(q.pop(), None);

        drop(q);
        for p in hog {
            unsafe { pool.free(p) };
        }
    }
}
