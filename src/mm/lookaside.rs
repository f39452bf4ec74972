//! Lookaside list - cache de blocos de tamanho fixo sobre um pool.
//!
//! Blocos liberados ficam numa free list intrusiva (o primeiro word do bloco
//! guarda o próximo) até `depth` entradas; acima disso voltam ao pool.
//! Alocações consomem a free list antes de recorrer ao pool.

use core::mem::{align_of, size_of};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;

use super::pool::{MemoryPool, PoolFlags};

/// Cabeçalho de um bloco livre dentro da lista
struct FreeBlock {
    next: Option<NonNull<FreeBlock>>,
}

/// Cadeia de blocos livres
struct FreeChain {
    head: Option<NonNull<FreeBlock>>,
    cached: usize,
}

// Send seguro pois é protegido pelo Mutex da lista
unsafe impl Send for FreeChain {}

impl FreeChain {
    const fn new() -> Self {
        Self {
            head: None,
            cached: 0,
        }
    }

    unsafe fn push(&mut self, ptr: NonNull<u8>) {
        let block = ptr.cast::<FreeBlock>();
        block.as_ptr().write(FreeBlock { next: self.head });
        self.head = Some(block);
        self.cached += 1;
    }

    unsafe fn pop(&mut self) -> Option<NonNull<u8>> {
        let block = self.head?;
        self.head = (*block.as_ptr()).next;
        self.cached -= 1;
        Some(block.cast())
    }
}

/// Estatísticas de acerto da lista
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LookasideStats {
    pub allocations: usize,
    /// Alocações servidas pela free list
    pub allocation_hits: usize,
    pub frees: usize,
    /// Liberações retidas na free list
    pub free_hits: usize,
}

/// Lista lookaside de blocos de tamanho fixo.
pub struct LookasideList {
    pool: &'static MemoryPool,
    block_size: usize,
    align: usize,
    tag: u32,
    depth: usize,
    free: Mutex<FreeChain>,
    allocations: AtomicUsize,
    allocation_hits: AtomicUsize,
    frees: AtomicUsize,
    free_hits: AtomicUsize,
}

impl LookasideList {
    /// Cria uma lista para blocos de `block_size` bytes.
    ///
    /// O tamanho efetivo nunca é menor que um ponteiro (o encadeamento
    /// intrusivo precisa dele).
    pub fn new(
        pool: &'static MemoryPool,
        block_size: usize,
        align: usize,
        tag: u32,
        depth: usize,
    ) -> Self {
        Self {
            pool,
            block_size: block_size.max(size_of::<FreeBlock>()),
            align: align.max(align_of::<FreeBlock>()),
            tag,
            depth,
            free: Mutex::new(FreeChain::new()),
            allocations: AtomicUsize::new(0),
            allocation_hits: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            free_hits: AtomicUsize::new(0),
        }
    }

    /// Tamanho fixo de cada bloco
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Blocos livres retidos agora
    pub fn cached(&self) -> usize {
        self.free.lock().cached
    }

    /// Entrega um bloco (conteúdo indefinido) ou `None` se o pool esgotou.
    pub fn allocate(&self) -> Option<NonNull<u8>> {
        self.allocations.fetch_add(1, Ordering::Relaxed);

        // SAFETY: blocos na cadeia foram entregues por este pool e estão livres
        if let Some(block) = unsafe { self.free.lock().pop() } {
            self.allocation_hits.fetch_add(1, Ordering::Relaxed);
            return Some(block);
        }

        self.pool
            .allocate(self.block_size, self.align, self.tag, PoolFlags::empty())
    }

    /// Devolve um bloco à lista (ou ao pool, se a lista está cheia).
    ///
    /// # Safety
    ///
    /// `ptr` deve ter vindo de `allocate` desta lista e não ser usado depois.
    pub unsafe fn free(&self, ptr: NonNull<u8>) {
        self.frees.fetch_add(1, Ordering::Relaxed);

        {
            let mut chain = self.free.lock();
            if chain.cached < self.depth {
                chain.push(ptr);
                self.free_hits.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        self.pool.free_with_tag(ptr, self.tag);
    }

    pub fn stats(&self) -> LookasideStats {
        LookasideStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            allocation_hits: self.allocation_hits.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            free_hits: self.free_hits.load(Ordering::Relaxed),
        }
    }
}

impl Drop for LookasideList {
    fn drop(&mut self) {
        let chain = self.free.get_mut();
        // SAFETY: blocos da cadeia pertencem ao pool e não têm mais donos
        while let Some(block) = unsafe { chain.pop() } {
            unsafe { self.pool.free_with_tag(block, self.tag) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::pool::{pool_tag, PoolType};

    crate::define_pool!(LookasidePool: NonPagedPool, "LookasidePool", 64 * 1024);
    crate::define_pool!(DrainPool: NonPagedPool, "DrainPool", 16 * 1024);

    #[test]
    fn freed_blocks_are_reused_up_to_depth() {
        let list = LookasideList::new(LookasidePool::pool(), 48, 8, pool_tag(b"LkTs"), 2);

        let a = list.allocate().unwrap();
        let b = list.allocate().unwrap();
        let c = list.allocate().unwrap();
        unsafe {
            list.free(a);
            list.free(b);
            list.free(c); // acima do depth: volta ao pool
        }
        assert_eq!(list.cached(), 2);

        let again = list.allocate().unwrap();
        assert_eq!(again, b);
        let stats = list.stats();
        assert_eq!(stats.allocation_hits, 1);
        assert_eq!(stats.free_hits, 2);
        unsafe { list.free(again) };
    }

    #[test]
    fn drop_drains_cache_back_to_pool() {
        let pool = DrainPool::pool();
        let before = pool.usage().bytes_in_use;
        {
            let list = LookasideList::new(pool, 32, 8, pool_tag(b"LkDr"), 8);
            let blocks: std::vec::Vec<_> = (0..4).map(|_| list.allocate().unwrap()).collect();
            for b in blocks {
                unsafe { list.free(b) };
            }
            assert_eq!(list.cached(), 4);
        }
        assert_eq!(pool.usage().bytes_in_use, before);
    }

    #[test]
    fn block_size_covers_a_link() {
        let list = LookasideList::new(LookasidePool::pool(), 1, 1, pool_tag(b"LkSm"), 1);
        assert!(list.block_size() >= size_of::<usize>());
    }
}
