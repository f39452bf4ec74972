//! # Família de Alocadores
//!
//! Contrato único (`KAllocator`) com quatro estratégias de aquisição de
//! memória, todas resolvidas em tempo de compilação:
//!
//! | Estratégia            | Origem                     | Tag           |
//! |-----------------------|----------------------------|---------------|
//! | `PoolAllocator`       | pool (paged / non-paged)   | padrão        |
//! | `TaggedPoolAllocator` | pool                       | do chamador   |
//! | `LookasideAllocator`  | lookaside list sobre pool  | do chamador   |
//!
//! Toda alocação bem-sucedida devolve memória zerada; falha devolve `None`.
//! Containers nunca alocam `T` diretamente: pedem `Rebind<No<T>>` ao
//! alocador recebido e alocam seus próprios nós.

use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ptr::NonNull;

use super::lookaside::{LookasideList, LookasideStats};
use super::pool::{NonPagedPool, PagedPool, PoolFlags, PoolType};
use crate::config::{DEFAULT_POOL_TAG, LOOKASIDE_DEPTH};

/// Contrato de alocador tipado.
///
/// # Safety
///
/// `allocate` deve devolver memória válida para `bytes` bytes, alinhada para
/// `Value`, zerada e exclusiva até o `deallocate` correspondente.
pub unsafe trait KAllocator: Default {
    /// Tipo de valor que este alocador entrega
    type Value;

    /// O mesmo alocador, para outro tipo de valor
    type Rebind<U>: KAllocator<Value = U>;

    /// Produz o alocador equivalente para `U`
    fn rebind<U>(&self) -> Self::Rebind<U>;

    /// Aloca `bytes` bytes zerados. Nunca espera indefinidamente.
    fn allocate(&mut self, bytes: usize) -> Option<NonNull<Self::Value>>;

    /// Devolve um bloco. Ponteiro nulo é ignorado.
    ///
    /// # Safety
    ///
    /// `ptr` deve ser nulo ou vir de `allocate` deste alocador.
    unsafe fn deallocate(&mut self, ptr: *mut Self::Value);

    /// `false` se o alocador não conseguiu se inicializar
    fn is_valid(&self) -> bool {
        true
    }

    /// Constrói o valor padrão no endereço.
    ///
    /// # Safety
    ///
    /// `ptr` deve apontar para memória válida e não inicializada.
    unsafe fn construct(&mut self, ptr: NonNull<Self::Value>)
    where
        Self::Value: Default,
    {
        ptr.as_ptr().write(Self::Value::default());
    }

    /// Move `value` para o endereço.
    ///
    /// # Safety
    ///
    /// `ptr` deve apontar para memória válida e não inicializada.
    unsafe fn construct_with(&mut self, ptr: NonNull<Self::Value>, value: Self::Value) {
        ptr.as_ptr().write(value);
    }

    /// Destrói o valor sem liberar a memória.
    ///
    /// # Safety
    ///
    /// `ptr` deve apontar para um valor vivo, que não será usado depois.
    unsafe fn destroy(&mut self, ptr: NonNull<Self::Value>) {
        core::ptr::drop_in_place(ptr.as_ptr());
    }

    /// Endereço de um valor
    fn address(&self, value: &Self::Value) -> NonNull<Self::Value> {
        NonNull::from(value)
    }
}

/// Alocador cujos blocos têm tamanho fixo (lookaside).
pub trait FixedBlockAllocator: KAllocator {
    /// Tamanho de cada bloco; 0 se o alocador é inválido
    fn block_size(&self) -> usize;
}

#[inline]
fn pool_allocate<T, P: PoolType>(bytes: usize, tag: u32) -> Option<NonNull<T>> {
    P::pool()
        .allocate(bytes, align_of::<T>(), tag, PoolFlags::ZERO_INIT)
        .map(NonNull::cast)
}

// =============================================================================
// POOL ALLOCATOR
// =============================================================================

/// Aloca direto do pool `P` com a tag padrão.
pub struct PoolAllocator<T, P: PoolType> {
    _marker: PhantomData<(fn() -> T, P)>,
}

impl<T, P: PoolType> PoolAllocator<T, P> {
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T, P: PoolType> Default for PoolAllocator<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P: PoolType> Clone for PoolAllocator<T, P> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

// SAFETY: blocos vêm do pool, zerados e alinhados para T
unsafe impl<T, P: PoolType> KAllocator for PoolAllocator<T, P> {
    type Value = T;
    type Rebind<U> = PoolAllocator<U, P>;

    fn rebind<U>(&self) -> PoolAllocator<U, P> {
        PoolAllocator::new()
    }

    fn allocate(&mut self, bytes: usize) -> Option<NonNull<T>> {
        pool_allocate::<T, P>(bytes, DEFAULT_POOL_TAG)
    }

    unsafe fn deallocate(&mut self, ptr: *mut T) {
        if let Some(p) = NonNull::new(ptr) {
            P::pool().free(p.cast());
        }
    }
}

// =============================================================================
// TAGGED POOL ALLOCATOR
// =============================================================================

/// Aloca do pool `P` com a tag `TAG`; libera conferindo a tag.
pub struct TaggedPoolAllocator<T, P: PoolType, const TAG: u32> {
    _marker: PhantomData<(fn() -> T, P)>,
}

impl<T, P: PoolType, const TAG: u32> TaggedPoolAllocator<T, P, TAG> {
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    pub const fn tag(&self) -> u32 {
        TAG
    }
}

impl<T, P: PoolType, const TAG: u32> Default for TaggedPoolAllocator<T, P, TAG> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P: PoolType, const TAG: u32> Clone for TaggedPoolAllocator<T, P, TAG> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

// SAFETY: blocos vêm do pool, zerados e alinhados para T
unsafe impl<T, P: PoolType, const TAG: u32> KAllocator for TaggedPoolAllocator<T, P, TAG> {
    type Value = T;
    type Rebind<U> = TaggedPoolAllocator<U, P, TAG>;

    fn rebind<U>(&self) -> TaggedPoolAllocator<U, P, TAG> {
        TaggedPoolAllocator::new()
    }

    fn allocate(&mut self, bytes: usize) -> Option<NonNull<T>> {
        pool_allocate::<T, P>(bytes, TAG)
    }

    unsafe fn deallocate(&mut self, ptr: *mut T) {
        if let Some(p) = NonNull::new(ptr) {
            P::pool().free_with_tag(p.cast(), TAG);
        }
    }
}

// =============================================================================
// LOOKASIDE ALLOCATOR
// =============================================================================

/// Aloca blocos de `size_of::<T>()` bytes de uma lookaside list própria.
///
/// O cabeçalho da lista é alocado do pool `P` (com `TAG`) na construção. Se
/// isso falhar, o alocador nasce inválido: `is_valid()` é `false` e toda
/// alocação devolve `None`.
pub struct LookasideAllocator<T, P: PoolType, const TAG: u32> {
    list: Option<NonNull<LookasideList>>,
    _marker: PhantomData<(fn() -> T, P)>,
}

// SAFETY: a lista só é acessada via &LookasideList, que é Sync
unsafe impl<T, P: PoolType, const TAG: u32> Send for LookasideAllocator<T, P, TAG> {}
unsafe impl<T, P: PoolType, const TAG: u32> Sync for LookasideAllocator<T, P, TAG> {}

impl<T, P: PoolType, const TAG: u32> LookasideAllocator<T, P, TAG> {
    pub fn new() -> Self {
        let pool = P::pool();
        let list = pool
            .allocate(
                size_of::<LookasideList>(),
                align_of::<LookasideList>(),
                TAG,
                PoolFlags::ZERO_INIT,
            )
            .map(|raw| {
                let list = raw.cast::<LookasideList>();
                // SAFETY: bloco novo, alinhado para LookasideList
                unsafe {
                    list.as_ptr().write(LookasideList::new(
                        pool,
                        size_of::<T>(),
                        align_of::<T>(),
                        TAG,
                        LOOKASIDE_DEPTH,
                    ));
                }
                list
            });

        if list.is_none() {
            crate::kwarn!("(Lookaside) falha ao alocar a lista, tag=", TAG);
        }

        Self {
            list,
            _marker: PhantomData,
        }
    }

    pub const fn tag(&self) -> u32 {
        TAG
    }

    /// Estatísticas da lista (None se inválido)
    pub fn stats(&self) -> Option<LookasideStats> {
        self.list().map(LookasideList::stats)
    }

    #[inline]
    fn list(&self) -> Option<&LookasideList> {
        // SAFETY: a lista vive até o Drop deste alocador
        self.list.map(|l| unsafe { &*l.as_ptr() })
    }
}

impl<T, P: PoolType, const TAG: u32> Default for LookasideAllocator<T, P, TAG> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P: PoolType, const TAG: u32> Drop for LookasideAllocator<T, P, TAG> {
    fn drop(&mut self) {
        if let Some(list) = self.list.take() {
            // SAFETY: a lista é exclusiva deste alocador
            unsafe {
                core::ptr::drop_in_place(list.as_ptr());
                P::pool().free_with_tag(list.cast(), TAG);
            }
        }
    }
}

// SAFETY: blocos da lista têm size_of::<T>() bytes alinhados e são zerados
unsafe impl<T, P: PoolType, const TAG: u32> KAllocator for LookasideAllocator<T, P, TAG> {
    type Value = T;
    type Rebind<U> = LookasideAllocator<U, P, TAG>;

    fn rebind<U>(&self) -> LookasideAllocator<U, P, TAG> {
        LookasideAllocator::new()
    }

    /// O tamanho pedido é ignorado: o bloco tem sempre o tamanho de `T`.
    /// Um pedido maior que o bloco não cabe nele e é tratado como falta de
    /// memória.
    fn allocate(&mut self, bytes: usize) -> Option<NonNull<T>> {
        let list = self.list()?;
        if bytes > list.block_size() {
            crate::kerror!("(Lookaside) pedido maior que o bloco, bytes=", bytes as u64);
            return None;
        }
        let block = list.allocate()?;
        // SAFETY: o bloco tem pelo menos size_of::<T>() bytes
        unsafe { core::ptr::write_bytes(block.as_ptr(), 0, size_of::<T>()) };
        Some(block.cast())
    }

    unsafe fn deallocate(&mut self, ptr: *mut T) {
        let Some(p) = NonNull::new(ptr) else {
            return;
        };
        match self.list() {
            Some(list) => list.free(p.cast()),
            None => debug_assert!(false, "(Lookaside) free em alocador inválido"),
        }
    }

    fn is_valid(&self) -> bool {
        self.list.is_some()
    }
}

impl<T, P: PoolType, const TAG: u32> FixedBlockAllocator for LookasideAllocator<T, P, TAG> {
    fn block_size(&self) -> usize {
        self.list().map_or(0, LookasideList::block_size)
    }
}

// =============================================================================
// ALIASES POR POOL
// =============================================================================

pub type PagedPoolAllocator<T> = PoolAllocator<T, PagedPool>;
pub type NonPagedPoolAllocator<T> = PoolAllocator<T, NonPagedPool>;
pub type TaggedPagedPoolAllocator<T, const TAG: u32> = TaggedPoolAllocator<T, PagedPool, TAG>;
pub type TaggedNonPagedPoolAllocator<T, const TAG: u32> =
    TaggedPoolAllocator<T, NonPagedPool, TAG>;
pub type PagedLookasideAllocator<T, const TAG: u32> = LookasideAllocator<T, PagedPool, TAG>;
pub type NonPagedLookasideAllocator<T, const TAG: u32> = LookasideAllocator<T, NonPagedPool, TAG>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::pool::{pool_tag, MemoryPool};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TAG: u32 = pool_tag(b"AlTs");

    crate::define_pool!(TinyPool: NonPagedPool, "TinyPool", 4096);

    struct Tracked(Arc<AtomicUsize>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn pool_allocator_hands_out_zeroed_memory() {
        let mut a = NonPagedPoolAllocator::<[u64; 8]>::default();
        let p = a.allocate(size_of::<[u64; 8]>()).unwrap();
        unsafe {
            assert_eq!(*p.as_ptr(), [0u64; 8]);
            assert!(NonPagedPool::pool().contains(p.as_ptr().cast()));
            a.deallocate(p.as_ptr());
            a.deallocate(core::ptr::null_mut());
        }
    }

    #[test]
    fn construct_and_destroy_do_not_free() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut a = PagedPoolAllocator::<Tracked>::default();
        let p = a.allocate(size_of::<Tracked>()).unwrap();
        unsafe {
            a.construct_with(p, Tracked(drops.clone()));
            assert_eq!(a.address(p.as_ref()), p);
            a.destroy(p);
            assert_eq!(drops.load(Ordering::SeqCst), 1);
            a.deallocate(p.as_ptr());
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn construct_writes_default_value() {
        let mut a = NonPagedPoolAllocator::<u32>::default();
        let p = a.allocate(4).unwrap();
        unsafe {
            p.as_ptr().write(77);
            a.construct(p);
            assert_eq!(*p.as_ptr(), 0);
            a.deallocate(p.as_ptr());
        }
    }

    #[test]
    fn tagged_allocator_stamps_blocks() {
        let a = TaggedPagedPoolAllocator::<u8, TAG>::default();
        let mut rebound = a.rebind::<u64>();
        let p = rebound.allocate(8).unwrap();
        unsafe {
            assert_eq!(MemoryPool::block_tag(p.cast()), TAG);
            assert!(PagedPool::pool().contains(p.as_ptr().cast()));
            rebound.deallocate(p.as_ptr());
        }
    }

    #[test]
    fn lookaside_reuses_fixed_blocks() {
        let mut a = NonPagedLookasideAllocator::<u128, TAG>::new();
        assert!(a.is_valid());
        assert!(a.block_size() >= size_of::<u128>());

        assert!(a.allocate(10_000).is_none());
        let p = a.allocate(1).unwrap();
        unsafe {
            p.as_ptr().write(u128::MAX);
            a.deallocate(p.as_ptr());
        }
        let q = a.allocate(0).unwrap();
        assert_eq!(p, q);
        assert_eq!(unsafe { *q.as_ptr() }, 0);
        assert_eq!(a.stats().unwrap().allocation_hits, 1);
        unsafe { a.deallocate(q.as_ptr()) };
    }

    #[test]
    fn lookaside_rebind_sizes_for_new_type() {
        let a = PagedLookasideAllocator::<u8, TAG>::new();
        let b = a.rebind::<[u64; 16]>();
        assert!(b.block_size() >= size_of::<[u64; 16]>());
    }

    #[test]
    fn lookaside_without_list_is_invalid() {
        let pool = TinyPool::pool();
        let mut hog = std::vec::Vec::new();
        while let Some(p) = pool.allocate(64, 16, TAG, PoolFlags::empty()) {
            hog.push(p);
        }

        let mut a = LookasideAllocator::<u64, TinyPool, TAG>::new();
        assert!(!a.is_valid());
        assert_eq!(a.block_size(), 0);
        assert!(a.allocate(8).is_none());
        unsafe { a.deallocate(core::ptr::null_mut()) };
        assert!(a.stats().is_none());

        for p in hog {
            unsafe { pool.free(p) };
        }
        assert!(LookasideAllocator::<u64, TinyPool, TAG>::new().is_valid());
    }
}
