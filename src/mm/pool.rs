//! # Pools de Memória do Kernel
//!
//! Primitiva bruta de alocação usada por toda a família de alocadores.
//!
//! ## 🎯 Propósito
//! - Modelar os pools paginável e não-paginável como regiões próprias,
//!   cada uma gerenciada por um `linked_list_allocator::Heap` first-fit.
//! - Carimbar cada bloco com uma tag de 4 bytes para diagnóstico de leaks.
//! - Nunca falhar com pânico: exaustão retorna `None`.
//!
//! ## Layout de um bloco
//!
//! ```text
//! base                       user (alinhado)
//!  | padding ... | PoolHeader | dados do chamador ... |
//! ```
//!
//! A região de cada pool é obtida do alocador global na primeira alocação
//! e nunca é devolvida (pools são estáticos).

use core::alloc::Layout;
use core::mem::size_of;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use bitflags::bitflags;
use linked_list_allocator::Heap;
use spin::{Mutex, Once};

use crate::config::{
    CACHE_LINE_SIZE, NON_PAGED_POOL_SIZE, PAGED_POOL_SIZE, PAGE_SIZE, POOL_ALIGNMENT,
};
use crate::klib::align::{align_up, is_aligned};
use crate::sync::{Irql, RawGuardedMutex, RawLock, RawSpinLock};

/// Converte 4 bytes ASCII em uma tag de pool.
///
/// `pool_tag(b"meMX")` aparece como "meMX" num dump de memória little-endian.
pub const fn pool_tag(tag: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*tag)
}

// =============================================================================
// TIPOS
// =============================================================================

/// Classe do pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Pode ser paginado para disco; só até APC_LEVEL
    Paged,
    /// Sempre residente; utilizável até DISPATCH_LEVEL
    NonPaged,
}

impl PoolKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Paged => "PagedPool",
            Self::NonPaged => "NonPagedPool",
        }
    }

    /// IRQL máximo em que memória deste pool pode ser tocada
    pub const fn max_irql(self) -> Irql {
        match self {
            Self::Paged => Irql::Apc,
            Self::NonPaged => Irql::Dispatch,
        }
    }
}

bitflags! {
    /// Flags de alocação
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PoolFlags: u32 {
        /// Preencher o bloco com zeros
        const ZERO_INIT     = 1 << 0;
        /// Alinhar o bloco à linha de cache
        const CACHE_ALIGNED = 1 << 1;
    }
}

/// Cabeçalho escondido imediatamente antes do ponteiro entregue
#[repr(C)]
struct PoolHeader {
    tag: u32,
    flags: u32,
    size: usize,
    offset: usize,
    align: usize,
}

const HEADER_SIZE: usize = size_of::<PoolHeader>();

/// Contadores atômicos de um pool
struct PoolStats {
    allocations: AtomicUsize,
    frees: AtomicUsize,
    failures: AtomicUsize,
    bytes_in_use: AtomicUsize,
}

impl PoolStats {
    const fn new() -> Self {
        Self {
            allocations: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            bytes_in_use: AtomicUsize::new(0),
        }
    }
}

/// Fotografia das estatísticas de um pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolUsage {
    pub allocations: usize,
    pub frees: usize,
    pub failures: usize,
    /// Bytes entregues aos chamadores e ainda não liberados
    pub bytes_in_use: usize,
    /// Tamanho total da região
    pub capacity: usize,
}

impl PoolUsage {
    /// Blocos ainda vivos
    pub const fn live_blocks(&self) -> usize {
        self.allocations - self.frees
    }
}

// =============================================================================
// MEMORY POOL
// =============================================================================

/// Um pool de memória do kernel.
pub struct MemoryPool {
    name: &'static str,
    kind: PoolKind,
    capacity: usize,
    /// Endereço base da região (0 se a região não pôde ser obtida)
    region: Once<usize>,
    heap: Mutex<Heap>,
    stats: PoolStats,
}

impl MemoryPool {
    pub const fn new(name: &'static str, kind: PoolKind, capacity: usize) -> Self {
        Self {
            name,
            kind,
            capacity,
            region: Once::new(),
            heap: Mutex::new(Heap::empty()),
            stats: PoolStats::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Obtém a região na primeira chamada. Retorna a base (0 = indisponível).
    fn region_base(&self) -> usize {
        *self.region.call_once(|| {
            if self.capacity < PAGE_SIZE {
                crate::kerror!("(Pool) capacidade menor que uma página=", self.capacity);
                return 0;
            }
            let layout = match Layout::from_size_align(self.capacity, PAGE_SIZE) {
                Ok(l) => l,
                Err(_) => return 0,
            };
            // SAFETY: layout com tamanho não-nulo
            let base = unsafe { alloc::alloc::alloc_zeroed(layout) };
            if base.is_null() {
                crate::kerror!("(Pool) região indisponível, tamanho=", self.capacity);
                return 0;
            }
            // SAFETY: região exclusiva deste pool e nunca devolvida
            unsafe { self.heap.lock().init(base, self.capacity) };
            crate::kdebug!("(Pool) região inicializada, tamanho=", self.capacity);
            base as usize
        })
    }

    /// Verifica se `ptr` pertence à região deste pool.
    pub fn contains(&self, ptr: *const u8) -> bool {
        match self.region.get() {
            Some(&base) if base != 0 => {
                let p = ptr as usize;
                p >= base && p < base + self.capacity
            }
            _ => false,
        }
    }

    /// Aloca `size` bytes alinhados a `align` (mínimo `POOL_ALIGNMENT`).
    ///
    /// Retorna `None` quando o pool está esgotado. Nunca bloqueia além do
    /// lock interno do heap.
    pub fn allocate(
        &self,
        size: usize,
        align: usize,
        tag: u32,
        flags: PoolFlags,
    ) -> Option<NonNull<u8>> {
        match self.try_allocate(size, align, tag, flags) {
            Some(p) => {
                self.stats.allocations.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes_in_use.fetch_add(size, Ordering::Relaxed);
                Some(p)
            }
            None => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                crate::ktrace!("(Pool) alloc: falhou, tamanho=", size);
                None
            }
        }
    }

    fn try_allocate(
        &self,
        size: usize,
        align: usize,
        tag: u32,
        flags: PoolFlags,
    ) -> Option<NonNull<u8>> {
        if self.region_base() == 0 {
            return None;
        }

        let mut align = align.max(POOL_ALIGNMENT);
        if flags.contains(PoolFlags::CACHE_ALIGNED) {
            align = align.max(CACHE_LINE_SIZE);
        }
        if !align.is_power_of_two() {
            return None;
        }

        let offset = align_up(HEADER_SIZE, align);
        let total = offset.checked_add(size)?;
        let layout = Layout::from_size_align(total, align).ok()?;

        let base = self.heap.lock().allocate_first_fit(layout).ok()?;

        // SAFETY: [base, base+total) pertence ao bloco recém-alocado
        unsafe {
            let user = base.as_ptr().add(offset);
            let header = user.sub(HEADER_SIZE) as *mut PoolHeader;
            header.write(PoolHeader {
                tag,
                flags: flags.bits(),
                size,
                offset,
                align,
            });
            if flags.contains(PoolFlags::ZERO_INIT) {
                core::ptr::write_bytes(user, 0, size);
            }
            debug_assert!(is_aligned(user as usize, align));
            Some(NonNull::new_unchecked(user))
        }
    }

    /// Libera um bloco sem conferir a tag.
    ///
    /// # Safety
    ///
    /// `ptr` deve ter vindo de `allocate` deste pool e ainda estar vivo.
    pub unsafe fn free(&self, ptr: NonNull<u8>) {
        self.release(ptr, None);
    }

    /// Libera um bloco conferindo a tag usada na alocação.
    ///
    /// # Safety
    ///
    /// Mesmo contrato de [`MemoryPool::free`].
    pub unsafe fn free_with_tag(&self, ptr: NonNull<u8>, tag: u32) {
        self.release(ptr, Some(tag));
    }

    unsafe fn release(&self, ptr: NonNull<u8>, expected_tag: Option<u32>) {
        debug_assert!(
            self.contains(ptr.as_ptr()),
            "(Pool) free: ponteiro fora da região do pool"
        );

        let header = Self::header(ptr).read();
        if let Some(tag) = expected_tag {
            if header.tag != tag {
                crate::kerror!("(Pool) free: tag divergente=", header.tag);
            }
            debug_assert_eq!(header.tag, tag, "(Pool) free: tag divergente");
        }

        let base = ptr.as_ptr().sub(header.offset);
        let layout = Layout::from_size_align_unchecked(header.offset + header.size, header.align);
        self.heap
            .lock()
            .deallocate(NonNull::new_unchecked(base), layout);

        self.stats.frees.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_in_use
            .fetch_sub(header.size, Ordering::Relaxed);
    }

    #[inline]
    unsafe fn header(ptr: NonNull<u8>) -> *const PoolHeader {
        ptr.as_ptr().sub(HEADER_SIZE) as *const PoolHeader
    }

    /// Tag gravada no bloco.
    ///
    /// # Safety
    ///
    /// `ptr` deve ser um bloco vivo deste pool.
    pub unsafe fn block_tag(ptr: NonNull<u8>) -> u32 {
        (*Self::header(ptr)).tag
    }

    /// Tamanho pedido na alocação do bloco.
    ///
    /// # Safety
    ///
    /// `ptr` deve ser um bloco vivo deste pool.
    pub unsafe fn block_size(ptr: NonNull<u8>) -> usize {
        (*Self::header(ptr)).size
    }

    /// Fotografia das estatísticas
    pub fn usage(&self) -> PoolUsage {
        PoolUsage {
            allocations: self.stats.allocations.load(Ordering::Relaxed),
            frees: self.stats.frees.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            bytes_in_use: self.stats.bytes_in_use.load(Ordering::Relaxed),
            capacity: self.capacity,
        }
    }
}

// =============================================================================
// CLASSES DE POOL (dispatch estático)
// =============================================================================

/// Pool paginável global
pub static PAGED_POOL: MemoryPool = MemoryPool::new("PagedPool", PoolKind::Paged, PAGED_POOL_SIZE);

/// Pool não-paginável global
pub static NON_PAGED_POOL: MemoryPool =
    MemoryPool::new("NonPagedPool", PoolKind::NonPaged, NON_PAGED_POOL_SIZE);

/// Seleciona, em tempo de compilação, um pool e a classe de lock que
/// protege containers que vivem nele.
pub trait PoolType: 'static + Send + Sync {
    const KIND: PoolKind;

    /// Lock usado por containers com lock interno neste pool
    type Lock: RawLock;

    fn pool() -> &'static MemoryPool;
}

/// Marcador do pool paginável
#[derive(Debug, Clone, Copy, Default)]
pub struct PagedPool;

/// Marcador do pool não-paginável
#[derive(Debug, Clone, Copy, Default)]
pub struct NonPagedPool;

impl PoolType for PagedPool {
    const KIND: PoolKind = PoolKind::Paged;
    type Lock = RawGuardedMutex;

    fn pool() -> &'static MemoryPool {
        &PAGED_POOL
    }
}

impl PoolType for NonPagedPool {
    const KIND: PoolKind = PoolKind::NonPaged;
    type Lock = RawSpinLock;

    fn pool() -> &'static MemoryPool {
        &NON_PAGED_POOL
    }
}

/// Declara um pool adicional com região própria.
///
/// A classe (`PagedPool` ou `NonPagedPool`) define o tipo de lock.
///
/// ```ignore
/// kstl::define_pool!(pub DriverPool: NonPagedPool, "DriverPool", 256 * 1024);
/// ```
#[macro_export]
macro_rules! define_pool {
    ($(#[$meta:meta])* $vis:vis $name:ident : $class:ident, $label:expr, $capacity:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $name;

        impl $crate::mm::pool::PoolType for $name {
            const KIND: $crate::mm::pool::PoolKind =
                <$crate::mm::pool::$class as $crate::mm::pool::PoolType>::KIND;
            type Lock = <$crate::mm::pool::$class as $crate::mm::pool::PoolType>::Lock;

            fn pool() -> &'static $crate::mm::pool::MemoryPool {
                static POOL: $crate::mm::pool::MemoryPool = $crate::mm::pool::MemoryPool::new(
                    $label,
                    <$crate::mm::pool::$class as $crate::mm::pool::PoolType>::KIND,
                    $capacity,
                );
                &POOL
            }
        }
    };
}
