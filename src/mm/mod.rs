//! # Memory Management (MM)
//!
//! Camada de memória da KStl.
//!
//! ## 🏗️ Arquitetura dos Módulos
//!
//! | Módulo      | Responsabilidade |
//! |-------------|------------------|
//! | `pool`      | Pools paged/non-paged com tag, flags e estatísticas. |
//! | `lookaside` | Cache de blocos de tamanho fixo sobre um pool. |
//! | `allocator` | Contrato `KAllocator` e as estratégias usadas pelos containers. |
//!
//! ## Regras
//!
//! - Falta de memória nunca causa pânico: volta `None`.
//! - Containers em pool paginável só podem ser usados até APC_LEVEL.
//! - Alocadores lookaside devem ser checados com `is_valid()`.

pub mod allocator;
pub mod lookaside;
pub mod pool;

pub use allocator::{
    FixedBlockAllocator, KAllocator, LookasideAllocator, NonPagedLookasideAllocator,
    NonPagedPoolAllocator, PagedLookasideAllocator, PagedPoolAllocator, PoolAllocator,
    TaggedNonPagedPoolAllocator, TaggedPagedPoolAllocator, TaggedPoolAllocator,
};
pub use lookaside::{LookasideList, LookasideStats};
pub use pool::{
    pool_tag, MemoryPool, NonPagedPool, PagedPool, PoolFlags, PoolKind, PoolType, PoolUsage,
    NON_PAGED_POOL, PAGED_POOL,
};
