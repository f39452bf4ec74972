//! # Configuração da KStl
//!
//! Define constantes de tamanho, tags de pool e limites globais da biblioteca.

use crate::mm::pool::pool_tag;

// =============================================================================
// CONSTANTES DE TAMANHO
// =============================================================================

/// Tamanho de uma página (4 KiB)
pub const PAGE_SIZE: usize = 4096;

/// Tamanho de uma linha de cache
pub const CACHE_LINE_SIZE: usize = 64;

// =============================================================================
// CONFIGURAÇÃO DOS POOLS
// =============================================================================

/// Tamanho da região do pool paginável (16 MiB)
pub const PAGED_POOL_SIZE: usize = 16 * 1024 * 1024;

/// Tamanho da região do pool não-paginável (8 MiB)
pub const NON_PAGED_POOL_SIZE: usize = 8 * 1024 * 1024;

/// Alinhamento mínimo de qualquer bloco entregue por um pool
pub const POOL_ALIGNMENT: usize = 16;

/// Máximo de blocos livres retidos por uma lookaside list
pub const LOOKASIDE_DEPTH: usize = 256;

// =============================================================================
// TAGS
// =============================================================================

/// Tag usada pelos alocadores sem tag explícita
pub const DEFAULT_POOL_TAG: u32 = pool_tag(b"meMX");

/// Tag dos blocos de controle do `SharedPtr`
pub const SHARED_PTR_COUNTER_TAG: u32 = pool_tag(b"CPhS");

// =============================================================================
// LIMITES DE CONTAINERS
// =============================================================================

/// Número máximo de elementos de um `Vector`
pub const VECTOR_MAX_SIZE: usize = 0x7FFF_FFFF;

// =============================================================================
// SINCRONIZAÇÃO
// =============================================================================

/// Tentativas de spin do GuardedMutex antes de chamar o wait hook
pub const MUTEX_SPIN_LIMIT: u32 = 128;
