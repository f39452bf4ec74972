//! KStl - Kernel Template Library.
//!
//! Containers, smart pointers e alocadores do Redstone OS ligados aos pools
//! de memória do kernel (paged, non-paged, com tag e lookaside).
//!
//! Nenhuma operação lança ou entra em pânico por falta de memória: toda
//! falha de alocação volta como valor (`None`, `Err(KError)` ou estado
//! inválido). Os containers são parametrizados por alocador via dispatch
//! estático; não há dispatch dinâmico no caminho quente.

#![cfg_attr(not(test), no_std)]

// Os pools obtêm suas regiões do alocador global do kernel
extern crate alloc;

// --- Infraestrutura ---
pub mod config; // Constantes de tamanho, tags e limites
pub mod debug; // Logging zero-overhead
pub mod error; // KError / KResult
pub mod sync; // Spinlock, GuardedMutex, RefCount

// --- Memória ---
pub mod mm; // Pools, lookaside lists e a família de alocadores

// --- Ponteiros inteligentes ---
pub mod ptr; // AutoPtr, SharedPtr, deleters

// --- Containers ---
pub mod klib; // Vector, List, ForwardList, Queue, Set, Map

pub use error::{KError, KResult};
pub use klib::{ForwardList, List, Map, Pair, Queue, Set, Vector};
pub use mm::{KAllocator, LookasideAllocator, PoolAllocator, TaggedPoolAllocator};
pub use ptr::{AutoPtr, SharedPtr};
