//! # Árvore Balanceada (Set / Map)
//!
//! ## 🎯 Propósito
//!
//! Conjunto e mapa ordenados com lock interno, sobre um motor AVL cuja
//! memória de nós vem de um sink plugável.
//!
//! ## Camadas
//!
//! ```text
//! Set / Map        → API tipada (ordem natural ou só pela chave)
//! AvlTree          → lock + construção/destruição dos valores
//! TreeEventSink    → memória dos nós (pool ou lookaside)
//! AvlTable         → motor AVL (ligação, rotações, enumeração)
//! ```
//!
//! ## Locks
//!
//! A classe do pool escolhe o lock: paginável usa `RawGuardedMutex`,
//! não-paginável usa `RawSpinLock`.

pub mod avl;
pub mod map;
pub mod set;
pub mod sink;

pub use avl::{AvlTable, InsertOutcome, TableHooks, TreeNode};
pub use map::{
    KeyOrder, Map, NonPagedLookasideMap, NonPagedPoolMap, PagedLookasideMap, PagedPoolMap,
    TaggedNonPagedPoolMap, TaggedPagedPoolMap,
};
pub use set::{
    AvlTree, NonPagedLookasideSet, NonPagedPoolSet, PagedLookasideSet, PagedPoolSet, Set,
    SetOrder, TaggedNonPagedPoolSet, TaggedPagedPoolSet, TreeOrder,
};
pub use sink::{LookasideEventSink, PoolEventSink, TreeEventSink};

use crate::mm::pool::{NonPagedPool, PagedPool, PoolType};

/// Lock das árvores no pool paginável
pub type PagedTreeLock = <PagedPool as PoolType>::Lock;

/// Lock das árvores no pool não-paginável
pub type NonPagedTreeLock = <NonPagedPool as PoolType>::Lock;
