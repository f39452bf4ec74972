//! # Synchronization Primitives
//!
//! Primitivas usadas pelos containers com lock interno (árvore, Set, Map)
//! e pelo contador do `SharedPtr`.
//!
//! ## Hierarquia de Uso
//!
//! ```text
//! RawSpinLock      → Containers não-pagináveis (até DISPATCH, não dorme)
//! RawGuardedMutex  → Containers pagináveis (até APC, pode dormir)
//! KLocked/KLocker  → Dado + lock, liberado por RAII
//! RefCount         → Contagem atômica de referências
//! ```
//!
//! ## Regras
//!
//! - **Spinlock**: Nunca segurar durante operações que podem dormir
//! - **GuardedMutex**: Preferir para seções em memória paginável
//! - **Ordem de Lock**: Sempre adquirir na mesma ordem para evitar deadlock

pub mod irql;
pub mod locked;
pub mod mutex;
pub mod raw;
pub mod refcount;
pub mod spinlock;

pub use irql::Irql;
pub use locked::{KLocked, KLocker};
pub use mutex::{set_wait_hook, RawGuardedMutex, WaitHook};
pub use raw::RawLock;
pub use refcount::RefCount;
pub use spinlock::RawSpinLock;

/// Dado protegido por spinlock
pub type Spinlock<T> = KLocked<RawSpinLock, T>;

/// Dado protegido por guarded mutex
pub type GuardedMutex<T> = KLocked<RawGuardedMutex, T>;
