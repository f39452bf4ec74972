//! Spinlock - bloqueio com busy-wait

use core::sync::atomic::{AtomicBool, Ordering};

use super::irql::Irql;
use super::raw::RawLock;

/// Spinlock bruto - usa busy-wait, NÃO pode dormir
///
/// # Quando usar
///
/// - Seções críticas MUITO curtas
/// - Containers em memória não-paginável (até DISPATCH_LEVEL)
///
/// # Quando NÃO usar
///
/// - Seções que podem demorar ou tocar memória paginável
pub struct RawSpinLock {
    locked: AtomicBool,
}

impl RawSpinLock {
    /// Cria novo spinlock destravado
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: compare_exchange Acquire no lock, store Release no unlock
unsafe impl RawLock for RawSpinLock {
    const INIT: Self = Self::new();
    const MAX_IRQL: Irql = Irql::Dispatch;

    fn lock(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // Espera em leitura para não martelar a linha de cache
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}
