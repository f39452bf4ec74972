//! GuardedMutex - lock que pode suspender quem espera

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use spin::RwLock;

use super::irql::Irql;
use super::raw::RawLock;
use crate::config::MUTEX_SPIN_LIMIT;

/// Hook chamado enquanto um GuardedMutex está contendido.
///
/// O scheduler registra aqui seu yield/sleep. Sem hook, o mutex apenas gira.
pub type WaitHook = fn();

static WAIT_HOOK: RwLock<Option<WaitHook>> = RwLock::new(None);

/// Registra (ou remove) o hook de espera dos mutexes.
pub fn set_wait_hook(hook: Option<WaitHook>) {
    *WAIT_HOOK.write() = hook;
}

#[inline]
fn wait() {
    let hook = *WAIT_HOOK.read();
    match hook {
        Some(f) => f(),
        None => core::hint::spin_loop(),
    }
}

/// GuardedMutex bruto - PODE dormir
///
/// # Diferença do Spinlock
///
/// - Após `MUTEX_SPIN_LIMIT` tentativas, cede a CPU via wait hook
/// - Só pode ser usado até APC_LEVEL
/// - Protege containers em memória paginável
pub struct RawGuardedMutex {
    /// Estado do lock
    locked: AtomicBool,
    /// Quantas vezes alguém precisou esperar (diagnóstico)
    contention: AtomicU32,
}

impl RawGuardedMutex {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            contention: AtomicU32::new(0),
        }
    }

    /// Número de aquisições que encontraram o mutex ocupado
    pub fn contention_count(&self) -> u32 {
        self.contention.load(Ordering::Relaxed)
    }
}

impl Default for RawGuardedMutex {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: compare_exchange Acquire no lock, store Release no unlock
unsafe impl RawLock for RawGuardedMutex {
    const INIT: Self = Self::new();
    const MAX_IRQL: Irql = Irql::Apc;

    fn lock(&self) {
        if self.try_lock() {
            return;
        }

        self.contention.fetch_add(1, Ordering::Relaxed);
        let mut spins = 0u32;
        loop {
            if !self.locked.load(Ordering::Relaxed) && self.try_lock() {
                return;
            }
            if spins < MUTEX_SPIN_LIMIT {
                spins += 1;
                core::hint::spin_loop();
            } else {
                wait();
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
