//! Dados protegidos por um lock bruto + guard RAII (KLocker).

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use super::raw::RawLock;

/// Valor protegido pelo lock `L`.
///
/// O acesso só existe através de um `KLocker`, que libera o lock em
/// qualquer saída do escopo.
pub struct KLocked<L: RawLock, T: ?Sized> {
    raw: L,
    data: UnsafeCell<T>,
}

// SAFETY: o lock serializa todo acesso a `data`
unsafe impl<L: RawLock, T: ?Sized + Send> Send for KLocked<L, T> {}
unsafe impl<L: RawLock, T: ?Sized + Send> Sync for KLocked<L, T> {}

impl<L: RawLock, T> KLocked<L, T> {
    pub const fn new(data: T) -> Self {
        Self {
            raw: L::INIT,
            data: UnsafeCell::new(data),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<L: RawLock, T: ?Sized> KLocked<L, T> {
    /// Adquire o lock
    pub fn lock(&self) -> KLocker<'_, L, T> {
        self.raw.lock();
        KLocker { lock: self }
    }

    /// Tenta adquirir sem esperar
    pub fn try_lock(&self) -> Option<KLocker<'_, L, T>> {
        if self.raw.try_lock() {
            Some(KLocker { lock: self })
        } else {
            None
        }
    }

    /// Acesso exclusivo sem travar (o borrow já garante exclusão)
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }
}

impl<L: RawLock, T: Default> Default for KLocked<L, T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Guard do lock - libera ao sair do escopo
pub struct KLocker<'a, L: RawLock, T: ?Sized> {
    lock: &'a KLocked<L, T>,
}

impl<L: RawLock, T: ?Sized> Deref for KLocker<'_, L, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: Lock está adquirido
        unsafe { &*self.lock.data.get() }
    }
}

impl<L: RawLock, T: ?Sized> DerefMut for KLocker<'_, L, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: Lock está adquirido
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<L: RawLock, T: ?Sized> Drop for KLocker<'_, L, T> {
    fn drop(&mut self) {
        // SAFETY: este guard é o dono do lock
        unsafe { self.lock.raw.unlock() }
    }
}
