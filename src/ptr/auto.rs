//! AutoPtr - posse exclusiva com transferência explícita.
//!
//! "Copiar" um `AutoPtr` (`take_from`) move o ponteiro e anula a origem.
//! No máximo um `AutoPtr` é dono de um objeto em qualquer instante.

use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

use super::deleter::{pool_new, DefaultDelete, Deleter};
use crate::config::DEFAULT_POOL_TAG;
use crate::mm::pool::NonPagedPool;

/// Ponteiro com posse exclusiva.
pub struct AutoPtr<T: ?Sized, D: Deleter<T> = DefaultDelete<NonPagedPool>> {
    obj: Option<NonNull<T>>,
    deleter: D,
}

// SAFETY: posse exclusiva, como Box
unsafe impl<T: ?Sized + Send, D: Deleter<T> + Send> Send for AutoPtr<T, D> {}
unsafe impl<T: ?Sized + Sync, D: Deleter<T> + Sync> Sync for AutoPtr<T, D> {}

impl<T> AutoPtr<T> {
    /// Aloca `value` no pool não-paginável.
    ///
    /// Sem memória, devolve um `AutoPtr` nulo (e `value` é destruído).
    pub fn new(value: T) -> Self {
        Self {
            obj: pool_new::<T, NonPagedPool>(value, DEFAULT_POOL_TAG),
            deleter: DefaultDelete::new(),
        }
    }
}

impl<T: ?Sized, D: Deleter<T> + Default> AutoPtr<T, D> {
    /// Ponteiro vazio
    pub fn null() -> Self {
        Self {
            obj: None,
            deleter: D::default(),
        }
    }

    /// Assume a posse de `ptr` (nulo é aceito).
    ///
    /// # Safety
    ///
    /// `ptr` deve ser nulo ou um objeto vivo que `D` saiba destruir.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self::from_raw_with_deleter(ptr, D::default())
    }

    /// Transfere o objeto de `other`, que fica nulo.
    pub fn take_from(other: &mut Self) -> Self {
        Self {
            obj: other.obj.take(),
            deleter: core::mem::take(&mut other.deleter),
        }
    }

    /// Transfere de um `AutoPtr` de tipo relacionado (ex.: concreto → `dyn Trait`).
    ///
    /// # Safety
    ///
    /// `convert` deve devolver um ponteiro para o mesmo objeto, destrutível
    /// por `D`.
    pub unsafe fn take_from_related<U: ?Sized, E: Deleter<U>>(
        other: &mut AutoPtr<U, E>,
        convert: impl FnOnce(*mut U) -> *mut T,
    ) -> Self {
        let obj = other
            .obj
            .take()
            .and_then(|p| NonNull::new(convert(p.as_ptr())));
        Self {
            obj,
            deleter: D::default(),
        }
    }

    /// Atribuição: destrói o objeto atual e transfere o de `other`.
    pub fn assign_from(&mut self, other: &mut Self) {
        self.destroy();
        self.obj = other.obj.take();
        self.deleter = core::mem::take(&mut other.deleter);
    }
}

impl<T: ?Sized, D: Deleter<T>> AutoPtr<T, D> {
    /// # Safety
    ///
    /// Mesmo contrato de [`AutoPtr::from_raw`].
    pub unsafe fn from_raw_with_deleter(ptr: *mut T, deleter: D) -> Self {
        Self {
            obj: NonNull::new(ptr),
            deleter,
        }
    }

    pub fn get(&self) -> Option<NonNull<T>> {
        self.obj
    }

    pub fn is_null(&self) -> bool {
        self.obj.is_none()
    }

    pub fn as_ref(&self) -> Option<&T> {
        // SAFETY: somos os únicos donos do objeto
        self.obj.map(|p| unsafe { &*p.as_ptr() })
    }

    pub fn as_mut(&mut self) -> Option<&mut T> {
        // SAFETY: somos os únicos donos do objeto
        self.obj.map(|p| unsafe { &mut *p.as_ptr() })
    }

    /// Abre mão da posse sem destruir.
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.obj.take()
    }

    /// Troca o objeto. O atual é destruído, exceto se for o mesmo endereço.
    ///
    /// # Safety
    ///
    /// `ptr` deve ser `None` ou um objeto vivo que `D` saiba destruir.
    pub unsafe fn reset(&mut self, ptr: Option<NonNull<T>>) {
        let same = match (self.obj, ptr) {
            (Some(a), Some(b)) => a.cast::<u8>() == b.cast::<u8>(),
            _ => false,
        };
        if same {
            return;
        }
        self.destroy();
        self.obj = ptr;
    }

    fn destroy(&mut self) {
        if let Some(p) = self.obj.take() {
            // SAFETY: posse exclusiva; ninguém mais usa o objeto
            unsafe { self.deleter.delete(p) };
        }
    }
}

impl<T: ?Sized, D: Deleter<T> + Default> Default for AutoPtr<T, D> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized, D: Deleter<T>> Deref for AutoPtr<T, D> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.as_ref() {
            Some(r) => r,
            None => panic!("AutoPtr: deref de ponteiro nulo"),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> DerefMut for AutoPtr<T, D> {
    fn deref_mut(&mut self) -> &mut T {
        match self.as_mut() {
            Some(r) => r,
            None => panic!("AutoPtr: deref de ponteiro nulo"),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> Drop for AutoPtr<T, D> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ptr::deleter::{pool_delete, FnDeleter};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Tracked(Arc<AtomicUsize>, u32);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    trait Shape {
        fn sides(&self) -> u32;
    }

    impl Shape for Tracked {
        fn sides(&self) -> u32 {
            self.1
        }
    }

    #[test]
    fn take_from_transfers_and_nulls_source() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut a = AutoPtr::new(Tracked(drops.clone(), 3));
        let b = AutoPtr::take_from(&mut a);
        assert!(a.is_null());
        assert_eq!(b.1, 3);
        drop(a);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(b);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn assign_destroys_current_then_takes() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut a = AutoPtr::new(Tracked(drops.clone(), 1));
        let mut b = AutoPtr::new(Tracked(drops.clone(), 2));
        a.assign_from(&mut b);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(a.1, 2);
        assert!(b.is_null());
    }

    #[test]
    fn release_gives_up_ownership() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut a = AutoPtr::new(Tracked(drops.clone(), 4));
        let raw = a.release().unwrap();
        drop(a);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        unsafe { pool_delete::<Tracked, NonPagedPool>(raw) };
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_with_same_pointer_keeps_object() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut a = AutoPtr::new(Tracked(drops.clone(), 5));
        let same = a.get();
        unsafe { a.reset(same) };
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        unsafe { a.reset(None) };
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(a.is_null());
    }

    #[test]
    fn converts_to_trait_object() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut concrete = AutoPtr::new(Tracked(drops.clone(), 6));
        let shape: AutoPtr<dyn Shape> =
            unsafe { AutoPtr::take_from_related(&mut concrete, |p| p as *mut dyn Shape) };
        assert!(concrete.is_null());
        assert_eq!(shape.sides(), 6);
        drop(shape);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn custom_deleter_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let raw = pool_new::<u32, NonPagedPool>(9, DEFAULT_POOL_TAG).unwrap();
        let deleter = FnDeleter(move |p: NonNull<u32>| {
            seen.fetch_add(1, Ordering::SeqCst);
            unsafe { pool_delete::<u32, NonPagedPool>(p) };
        });
        let p = unsafe { AutoPtr::from_raw_with_deleter(raw.as_ptr(), deleter) };
        assert_eq!(*p, 9);
        drop(p);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
