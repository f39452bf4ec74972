//! Políticas de criação e destruição de objetos em pool.

use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ptr::NonNull;

use crate::config::DEFAULT_POOL_TAG;
use crate::mm::pool::{NonPagedPool, PoolFlags, PoolType};

/// Destrói um objeto e devolve sua memória.
pub trait Deleter<T: ?Sized> {
    /// # Safety
    ///
    /// `ptr` deve apontar para um objeto vivo, criado de forma compatível
    /// com este deleter, que não será usado depois.
    unsafe fn delete(&mut self, ptr: NonNull<T>);
}

/// Fabrica um objeto (o "alocador" dos ponteiros inteligentes).
///
/// # Safety
///
/// Todo ponteiro devolvido deve apontar para um objeto vivo e exclusivo,
/// cuja posse passa ao chamador.
pub unsafe trait Factory<T> {
    /// Cria um objeto ou devolve `None` se não houver memória.
    fn create(&mut self) -> Option<NonNull<T>>;
}

/// Aloca `value` no pool `P` com a tag informada.
///
/// Se o pool estiver esgotado, `value` é destruído e volta `None`.
pub fn pool_new<T, P: PoolType>(value: T, tag: u32) -> Option<NonNull<T>> {
    let raw = P::pool().allocate(size_of::<T>(), align_of::<T>(), tag, PoolFlags::empty())?;
    let ptr = raw.cast::<T>();
    // SAFETY: bloco novo, alinhado e grande o bastante para T
    unsafe { ptr.as_ptr().write(value) };
    Some(ptr)
}

/// Destrói e libera um objeto criado por [`pool_new`].
///
/// # Safety
///
/// `ptr` deve ter vindo de `pool_new::<_, P>` e não ser usado depois.
pub unsafe fn pool_delete<T: ?Sized, P: PoolType>(ptr: NonNull<T>) {
    core::ptr::drop_in_place(ptr.as_ptr());
    P::pool().free(ptr.cast());
}

/// Deleter padrão: `drop` + free no pool `P`.
pub struct DefaultDelete<P: PoolType = NonPagedPool> {
    _pool: PhantomData<P>,
}

impl<P: PoolType> DefaultDelete<P> {
    pub const fn new() -> Self {
        Self { _pool: PhantomData }
    }
}

impl<P: PoolType> Default for DefaultDelete<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PoolType> Clone for DefaultDelete<P> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: ?Sized, P: PoolType> Deleter<T> for DefaultDelete<P> {
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        pool_delete::<T, P>(ptr);
    }
}

/// Fábrica padrão: valor `Default` alocado no pool `P` com `TAG`.
pub struct DefaultNew<T, P: PoolType = NonPagedPool, const TAG: u32 = { DEFAULT_POOL_TAG }> {
    _marker: PhantomData<(fn() -> T, P)>,
}

impl<T, P: PoolType, const TAG: u32> DefaultNew<T, P, TAG> {
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T, P: PoolType, const TAG: u32> Default for DefaultNew<T, P, TAG> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: cada chamada aloca um objeto novo no pool
unsafe impl<T: Default, P: PoolType, const TAG: u32> Factory<T> for DefaultNew<T, P, TAG> {
    fn create(&mut self) -> Option<NonNull<T>> {
        pool_new::<T, P>(T::default(), TAG)
    }
}

/// Adapta uma closure como deleter.
pub struct FnDeleter<F>(pub F);

impl<T: ?Sized, F: FnMut(NonNull<T>)> Deleter<T> for FnDeleter<F> {
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        (self.0)(ptr)
    }
}
