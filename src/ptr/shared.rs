//! SharedPtr - posse compartilhada com contagem atômica.
//!
//! ## Bloco de controle
//!
//! Alocado do pool `P` com a tag `SHARED_PTR_COUNTER_TAG`:
//!
//! ```text
//! [ RefCount | destroy fn | ponteiro original | deleter ]
//! ```
//!
//! Cópias incrementam o contador; o último dono roda o deleter sobre o
//! ponteiro original e devolve o bloco ao pool. Conversões (`upcast`)
//! compartilham o mesmo bloco, então o deleter sempre vê o tipo concreto.
//!
//! Se o bloco não puder ser alocado, o ponteiro nasce inválido
//! (`is_valid() == false`) sem objeto nem contador.

use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ops::Deref;
use core::ptr::NonNull;

use super::deleter::{pool_new, DefaultDelete, DefaultNew, Deleter, Factory};
use crate::config::{DEFAULT_POOL_TAG, SHARED_PTR_COUNTER_TAG};
use crate::mm::pool::{NonPagedPool, PoolFlags, PoolType};
use crate::sync::RefCount;

/// Parte do bloco de controle independente de tipo
#[repr(C)]
struct CounterHeader {
    refs: RefCount,
    destroy: unsafe fn(NonNull<CounterHeader>),
}

#[repr(C)]
struct CounterBlock<T, D, P> {
    header: CounterHeader,
    object: Option<NonNull<T>>,
    deleter: D,
    _pool: PhantomData<P>,
}

/// Roda o deleter e devolve o bloco ao pool.
unsafe fn destroy_block<T, D: Deleter<T>, P: PoolType>(header: NonNull<CounterHeader>) {
    let block = header.cast::<CounterBlock<T, D, P>>();
    let CounterBlock {
        object,
        mut deleter,
        ..
    } = block.as_ptr().read();

    if let Some(obj) = object {
        deleter.delete(obj);
    }
    P::pool().free_with_tag(block.cast(), SHARED_PTR_COUNTER_TAG);
}

/// Ponteiro com contagem de referências.
pub struct SharedPtr<T: ?Sized, P: PoolType = NonPagedPool> {
    obj: Option<NonNull<T>>,
    counter: Option<NonNull<CounterHeader>>,
    valid: bool,
    _pool: PhantomData<P>,
}

// SAFETY: mesmo raciocínio do Arc; o contador é atômico
unsafe impl<T: ?Sized + Send + Sync, P: PoolType> Send for SharedPtr<T, P> {}
unsafe impl<T: ?Sized + Send + Sync, P: PoolType> Sync for SharedPtr<T, P> {}

impl<T, P: PoolType> SharedPtr<T, P> {
    /// Aloca `value` no pool `P` e cria o contador.
    pub fn new(value: T) -> Self
    where
        T: Send + 'static,
    {
        match pool_new::<T, P>(value, DEFAULT_POOL_TAG) {
            // SAFETY: objeto recém-criado no pool P, destruído por DefaultDelete<P>
            Some(obj) => unsafe { Self::init(Some(obj), DefaultDelete::<P>::new()) },
            None => {
                crate::kwarn!("(SharedPtr) sem memória para o objeto");
                Self::invalid()
            }
        }
    }

    /// Cria o objeto com a fábrica padrão (`T::default()` no pool `P`).
    pub fn new_default() -> Self
    where
        T: Default + Send + 'static,
    {
        let obj = DefaultNew::<T, P>::new().create();
        // SAFETY: DefaultNew aloca no pool P, compatível com DefaultDelete<P>
        unsafe { Self::init(obj, DefaultDelete::<P>::new()) }
    }

    /// Assume a posse de `ptr` com o deleter padrão.
    ///
    /// # Safety
    ///
    /// `ptr` deve ser nulo ou um objeto vivo criado no pool `P`.
    pub unsafe fn from_raw(ptr: *mut T) -> Self
    where
        T: Send + 'static,
    {
        Self::init(NonNull::new(ptr), DefaultDelete::<P>::new())
    }

    /// Assume a posse de `ptr` com um deleter próprio.
    ///
    /// # Safety
    ///
    /// `ptr` deve ser nulo ou um objeto vivo que `deleter` saiba destruir.
    pub unsafe fn from_raw_with_deleter<D>(ptr: *mut T, deleter: D) -> Self
    where
        T: Send + 'static,
        D: Deleter<T> + Send + 'static,
    {
        Self::init(NonNull::new(ptr), deleter)
    }

    /// Fabrica o objeto com `factory` e o destrói com `deleter`.
    ///
    /// Se a fábrica falhar, o ponteiro fica válido porém nulo.
    ///
    /// # Safety
    ///
    /// `deleter` deve saber destruir objetos criados por `factory`.
    pub unsafe fn with_factory<D, F>(deleter: D, mut factory: F) -> Self
    where
        T: Send + 'static,
        D: Deleter<T> + Send + 'static,
        F: Factory<T>,
    {
        Self::init(factory.create(), deleter)
    }

    unsafe fn init<D>(obj: Option<NonNull<T>>, mut deleter: D) -> Self
    where
        T: Send + 'static,
        D: Deleter<T> + Send + 'static,
    {
        let raw = P::pool().allocate(
            size_of::<CounterBlock<T, D, P>>(),
            align_of::<CounterBlock<T, D, P>>(),
            SHARED_PTR_COUNTER_TAG,
            PoolFlags::empty(),
        );

        let Some(raw) = raw else {
            crate::kwarn!("(SharedPtr) sem memória para o contador, tag=", SHARED_PTR_COUNTER_TAG);
            // A posse já era nossa: o objeto não pode vazar
            if let Some(o) = obj {
                deleter.delete(o);
            }
            return Self::invalid();
        };

        let block = raw.cast::<CounterBlock<T, D, P>>();
        block.as_ptr().write(CounterBlock {
            header: CounterHeader {
                refs: RefCount::new(1),
                destroy: destroy_block::<T, D, P>,
            },
            object: obj,
            deleter,
            _pool: PhantomData,
        });

        Self {
            obj,
            counter: Some(block.cast()),
            valid: true,
            _pool: PhantomData,
        }
    }

    /// Troca o objeto: solta a referência atual e assume `ptr`.
    ///
    /// Não faz nada se `ptr` for o objeto atual.
    ///
    /// # Safety
    ///
    /// Mesmo contrato de [`SharedPtr::from_raw`].
    pub unsafe fn reset(&mut self, ptr: Option<NonNull<T>>)
    where
        T: Send + 'static,
    {
        if ptr.is_some() && ptr == self.obj {
            return;
        }
        self.cleanup();
        *self = match ptr {
            Some(p) => Self::init(Some(p), DefaultDelete::<P>::new()),
            None => Self::empty(),
        };
    }
}

impl<T: ?Sized, P: PoolType> SharedPtr<T, P> {
    /// Ponteiro vazio e válido, sem contador
    pub const fn empty() -> Self {
        Self {
            obj: None,
            counter: None,
            valid: true,
            _pool: PhantomData,
        }
    }

    const fn invalid() -> Self {
        Self {
            obj: None,
            counter: None,
            valid: false,
            _pool: PhantomData,
        }
    }

    /// `false` se a criação do bloco de controle falhou
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_null(&self) -> bool {
        self.obj.is_none()
    }

    pub fn get(&self) -> Option<NonNull<T>> {
        self.obj
    }

    pub fn as_ref(&self) -> Option<&T> {
        // SAFETY: o contador mantém o objeto vivo enquanto existirmos
        self.obj.map(|p| unsafe { &*p.as_ptr() })
    }

    /// Referências vivas (0 sem contador)
    pub fn ref_count(&self) -> usize {
        // SAFETY: o bloco vive enquanto seguramos uma referência
        self.counter
            .map_or(0, |c| unsafe { (*c.as_ptr()).refs.count() })
    }

    /// Solta esta referência.
    ///
    /// Devolve o ponteiro, ou `None` se esta chamada destruiu o objeto.
    pub fn release(&mut self) -> Option<NonNull<T>> {
        let obj = self.obj;
        if self.cleanup() {
            None
        } else {
            obj
        }
    }

    /// Visão de tipo relacionado (ex.: `dyn Trait`) compartilhando o contador.
    pub fn upcast<U: ?Sized>(&self, convert: impl FnOnce(&T) -> &U) -> SharedPtr<U, P>
    where
        T: 'static,
    {
        let obj = self.as_ref().map(|r| NonNull::from(convert(r)));
        self.share_as(obj)
    }

    /// Conversão livre de ponteiro compartilhando o contador.
    ///
    /// # Safety
    ///
    /// `convert` deve devolver um ponteiro válido enquanto o objeto
    /// original estiver vivo.
    pub unsafe fn static_pointer_cast<U: ?Sized>(
        &self,
        convert: impl FnOnce(NonNull<T>) -> NonNull<U>,
    ) -> SharedPtr<U, P>
    where
        T: 'static,
    {
        self.share_as(self.obj.map(convert))
    }

    fn share_as<U: ?Sized>(&self, obj: Option<NonNull<U>>) -> SharedPtr<U, P> {
        if let Some(c) = self.counter {
            // SAFETY: seguramos uma referência, o bloco está vivo
            unsafe { (*c.as_ptr()).refs.retain() };
        }
        SharedPtr {
            obj: if self.counter.is_some() { obj } else { None },
            counter: self.counter,
            valid: self.valid,
            _pool: PhantomData,
        }
    }

    /// Decrementa; destrói no zero. Retorna `true` se destruiu.
    fn cleanup(&mut self) -> bool {
        self.obj = None;
        let Some(c) = self.counter.take() else {
            return false;
        };
        // SAFETY: nossa referência mantinha o bloco vivo até aqui
        unsafe {
            if (*c.as_ptr()).refs.release() {
                ((*c.as_ptr()).destroy)(c);
                true
            } else {
                false
            }
        }
    }
}

impl<T: ?Sized, P: PoolType> Clone for SharedPtr<T, P> {
    fn clone(&self) -> Self {
        self.share_as(self.obj)
    }

    fn clone_from(&mut self, source: &Self) {
        if self.counter == source.counter && self.obj == source.obj {
            return;
        }
        self.cleanup();
        *self = source.clone();
    }
}

impl<T: ?Sized, P: PoolType> Default for SharedPtr<T, P> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized, P: PoolType> Deref for SharedPtr<T, P> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.as_ref() {
            Some(r) => r,
            None => panic!("SharedPtr: deref de ponteiro nulo"),
        }
    }
}

impl<T: ?Sized, P: PoolType> Drop for SharedPtr<T, P> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::pool::{MemoryPool, PoolFlags};
    use crate::ptr::deleter::{pool_delete, FnDeleter};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    crate::define_pool!(CounterPool: NonPagedPool, "CounterPool", 4096);

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

    fn as_shape(t: &Tracked) -> &(dyn Shape + 'static) {
        t
    }

    #[test]
    fn copies_share_one_object() {
        let drops = Arc::new(AtomicUsize::new(0));
        let a: SharedPtr<Tracked> = SharedPtr::new(Tracked(drops.clone(), 3));
        assert!(a.is_valid());
        assert_eq!(a.ref_count(), 1);

        let b = a.clone();
        assert_eq!(a.ref_count(), 2);
        assert_eq!(a.get(), b.get());

        drop(a);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(b.ref_count(), 1);
        drop(b);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn counter_block_carries_counter_tag() {
        let a: SharedPtr<u32> = SharedPtr::new(1);
        let tag = unsafe { MemoryPool::block_tag(a.counter.unwrap().cast()) };
        assert_eq!(tag, SHARED_PTR_COUNTER_TAG);
    }

    #[test]
    fn release_returns_null_only_when_destroying() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut a: SharedPtr<Tracked> = SharedPtr::new(Tracked(drops.clone(), 1));
        let mut b = a.clone();

        let first = a.release();
        assert!(first.is_some());
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert!(a.is_null());

        assert!(b.release().is_none());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_pointer_copies_without_counter() {
        let a: SharedPtr<u64> = SharedPtr::empty();
        let b = a.clone();
        assert!(b.is_valid());
        assert!(b.is_null());
        assert_eq!(b.ref_count(), 0);
    }

    #[test]
    fn upcast_shares_counter_and_deletes_concrete() {
        let drops = Arc::new(AtomicUsize::new(0));
        let concrete: SharedPtr<Tracked> = SharedPtr::new(Tracked(drops.clone(), 5));
        let shape: SharedPtr<dyn Shape> = concrete.upcast(as_shape);
        assert_eq!(shape.sides(), 5);
        assert_eq!(concrete.ref_count(), 2);

        drop(concrete);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(shape);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clone_from_releases_previous_object() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut a: SharedPtr<Tracked> = SharedPtr::new(Tracked(drops.clone(), 1));
        let b: SharedPtr<Tracked> = SharedPtr::new(Tracked(drops.clone(), 2));
        a.clone_from(&b);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(a.1, 2);
        assert_eq!(b.ref_count(), 2);
    }

    #[test]
    fn reset_to_current_object_is_noop() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut a: SharedPtr<Tracked> = SharedPtr::new(Tracked(drops.clone(), 1));
        let same = a.get();
        unsafe { a.reset(same) };
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        unsafe { a.reset(None) };
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(a.is_null());
        assert!(a.is_valid());
    }

    #[test]
    fn counter_exhaustion_makes_pointer_invalid() {
        let pool = CounterPool::pool();
        let mut hog = std::vec::Vec::new();
        while let Some(p) = pool.allocate(16, 16, 0, PoolFlags::empty()) {
            hog.push(p);
        }

        let deleted = Arc::new(AtomicUsize::new(0));
        let seen = deleted.clone();
        let raw = pool_new::<u32, NonPagedPool>(7, DEFAULT_POOL_TAG).unwrap();
        let deleter = FnDeleter(move |p: NonNull<u32>| {
            seen.fetch_add(1, Ordering::SeqCst);
            unsafe { pool_delete::<u32, NonPagedPool>(p) };
        });
        let p: SharedPtr<u32, CounterPool> =
            unsafe { SharedPtr::from_raw_with_deleter(raw.as_ptr(), deleter) };

        assert!(!p.is_valid());
        assert!(p.get().is_none());
        assert_eq!(p.ref_count(), 0);
        assert_eq!(deleted.load(Ordering::SeqCst), 1);

        for b in hog {
            unsafe { pool.free(b) };
        }
    }

    /// Fábrica que conta quantos objetos criou
    struct CountingFactory {
        created: Arc<AtomicUsize>,
        drops: Arc<AtomicUsize>,
    }

    unsafe impl Factory<Tracked> for CountingFactory {
        fn create(&mut self) -> Option<NonNull<Tracked>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            pool_new::<Tracked, NonPagedPool>(Tracked(self.drops.clone(), 4), DEFAULT_POOL_TAG)
        }
    }

    #[test]
    fn factory_object_is_deleted_once_by_its_deleter() {
        let created = Arc::new(AtomicUsize::new(0));
        let drops = Arc::new(AtomicUsize::new(0));
        let deleted = Arc::new(AtomicUsize::new(0));
        let seen = deleted.clone();
        let factory = CountingFactory {
            created: created.clone(),
            drops: drops.clone(),
        };
        let deleter = FnDeleter(move |p: NonNull<Tracked>| {
            seen.fetch_add(1, Ordering::SeqCst);
            unsafe { pool_delete::<Tracked, NonPagedPool>(p) };
        });

        let a: SharedPtr<Tracked> = unsafe { SharedPtr::with_factory(deleter, factory) };
        assert!(a.is_valid());
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(a.sides(), 4);

        let b = a.clone();
        drop(a);
        assert_eq!(deleted.load(Ordering::SeqCst), 0);
        assert_eq!(b.ref_count(), 1);
        drop(b);
        assert_eq!(deleted.load(Ordering::SeqCst), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_factory_leaves_a_valid_null_pointer() {
        crate::define_pool!(FactoryPool: NonPagedPool, "FactoryPool", 4096);
        let pool = FactoryPool::pool();
        let mut hog = std::vec::Vec::new();
        while let Some(p) = pool.allocate(16, 16, 0, PoolFlags::empty()) {
            hog.push(p);
        }

        let deleted = Arc::new(AtomicUsize::new(0));
        let seen = deleted.clone();
        let deleter = FnDeleter(move |_: NonNull<u64>| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let p: SharedPtr<u64> =
            unsafe { SharedPtr::with_factory(deleter, DefaultNew::<u64, FactoryPool>::new()) };
        assert!(p.is_valid());
        assert!(p.is_null());
        drop(p);
        assert_eq!(deleted.load(Ordering::SeqCst), 0);

        for b in hog {
            unsafe { pool.free(b) };
        }
    }

    #[test]
    fn default_factory_builds_default_value() {
        let p: SharedPtr<u64, crate::mm::pool::PagedPool> = SharedPtr::new_default();
        assert_eq!(*p, 0);
        assert_eq!(p.ref_count(), 1);
    }

    #[test]
    fn concurrent_copies_keep_count_exact() {
        let drops = Arc::new(AtomicUsize::new(0));
        let root: SharedPtr<Tracked> = SharedPtr::new(Tracked(drops.clone(), 0));

        let handles: std::vec::Vec<_> = (0..4)
            .map(|_| {
                let local = root.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let c = local.clone();
                        drop(c);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(root.ref_count(), 1);
        drop(root);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
