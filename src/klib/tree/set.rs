//! Arquivo: klib/tree/set.rs
//!
//! Propósito: Árvore balanceada com lock interno (`AvlTree`) e o `Set`.
//!
//! Detalhes de Implementação:
//! - Toda operação por `&self` adquire o lock via guard (`KLocker`).
//! - Containers pagináveis usam `RawGuardedMutex`; não-pagináveis, `RawSpinLock`.
//! - O valor só é construído depois que o motor reporta um slot novo.
//! - Valores removidos são destruídos fora do lock.
//!
//! Balanced Tree

use core::cmp::Ordering;
use core::marker::PhantomData;
use core::ptr::NonNull;

use super::avl::{AvlTable, InsertOutcome, RawIter, TableHooks, TreeNode};
use super::sink::{LookasideEventSink, PoolEventSink, TreeEventSink};
use super::{NonPagedTreeLock, PagedTreeLock};
use crate::error::{KError, KResult};
use crate::mm::allocator::{
    NonPagedLookasideAllocator, NonPagedPoolAllocator, PagedLookasideAllocator,
    PagedPoolAllocator, TaggedNonPagedPoolAllocator, TaggedPagedPoolAllocator,
};
use crate::sync::{KLocked, RawLock};

/// Ordem total usada pela árvore
pub trait TreeOrder<T> {
    fn compare(a: &T, b: &T) -> Ordering;
}

/// Ordem natural do elemento (`Ord`)
pub struct SetOrder;

impl<T: Ord> TreeOrder<T> for SetOrder {
    #[inline]
    fn compare(a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Liga o motor AVL ao sink e à ordem da árvore
struct Hooks<'a, T, C, S> {
    sink: &'a mut S,
    _order: PhantomData<(fn(&T), fn() -> C)>,
}

impl<'a, T, C, S> Hooks<'a, T, C, S> {
    fn new(sink: &'a mut S) -> Self {
        Self {
            sink,
            _order: PhantomData,
        }
    }
}

impl<T, C: TreeOrder<T>, S: TreeEventSink<T>> TableHooks<T> for Hooks<'_, T, C, S> {
    fn compare(&self, probe: &T, stored: &T) -> Ordering {
        C::compare(probe, stored)
    }

    fn allocate(&mut self, bytes: usize) -> Option<NonNull<TreeNode<T>>> {
        self.sink.on_allocate(bytes)
    }

    unsafe fn free(&mut self, node: NonNull<TreeNode<T>>) {
        self.sink.on_free(node);
    }
}

pub(super) struct TreeInner<T, S> {
    pub(super) table: AvlTable<T>,
    pub(super) sink: S,
}

/// Árvore AVL protegida pelo lock `L`.
pub struct AvlTree<T, C, S, L>
where
    C: TreeOrder<T>,
    S: TreeEventSink<T>,
    L: RawLock,
{
    inner: KLocked<L, TreeInner<T, S>>,
    _order: PhantomData<fn() -> C>,
}

impl<T, C, S, L> AvlTree<T, C, S, L>
where
    C: TreeOrder<T>,
    S: TreeEventSink<T>,
    L: RawLock,
{
    pub fn new() -> Self {
        Self::with_sink(S::default())
    }

    /// Usa um sink já montado (ex.: sobre um alocador específico)
    pub fn with_sink(sink: S) -> Self {
        Self {
            inner: KLocked::new(TreeInner {
                table: AvlTable::new(),
                sink,
            }),
            _order: PhantomData,
        }
    }

    /// `false` se o alocador dos nós não se inicializou
    pub fn is_valid(&self) -> bool {
        self.inner.lock().sink.is_ready()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // INSERÇÃO / REMOÇÃO
    // =========================================================================

    /// Insere `value`. Equivalente presente: `AlreadyExists`.
    pub fn insert(&self, value: T) -> KResult<()> {
        self.insert_node(value).map(|_| ())
    }

    pub(super) fn insert_node(&self, value: T) -> KResult<NonNull<TreeNode<T>>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if !inner.sink.is_ready() {
            return Err(KError::InvalidAllocator);
        }

        let mut hooks = Hooks::<T, C, S>::new(&mut inner.sink);
        // SAFETY: o slot novo é construído antes de soltar o lock
        match unsafe { inner.table.insert(&value, &mut hooks) } {
            InsertOutcome::Inserted(node) => {
                unsafe { TreeNode::init(node, value) };
                Ok(node)
            }
            InsertOutcome::Existing(_) => Err(KError::AlreadyExists),
            InsertOutcome::Failed => {
                crate::kwarn!("(Tree) insert: sem memória para o nó");
                Err(KError::OutOfMemory)
            }
        }
    }

    /// Remove e devolve o elemento equivalente a `probe`
    pub fn take(&self, probe: &T) -> Option<T> {
        self.take_by(|stored| C::compare(probe, stored))
    }

    /// Remove e destrói o elemento equivalente a `probe`
    pub fn erase(&self, probe: &T) -> bool {
        self.take(probe).is_some()
    }

    pub(super) fn take_by(&self, probe: impl FnMut(&T) -> Ordering) -> Option<T> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let mut hooks = Hooks::<T, C, S>::new(&mut inner.sink);
        inner.table.take_by(probe, &mut hooks)
    }

    /// Destrói todos os elementos e devolve os nós ao alocador
    pub fn cleanup(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.table.clear(&mut Hooks::<T, C, S>::new(&mut inner.sink));
    }

    // =========================================================================
    // BUSCA
    // =========================================================================

    pub fn contains(&self, probe: &T) -> bool {
        self.with_value(probe, |_| ()).is_some()
    }

    /// Executa `f` sobre o elemento equivalente, com o lock adquirido
    pub fn with_value<R>(&self, probe: &T, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.with_value_by(|stored| C::compare(probe, stored), f)
    }

    pub(super) fn with_value_by<R>(
        &self,
        probe: impl FnMut(&T) -> Ordering,
        f: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        let guard = self.inner.lock();
        let node = guard.table.lookup_by(probe)?;
        // SAFETY: nó ligado, protegido pelo lock enquanto `f` roda
        Some(f(unsafe { TreeNode::value(node) }))
    }

    pub(super) fn find_node_by(&self, probe: impl FnMut(&T) -> Ordering) -> Option<NonNull<TreeNode<T>>> {
        self.inner.lock().table.lookup_by(probe)
    }

    /// Cópia do elemento equivalente
    pub fn find_cloned(&self, probe: &T) -> Option<T>
    where
        T: Clone,
    {
        self.with_value(probe, T::clone)
    }

    /// Visita todos os elementos em ordem, com o lock adquirido
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        let mut guard = self.inner.lock();
        let mut next = guard.table.enumerate(true);
        while let Some(node) = next {
            // SAFETY: nó ligado, protegido pelo lock
            f(unsafe { TreeNode::value(node) });
            next = guard.table.enumerate(false);
        }
    }

    // =========================================================================
    // ITERAÇÃO EXCLUSIVA
    // =========================================================================

    /// Do menor ao maior. O empréstimo exclusivo dispensa o lock.
    pub fn iter(&mut self) -> Iter<'_, T> {
        let table = &self.inner.get_mut().table;
        Iter::new(table.raw_iter(table.first()))
    }

    /// A partir do elemento equivalente a `probe` (vazio se ausente)
    pub fn iter_from(&mut self, probe: &T) -> Iter<'_, T> {
        self.iter_from_by(|stored| C::compare(probe, stored))
    }

    pub(super) fn iter_from_by(&mut self, probe: impl FnMut(&T) -> Ordering) -> Iter<'_, T> {
        let table = &self.inner.get_mut().table;
        Iter::new(table.raw_iter(table.lookup_by(probe)))
    }

    pub(super) fn table_mut(&mut self) -> &mut AvlTable<T> {
        &mut self.inner.get_mut().table
    }
}

impl<T, C, S, L> Default for AvlTree<T, C, S, L>
where
    C: TreeOrder<T>,
    S: TreeEventSink<T>,
    L: RawLock,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C, S, L> Drop for AvlTree<T, C, S, L>
where
    C: TreeOrder<T>,
    S: TreeEventSink<T>,
    L: RawLock,
{
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        inner.table.clear(&mut Hooks::<T, C, S>::new(&mut inner.sink));
    }
}

/// Iterador em ordem sobre uma árvore emprestada com exclusividade
pub struct Iter<'a, T> {
    raw: RawIter<T>,
    _marker: PhantomData<&'a T>,
}

impl<T> Iter<'_, T> {
    fn new(raw: RawIter<T>) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        // SAFETY: a árvore está emprestada por 'a e não muda
        self.raw.next().map(|n| unsafe { TreeNode::value(n) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}

// =============================================================================
// SET
// =============================================================================

/// Conjunto ordenado de elementos únicos
pub type Set<T, S, L> = AvlTree<T, SetOrder, S, L>;

pub type PagedPoolSet<T> = Set<T, PoolEventSink<T, PagedPoolAllocator<T>>, PagedTreeLock>;
pub type NonPagedPoolSet<T> = Set<T, PoolEventSink<T, NonPagedPoolAllocator<T>>, NonPagedTreeLock>;
pub type TaggedPagedPoolSet<T, const TAG: u32> =
    Set<T, PoolEventSink<T, TaggedPagedPoolAllocator<T, TAG>>, PagedTreeLock>;
pub type TaggedNonPagedPoolSet<T, const TAG: u32> =
    Set<T, PoolEventSink<T, TaggedNonPagedPoolAllocator<T, TAG>>, NonPagedTreeLock>;
pub type PagedLookasideSet<T, const TAG: u32> =
    Set<T, LookasideEventSink<T, PagedLookasideAllocator<T, TAG>>, PagedTreeLock>;
pub type NonPagedLookasideSet<T, const TAG: u32> =
    Set<T, LookasideEventSink<T, NonPagedLookasideAllocator<T, TAG>>, NonPagedTreeLock>;
