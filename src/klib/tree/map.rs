//! Mapa ordenado sobre a árvore balanceada.
//!
//! Os elementos são `Pair<K, V>` comparados só pela chave. Buscas por chave
//! não constroem um par: a sonda compara a chave direto com `first`.

use core::cmp::Ordering;
use core::marker::PhantomData;

use super::avl::{RawIter, TreeNode};
use super::set::{self, AvlTree, TreeOrder};
use super::sink::{LookasideEventSink, PoolEventSink, TreeEventSink};
use super::{NonPagedTreeLock, PagedTreeLock};
use crate::error::KResult;
use crate::klib::pair::Pair;
use crate::mm::allocator::{
    NonPagedLookasideAllocator, NonPagedPoolAllocator, PagedLookasideAllocator,
    PagedPoolAllocator, TaggedNonPagedPoolAllocator, TaggedPagedPoolAllocator,
};
use crate::sync::RawLock;

/// Ordem apenas pela chave (`first`)
pub struct KeyOrder;

impl<K: Ord, V> TreeOrder<Pair<K, V>> for KeyOrder {
    #[inline]
    fn compare(a: &Pair<K, V>, b: &Pair<K, V>) -> Ordering {
        a.first.cmp(&b.first)
    }
}

pub struct Map<K, V, S, L>
where
    K: Ord,
    S: TreeEventSink<Pair<K, V>>,
    L: RawLock,
{
    tree: AvlTree<Pair<K, V>, KeyOrder, S, L>,
    /// Devolvido por `get_or_insert_default` quando a inserção falha;
    /// criado só na primeira falha
    fallback: Option<V>,
}

impl<K, V, S, L> Map<K, V, S, L>
where
    K: Ord,
    S: TreeEventSink<Pair<K, V>>,
    L: RawLock,
{
    pub fn new() -> Self {
        Self::with_sink(S::default())
    }

    pub fn with_sink(sink: S) -> Self {
        Self {
            tree: AvlTree::with_sink(sink),
            fallback: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.tree.is_valid()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Insere o par. Chave presente: `AlreadyExists` (valor não muda).
    pub fn insert(&self, key: K, value: V) -> KResult<()> {
        self.tree.insert(Pair::new(key, value))
    }

    /// Remove e devolve o valor da chave
    pub fn take(&self, key: &K) -> Option<V> {
        self.tree.take_by(|p| key.cmp(&p.first)).map(|p| p.second)
    }

    pub fn erase(&self, key: &K) -> bool {
        self.take(key).is_some()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.with_value(key, |_| ()).is_some()
    }

    /// Executa `f` sobre o valor da chave, com o lock adquirido
    pub fn with_value<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.tree.with_value_by(|p| key.cmp(&p.first), |p| f(&p.second))
    }

    /// Cópia do valor da chave
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.with_value(key, V::clone)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let node = self.tree.table_mut().lookup_by(|p| key.cmp(&p.first))?;
        // SAFETY: &mut self garante acesso exclusivo ao nó
        Some(unsafe { &mut TreeNode::value_mut(node).second })
    }

    /// Valor da chave, inserindo `V::default()` se ausente.
    ///
    /// Se a inserção falhar, devolve o objeto reserva do mapa (reiniciado
    /// para o padrão); compare com `fallback_ptr()` para detectar.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let found = self.tree.find_node_by(|p| key.cmp(&p.first));
        let node = match found {
            Some(node) => Some(node),
            None => self.tree.insert_node(Pair::new(key, V::default())).ok(),
        };

        match node {
            // SAFETY: &mut self garante acesso exclusivo ao nó
            Some(node) => unsafe { &mut TreeNode::value_mut(node).second },
            None => {
                crate::kwarn!("(Map) operator[]: inserção falhou, usando reserva");
                self.fallback.insert(V::default())
            }
        }
    }

    /// Endereço do objeto reserva (nulo enquanto nenhuma inserção falhou)
    pub fn fallback_ptr(&self) -> *const V {
        self.fallback.as_ref().map_or(core::ptr::null(), |v| v as *const V)
    }

    pub fn cleanup(&self) {
        self.tree.cleanup();
    }

    /// Visita todos os pares em ordem de chave, com o lock adquirido
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        self.tree.for_each(|p| f(&p.first, &p.second));
    }

    pub fn iter(&mut self) -> Iter<'_, K, V> {
        Iter {
            inner: self.tree.iter(),
        }
    }

    /// A partir da chave `key` (vazio se ausente)
    pub fn iter_from(&mut self, key: &K) -> Iter<'_, K, V> {
        Iter {
            inner: self.tree.iter_from_by(|p| key.cmp(&p.first)),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let table = self.tree.table_mut();
        IterMut {
            raw: table.raw_iter(table.first()),
            _marker: PhantomData,
        }
    }
}

impl<K, V, S, L> Default for Map<K, V, S, L>
where
    K: Ord,
    S: TreeEventSink<Pair<K, V>>,
    L: RawLock,
{
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a, K, V> {
    inner: set::Iter<'a, Pair<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|p| (&p.first, &p.second))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Chaves imutáveis, valores mutáveis
pub struct IterMut<'a, K, V> {
    raw: RawIter<Pair<K, V>>,
    _marker: PhantomData<&'a mut Pair<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.raw.next()?;
        // SAFETY: cada nó é visitado uma vez; o mapa está emprestado por 'a
        let pair = unsafe { TreeNode::value_mut(node) };
        Some((&pair.first, &mut pair.second))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}

pub type PoolMapSink<K, V, A> = PoolEventSink<Pair<K, V>, A>;
pub type LookasideMapSink<K, V, A> = LookasideEventSink<Pair<K, V>, A>;

pub type PagedPoolMap<K, V> =
    Map<K, V, PoolMapSink<K, V, PagedPoolAllocator<Pair<K, V>>>, PagedTreeLock>;
pub type NonPagedPoolMap<K, V> =
    Map<K, V, PoolMapSink<K, V, NonPagedPoolAllocator<Pair<K, V>>>, NonPagedTreeLock>;
pub type TaggedPagedPoolMap<K, V, const TAG: u32> =
    Map<K, V, PoolMapSink<K, V, TaggedPagedPoolAllocator<Pair<K, V>, TAG>>, PagedTreeLock>;
pub type TaggedNonPagedPoolMap<K, V, const TAG: u32> =
    Map<K, V, PoolMapSink<K, V, TaggedNonPagedPoolAllocator<Pair<K, V>, TAG>>, NonPagedTreeLock>;
pub type PagedLookasideMap<K, V, const TAG: u32> =
    Map<K, V, LookasideMapSink<K, V, PagedLookasideAllocator<Pair<K, V>, TAG>>, PagedTreeLock>;
pub type NonPagedLookasideMap<K, V, const TAG: u32> =
    Map<K, V, LookasideMapSink<K, V, NonPagedLookasideAllocator<Pair<K, V>, TAG>>, NonPagedTreeLock>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KError;
    use crate::mm::allocator::{LookasideAllocator, PoolAllocator};
    use crate::mm::pool::{pool_tag, PoolFlags, PoolType};
    use crate::sync::RawSpinLock;
    use std::vec::Vec;

    const TAG: u32 = pool_tag(b"MpTs");

    crate::define_pool!(MapStarvedPool: NonPagedPool, "MapStarvedPool", 4096);
    crate::define_pool!(MapLookasidePool: NonPagedPool, "MapLookasidePool", 4096);
    crate::define_pool!(MapBarePool: PagedPool, "MapBarePool", 4096);

    type Starved = Map<u32, u64, PoolMapSink<u32, u64, PoolAllocator<Pair<u32, u64>, MapStarvedPool>>, RawSpinLock>;
    type StarvedLookaside = Map<
        u32,
        u64,
        LookasideMapSink<u32, u64, LookasideAllocator<Pair<u32, u64>, MapLookasidePool, TAG>>,
        RawSpinLock,
    >;
    type BareLookaside = Map<
        u32,
        u64,
        LookasideMapSink<u32, u64, LookasideAllocator<Pair<u32, u64>, MapBarePool, TAG>>,
        PagedTreeLock,
    >;

    /// Esgota o pool com blocos do tamanho de um nó
    fn exhaust<P: PoolType>() -> Vec<core::ptr::NonNull<u8>> {
        let node = TreeNode::<Pair<u32, u64>>::BYTES;
        let mut hog = Vec::new();
        while let Some(p) = P::pool().allocate(node, 16, 0, PoolFlags::empty()) {
            hog.push(p);
        }
        hog
    }

    /// Valor sem `Default`: só `get_or_insert_default` exige o bound
    #[derive(Debug, Clone, PartialEq)]
    struct Handle(u32);

    #[test]
    fn insert_is_keyed_only_by_first() {
        let mut m = NonPagedPoolMap::<u32, &str>::new();
        m.insert(2, "dois").unwrap();
        m.insert(1, "um").unwrap();
        assert_eq!(m.insert(2, "outro"), Err(KError::AlreadyExists));
        assert_eq!(m.get(&2), Some("dois"));
        let keys: Vec<u32> = m.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, [1, 2]);
    }

    #[test]
    fn erase_take_and_contains() {
        let m = PagedPoolMap::<u32, u32>::new();
        for k in 0..8 {
            m.insert(k, k * 100).unwrap();
        }
        assert!(m.erase(&3));
        assert!(!m.contains_key(&3));
        assert_eq!(m.take(&5), Some(500));
        assert_eq!(m.len(), 6);
        assert_eq!(m.with_value(&7, |v| v + 1), Some(701));
    }

    #[test]
    fn index_inserts_default_then_updates() {
        let mut m = TaggedNonPagedPoolMap::<u32, u64, TAG>::new();
        *m.get_or_insert_default(10) += 5;
        *m.get_or_insert_default(10) += 5;
        assert_eq!(m.get(&10), Some(10));
        assert_eq!(m.len(), 1);
        let slot: *const u64 = m.get_or_insert_default(11);
        assert_ne!(slot, m.fallback_ptr());
    }

    #[test]
    fn index_falls_back_when_pool_is_exhausted() {
        let pool = MapStarvedPool::pool();
        let mut hog = Vec::new();
        while let Some(p) = pool.allocate(16, 16, 0, PoolFlags::empty()) {
            hog.push(p);
        }

        let mut m = Starved::new();
        {
            let v = m.get_or_insert_default(1);
            *v = 99;
        }
        assert!(m.is_empty());
        let again: *const u64 = m.get_or_insert_default(2);
        assert_eq!(again, m.fallback_ptr());
        // a reserva é reiniciada a cada falha
        assert_eq!(unsafe { *again }, 0);

        drop(m);
        for p in hog {
            unsafe { pool.free(p) };
        }
    }

    #[test]
    fn starved_lookaside_map_hands_out_a_cleared_fallback() {
        let pool = MapLookasidePool::pool();
        let mut m = StarvedLookaside::new();
        assert!(m.is_valid());
        assert!(m.fallback_ptr().is_null());
        let mut hog = exhaust::<MapLookasidePool>();

        *m.get_or_insert_default(1) = 99;
        let fallback = m.fallback_ptr();
        assert!(!fallback.is_null());
        assert!(m.is_empty());
        assert_eq!(m.insert(1, 5), Err(KError::OutOfMemory));

        // a reserva volta zerada e no mesmo endereço
        let again: *const u64 = m.get_or_insert_default(2);
        assert_eq!(again, fallback);
        assert_eq!(unsafe { *again }, 0);
        assert!(!m.contains_key(&2));

        let last = hog.pop().unwrap();
        unsafe { pool.free(last) };
        *m.get_or_insert_default(3) = 30;
        assert_eq!(m.get(&3), Some(30));
        assert_ne!(m.get_or_insert_default(3) as *const u64, fallback);
        assert_eq!(m.len(), 1);

        drop(m);
        for p in hog {
            unsafe { pool.free(p) };
        }
    }

    #[test]
    fn invalid_lookaside_map_rejects_inserts() {
        let pool = MapBarePool::pool();
        let hog = exhaust::<MapBarePool>();
        let mut m = BareLookaside::new();
        assert!(!m.is_valid());
        assert_eq!(m.insert(1, 1), Err(KError::InvalidAllocator));

        *m.get_or_insert_default(4) = 8;
        assert_eq!(*m.get_or_insert_default(5), 0);
        assert!(m.is_empty());

        drop(m);
        for p in hog {
            unsafe { pool.free(p) };
        }
    }

    #[test]
    fn values_without_default_are_accepted() {
        let m = NonPagedPoolMap::<u32, Handle>::new();
        m.insert(1, Handle(10)).unwrap();
        assert_eq!(m.get(&1), Some(Handle(10)));
        assert_eq!(m.take(&1), Some(Handle(10)));
        assert!(m.fallback_ptr().is_null());
    }

    #[test]
    fn iter_mut_and_get_mut_change_values() {
        let mut m = TaggedPagedPoolMap::<u32, u32, TAG>::new();
        for k in 1..=4 {
            m.insert(k, 0).unwrap();
        }
        for (k, v) in m.iter_mut() {
            *v = k * 2;
        }
        *m.get_mut(&4).unwrap() = 1000;
        assert!(m.get_mut(&9).is_none());

        let mut seen = Vec::new();
        m.for_each(|k, v| seen.push((*k, *v)));
        assert_eq!(seen, [(1, 2), (2, 4), (3, 6), (4, 1000)]);

        let tail: Vec<u32> = m.iter_from(&3).map(|(k, _)| *k).collect();
        assert_eq!(tail, [3, 4]);
    }

    #[test]
    fn lookaside_maps_work() {
        let mut m = NonPagedLookasideMap::<u64, u64, TAG>::new();
        assert!(m.is_valid());
        for k in 0..64 {
            m.insert(k, k).unwrap();
        }
        m.cleanup();
        assert!(m.is_empty());
        *m.get_or_insert_default(7) = 7;
        assert_eq!(m.get(&7), Some(7));

        let p = PagedLookasideMap::<u64, u64, TAG>::new();
        p.insert(1, 2).unwrap();
        assert_eq!(p.get(&1), Some(2));
    }
}
