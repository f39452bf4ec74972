//! Arquivo: klib/tree/avl.rs
//!
//! Propósito: Motor AVL genérico sobre nós tipados.
//!
//! Detalhes de Implementação:
//! - Nós com ponteiro para o pai; rebalanceamento por altura, subindo do
//!   ponto de inserção/remoção até a raiz.
//! - Memória dos nós e comparação vêm do chamador (`TableHooks`).
//! - A inserção devolve o slot com payload NÃO inicializado; o chamador
//!   constrói o valor logo em seguida.
//! - A enumeração guarda o último nó visitado e continua a partir dele.
//!
//! AVL Table

use core::cmp::{max, Ordering};
use core::mem::{size_of, MaybeUninit};
use core::ptr::NonNull;

pub type Link<T> = Option<NonNull<TreeNode<T>>>;

/// Nó da árvore: cabeçalho de ligação + payload.
pub struct TreeNode<T> {
    parent: Link<T>,
    left: Link<T>,
    right: Link<T>,
    height: i32,
    value: MaybeUninit<T>,
}

impl<T> TreeNode<T> {
    /// Bytes pedidos ao alocador para um nó
    pub const BYTES: usize = size_of::<TreeNode<T>>();

    /// Constrói o valor no slot de um nó recém inserido.
    ///
    /// # Safety
    ///
    /// `node` veio de `InsertOutcome::Inserted` e ainda não foi inicializado.
    pub unsafe fn init(node: NonNull<Self>, value: T) {
        (*node.as_ptr()).value.write(value);
    }

    /// # Safety
    ///
    /// `node` está ligado a uma tabela viva e seu valor foi construído.
    pub unsafe fn value<'a>(node: NonNull<Self>) -> &'a T {
        (*node.as_ptr()).value.assume_init_ref()
    }

    /// # Safety
    ///
    /// Igual a `value`, e nenhuma outra referência ao valor está viva.
    pub unsafe fn value_mut<'a>(node: NonNull<Self>) -> &'a mut T {
        (*node.as_ptr()).value.assume_init_mut()
    }

    fn height(link: Link<T>) -> i32 {
        // SAFETY: links de uma tabela sempre apontam para nós vivos
        link.map_or(0, |n| unsafe { (*n.as_ptr()).height })
    }

    unsafe fn update_height(node: NonNull<Self>) {
        let n = &mut *node.as_ptr();
        n.height = max(Self::height(n.left), Self::height(n.right)) + 1;
    }

    unsafe fn balance(node: NonNull<Self>) -> i32 {
        let n = &*node.as_ptr();
        Self::height(n.left) - Self::height(n.right)
    }

    unsafe fn leftmost(mut node: NonNull<Self>) -> NonNull<Self> {
        while let Some(l) = (*node.as_ptr()).left {
            node = l;
        }
        node
    }

    unsafe fn rightmost(mut node: NonNull<Self>) -> NonNull<Self> {
        while let Some(r) = (*node.as_ptr()).right {
            node = r;
        }
        node
    }

    /// Próximo nó em ordem
    ///
    /// # Safety
    ///
    /// `node` está ligado a uma tabela viva.
    pub unsafe fn successor(node: NonNull<Self>) -> Link<T> {
        if let Some(r) = (*node.as_ptr()).right {
            return Some(Self::leftmost(r));
        }
        let mut child = node;
        let mut parent = (*node.as_ptr()).parent;
        while let Some(p) = parent {
            if (*p.as_ptr()).left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = (*p.as_ptr()).parent;
        }
        None
    }

    /// Nó anterior em ordem
    ///
    /// # Safety
    ///
    /// `node` está ligado a uma tabela viva.
    pub unsafe fn predecessor(node: NonNull<Self>) -> Link<T> {
        if let Some(l) = (*node.as_ptr()).left {
            return Some(Self::rightmost(l));
        }
        let mut child = node;
        let mut parent = (*node.as_ptr()).parent;
        while let Some(p) = parent {
            if (*p.as_ptr()).right == Some(child) {
                return Some(p);
            }
            child = p;
            parent = (*p.as_ptr()).parent;
        }
        None
    }
}

/// Callbacks da tabela: ordem e memória dos nós.
pub trait TableHooks<T> {
    /// Compara a sonda com o valor de um nó
    fn compare(&self, probe: &T, stored: &T) -> Ordering;

    /// Memória zerada para um nó de `bytes` bytes
    fn allocate(&mut self, bytes: usize) -> Option<NonNull<TreeNode<T>>>;

    /// Devolve a memória de um nó (valor já destruído ou movido)
    ///
    /// # Safety
    ///
    /// `node` veio de `allocate` e não está mais ligado.
    unsafe fn free(&mut self, node: NonNull<TreeNode<T>>);
}

/// Resultado de `AvlTable::insert`
#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome<T> {
    /// Já havia um elemento equivalente
    Existing(NonNull<TreeNode<T>>),
    /// Slot novo, ligado e com payload não inicializado
    Inserted(NonNull<TreeNode<T>>),
    /// O alocador não entregou memória
    Failed,
}

enum EnumCursor<T> {
    Start,
    At(NonNull<TreeNode<T>>),
    End,
}

/// Tabela AVL. Dona dos valores; a memória dos nós pertence aos hooks.
///
/// A tabela não guarda os hooks: quem a usa precisa passar sempre os
/// mesmos (em especial em `clear`).
pub struct AvlTable<T> {
    root: Link<T>,
    count: usize,
    cursor: EnumCursor<T>,
}

// SAFETY: a tabela é dona exclusiva dos nós
unsafe impl<T: Send> Send for AvlTable<T> {}
unsafe impl<T: Sync> Sync for AvlTable<T> {}

impl<T> AvlTable<T> {
    pub const fn new() -> Self {
        Self {
            root: None,
            count: 0,
            cursor: EnumCursor::Start,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Menor elemento
    pub fn first(&self) -> Link<T> {
        // SAFETY: a raiz é um nó vivo
        self.root.map(|r| unsafe { TreeNode::leftmost(r) })
    }

    /// Maior elemento
    pub fn last(&self) -> Link<T> {
        // SAFETY: a raiz é um nó vivo
        self.root.map(|r| unsafe { TreeNode::rightmost(r) })
    }

    // =========================================================================
    // BUSCA
    // =========================================================================

    /// Busca guiada por `probe(valor) -> ordem da chave procurada`.
    pub fn lookup_by(&self, mut probe: impl FnMut(&T) -> Ordering) -> Link<T> {
        let mut cur = self.root;
        while let Some(n) = cur {
            // SAFETY: nós ligados têm valor construído
            let ord = probe(unsafe { TreeNode::value(n) });
            cur = match ord {
                Ordering::Less => unsafe { (*n.as_ptr()).left },
                Ordering::Greater => unsafe { (*n.as_ptr()).right },
                Ordering::Equal => return Some(n),
            };
        }
        None
    }

    pub fn lookup<H: TableHooks<T>>(&self, probe: &T, hooks: &H) -> Link<T> {
        self.lookup_by(|stored| hooks.compare(probe, stored))
    }

    // =========================================================================
    // INSERÇÃO
    // =========================================================================

    /// Insere um slot para `probe`.
    ///
    /// # Safety
    ///
    /// Em `Inserted`, o chamador deve chamar `TreeNode::init` no nó antes de
    /// qualquer outra operação na tabela.
    pub unsafe fn insert<H: TableHooks<T>>(&mut self, probe: &T, hooks: &mut H) -> InsertOutcome<T> {
        let mut parent: Link<T> = None;
        let mut went_left = false;
        let mut cur = self.root;

        while let Some(n) = cur {
            match hooks.compare(probe, TreeNode::value(n)) {
                Ordering::Less => {
                    went_left = true;
                    cur = (*n.as_ptr()).left;
                }
                Ordering::Greater => {
                    went_left = false;
                    cur = (*n.as_ptr()).right;
                }
                Ordering::Equal => return InsertOutcome::Existing(n),
            }
            parent = Some(n);
        }

        let Some(node) = hooks.allocate(TreeNode::<T>::BYTES) else {
            return InsertOutcome::Failed;
        };
        node.as_ptr().write(TreeNode {
            parent,
            left: None,
            right: None,
            height: 1,
            value: MaybeUninit::uninit(),
        });

        match parent {
            None => self.root = Some(node),
            Some(p) if went_left => (*p.as_ptr()).left = Some(node),
            Some(p) => (*p.as_ptr()).right = Some(node),
        }
        self.count += 1;
        self.retrace(parent);

        InsertOutcome::Inserted(node)
    }

    // =========================================================================
    // REMOÇÃO
    // =========================================================================

    /// Remove o elemento achado por `probe` e devolve o valor.
    pub fn take_by<H: TableHooks<T>>(
        &mut self,
        probe: impl FnMut(&T) -> Ordering,
        hooks: &mut H,
    ) -> Option<T> {
        let node = self.lookup_by(probe)?;
        // SAFETY: `node` está ligado a esta tabela
        Some(unsafe { self.remove_node(node, hooks) })
    }

    /// Remove e destrói o elemento equivalente a `probe`.
    pub fn delete<H: TableHooks<T>>(&mut self, probe: &T, hooks: &mut H) -> bool {
        let Some(node) = self.lookup(probe, hooks) else {
            return false;
        };
        // SAFETY: `node` está ligado a esta tabela
        drop(unsafe { self.remove_node(node, hooks) });
        true
    }

    /// Desliga `node`, libera o nó fisicamente removido e devolve o valor.
    ///
    /// Com dois filhos, o valor do sucessor sobe para `node` e o nó do
    /// sucessor é o que sai da árvore.
    unsafe fn remove_node<H: TableHooks<T>>(&mut self, node: NonNull<TreeNode<T>>, hooks: &mut H) -> T {
        let both = (*node.as_ptr()).left.is_some() && (*node.as_ptr()).right.is_some();
        let victim = match (*node.as_ptr()).right {
            Some(r) if both => TreeNode::leftmost(r),
            _ => node,
        };

        // O cursor de enumeração continua válido
        match self.cursor {
            EnumCursor::At(c) if c == node => {
                self.cursor = match TreeNode::predecessor(node) {
                    Some(p) => EnumCursor::At(p),
                    None => EnumCursor::Start,
                };
            }
            EnumCursor::At(c) if c == victim => self.cursor = EnumCursor::At(node),
            _ => {}
        }

        let value = (*node.as_ptr()).value.assume_init_read();
        if victim != node {
            core::ptr::copy_nonoverlapping(
                (*victim.as_ptr()).value.as_ptr(),
                (*node.as_ptr()).value.as_mut_ptr(),
                1,
            );
        }

        let v = &mut *victim.as_ptr();
        let child = v.left.or(v.right);
        let parent = v.parent;
        if let Some(c) = child {
            (*c.as_ptr()).parent = parent;
        }
        self.replace_child(parent, victim, child);

        hooks.free(victim);
        self.count -= 1;
        self.retrace(parent);

        value
    }

    /// Destrói todos os valores e libera todos os nós (pós-ordem).
    pub fn clear<H: TableHooks<T>>(&mut self, hooks: &mut H) {
        let mut cur = self.root.take();
        while let Some(n) = cur {
            // SAFETY: percorre só nós desta tabela; cada nó é liberado
            // depois dos dois filhos
            unsafe {
                let node = &mut *n.as_ptr();
                if let Some(l) = node.left.take() {
                    cur = Some(l);
                } else if let Some(r) = node.right.take() {
                    cur = Some(r);
                } else {
                    cur = node.parent;
                    node.value.assume_init_drop();
                    hooks.free(n);
                }
            }
        }
        self.count = 0;
        self.cursor = EnumCursor::Start;
    }

    // =========================================================================
    // ENUMERAÇÃO
    // =========================================================================

    /// Próximo elemento em ordem. `restart` volta ao menor.
    pub fn enumerate(&mut self, restart: bool) -> Link<T> {
        if restart {
            self.cursor = EnumCursor::Start;
        }
        let next = match self.cursor {
            EnumCursor::Start => self.first(),
            // SAFETY: o cursor é corrigido em toda remoção
            EnumCursor::At(n) => unsafe { TreeNode::successor(n) },
            EnumCursor::End => None,
        };
        self.cursor = next.map_or(EnumCursor::End, EnumCursor::At);
        next
    }

    /// Percurso em ordem a partir de `start` (sem tocar no cursor)
    pub fn raw_iter(&self, start: Link<T>) -> RawIter<T> {
        RawIter {
            next: start,
            remaining: self.count,
        }
    }

    // =========================================================================
    // BALANCEAMENTO
    // =========================================================================

    unsafe fn replace_child(&mut self, parent: Link<T>, old: NonNull<TreeNode<T>>, new: Link<T>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let p = &mut *p.as_ptr();
                if p.left == Some(old) {
                    p.left = new;
                } else {
                    p.right = new;
                }
            }
        }
    }

    unsafe fn rotate_left(&mut self, x: NonNull<TreeNode<T>>) -> NonNull<TreeNode<T>> {
        let Some(y) = (*x.as_ptr()).right else {
            return x;
        };
        let inner = (*y.as_ptr()).left;
        (*x.as_ptr()).right = inner;
        if let Some(b) = inner {
            (*b.as_ptr()).parent = Some(x);
        }
        let parent = (*x.as_ptr()).parent;
        (*y.as_ptr()).parent = parent;
        self.replace_child(parent, x, Some(y));
        (*y.as_ptr()).left = Some(x);
        (*x.as_ptr()).parent = Some(y);

        TreeNode::update_height(x);
        TreeNode::update_height(y);
        y
    }

    unsafe fn rotate_right(&mut self, x: NonNull<TreeNode<T>>) -> NonNull<TreeNode<T>> {
        let Some(y) = (*x.as_ptr()).left else {
            return x;
        };
        let inner = (*y.as_ptr()).right;
        (*x.as_ptr()).left = inner;
        if let Some(b) = inner {
            (*b.as_ptr()).parent = Some(x);
        }
        let parent = (*x.as_ptr()).parent;
        (*y.as_ptr()).parent = parent;
        self.replace_child(parent, x, Some(y));
        (*y.as_ptr()).right = Some(x);
        (*x.as_ptr()).parent = Some(y);

        TreeNode::update_height(x);
        TreeNode::update_height(y);
        y
    }

    /// Sobe de `from` até a raiz corrigindo alturas e rotacionando.
    unsafe fn retrace(&mut self, mut from: Link<T>) {
        while let Some(n) = from {
            TreeNode::update_height(n);
            let bf = TreeNode::balance(n);

            let top = if bf > 1 {
                if let Some(l) = (*n.as_ptr()).left {
                    if TreeNode::balance(l) < 0 {
                        self.rotate_left(l);
                    }
                }
                self.rotate_right(n)
            } else if bf < -1 {
                if let Some(r) = (*n.as_ptr()).right {
                    if TreeNode::balance(r) > 0 {
                        self.rotate_right(r);
                    }
                }
                self.rotate_left(n)
            } else {
                n
            };

            from = (*top.as_ptr()).parent;
        }
    }

    /// Confere ordem, alturas, fator de balanço e ponteiros de pai.
    /// Devolve o número de nós.
    #[cfg(test)]
    pub fn check_invariants<H: TableHooks<T>>(&self, hooks: &H) -> usize {
        unsafe fn walk<T, H: TableHooks<T>>(node: Link<T>, parent: Link<T>, hooks: &H) -> (i32, usize) {
            let Some(n) = node else {
                return (0, 0);
            };
            let r = &*n.as_ptr();
            assert_eq!(r.parent, parent, "ponteiro de pai inconsistente");
            if let Some(l) = r.left {
                assert_eq!(
                    hooks.compare(TreeNode::value(l), TreeNode::value(n)),
                    Ordering::Less
                );
            }
            if let Some(rt) = r.right {
                assert_eq!(
                    hooks.compare(TreeNode::value(rt), TreeNode::value(n)),
                    Ordering::Greater
                );
            }
            let (hl, cl) = walk(r.left, Some(n), hooks);
            let (hr, cr) = walk(r.right, Some(n), hooks);
            assert!((hl - hr).abs() <= 1, "árvore desbalanceada");
            assert_eq!(r.height, max(hl, hr) + 1, "altura desatualizada");
            (r.height, cl + cr + 1)
        }

        // SAFETY: só leitura de nós vivos
        let (_, count) = unsafe { walk(self.root, None, hooks) };
        assert_eq!(count, self.count);
        count
    }
}

impl<T> Default for AvlTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Percurso em ordem sobre nós crus.
///
/// Não segura empréstimo da tabela: quem cria garante que ela não muda
/// enquanto o percurso existe.
pub struct RawIter<T> {
    next: Link<T>,
    remaining: usize,
}

impl<T> Iterator for RawIter<T> {
    type Item = NonNull<TreeNode<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.next?;
        // SAFETY: contrato de criação do RawIter
        self.next = unsafe { TreeNode::successor(n) };
        self.remaining = self.remaining.saturating_sub(1);
        Some(n)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.next.is_none() {
            (0, Some(0))
        } else {
            (1, Some(self.remaining))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::alloc::{alloc_zeroed, dealloc, Layout};
    use std::vec::Vec;

    /// Hooks sobre o alocador do host, contando nós vivos
    struct HostHooks {
        live: usize,
    }

    impl TableHooks<u32> for HostHooks {
        fn compare(&self, probe: &u32, stored: &u32) -> Ordering {
            probe.cmp(stored)
        }

        fn allocate(&mut self, bytes: usize) -> Option<NonNull<TreeNode<u32>>> {
            assert_eq!(bytes, TreeNode::<u32>::BYTES);
            self.live += 1;
            NonNull::new(unsafe { alloc_zeroed(Layout::new::<TreeNode<u32>>()) }.cast())
        }

        unsafe fn free(&mut self, node: NonNull<TreeNode<u32>>) {
            self.live -= 1;
            dealloc(node.as_ptr().cast(), Layout::new::<TreeNode<u32>>());
        }
    }

    fn put(t: &mut AvlTable<u32>, h: &mut HostHooks, v: u32) -> bool {
        match unsafe { t.insert(&v, h) } {
            InsertOutcome::Inserted(n) => {
                unsafe { TreeNode::init(n, v) };
                true
            }
            InsertOutcome::Existing(_) => false,
            InsertOutcome::Failed => panic!("host alloc falhou"),
        }
    }

    fn values(t: &AvlTable<u32>) -> Vec<u32> {
        t.raw_iter(t.first())
            .map(|n| unsafe { *TreeNode::value(n) })
            .collect()
    }

    /// Permutação determinística de 0..n
    fn scrambled(n: u32) -> Vec<u32> {
        (0..n).map(|i| (i * 7919) % n).collect()
    }

    #[test]
    fn sequential_inserts_stay_balanced() {
        let mut h = HostHooks { live: 0 };
        let mut t = AvlTable::new();
        for v in 0..1000 {
            assert!(put(&mut t, &mut h, v));
        }
        assert_eq!(t.check_invariants(&h), 1000);
        // altura AVL com 1000 nós fica abaixo de 1.44 * log2(n)
        assert!(TreeNode::height(t.root) <= 14);
        t.clear(&mut h);
        assert_eq!(h.live, 0);
    }

    #[test]
    fn duplicates_report_existing_node() {
        let mut h = HostHooks { live: 0 };
        let mut t = AvlTable::new();
        assert!(put(&mut t, &mut h, 5));
        let existing = t.lookup(&5, &h).unwrap();
        assert_eq!(unsafe { t.insert(&5, &mut h) }, InsertOutcome::Existing(existing));
        assert_eq!(t.len(), 1);
        t.clear(&mut h);
    }

    #[test]
    fn deletes_keep_order_and_balance() {
        let mut h = HostHooks { live: 0 };
        let mut t = AvlTable::new();
        for v in scrambled(509) {
            put(&mut t, &mut h, v);
        }
        for v in (0..509).filter(|v| v % 3 == 0) {
            assert!(t.delete(&v, &mut h));
            t.check_invariants(&h);
        }
        assert!(!t.delete(&3, &mut h));
        let expected: Vec<u32> = (0..509).filter(|v| v % 3 != 0).collect();
        assert_eq!(values(&t), expected);
        assert_eq!(h.live, expected.len());
        t.clear(&mut h);
        assert_eq!(h.live, 0);
        assert!(t.is_empty());
    }

    #[test]
    fn take_by_moves_value_out() {
        let mut h = HostHooks { live: 0 };
        let mut t = AvlTable::new();
        for v in [10, 20, 30] {
            put(&mut t, &mut h, v);
        }
        assert_eq!(t.take_by(|s| 20.cmp(s), &mut h), Some(20));
        assert_eq!(t.take_by(|s| 20.cmp(s), &mut h), None);
        assert_eq!(values(&t), [10, 30]);
        t.clear(&mut h);
    }

    #[test]
    fn enumeration_resumes_after_deleting_current() {
        let mut h = HostHooks { live: 0 };
        let mut t = AvlTable::new();
        for v in scrambled(64) {
            put(&mut t, &mut h, v);
        }

        let mut seen = Vec::new();
        let mut next = t.enumerate(true);
        while let Some(n) = next {
            let v = unsafe { *TreeNode::value(n) };
            seen.push(v);
            if v % 2 == 0 {
                assert!(t.delete(&v, &mut h));
            }
            next = t.enumerate(false);
        }
        assert_eq!(seen, (0..64).collect::<Vec<_>>());
        assert_eq!(values(&t), (0..64).filter(|v| v % 2 == 1).collect::<Vec<_>>());
        assert!(t.enumerate(false).is_none());
        t.clear(&mut h);
    }

    #[test]
    fn successor_and_predecessor_walk_in_order() {
        let mut h = HostHooks { live: 0 };
        let mut t = AvlTable::new();
        for v in scrambled(31) {
            put(&mut t, &mut h, v);
        }
        let mut back = Vec::new();
        let mut cur = t.last();
        while let Some(n) = cur {
            back.push(unsafe { *TreeNode::value(n) });
            cur = unsafe { TreeNode::predecessor(n) };
        }
        assert_eq!(back, (0..31).rev().collect::<Vec<_>>());
        t.clear(&mut h);
    }
}
