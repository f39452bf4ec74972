//! Arquivo: klib/list/linked.rs
//!
//! Propósito: Lista Duplamente Encadeada sobre um `KAllocator`.
//!
//! Detalhes de Implementação:
//! - Nós alocados via `A::Rebind<ListNode<T>>` (nunca pelo alocador global).
//! - Falha de alocação devolve `Err(KError::OutOfMemory)` e a lista fica intacta.
//! - Remoção move o valor para fora, depois libera o nó.
//!
//! Doubly Linked List

use core::marker::PhantomData;
use core::mem::size_of;
use core::ptr::NonNull;

use crate::error::{KError, KResult};
use crate::mm::allocator::{
    KAllocator, NonPagedLookasideAllocator, NonPagedPoolAllocator, PagedLookasideAllocator,
    PagedPoolAllocator, TaggedNonPagedPoolAllocator, TaggedPagedPoolAllocator,
};

type Link<T> = Option<NonNull<ListNode<T>>>;

/// Nó da lista (o alocador é reatado para este tipo)
pub struct ListNode<T> {
    next: Link<T>,
    prev: Link<T>,
    value: T,
}

/// Sentido de percurso de um cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

pub struct List<T, A: KAllocator<Value = T>> {
    head: Link<T>,
    tail: Link<T>,
    len: usize,
    allocator: A::Rebind<ListNode<T>>,
    _marker: PhantomData<T>,
}

// SAFETY: a lista é dona exclusiva dos nós
unsafe impl<T: Send, A: KAllocator<Value = T>> Send for List<T, A> where
    A::Rebind<ListNode<T>>: Send
{
}
unsafe impl<T: Sync, A: KAllocator<Value = T>> Sync for List<T, A> where
    A::Rebind<ListNode<T>>: Sync
{
}

impl<T, A: KAllocator<Value = T>> List<T, A> {
    pub fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            allocator: Default::default(),
            _marker: PhantomData,
        }
    }

    /// Usa o alocador informado (reatado para os nós)
    pub fn with_allocator(allocator: &A) -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            allocator: allocator.rebind(),
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // =========================================================================
    // NÓS
    // =========================================================================

    fn new_node(&mut self, value: T) -> KResult<NonNull<ListNode<T>>> {
        if !self.allocator.is_valid() {
            return Err(KError::InvalidAllocator);
        }
        let node = self
            .allocator
            .allocate(size_of::<ListNode<T>>())
            .ok_or(KError::OutOfMemory)?;
        // SAFETY: bloco novo do tamanho de um nó
        unsafe {
            self.allocator.construct_with(
                node,
                ListNode {
                    next: None,
                    prev: None,
                    value,
                },
            );
        }
        Ok(node)
    }

    /// Move o valor para fora e libera o nó (já desligado).
    unsafe fn free_node(&mut self, node: NonNull<ListNode<T>>) -> T {
        let ListNode { value, .. } = node.as_ptr().read();
        self.allocator.deallocate(node.as_ptr());
        value
    }

    /// Liga `node` antes de `at` (`None` = fim da lista).
    unsafe fn link_before(&mut self, at: Link<T>, node: NonNull<ListNode<T>>) {
        let prev = match at {
            Some(a) => (*a.as_ptr()).prev,
            None => self.tail,
        };
        (*node.as_ptr()).prev = prev;
        (*node.as_ptr()).next = at;

        match prev {
            Some(p) => (*p.as_ptr()).next = Some(node),
            None => self.head = Some(node),
        }
        match at {
            Some(a) => (*a.as_ptr()).prev = Some(node),
            None => self.tail = Some(node),
        }
        self.len += 1;
    }

    unsafe fn unlink(&mut self, node: NonNull<ListNode<T>>) {
        let next = (*node.as_ptr()).next;
        let prev = (*node.as_ptr()).prev;
        match prev {
            Some(p) => (*p.as_ptr()).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => (*n.as_ptr()).prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
    }

    // =========================================================================
    // INSERÇÃO / REMOÇÃO
    // =========================================================================

    pub fn insert_first(&mut self, value: T) -> KResult<()> {
        let node = self.new_node(value)?;
        // SAFETY: nó novo, ainda não ligado
        unsafe { self.link_before(self.head, node) };
        Ok(())
    }

    pub fn insert_last(&mut self, value: T) -> KResult<()> {
        let node = self.new_node(value)?;
        // SAFETY: nó novo, ainda não ligado
        unsafe { self.link_before(None, node) };
        Ok(())
    }

    pub fn remove_first(&mut self) -> Option<T> {
        let node = self.head?;
        // SAFETY: head pertence a esta lista
        unsafe {
            self.unlink(node);
            Some(self.free_node(node))
        }
    }

    pub fn remove_last(&mut self) -> Option<T> {
        let node = self.tail?;
        // SAFETY: tail pertence a esta lista
        unsafe {
            self.unlink(node);
            Some(self.free_node(node))
        }
    }

    /// Remove o primeiro elemento igual a `value`.
    ///
    /// Remover um valor ausente é violação de contrato.
    pub fn remove(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        let mut cur = self.head;
        while let Some(node) = cur {
            // SAFETY: nós ligados estão vivos
            unsafe {
                if (*node.as_ptr()).value == *value {
                    self.unlink(node);
                    drop(self.free_node(node));
                    return true;
                }
                cur = (*node.as_ptr()).next;
            }
        }
        debug_assert!(false, "List::remove: elemento ausente");
        false
    }

    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.iter().any(|v| v == value)
    }

    /// Destrói todos os elementos
    pub fn cleanup(&mut self) {
        while self.remove_first().is_some() {}
    }

    pub fn front(&self) -> Option<&T> {
        // SAFETY: nós ligados estão vivos
        self.head.map(|n| unsafe { &(*n.as_ptr()).value })
    }

    pub fn back(&self) -> Option<&T> {
        // SAFETY: nós ligados estão vivos
        self.tail.map(|n| unsafe { &(*n.as_ptr()).value })
    }

    pub fn front_mut(&mut self) -> Option<&mut T> {
        // SAFETY: &mut self garante exclusividade
        self.head.map(|n| unsafe { &mut (*n.as_ptr()).value })
    }

    pub fn back_mut(&mut self) -> Option<&mut T> {
        // SAFETY: &mut self garante exclusividade
        self.tail.map(|n| unsafe { &mut (*n.as_ptr()).value })
    }

    // =========================================================================
    // ITERAÇÃO
    // =========================================================================

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            head: self.head,
            tail: self.tail,
            len: self.len,
            _marker: PhantomData,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            head: self.head,
            tail: self.tail,
            len: self.len,
            _marker: PhantomData,
        }
    }

    /// Cursor no primeiro elemento, andando para frente
    pub fn cursor_front_mut(&mut self) -> CursorMut<'_, T, A> {
        let current = self.head;
        CursorMut {
            list: self,
            current,
            direction: Direction::Forward,
        }
    }

    /// Cursor no último elemento, andando para trás
    pub fn cursor_back_mut(&mut self) -> CursorMut<'_, T, A> {
        let current = self.tail;
        CursorMut {
            list: self,
            current,
            direction: Direction::Reverse,
        }
    }
}

impl<T, A: KAllocator<Value = T>> Default for List<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: KAllocator<Value = T>> Drop for List<T, A> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl<'a, T, A: KAllocator<Value = T>> IntoIterator for &'a List<T, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

// =============================================================================
// ITERADORES
// =============================================================================

pub struct Iter<'a, T> {
    head: Link<T>,
    tail: Link<T>,
    len: usize,
    _marker: PhantomData<&'a ListNode<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.len == 0 {
            return None;
        }
        self.head.map(|node| unsafe {
            // SAFETY: o borrow da lista mantém os nós vivos
            let node = &*node.as_ptr();
            self.len -= 1;
            self.head = node.next;
            &node.value
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<&'a T> {
        if self.len == 0 {
            return None;
        }
        self.tail.map(|node| unsafe {
            // SAFETY: o borrow da lista mantém os nós vivos
            let node = &*node.as_ptr();
            self.len -= 1;
            self.tail = node.prev;
            &node.value
        })
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

pub struct IterMut<'a, T> {
    head: Link<T>,
    tail: Link<T>,
    len: usize,
    _marker: PhantomData<&'a mut ListNode<T>>,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<&'a mut T> {
        if self.len == 0 {
            return None;
        }
        self.head.map(|node| unsafe {
            // SAFETY: cada nó é entregue uma única vez
            let node = &mut *node.as_ptr();
            self.len -= 1;
            self.head = node.next;
            &mut node.value
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'a, T> DoubleEndedIterator for IterMut<'a, T> {
    fn next_back(&mut self) -> Option<&'a mut T> {
        if self.len == 0 {
            return None;
        }
        self.tail.map(|node| unsafe {
            // SAFETY: cada nó é entregue uma única vez
            let node = &mut *node.as_ptr();
            self.len -= 1;
            self.tail = node.prev;
            &mut node.value
        })
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}

// =============================================================================
// CURSOR
// =============================================================================

/// Posição mutável na lista.
///
/// `None` em `current` é a sentinela de fim. Avançar a partir da
/// sentinela é violação de contrato. Inserções respeitam a ordem da lista,
/// independente da direção do cursor.
pub struct CursorMut<'a, T, A: KAllocator<Value = T>> {
    list: &'a mut List<T, A>,
    current: Link<T>,
    direction: Direction,
}

impl<'a, T, A: KAllocator<Value = T>> CursorMut<'a, T, A> {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// `true` se o cursor está na sentinela de fim
    pub fn is_end(&self) -> bool {
        self.current.is_none()
    }

    pub fn current(&mut self) -> Option<&mut T> {
        // SAFETY: o cursor segura &mut da lista
        self.current.map(|n| unsafe { &mut (*n.as_ptr()).value })
    }

    pub fn peek(&self) -> Option<&T> {
        // SAFETY: o cursor segura &mut da lista
        self.current.map(|n| unsafe { &(*n.as_ptr()).value })
    }

    #[inline]
    fn step(&self, node: NonNull<ListNode<T>>, forward: bool) -> Link<T> {
        // SAFETY: nós ligados estão vivos
        unsafe {
            let n = &*node.as_ptr();
            match (self.direction, forward) {
                (Direction::Forward, true) | (Direction::Reverse, false) => n.next,
                (Direction::Forward, false) | (Direction::Reverse, true) => n.prev,
            }
        }
    }

    fn walk(&mut self, count: usize, forward: bool) {
        if count == 0 {
            return;
        }
        debug_assert!(self.current.is_some(), "CursorMut: movendo a partir do fim");
        let mut left = count;
        while left > 0 {
            let Some(node) = self.current else {
                break;
            };
            self.current = self.step(node, forward);
            left -= 1;
        }
    }

    /// Um passo no sentido do cursor. Retorna `false` ao chegar no fim.
    pub fn move_next(&mut self) -> bool {
        self.walk(1, true);
        self.current.is_some()
    }

    /// `count` passos no sentido do cursor (para na sentinela)
    pub fn advance(&mut self, count: usize) {
        self.walk(count, true);
    }

    /// `count` passos no sentido oposto (para na sentinela)
    pub fn retreat(&mut self, count: usize) {
        self.walk(count, false);
    }

    /// Insere antes da posição atual (na sentinela: no fim da lista).
    pub fn insert_before(&mut self, value: T) -> KResult<()> {
        let node = self.list.new_node(value)?;
        // SAFETY: nó novo; current pertence à lista
        unsafe { self.list.link_before(self.current, node) };
        Ok(())
    }

    /// Insere depois da posição atual (na sentinela: no início da lista).
    pub fn insert_after(&mut self, value: T) -> KResult<()> {
        let at = match self.current {
            // SAFETY: nós ligados estão vivos
            Some(c) => unsafe { (*c.as_ptr()).next },
            None => self.list.head,
        };
        let node = self.list.new_node(value)?;
        // SAFETY: nó novo; `at` pertence à lista
        unsafe { self.list.link_before(at, node) };
        Ok(())
    }

    /// Remove o elemento atual; o cursor vai para o próximo no seu sentido.
    pub fn remove_current(&mut self) -> Option<T> {
        let node = self.current?;
        self.current = self.step(node, true);
        // SAFETY: node pertence à lista e é desligado antes de liberar
        unsafe {
            self.list.unlink(node);
            Some(self.list.free_node(node))
        }
    }
}

// =============================================================================
// ALIASES POR ALOCADOR
// =============================================================================

pub type PagedPoolList<T> = List<T, PagedPoolAllocator<T>>;
pub type NonPagedPoolList<T> = List<T, NonPagedPoolAllocator<T>>;
pub type TaggedPagedPoolList<T, const TAG: u32> = List<T, TaggedPagedPoolAllocator<T, TAG>>;
pub type TaggedNonPagedPoolList<T, const TAG: u32> = List<T, TaggedNonPagedPoolAllocator<T, TAG>>;
pub type PagedLookasideList<T, const TAG: u32> = List<T, PagedLookasideAllocator<T, TAG>>;
pub type NonPagedLookasideList<T, const TAG: u32> = List<T, NonPagedLookasideAllocator<T, TAG>>;
