//! Arquivo: klib/list/forward.rs
//!
//! Propósito: Lista Simplesmente Encadeada sobre um `KAllocator`.
//!
//! Detalhes de Implementação:
//! - Inserção/remoção O(1) na frente; `push_back` usa o ponteiro de cauda.
//! - O cursor só anda para frente: `retreat` não faz nada.
//!
//! Singly Linked List

use core::marker::PhantomData;
use core::mem::size_of;
use core::ptr::NonNull;

use crate::error::{KError, KResult};
use crate::mm::allocator::{
    KAllocator, NonPagedLookasideAllocator, NonPagedPoolAllocator, PagedLookasideAllocator,
    PagedPoolAllocator, TaggedNonPagedPoolAllocator, TaggedPagedPoolAllocator,
};

type Link<T> = Option<NonNull<ForwardNode<T>>>;

/// Nó da lista simples
pub struct ForwardNode<T> {
    next: Link<T>,
    value: T,
}

pub struct ForwardList<T, A: KAllocator<Value = T>> {
    head: Link<T>,
    tail: Link<T>,
    len: usize,
    allocator: A::Rebind<ForwardNode<T>>,
    _marker: PhantomData<T>,
}

// SAFETY: a lista é dona exclusiva dos nós
unsafe impl<T: Send, A: KAllocator<Value = T>> Send for ForwardList<T, A> where
    A::Rebind<ForwardNode<T>>: Send
{
}

impl<T, A: KAllocator<Value = T>> ForwardList<T, A> {
    pub fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            allocator: Default::default(),
            _marker: PhantomData,
        }
    }

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

    fn new_node(&mut self, value: T, next: Link<T>) -> KResult<NonNull<ForwardNode<T>>> {
        if !self.allocator.is_valid() {
            return Err(KError::InvalidAllocator);
        }
        let node = self
            .allocator
            .allocate(size_of::<ForwardNode<T>>())
            .ok_or(KError::OutOfMemory)?;
        // SAFETY: bloco novo do tamanho de um nó
        unsafe {
            self.allocator
                .construct_with(node, ForwardNode { next, value });
        }
        Ok(node)
    }

    unsafe fn free_node(&mut self, node: NonNull<ForwardNode<T>>) -> T {
        let ForwardNode { value, .. } = node.as_ptr().read();
        self.allocator.deallocate(node.as_ptr());
        value
    }

    /// Liga `node` depois de `prev` (`None` = na frente).
    unsafe fn link_after(&mut self, prev: Link<T>, node: NonNull<ForwardNode<T>>) {
        let next = match prev {
            Some(p) => (*p.as_ptr()).next,
            None => self.head,
        };
        (*node.as_ptr()).next = next;
        match prev {
            Some(p) => (*p.as_ptr()).next = Some(node),
            None => self.head = Some(node),
        }
        if next.is_none() {
            self.tail = Some(node);
        }
        self.len += 1;
    }

    /// Desliga o nó seguinte a `prev` (`None` = a cabeça).
    unsafe fn unlink_after(&mut self, prev: Link<T>) -> Link<T> {
        let node = match prev {
            Some(p) => (*p.as_ptr()).next,
            None => self.head,
        }?;
        let next = (*node.as_ptr()).next;
        match prev {
            Some(p) => (*p.as_ptr()).next = next,
            None => self.head = next,
        }
        if self.tail == Some(node) {
            self.tail = prev;
        }
        self.len -= 1;
        Some(node)
    }

    /// Insere na frente
    pub fn push(&mut self, value: T) -> KResult<()> {
        let node = self.new_node(value, None)?;
        // SAFETY: nó novo
        unsafe { self.link_after(None, node) };
        Ok(())
    }

    /// Insere no fim
    pub fn push_back(&mut self, value: T) -> KResult<()> {
        let node = self.new_node(value, None)?;
        // SAFETY: nó novo; tail pertence à lista
        unsafe { self.link_after(self.tail, node) };
        Ok(())
    }

    /// Remove da frente
    pub fn pop(&mut self) -> Option<T> {
        // SAFETY: a cabeça pertence à lista
        unsafe {
            let node = self.unlink_after(None)?;
            Some(self.free_node(node))
        }
    }

    /// Remove o primeiro elemento igual a `value`.
    pub fn remove(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        let mut prev: Link<T> = None;
        let mut cur = self.head;
        while let Some(node) = cur {
            // SAFETY: nós ligados estão vivos
            unsafe {
                if (*node.as_ptr()).value == *value {
                    self.unlink_after(prev);
                    drop(self.free_node(node));
                    return true;
                }
                prev = Some(node);
                cur = (*node.as_ptr()).next;
            }
        }
        debug_assert!(false, "ForwardList::remove: elemento ausente");
        false
    }

    pub fn front(&self) -> Option<&T> {
        // SAFETY: nós ligados estão vivos
        self.head.map(|n| unsafe { &(*n.as_ptr()).value })
    }

    pub fn cleanup(&mut self) {
        while self.pop().is_some() {}
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head,
            len: self.len,
            _marker: PhantomData,
        }
    }

    pub fn cursor_mut(&mut self) -> ForwardCursorMut<'_, T, A> {
        let current = self.head;
        ForwardCursorMut {
            list: self,
            prev: None,
            current,
        }
    }
}

impl<T, A: KAllocator<Value = T>> Default for ForwardList<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: KAllocator<Value = T>> Drop for ForwardList<T, A> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

pub struct Iter<'a, T> {
    next: Link<T>,
    len: usize,
    _marker: PhantomData<&'a ForwardNode<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        self.next.map(|node| unsafe {
            // SAFETY: o borrow da lista mantém os nós vivos
            let node = &*node.as_ptr();
            self.next = node.next;
            self.len -= 1;
            &node.value
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

/// Cursor de avanço único.
///
/// Guarda o nó anterior para poder remover e inserir antes da posição.
pub struct ForwardCursorMut<'a, T, A: KAllocator<Value = T>> {
    list: &'a mut ForwardList<T, A>,
    prev: Link<T>,
    current: Link<T>,
}

impl<'a, T, A: KAllocator<Value = T>> ForwardCursorMut<'a, T, A> {
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

    pub fn move_next(&mut self) -> bool {
        self.advance(1);
        self.current.is_some()
    }

    /// `count` passos para frente (para na sentinela)
    pub fn advance(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        debug_assert!(self.current.is_some(), "ForwardCursorMut: movendo a partir do fim");
        for _ in 0..count {
            let Some(node) = self.current else {
                break;
            };
            self.prev = Some(node);
            // SAFETY: nós ligados estão vivos
            self.current = unsafe { (*node.as_ptr()).next };
        }
    }

    /// Lista simples não anda para trás: não faz nada.
    pub fn retreat(&mut self, _count: usize) {}

    /// Insere depois da posição atual (na sentinela: na frente da lista).
    pub fn insert_after(&mut self, value: T) -> KResult<()> {
        let node = self.list.new_node(value, None)?;
        // SAFETY: nó novo; current pertence à lista
        unsafe { self.list.link_after(self.current, node) };
        if self.current.is_none() && self.prev.is_none() {
            // Lista estava vazia: o fim agora vem depois do nó novo
            self.prev = Some(node);
        }
        Ok(())
    }

    /// Insere antes da posição atual (na sentinela: no fim da lista).
    pub fn insert_before(&mut self, value: T) -> KResult<()> {
        let node = self.list.new_node(value, None)?;
        // SAFETY: nó novo; prev pertence à lista
        unsafe { self.list.link_after(self.prev, node) };
        self.prev = Some(node);
        Ok(())
    }

    /// Remove o elemento atual; o cursor vai para o seguinte.
    pub fn remove_current(&mut self) -> Option<T> {
        self.current?;
        // SAFETY: current é o nó seguinte a prev
        unsafe {
            let node = self.list.unlink_after(self.prev)?;
            self.current = (*node.as_ptr()).next;
            Some(self.list.free_node(node))
        }
    }
}

// =============================================================================
// ALIASES POR ALOCADOR
// =============================================================================

pub type PagedPoolForwardList<T> = ForwardList<T, PagedPoolAllocator<T>>;
pub type NonPagedPoolForwardList<T> = ForwardList<T, NonPagedPoolAllocator<T>>;
pub type TaggedPagedPoolForwardList<T, const TAG: u32> =
    ForwardList<T, TaggedPagedPoolAllocator<T, TAG>>;
pub type TaggedNonPagedPoolForwardList<T, const TAG: u32> =
    ForwardList<T, TaggedNonPagedPoolAllocator<T, TAG>>;
pub type PagedLookasideForwardList<T, const TAG: u32> =
    ForwardList<T, PagedLookasideAllocator<T, TAG>>;
pub type NonPagedLookasideForwardList<T, const TAG: u32> =
    ForwardList<T, NonPagedLookasideAllocator<T, TAG>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::pool::pool_tag;
    use std::vec::Vec;

    const TAG: u32 = pool_tag(b"FlTs");

    fn collect<A: KAllocator<Value = u32>>(l: &ForwardList<u32, A>) -> Vec<u32> {
        l.iter().copied().collect()
    }

    #[test]
    fn push_pop_is_lifo() {
        let mut l = NonPagedPoolForwardList::<u32>::new();
        for v in 1..=3 {
            l.push(v).unwrap();
        }
        assert_eq!(collect(&l), [3, 2, 1]);
        assert_eq!(l.pop(), Some(3));
        assert_eq!(l.len(), 2);
        assert_eq!(l.front(), Some(&2));
    }

    #[test]
    fn push_back_tracks_tail_after_removals() {
        let mut l = PagedPoolForwardList::<u32>::new();
        l.push_back(1).unwrap();
        l.push_back(2).unwrap();
        assert!(l.remove(&2));
        l.push_back(3).unwrap();
        assert_eq!(collect(&l), [1, 3]);
        l.cleanup();
        l.push_back(4).unwrap();
        assert_eq!(collect(&l), [4]);
    }

    #[test]
    fn cursor_edits_around_position() {
        let mut l = TaggedNonPagedPoolForwardList::<u32, TAG>::new();
        for v in [1, 3, 5] {
            l.push_back(v).unwrap();
        }
        {
            let mut c = l.cursor_mut();
            c.advance(1);
            assert_eq!(c.peek(), Some(&3));
            c.retreat(1);
            assert_eq!(c.peek(), Some(&3));
            c.insert_before(2).unwrap();
            c.insert_after(4).unwrap();
            assert_eq!(c.remove_current(), Some(3));
            assert_eq!(c.peek(), Some(&4));
            c.advance(5);
            assert!(c.is_end());
            c.insert_before(6).unwrap();
        }
        assert_eq!(collect(&l), [1, 2, 4, 5, 6]);
        l.push_back(7).unwrap();
        assert_eq!(collect(&l), [1, 2, 4, 5, 6, 7]);
    }

    #[test]
    fn cursor_on_empty_list_inserts() {
        let mut l = NonPagedLookasideForwardList::<u32, TAG>::new();
        {
            let mut c = l.cursor_mut();
            c.insert_after(1).unwrap();
            c.insert_before(2).unwrap();
        }
        assert_eq!(collect(&l), [1, 2]);
    }
}
