//! Origem da memória dos nós da árvore.
//!
//! O motor AVL pede bytes e devolve nós; o sink decide de onde vêm:
//!
//! - `PoolEventSink`: alocador de propósito geral, respeita o tamanho pedido.
//! - `LookasideEventSink`: blocos fixos do tamanho exato de `TreeNode<T>`.

use core::ptr::NonNull;

use super::avl::TreeNode;
use crate::mm::allocator::{FixedBlockAllocator, KAllocator};

/// Eventos de memória da árvore
pub trait TreeEventSink<T>: Default {
    /// `false` se o alocador subjacente é inválido
    fn is_ready(&self) -> bool;

    /// Memória zerada para um nó
    fn on_allocate(&mut self, bytes: usize) -> Option<NonNull<TreeNode<T>>>;

    /// Devolve a memória de um nó já desligado
    ///
    /// # Safety
    ///
    /// `node` veio de `on_allocate` deste sink e o valor já saiu dele.
    unsafe fn on_free(&mut self, node: NonNull<TreeNode<T>>);
}

// =============================================================================
// POOL
// =============================================================================

/// Sink sobre qualquer `KAllocator` (reatado para `TreeNode<T>`)
pub struct PoolEventSink<T, A: KAllocator<Value = T>> {
    allocator: A::Rebind<TreeNode<T>>,
}

impl<T, A: KAllocator<Value = T>> PoolEventSink<T, A> {
    pub fn with_allocator(allocator: &A) -> Self {
        Self {
            allocator: allocator.rebind(),
        }
    }
}

impl<T, A: KAllocator<Value = T>> Default for PoolEventSink<T, A> {
    fn default() -> Self {
        Self {
            allocator: Default::default(),
        }
    }
}

impl<T, A: KAllocator<Value = T>> TreeEventSink<T> for PoolEventSink<T, A> {
    fn is_ready(&self) -> bool {
        self.allocator.is_valid()
    }

    fn on_allocate(&mut self, bytes: usize) -> Option<NonNull<TreeNode<T>>> {
        self.allocator.allocate(bytes)
    }

    unsafe fn on_free(&mut self, node: NonNull<TreeNode<T>>) {
        self.allocator.deallocate(node.as_ptr());
    }
}

// =============================================================================
// LOOKASIDE
// =============================================================================

/// Sink sobre um alocador de bloco fixo.
///
/// O bloco é dimensionado para `TreeNode<T>`; pedidos maiores são recusados.
pub struct LookasideEventSink<T, A: KAllocator<Value = T>>
where
    A::Rebind<TreeNode<T>>: FixedBlockAllocator,
{
    allocator: A::Rebind<TreeNode<T>>,
}

impl<T, A: KAllocator<Value = T>> Default for LookasideEventSink<T, A>
where
    A::Rebind<TreeNode<T>>: FixedBlockAllocator,
{
    fn default() -> Self {
        Self {
            allocator: Default::default(),
        }
    }
}

impl<T, A: KAllocator<Value = T>> LookasideEventSink<T, A>
where
    A::Rebind<TreeNode<T>>: FixedBlockAllocator,
{
    pub fn with_allocator(allocator: &A) -> Self {
        Self {
            allocator: allocator.rebind(),
        }
    }

    /// Tamanho do bloco da lookaside (0 se inválida)
    pub fn block_size(&self) -> usize {
        self.allocator.block_size()
    }
}

impl<T, A: KAllocator<Value = T>> TreeEventSink<T> for LookasideEventSink<T, A>
where
    A::Rebind<TreeNode<T>>: FixedBlockAllocator,
{
    fn is_ready(&self) -> bool {
        self.allocator.is_valid()
    }

    fn on_allocate(&mut self, bytes: usize) -> Option<NonNull<TreeNode<T>>> {
        let block = self.allocator.block_size();
        debug_assert!(bytes <= block, "(Tree) nó maior que o bloco da lookaside");
        if bytes > block {
            crate::kerror!("(Tree) nó maior que o bloco da lookaside, bytes=", bytes as u64);
            return None;
        }
        self.allocator.allocate(bytes)
    }

    unsafe fn on_free(&mut self, node: NonNull<TreeNode<T>>) {
        self.allocator.deallocate(node.as_ptr());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::allocator::{NonPagedLookasideAllocator, PagedPoolAllocator};
    use crate::mm::pool::pool_tag;

    const TAG: u32 = pool_tag(b"SkTs");

    #[test]
    fn lookaside_sink_blocks_fit_a_node() {
        let mut sink = LookasideEventSink::<u64, NonPagedLookasideAllocator<u64, TAG>>::default();
        assert!(sink.is_ready());
        assert!(sink.block_size() >= TreeNode::<u64>::BYTES);

        let n = sink.on_allocate(TreeNode::<u64>::BYTES).unwrap();
        unsafe { sink.on_free(n) };
        let again = sink.on_allocate(TreeNode::<u64>::BYTES).unwrap();
        assert_eq!(n, again);
        unsafe { sink.on_free(again) };
    }

    #[test]
    fn pool_sink_honours_requested_size() {
        let mut sink = PoolEventSink::<[u8; 3], PagedPoolAllocator<[u8; 3]>>::default();
        assert!(sink.is_ready());
        let n = sink.on_allocate(512).unwrap();
        unsafe {
            assert!(crate::mm::pool::MemoryPool::block_size(n.cast()) >= 512);
            sink.on_free(n);
        }
    }
}
