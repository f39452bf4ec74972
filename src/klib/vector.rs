//! Arquivo: klib/vector.rs
//!
//! Propósito: Array dinâmico sobre um `KAllocator`.
//!
//! Detalhes de Implementação:
//! - Crescimento: quando o novo tamanho alcança a capacidade, a capacidade
//!   passa a ser `2 × novo tamanho` e cada elemento é movido para o novo buffer.
//! - Encolhimento preguiçoso: o buffer só é realocado com metade da capacidade
//!   quando o novo tamanho é ímpar e menor que a metade. Tamanho zero volta
//!   para capacidade 1.
//! - Falha de alocação devolve `Err` e deixa o vetor intacto.
//! - Posições (`Position`) carregam o tamanho do vetor em que nasceram.
//!
//! Dynamic Array

use core::mem::size_of;
use core::ops::{Index, IndexMut, Range};
use core::ptr::{self, NonNull};

use crate::config::VECTOR_MAX_SIZE;
use crate::error::{KError, KResult};
use crate::mm::allocator::{
    KAllocator, NonPagedPoolAllocator, PagedPoolAllocator, TaggedNonPagedPoolAllocator,
    TaggedPagedPoolAllocator,
};

pub struct Vector<T, A: KAllocator<Value = T>> {
    allocator: A,
    data: Option<NonNull<T>>,
    size: usize,
    capacity: usize,
}

// SAFETY: o vetor é dono exclusivo do buffer
unsafe impl<T: Send, A: KAllocator<Value = T> + Send> Send for Vector<T, A> {}
unsafe impl<T: Sync, A: KAllocator<Value = T> + Sync> Sync for Vector<T, A> {}

impl<T, A: KAllocator<Value = T>> Vector<T, A> {
    pub fn new() -> Self {
        Self::with_allocator(A::default())
    }

    /// Vetor vazio com buffer inicial de capacidade 1.
    ///
    /// Se o buffer inicial não puder ser alocado, o vetor nasce sem buffer e
    /// aloca na primeira inserção.
    pub fn with_allocator(allocator: A) -> Self {
        let mut v = Self {
            allocator,
            data: None,
            size: 0,
            capacity: 1,
        };
        v.data = v.allocator.allocate(size_of::<T>());
        v
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub const fn max_size(&self) -> usize {
        VECTOR_MAX_SIZE
    }

    // =========================================================================
    // BUFFER
    // =========================================================================

    #[inline]
    fn ptr(&self) -> *mut T {
        self.data.map_or(NonNull::dangling().as_ptr(), NonNull::as_ptr)
    }

    /// Move os `keep` primeiros elementos para um buffer de `new_capacity`.
    ///
    /// Elementos além de `keep` já devem ter sido destruídos ou movidos.
    fn relocate(&mut self, new_capacity: usize, keep: usize) -> KResult<()> {
        let bytes = new_capacity
            .checked_mul(size_of::<T>())
            .ok_or(KError::CapacityExceeded)?;
        let new_data = self.allocator.allocate(bytes).ok_or(KError::OutOfMemory)?;

        if let Some(old) = self.data.take() {
            // SAFETY: buffers distintos; `keep` cabe nos dois
            unsafe {
                ptr::copy_nonoverlapping(old.as_ptr(), new_data.as_ptr(), keep);
                self.allocator.deallocate(old.as_ptr());
            }
        }

        self.data = Some(new_data);
        self.capacity = new_capacity;
        Ok(())
    }

    /// Garante espaço para `new_size` elementos (crescimento por dobra).
    fn grow_for(&mut self, new_size: usize) -> KResult<()> {
        if new_size > VECTOR_MAX_SIZE {
            return Err(KError::CapacityExceeded);
        }
        if new_size < self.capacity && self.data.is_some() {
            return Ok(());
        }

        let new_capacity = new_size.saturating_mul(2).min(VECTOR_MAX_SIZE).max(1);
        crate::ktrace!("(Vector) crescendo para capacidade=", new_capacity as u64);
        self.relocate(new_capacity, self.size)
    }

    /// Aplica a política de encolhimento ao tamanho atual.
    fn compact(&mut self) {
        let half = self.capacity >> 1;
        let new_capacity = if self.size == 0 {
            1
        } else if self.size % 2 == 1 && half > self.size {
            half
        } else {
            return;
        };
        if new_capacity == self.capacity {
            return;
        }

        if self.relocate(new_capacity, self.size).is_err() {
            crate::kwarn!("(Vector) encolhimento sem memória, mantendo buffer=", self.capacity as u64);
        }
    }

    /// Destrói os elementos a partir de `new_size` sem mexer no buffer.
    fn truncate_in_place(&mut self, new_size: usize) {
        if new_size >= self.size {
            return;
        }
        let tail = ptr::slice_from_raw_parts_mut(
            // SAFETY: new_size < size <= capacity
            unsafe { self.ptr().add(new_size) },
            self.size - new_size,
        );
        // O tamanho cai antes do drop: um pânico no drop não gera double free
        self.size = new_size;
        // SAFETY: a cauda tinha elementos vivos
        unsafe { ptr::drop_in_place(tail) };
    }

    // =========================================================================
    // TAMANHO
    // =========================================================================

    /// Ajusta o tamanho; novos elementos vêm de `fill`.
    pub fn resize_with(&mut self, new_size: usize, mut fill: impl FnMut() -> T) -> KResult<()> {
        if new_size < self.size {
            self.truncate_in_place(new_size);
            self.compact();
            return Ok(());
        }

        self.grow_for(new_size)?;
        let base = self.ptr();
        while self.size < new_size {
            // SAFETY: size < new_size < capacity
            unsafe { base.add(self.size).write(fill()) };
            self.size += 1;
        }
        Ok(())
    }

    pub fn resize(&mut self, new_size: usize, value: T) -> KResult<()>
    where
        T: Clone,
    {
        self.resize_with(new_size, || value.clone())
    }

    pub fn resize_default(&mut self, new_size: usize) -> KResult<()>
    where
        T: Default,
    {
        self.resize_with(new_size, T::default)
    }

    /// Capacidade passa a ser exatamente `new_capacity`, se maior que a atual.
    pub fn reserve(&mut self, new_capacity: usize) -> KResult<()> {
        if new_capacity <= self.capacity && self.data.is_some() {
            return Ok(());
        }
        if new_capacity > VECTOR_MAX_SIZE {
            return Err(KError::CapacityExceeded);
        }
        self.relocate(new_capacity.max(self.capacity), self.size)
    }

    /// Destrói tudo e libera o buffer (capacidade volta a 1)
    pub fn cleanup(&mut self) {
        self.truncate_in_place(0);
        if let Some(old) = self.data.take() {
            // SAFETY: buffer veio deste alocador
            unsafe { self.allocator.deallocate(old.as_ptr()) };
        }
        self.capacity = 1;
    }

    // =========================================================================
    // INSERÇÃO / REMOÇÃO
    // =========================================================================

    pub fn push_back(&mut self, value: T) -> KResult<()> {
        self.grow_for(self.size + 1)?;
        // SAFETY: size + 1 < capacity
        unsafe { self.ptr().add(self.size).write(value) };
        self.size += 1;
        Ok(())
    }

    pub fn pop_back(&mut self) -> Option<T> {
        if self.size == 0 {
            return None;
        }
        self.size -= 1;
        // SAFETY: o último elemento estava vivo e sai do tamanho lógico
        let value = unsafe { self.ptr().add(self.size).read() };
        self.compact();
        Some(value)
    }

    /// Abre `count` posições em `index`, deslocando a cauda.
    fn open_gap(&mut self, index: usize, count: usize) -> KResult<*mut T> {
        assert!(index <= self.size, "(Vector) insert fora do intervalo");
        let new_size = self.size.checked_add(count).ok_or(KError::CapacityExceeded)?;
        self.grow_for(new_size)?;

        let base = self.ptr();
        // SAFETY: new_size < capacity; regiões sobrepostas usam copy
        unsafe {
            let at = base.add(index);
            ptr::copy(at, at.add(count), self.size - index);
            Ok(at)
        }
    }

    pub fn insert(&mut self, index: usize, value: T) -> KResult<()> {
        let at = self.open_gap(index, 1)?;
        // SAFETY: a posição foi aberta por open_gap
        unsafe { at.write(value) };
        self.size += 1;
        Ok(())
    }

    /// Insere `count` cópias de `value` em `index`
    pub fn insert_n(&mut self, index: usize, count: usize, value: &T) -> KResult<()>
    where
        T: Clone,
    {
        self.insert_from(index, count, |_| value.clone())
    }

    pub fn insert_slice(&mut self, index: usize, values: &[T]) -> KResult<()>
    where
        T: Clone,
    {
        self.insert_from(index, values.len(), |i| values[i].clone())
    }

    fn insert_from(&mut self, index: usize, count: usize, mut make: impl FnMut(usize) -> T) -> KResult<()> {
        if count == 0 {
            return Ok(());
        }
        let at = self.open_gap(index, count)?;
        let tail = self.size - index;
        // A cauda deslocada fica fora do tamanho lógico até a lacuna encher
        self.size = index;
        for i in 0..count {
            // SAFETY: lacuna aberta por open_gap
            unsafe { at.add(i).write(make(i)) };
        }
        self.size = index + count + tail;
        Ok(())
    }

    /// Remove e devolve o elemento em `index`
    pub fn remove(&mut self, index: usize) -> T {
        assert!(index < self.size, "(Vector) remove fora do intervalo");
        // SAFETY: index < size
        let value = unsafe {
            let at = self.ptr().add(index);
            let value = at.read();
            ptr::copy(at.add(1), at, self.size - index - 1);
            value
        };
        self.size -= 1;
        self.compact();
        value
    }

    /// Destrói os elementos em `range` e fecha a lacuna
    pub fn erase_range(&mut self, range: Range<usize>) {
        let Range { start, end } = range;
        assert!(start <= end && end <= self.size, "(Vector) intervalo inválido");
        let count = end - start;
        if count == 0 {
            return;
        }

        let old_size = self.size;
        self.size = start;
        // SAFETY: [start, end) vivos; a cauda é movida depois do drop
        unsafe {
            let at = self.ptr().add(start);
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(at, count));
            ptr::copy(at.add(count), at, old_size - end);
        }
        self.size = old_size - count;
        self.compact();
    }

    /// Substitui o conteúdo por `count` cópias de `value`
    pub fn assign(&mut self, count: usize, value: &T) -> KResult<()>
    where
        T: Clone,
    {
        self.assign_from(count, |_| value.clone(), |slot, _| slot.clone_from(value))
    }

    /// Substitui o conteúdo por cópias de `values`
    pub fn assign_slice(&mut self, values: &[T]) -> KResult<()>
    where
        T: Clone,
    {
        self.assign_from(
            values.len(),
            |i| values[i].clone(),
            |slot, i| slot.clone_from(&values[i]),
        )
    }

    fn assign_from(
        &mut self,
        count: usize,
        mut make: impl FnMut(usize) -> T,
        mut overwrite: impl FnMut(&mut T, usize),
    ) -> KResult<()> {
        // Cresce antes de tocar em qualquer elemento
        if count > self.size {
            self.grow_for(count)?;
        }

        let keep = count.min(self.size);
        for (i, slot) in self.as_mut_slice()[..keep].iter_mut().enumerate() {
            overwrite(slot, i);
        }

        if count < self.size {
            self.truncate_in_place(count);
            self.compact();
            return Ok(());
        }
        self.insert_from(keep, count - keep, |i| make(keep + i))
    }

    /// Troca o conteúdo (e os alocadores) dos dois vetores
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }

    // =========================================================================
    // ACESSO
    // =========================================================================

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: [0, size) vivos; ponteiro dangling só com size 0
        unsafe { core::slice::from_raw_parts(self.ptr(), self.size) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: idem as_slice, com acesso exclusivo
        unsafe { core::slice::from_raw_parts_mut(self.ptr(), self.size) }
    }

    /// Elemento em `index`; fora do intervalo é violação de contrato
    pub fn at(&self, index: usize) -> &T {
        assert!(index < self.size, "(Vector) at fora do intervalo");
        &self.as_slice()[index]
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    pub fn front(&self) -> Option<&T> {
        self.as_slice().first()
    }

    pub fn back(&self) -> Option<&T> {
        self.as_slice().last()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> core::slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    // =========================================================================
    // POSIÇÕES
    // =========================================================================

    pub fn begin(&self) -> Position {
        Position::new(0, self.size, false)
    }

    /// Sentinela logo após o último elemento
    pub fn end(&self) -> Position {
        Position::new(self.size as isize, self.size, false)
    }

    /// Último elemento, percorrendo para trás
    pub fn rbegin(&self) -> Position {
        Position::new(self.size as isize - 1, self.size, true)
    }

    /// Sentinela logo antes do primeiro elemento
    pub fn rend(&self) -> Position {
        Position::new(-1, self.size, true)
    }

    /// Elemento na posição (None em sentinela ou posição obsoleta)
    pub fn at_pos(&self, pos: Position) -> Option<&T> {
        if pos.stamp != self.size {
            return None;
        }
        pos.index().and_then(|i| self.get(i))
    }

    pub fn at_pos_mut(&mut self, pos: Position) -> Option<&mut T> {
        if pos.stamp != self.size {
            return None;
        }
        pos.index().and_then(move |i| self.get_mut(i))
    }

    /// Insere antes de `pos` (no sentido de percurso) e devolve a posição
    /// do novo elemento, no mesmo sentido.
    pub fn insert_at(&mut self, pos: Position, value: T) -> KResult<Position> {
        debug_assert_eq!(pos.stamp, self.size, "(Vector) posição obsoleta");
        let index = pos.slot();
        self.insert(index, value)?;
        Ok(Position::new(index as isize, self.size, pos.reverse))
    }

    /// Remove o elemento em `pos`; devolve a posição do seguinte no mesmo
    /// sentido (`end()` ou `rend()` se não houver).
    pub fn erase_at(&mut self, pos: Position) -> Position {
        debug_assert_eq!(pos.stamp, self.size, "(Vector) posição obsoleta");
        let Some(index) = pos.index() else {
            panic!("(Vector) erase_at em sentinela");
        };
        drop(self.remove(index));
        let next = if pos.reverse {
            index as isize - 1
        } else {
            index as isize
        };
        Position::new(next, self.size, pos.reverse)
    }
}

impl<T, A: KAllocator<Value = T>> Default for Vector<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: KAllocator<Value = T>> Drop for Vector<T, A> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl<T, A: KAllocator<Value = T>> Index<usize> for Vector<T, A> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<T, A: KAllocator<Value = T>> IndexMut<usize> for Vector<T, A> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.as_mut_slice()[index]
    }
}

impl<'a, T, A: KAllocator<Value = T>> IntoIterator for &'a Vector<T, A> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// POSITION
// =============================================================================

/// Posição num vetor, marcada com o tamanho do vetor que a criou.
///
/// Duas posições são iguais quando índice, carimbo e sentido coincidem.
/// Qualquer mudança de tamanho torna a posição obsoleta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    index: isize,
    stamp: usize,
    reverse: bool,
}

impl Position {
    const fn new(index: isize, stamp: usize, reverse: bool) -> Self {
        Self {
            index,
            stamp,
            reverse,
        }
    }

    /// Índice do elemento (None nas sentinelas)
    pub fn index(&self) -> Option<usize> {
        if self.index < 0 || self.index as usize >= self.stamp {
            None
        } else {
            Some(self.index as usize)
        }
    }

    /// Tamanho do vetor quando a posição foi criada
    pub fn stamp(&self) -> usize {
        self.stamp
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    /// Slot onde uma inserção na posição acontece
    fn slot(&self) -> usize {
        if self.reverse {
            (self.index + 1) as usize
        } else {
            self.index as usize
        }
    }

    /// Anda `n` passos no sentido de percurso, sem passar da sentinela final
    pub fn advance(&mut self, n: usize) -> &mut Self {
        let n = n as isize;
        if self.reverse {
            debug_assert!(self.index - n >= -1, "(Vector) posição antes de rend");
            self.index = (self.index - n).max(-1);
        } else {
            let end = self.stamp as isize;
            debug_assert!(self.index + n <= end, "(Vector) posição depois de end");
            self.index = (self.index + n).min(end);
        }
        self
    }

    /// Volta `n` passos, sem passar da sentinela inicial
    pub fn retreat(&mut self, n: usize) -> &mut Self {
        let n = n as isize;
        if self.reverse {
            let start = self.stamp as isize - 1;
            debug_assert!(self.index + n <= start, "(Vector) posição antes de rbegin");
            self.index = (self.index + n).min(start);
        } else {
            debug_assert!(self.index - n >= 0, "(Vector) posição antes de begin");
            self.index = (self.index - n).max(0);
        }
        self
    }
}

// =============================================================================
// ALIASES
// =============================================================================

pub type PagedPoolVector<T> = Vector<T, PagedPoolAllocator<T>>;
pub type NonPagedPoolVector<T> = Vector<T, NonPagedPoolAllocator<T>>;
pub type TaggedPagedPoolVector<T, const TAG: u32> = Vector<T, TaggedPagedPoolAllocator<T, TAG>>;
pub type TaggedNonPagedPoolVector<T, const TAG: u32> =
    Vector<T, TaggedNonPagedPoolAllocator<T, TAG>>;
