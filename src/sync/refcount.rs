//! Contador do bloco de controle do `SharedPtr`.
//!
//! `retain` é relaxado: só quem já tem uma referência viva pode chamá-lo.
//! `release` publica as escritas (Release) e o último a sair sincroniza com
//! todos os anteriores (Acquire) antes de destruir o objeto.

use core::sync::atomic::{fence, AtomicUsize, Ordering};

/// Referências fortes a um objeto compartilhado
#[derive(Debug)]
pub struct RefCount {
    strong: AtomicUsize,
}

impl RefCount {
    /// Contador que já representa o primeiro dono
    pub const fn new(owners: usize) -> Self {
        Self {
            strong: AtomicUsize::new(owners),
        }
    }

    /// Mais um dono. Devolve a contagem antes do incremento.
    #[inline]
    pub fn retain(&self) -> usize {
        let before = self.strong.fetch_add(1, Ordering::Relaxed);
        debug_assert!(before != 0, "(RefCount) retain em objeto já liberado");
        before
    }

    /// Um dono a menos. `true` para quem deve destruir o objeto.
    #[inline]
    #[must_use]
    pub fn release(&self) -> bool {
        let before = self.strong.fetch_sub(1, Ordering::Release);
        debug_assert!(before != 0, "(RefCount) release sem dono");
        if before != 1 {
            return false;
        }
        fence(Ordering::Acquire);
        true
    }

    /// Leitura instantânea; pode mudar logo em seguida
    #[inline]
    pub fn count(&self) -> usize {
        self.strong.load(Ordering::Relaxed)
    }
}
