//! Contrato comum dos locks brutos.

use super::irql::Irql;

/// Lock sem dados, parametrizável por tipo nos containers.
///
/// # Safety
///
/// `lock`/`try_lock` bem-sucedido devem garantir exclusão mútua até o
/// `unlock` correspondente, com semântica Acquire/Release.
pub unsafe trait RawLock: Send + Sync {
    /// Estado inicial (destravado)
    const INIT: Self;

    /// IRQL máximo em que o lock pode ser adquirido
    const MAX_IRQL: Irql;

    /// Adquire o lock, esperando o quanto for necessário
    fn lock(&self);

    /// Tenta adquirir sem esperar
    fn try_lock(&self) -> bool;

    /// Libera o lock.
    ///
    /// # Safety
    ///
    /// O chamador deve ser o dono atual do lock.
    unsafe fn unlock(&self);

    /// Estado atual (aproximado)
    fn is_locked(&self) -> bool;
}
