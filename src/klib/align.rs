//! # Funções de Alinhamento
//!
//! Usadas pelo pool para posicionar o cabeçalho e o bloco do chamador.

/// Alinha `val` para cima ao próximo múltiplo de `align` (potência de 2).
///
/// `align_up(10, 4) == 12`, `align_up(16, 4) == 16`
#[inline(always)]
pub const fn align_up(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// Verifica se `val` é múltiplo de `align` (potência de 2).
#[inline(always)]
pub const fn is_aligned(val: usize, align: usize) -> bool {
    val & (align - 1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_power_of_two_boundaries() {
        assert_eq!(align_up(10, 4), 12);
        assert_eq!(align_up(16, 4), 16);
        assert_eq!(align_up(40, 32), 64);
        assert!(is_aligned(64, 16));
        assert!(!is_aligned(24, 16));
    }
}
