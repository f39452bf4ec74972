//! Tipos de Erro da KStl
//!
//! Falhas de recurso são valores de retorno; nada aqui é fatal.

/// Erros das operações de containers e alocadores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KError {
    /// O pool não conseguiu entregar memória
    OutOfMemory,
    /// Elemento equivalente já presente (Set/Map)
    AlreadyExists,
    /// Alocador lookaside sem lista (falhou na construção)
    InvalidAllocator,
    /// Tamanho máximo do container seria excedido
    CapacityExceeded,
}

impl KError {
    /// Retorna descrição legível do erro
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "OOM: pool sem memória disponível",
            Self::AlreadyExists => "Elemento já existe",
            Self::InvalidAllocator => "Alocador inválido",
            Self::CapacityExceeded => "Capacidade máxima excedida",
        }
    }
}

impl core::fmt::Display for KError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tipo Result específico da KStl
pub type KResult<T> = Result<T, KError>;
