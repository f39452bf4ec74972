//! Níveis de prioridade de execução (IRQL).
//!
//! A KStl não eleva nem verifica o IRQL em runtime; os níveis documentam,
//! nos tipos, até onde cada lock e cada pool podem ser usados.

/// Prioridade de execução do processador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Irql {
    /// Código de thread normal; pode dormir e tocar memória paginável
    Passive = 0,
    /// APCs desabilitadas; ainda pode tocar memória paginável
    Apc = 1,
    /// Dispatcher; não pode dormir nem sofrer page fault
    Dispatch = 2,
}

impl Irql {
    /// Nome curto para logs
    pub const fn name(self) -> &'static str {
        match self {
            Self::Passive => "PASSIVE_LEVEL",
            Self::Apc => "APC_LEVEL",
            Self::Dispatch => "DISPATCH_LEVEL",
        }
    }

    /// Memória paginável só pode ser tocada abaixo de DISPATCH.
    pub const fn allows_paging(self) -> bool {
        (self as u8) < (Self::Dispatch as u8)
    }

    /// Esperas bloqueantes só são permitidas abaixo de DISPATCH.
    pub const fn allows_blocking(self) -> bool {
        (self as u8) < (Self::Dispatch as u8)
    }
}
