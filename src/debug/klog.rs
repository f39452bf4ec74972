// =============================================================================
// KSTL LOGGING - ZERO OVERHEAD
// =============================================================================
//
// Mesmo modelo do logging do kernel:
// - Features do Cargo filtram os níveis em compile-time
// - Com feature "no_logs", TODOS os macros viram expressões vazias
// - SEM core::fmt - apenas strings literais + valores em hex
// - SEM alocação
//
// A biblioteca não conhece a serial: o kernel registra um sink de linha com
// `set_log_sink` durante o boot. Sem sink, a saída é descartada.
//
// COMO USAR:
//   kinfo!("(Pool) Inicializando...");          // Apenas string
//   kinfo!("(Pool) tamanho=", 0x1000);          // String + hex
//
// =============================================================================

use spin::RwLock;

/// Função que recebe fragmentos de texto já formatados.
pub type LogSink = fn(&str);

static SINK: RwLock<Option<LogSink>> = RwLock::new(None);

// =============================================================================
// PREFIXOS COM CORES ANSI
// =============================================================================

pub const P_ERROR: &str = "\x1b[1;31m[ERRO]\x1b[0m ";
pub const P_WARN: &str = "\x1b[1;33m[WARN]\x1b[0m ";
pub const P_INFO: &str = "\x1b[32m[INFO]\x1b[0m ";
pub const P_DEBUG: &str = "\x1b[36m[DEBG]\x1b[0m ";
pub const P_TRACE: &str = "\x1b[35m[TRAC]\x1b[0m ";
pub const P_OK: &str = "\x1b[32m[OK]\x1b[0m ";

// =============================================================================
// SINK
// =============================================================================

/// Registra o destino dos logs (normalmente a serial do kernel).
///
/// Passar `None` silencia a biblioteca.
pub fn set_log_sink(sink: Option<LogSink>) {
    *SINK.write() = sink;
}

#[inline]
fn current_sink() -> Option<LogSink> {
    *SINK.read()
}

/// Envia uma string crua para o sink.
pub fn emit_str(s: &str) {
    if let Some(sink) = current_sink() {
        sink(s);
    }
}

/// Envia um valor em hexadecimal (`0x` + 16 nibbles).
pub fn emit_hex(value: u64) {
    if let Some(sink) = current_sink() {
        let mut buf = [0u8; 18];
        sink(format_hex(value, &mut buf));
    }
}

/// Envia quebra de linha.
pub fn emit_nl() {
    emit_str("\n");
}

/// Linha completa: prefixo + mensagem.
pub fn line(prefix: &str, msg: &str) {
    emit_str(prefix);
    emit_str(msg);
    emit_nl();
}

/// Linha completa: prefixo + mensagem + valor hex.
pub fn line_hex(prefix: &str, msg: &str, value: u64) {
    emit_str(prefix);
    emit_str(msg);
    emit_hex(value);
    emit_nl();
}

#[inline]
const fn nibble_to_ascii(n: u8) -> u8 {
    if n < 10 {
        b'0' + n
    } else {
        b'a' + (n - 10)
    }
}

fn format_hex(value: u64, buf: &mut [u8; 18]) -> &str {
    buf[0] = b'0';
    buf[1] = b'x';
    for i in 0..16 {
        let shift = 60 - (i * 4);
        buf[2 + i] = nibble_to_ascii(((value >> shift) & 0xF) as u8);
    }
    // Apenas ASCII foi escrito
    core::str::from_utf8(&buf[..]).unwrap_or("0x?")
}

// =============================================================================
// MACROS DE LOG - NÍVEL ERROR
// =============================================================================

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kerror {
    ($msg:expr) => {{
        $crate::debug::klog::line($crate::debug::klog::P_ERROR, $msg);
    }};
    ($msg:expr, $val:expr) => {{
        $crate::debug::klog::line_hex($crate::debug::klog::P_ERROR, $msg, $val as u64);
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kerror {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL WARN
// =============================================================================

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kwarn {
    ($msg:expr) => {{
        $crate::debug::klog::line($crate::debug::klog::P_WARN, $msg);
    }};
    ($msg:expr, $val:expr) => {{
        $crate::debug::klog::line_hex($crate::debug::klog::P_WARN, $msg, $val as u64);
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kwarn {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL INFO
// =============================================================================

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kinfo {
    ($msg:expr) => {{
        $crate::debug::klog::line($crate::debug::klog::P_INFO, $msg);
    }};
    ($msg:expr, $val:expr) => {{
        $crate::debug::klog::line_hex($crate::debug::klog::P_INFO, $msg, $val as u64);
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kinfo {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL DEBUG
// =============================================================================

#[cfg(any(feature = "log_trace", feature = "log_debug"))]
#[macro_export]
macro_rules! kdebug {
    ($msg:expr) => {{
        $crate::debug::klog::line($crate::debug::klog::P_DEBUG, $msg);
    }};
    ($msg:expr, $val:expr) => {{
        $crate::debug::klog::line_hex($crate::debug::klog::P_DEBUG, $msg, $val as u64);
    }};
}

#[cfg(not(any(feature = "log_trace", feature = "log_debug")))]
#[macro_export]
macro_rules! kdebug {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL TRACE
// =============================================================================

#[cfg(feature = "log_trace")]
#[macro_export]
macro_rules! ktrace {
    ($msg:expr) => {{
        $crate::debug::klog::line($crate::debug::klog::P_TRACE, $msg);
    }};
    ($msg:expr, $val:expr) => {{
        $crate::debug::klog::line_hex($crate::debug::klog::P_TRACE, $msg, $val as u64);
    }};
}

#[cfg(not(feature = "log_trace"))]
#[macro_export]
macro_rules! ktrace {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE STATUS
// =============================================================================

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kok {
    ($msg:expr) => {{
        $crate::debug::klog::line($crate::debug::klog::P_OK, $msg);
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kok {
    ($($t:tt)*) => {{}};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_zero_padded() {
        let mut buf = [0u8; 18];
        assert_eq!(format_hex(0x1000, &mut buf), "0x0000000000001000");
        assert_eq!(format_hex(u64::MAX, &mut buf), "0xffffffffffffffff");
    }

    #[test]
    fn emit_without_sink_is_silent() {
        // Sem sink registrado nada acontece; apenas não pode falhar
        emit_str("(Test) ignorado");
        emit_hex(0xdead);
        emit_nl();
    }
}
