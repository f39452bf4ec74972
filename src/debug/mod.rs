//! Infraestrutura de diagnóstico.
//!
//! - `klog`: macros de log zero-overhead e o sink de saída registrável.

pub mod klog;

pub use klog::{set_log_sink, LogSink};
