//! Listas encadeadas.
//!
//! - `linked`: lista dupla com cursores nos dois sentidos.
//! - `forward`: lista simples com cursor de avanço único.

pub mod forward;
pub mod linked;

pub use forward::{ForwardCursorMut, ForwardList};
pub use linked::{CursorMut, Direction, List};
