//! Ponteiros inteligentes ligados aos pools do kernel.
//!
//! - `AutoPtr`: posse exclusiva com transferência explícita.
//! - `SharedPtr`: posse compartilhada, contador atômico em bloco de pool.
//! - `deleter`: políticas de criação/destruição (`DefaultNew`, `DefaultDelete`).

pub mod auto;
pub mod deleter;
pub mod shared;

pub use auto::AutoPtr;
pub use deleter::{
    pool_delete, pool_new, DefaultDelete, DefaultNew, Deleter, Factory, FnDeleter,
};
pub use shared::SharedPtr;
