//! Kernel Library (KLib).
//!
//! Containers da KStl. Todos recebem o alocador como parâmetro de tipo e
//! alocam apenas os próprios nós (via `Rebind`).
//!
//! | Módulo   | Conteúdo |
//! |----------|----------|
//! | `vector` | Array dinâmico com crescimento dobrado e posições carimbadas. |
//! | `list`   | `List` (dupla) e `ForwardList` (simples). |
//! | `queue`  | Fila FIFO sobre `List`. |
//! | `tree`   | `Set` e `Map` AVL com lock interno. |

pub mod align;
pub mod list;
pub mod pair;
pub mod queue;
pub mod test_framework;
pub mod tree;
pub mod vector;

#[cfg(feature = "self_test")]
pub mod selftest;

pub use list::forward::{
    NonPagedLookasideForwardList, NonPagedPoolForwardList, PagedLookasideForwardList,
    PagedPoolForwardList, TaggedNonPagedPoolForwardList, TaggedPagedPoolForwardList,
};
pub use list::linked::{
    NonPagedLookasideList, NonPagedPoolList, PagedLookasideList, PagedPoolList,
    TaggedNonPagedPoolList, TaggedPagedPoolList,
};
pub use list::{ForwardList, List};
pub use pair::Pair;
pub use queue::{
    NonPagedLookasideQueue, NonPagedPoolQueue, PagedLookasideQueue, PagedPoolQueue, Queue,
    TaggedNonPagedPoolQueue, TaggedPagedPoolQueue,
};
pub use tree::{Map, Set};
pub use vector::{
    NonPagedPoolVector, PagedPoolVector, Position, TaggedNonPagedPoolVector,
    TaggedPagedPoolVector, Vector,
};
