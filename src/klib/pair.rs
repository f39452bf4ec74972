//! Par genérico (`first`, `second`), base dos elementos do `Map`.

/// Par ordenado lexicograficamente.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pair<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> Pair<A, B> {
    pub const fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn into_tuple(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A, B> From<(A, B)> for Pair<A, B> {
    fn from((first, second): (A, B)) -> Self {
        Self { first, second }
    }
}

/// Atalho para `Pair::new`
pub const fn make_pair<A, B>(first: A, second: B) -> Pair<A, B> {
    Pair::new(first, second)
}
