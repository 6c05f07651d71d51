//! Interned names for signals, nodes and register fields.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A name interned by a [`Interner`].
///
/// A model is interned once at load; from then on comparisons and map keys
/// use the `u32` and the text is looked up only when something is reported.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

impl Ident {
    /// Wraps a raw index. Names normally come from [`Interner::intern`].
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }
}

// SAFETY: the key round-trips through `usize` losslessly; `try_from_usize`
// refuses indices that do not fit a `u32`.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// Name table of one loaded clock graph.
///
/// Backed by [`lasso::ThreadedRodeo`] so that a `Graph` holding it stays
/// `Sync` and can serve concurrent evaluations.
pub struct Interner {
    names: ThreadedRodeo<Ident>,
}

impl Interner {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            names: ThreadedRodeo::new(),
        }
    }

    /// The identifier of `name`, adding it on first use.
    pub fn intern(&self, name: &str) -> Ident {
        self.names.get_or_intern(name)
    }

    /// The identifier of `name` if it was ever interned.
    pub fn lookup(&self, name: &str) -> Option<Ident> {
        self.names.get(name)
    }

    /// The text of `ident`.
    ///
    /// # Panics
    ///
    /// Panics if `ident` came from another interner.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.names.resolve(&ident)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no name was interned.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interner").field("names", &self.len()).finish()
    }
}
