//! String interning.
//!
//! Identifiers, property names and string-literal type values are interned
//! into `Atom`s so that name comparison during resolution and subtyping is an
//! integer comparison. The interner is shared by every crate in the engine
//! and must tolerate concurrent readers and writers: the hosting IDE may run
//! several semantic queries at once.

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use std::sync::Arc;
use std::sync::RwLock;

/// Interned string handle.
///
/// `Atom` equality implies string equality for atoms produced by the same
/// [`Interner`]. Atoms from different interners must never be mixed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(pub u32);

impl Atom {
    /// Sentinel for "no name" (anonymous declarations).
    pub const EMPTY: Self = Self(0);
}

/// Concurrent string interner.
///
/// Forward lookups go through a sharded map; reverse lookups read an
/// append-only table. Both sides are safe under concurrent access, so a
/// single `Interner` can back every query thread of the engine.
pub struct Interner {
    map: DashMap<Arc<str>, Atom, FxBuildHasher>,
    strings: RwLock<Vec<Arc<str>>>,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    pub fn new() -> Self {
        let interner = Self {
            map: DashMap::with_hasher(FxBuildHasher),
            strings: RwLock::new(Vec::new()),
        };
        // Atom::EMPTY must resolve to the empty string.
        interner.intern("");
        interner
    }

    /// Intern a string, returning its stable atom.
    pub fn intern(&self, text: &str) -> Atom {
        if let Some(existing) = self.map.get(text) {
            return *existing;
        }
        let mut strings = self.strings.write().unwrap_or_else(|e| e.into_inner());
        // Re-check under the write lock: another thread may have interned
        // the same string between the lookup above and acquiring the lock.
        if let Some(existing) = self.map.get(text) {
            return *existing;
        }
        let arc: Arc<str> = Arc::from(text);
        let atom = Atom(strings.len() as u32);
        strings.push(Arc::clone(&arc));
        self.map.insert(arc, atom);
        atom
    }

    /// Resolve an atom back to its string.
    ///
    /// Returns the empty string for atoms this interner never produced.
    pub fn resolve(&self, atom: Atom) -> Arc<str> {
        let strings = self.strings.read().unwrap_or_else(|e| e.into_inner());
        strings
            .get(atom.0 as usize)
            .cloned()
            .unwrap_or_else(|| Arc::from(""))
    }

    /// Number of distinct interned strings.
    pub fn len(&self) -> usize {
        self.strings.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_deduplicates() {
        let interner = Interner::new();
        let a = interner.intern("hello");
        let b = interner.intern("hello");
        let c = interner.intern("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn resolve_round_trips() {
        let interner = Interner::new();
        let atom = interner.intern("pigeon");
        assert_eq!(&*interner.resolve(atom), "pigeon");
    }

    #[test]
    fn empty_atom_is_empty_string() {
        let interner = Interner::new();
        assert_eq!(&*interner.resolve(Atom::EMPTY), "");
        assert_eq!(interner.intern(""), Atom::EMPTY);
    }

    #[test]
    fn unknown_atom_resolves_to_empty() {
        let interner = Interner::new();
        assert_eq!(&*interner.resolve(Atom(9999)), "");
    }
}
