//! String interning for identifiers, module names, and scoped-id components.
//!
//! Modelled on the teacher's `compiler_frontend::string_interning` module:
//! a `Vec<Box<str>>` gives O(1) id -> text, an `FxHashMap` keyed on a
//! `'static`-transmuted alias of the same heap data gives O(1) text -> id.

use rustc_hash::FxHashMap;
use serde::Serialize;

/// A unique identifier for an interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StringId(u32);

impl StringId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn resolve(self, table: &StringTable) -> &str {
        table.resolve(self)
    }
}

impl std::fmt::Display for StringId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Centralised string interner, shared by the lexer (identifier text),
/// the AST (scoped ids) and the symbol table (entry names).
#[derive(Debug, Default)]
pub struct StringTable {
    strings: Vec<Box<str>>,
    string_to_id: FxHashMap<&'static str, StringId>,
}

impl StringTable {
    pub fn new() -> Self {
        Self {
            strings: Vec::with_capacity(256),
            string_to_id: FxHashMap::default(),
        }
    }

    /// Intern a string slice, returning its unique id. Re-interning an
    /// existing string returns the id it was first given.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.string_to_id.get(s) {
            return id;
        }
        self.intern_new(s)
    }

    #[cold]
    fn intern_new(&mut self, s: &str) -> StringId {
        let id = StringId(self.strings.len() as u32);
        let boxed: Box<str> = s.into();

        // SAFETY: the StringTable owns `boxed` for the rest of the
        // program; the key is never read after the table itself is
        // dropped, and the table never removes or reallocates entries.
        let static_ref: &'static str = unsafe { std::mem::transmute(boxed.as_ref()) };

        self.string_to_id.insert(static_ref, id);
        self.strings.push(boxed);
        id
    }

    #[inline]
    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.0 as usize]
    }

    pub fn get_existing(&self, s: &str) -> Option<StringId> {
        self.string_to_id.get(s).copied()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_dedupes() {
        let mut table = StringTable::new();
        let a = table.intern("foo");
        let b = table.intern("foo");
        let c = table.intern("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.resolve(a), "foo");
        assert_eq!(table.resolve(c), "bar");
    }

    #[test]
    fn resolves_many_strings() {
        let mut table = StringTable::new();
        let ids: Vec<_> = (0..64).map(|i| table.intern(&format!("sym{i}"))).collect();
        for (i, id) in ids.into_iter().enumerate() {
            assert_eq!(table.resolve(id), format!("sym{i}"));
        }
    }
}
