//! Scoped identifiers (`A::B::C`), generalising the teacher's
//! `compiler_frontend::interned_path::InternedPath` from filesystem paths
//! to `::`-separated name sequences: module names, import targets, and
//! the scoped form of an identifier expression.

use crate::interning::{StringId, StringTable};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopedId {
    components: Vec<StringId>,
}

impl ScopedId {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    pub fn from_components(components: Vec<StringId>) -> Self {
        Self { components }
    }

    pub fn single(id: StringId) -> Self {
        Self {
            components: vec![id],
        }
    }

    pub fn push(&mut self, id: StringId) {
        self.components.push(id);
    }

    pub fn append(&self, id: StringId) -> Self {
        let mut components = self.components.clone();
        components.push(id);
        Self { components }
    }

    pub fn as_components(&self) -> &[StringId] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The last component, e.g. `C` in `A::B::C` - the "plain name".
    pub fn last(&self) -> Option<StringId> {
        self.components.last().copied()
    }

    /// All but the last component, e.g. `A::B` in `A::B::C`.
    /// Returns `None` for a single-component id.
    pub fn drop_last(&self) -> Option<ScopedId> {
        if self.components.len() <= 1 {
            return None;
        }
        Some(ScopedId {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    pub fn starts_with(&self, prefix: &ScopedId) -> bool {
        prefix.components.len() <= self.components.len()
            && self.components[..prefix.components.len()] == prefix.components[..]
    }

    /// Render as `A::B::C` for diagnostics, matching the teacher's
    /// `stringifyId`.
    pub fn stringify(&self, table: &StringTable) -> String {
        self.components
            .iter()
            .map(|id| table.resolve(*id))
            .collect::<Vec<_>>()
            .join("::")
    }
}

impl Default for ScopedId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk(table: &mut StringTable, parts: &[&str]) -> ScopedId {
        ScopedId::from_components(parts.iter().map(|p| table.intern(p)).collect())
    }

    #[test]
    fn stringifies_scoped_form() {
        let mut table = StringTable::new();
        let id = mk(&mut table, &["A", "B", "C"]);
        assert_eq!(id.stringify(&table), "A::B::C");
    }

    #[test]
    fn drop_last_matches_parent_module() {
        let mut table = StringTable::new();
        let child = mk(&mut table, &["A", "B"]);
        let parent = mk(&mut table, &["A"]);
        assert_eq!(child.drop_last(), Some(parent.clone()));
        assert!(child.starts_with(&parent));
        assert_eq!(parent.drop_last(), None);
    }

    #[test]
    fn structural_equality_ignores_identity() {
        let mut table = StringTable::new();
        let a = mk(&mut table, &["A", "B"]);
        let b = mk(&mut table, &["A", "B"]);
        assert_eq!(a, b);
    }
}
