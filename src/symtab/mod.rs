//! Symbol-table entries and the scope environment (spec.md §3 "Symbol-
//! table entry", §3 "Environment").
//!
//! Back-pointers (opaque -> definition, enum constant -> parent enum) are
//! modelled as indices into a flat arena rather than owned/cyclic
//! references, per spec.md §9's redesign note on back-pointers; this
//! mirrors the teacher's general preference for indices over `Rc`/`RefCell`
//! webs when entries must refer to each other (`compiler_frontend`'s HIR
//! arenas follow the same shape for its own node graph).

use crate::interning::StringId;
use crate::types::Type;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(pub usize);

#[derive(Debug, Clone)]
pub enum SymbolEntry {
    Variable {
        name: StringId,
        ty: Type,
        escapes: bool,
    },
    Function {
        name: StringId,
        return_type: Type,
        arg_types: Vec<Type>,
    },
    Opaque {
        name: StringId,
        definition: Option<EntryId>,
    },
    Struct {
        name: StringId,
        field_names: Vec<StringId>,
        field_types: Vec<Type>,
    },
    Union {
        name: StringId,
        option_names: Vec<StringId>,
        option_types: Vec<Type>,
    },
    Enum {
        name: StringId,
        constant_names: Vec<StringId>,
        constants: Vec<EntryId>,
        backing_type: Option<Type>,
    },
    /// `value` is the raw 64-bit pattern; reinterpret via `signed` when
    /// reading it back (spec.md §3: "signedness flag and 64-bit value").
    EnumConstant {
        name: StringId,
        parent: EntryId,
        signed: bool,
        value: u64,
    },
    Typedef {
        name: StringId,
        aliased: Type,
    },
}

impl SymbolEntry {
    pub fn name(&self) -> StringId {
        match self {
            SymbolEntry::Variable { name, .. }
            | SymbolEntry::Function { name, .. }
            | SymbolEntry::Opaque { name, .. }
            | SymbolEntry::Struct { name, .. }
            | SymbolEntry::Union { name, .. }
            | SymbolEntry::Enum { name, .. }
            | SymbolEntry::EnumConstant { name, .. }
            | SymbolEntry::Typedef { name, .. } => *name,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            SymbolEntry::Variable { .. } => "variable",
            SymbolEntry::Function { .. } => "function",
            SymbolEntry::Opaque { .. } => "opaque",
            SymbolEntry::Struct { .. } => "struct",
            SymbolEntry::Union { .. } => "union",
            SymbolEntry::Enum { .. } => "enum",
            SymbolEntry::EnumConstant { .. } => "enum constant",
            SymbolEntry::Typedef { .. } => "typedef",
        }
    }

    /// True for the symbols `sizeof(`/`cast<` lookahead (spec.md §4.5)
    /// and declaration-position parsing must treat as type names.
    pub fn is_type_kind(&self) -> bool {
        matches!(
            self,
            SymbolEntry::Opaque { .. }
                | SymbolEntry::Struct { .. }
                | SymbolEntry::Union { .. }
                | SymbolEntry::Enum { .. }
                | SymbolEntry::Typedef { .. }
        )
    }

    pub fn as_enum_constant_value(&self) -> Option<i64> {
        match self {
            SymbolEntry::EnumConstant { signed, value, .. } => {
                Some(if *signed { *value as i64 } else { *value as i64 })
            }
            _ => None,
        }
    }
}

/// A flat, append-only store of symbol-table entries shared by every file
/// in the list. Entries never move once allocated, so an `EntryId` stays
/// valid for the remainder of a compilation.
#[derive(Debug, Default)]
pub struct Arena {
    entries: Vec<SymbolEntry>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, entry: SymbolEntry) -> EntryId {
        let id = EntryId(self.entries.len());
        self.entries.push(entry);
        id
    }

    pub fn get(&self, id: EntryId) -> &SymbolEntry {
        &self.entries[id.0]
    }

    pub fn get_mut(&mut self, id: EntryId) -> &mut SymbolEntry {
        &mut self.entries[id.0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Follows an opaque's `definition` link through to a concrete entry,
    /// if one has been set; returns the id unchanged for non-opaques or
    /// an opaque with no definition yet.
    pub fn resolve_opaque(&self, id: EntryId) -> EntryId {
        match self.get(id) {
            SymbolEntry::Opaque { definition: Some(def), .. } => *def,
            _ => id,
        }
    }
}

/// A file's top-level name -> entry table, built during stab-construction
/// Stage B and consulted for the rest of the pipeline.
pub type FileScope = FxHashMap<StringId, EntryId>;

/// A stack of non-owning scope tables plus the surrounding file/import
/// context (spec.md §3 "Environment"). Scopes are pushed on function
/// entry and at every compound statement, for-header, and switch-case
/// body; popped on exit.
pub struct Environment<'a> {
    file_scope: &'a FileScope,
    implicit_import: Option<&'a FileScope>,
    explicit_imports: Vec<&'a FileScope>,
    scopes: Vec<FxHashMap<StringId, EntryId>>,
}

impl<'a> Environment<'a> {
    pub fn new(
        file_scope: &'a FileScope,
        implicit_import: Option<&'a FileScope>,
        explicit_imports: Vec<&'a FileScope>,
    ) -> Self {
        Self {
            file_scope,
            implicit_import,
            explicit_imports,
            scopes: Vec::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Declares `name` in the innermost scope. Returns the entry it
    /// shadows, if any, so the caller can decide whether that's an error.
    pub fn declare(&mut self, name: StringId, id: EntryId) -> Option<EntryId> {
        let scope = self.scopes.last_mut().expect("declare called outside any scope");
        scope.insert(name, id)
    }

    pub fn lookup(&self, name: StringId) -> Option<EntryId> {
        for scope in self.scopes.iter().rev() {
            if let Some(&id) = scope.get(&name) {
                return Some(id);
            }
        }
        if let Some(&id) = self.file_scope.get(&name) {
            return Some(id);
        }
        for imp in &self.explicit_imports {
            if let Some(&id) = imp.get(&name) {
                return Some(id);
            }
        }
        if let Some(imp) = self.implicit_import {
            if let Some(&id) = imp.get(&name) {
                return Some(id);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interning::StringTable;
    use crate::types::{Keyword, Type};

    #[test]
    fn lookup_checks_innermost_scope_first() {
        let mut table = StringTable::new();
        let mut arena = Arena::new();
        let x = table.intern("x");

        let outer_id = arena.alloc(SymbolEntry::Variable {
            name: x,
            ty: Type::Keyword(Keyword::Int),
            escapes: false,
        });
        let inner_id = arena.alloc(SymbolEntry::Variable {
            name: x,
            ty: Type::Keyword(Keyword::Bool),
            escapes: false,
        });

        let mut file_scope = FileScope::default();
        file_scope.insert(x, outer_id);

        let mut env = Environment::new(&file_scope, None, Vec::new());
        assert_eq!(env.lookup(x), Some(outer_id));

        env.push_scope();
        env.declare(x, inner_id);
        assert_eq!(env.lookup(x), Some(inner_id));
        env.pop_scope();
        assert_eq!(env.lookup(x), Some(outer_id));
    }

    #[test]
    fn opaque_resolves_through_definition_link() {
        let mut table = StringTable::new();
        let mut arena = Arena::new();
        let name = table.intern("Point");
        let concrete = arena.alloc(SymbolEntry::Struct {
            name,
            field_names: vec![],
            field_types: vec![],
        });
        let opaque = arena.alloc(SymbolEntry::Opaque {
            name,
            definition: Some(concrete),
        });
        assert_eq!(arena.resolve_opaque(opaque), concrete);
    }
}
