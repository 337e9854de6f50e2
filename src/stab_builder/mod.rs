//! Symbol-table construction (spec.md §4.4): five ordered stages run once
//! over the whole file list, after every file has been lexed and
//! skim-parsed and before any function body is late-parsed.
//!
//! Grounded on `module_dependencies.rs`'s graph-plus-DFS shape (its
//! `DependencyTracker`'s `temp_mark`/`visited` split is exactly the cycle
//! check Stage C needs, generalised here from the import graph to the
//! enum-constant value graph) and on the teacher's general preference for
//! accumulating `CompilerError`s into a flat `Vec` rather than bailing out
//! on the first one found.

use crate::ast::{EnumConstantDecl, Expr, Field, LiteralValue, PrefixOp, TopLevel, TypeExpr};
use crate::diagnostics::error::{CompileError, CompileWarning, CompilerMessages, PassOutcome};
use crate::diagnostics::location::SourceLoc;
use crate::diagnostics::policy::{Policy, Severity, WarningKind};
use crate::interning::StringTable;
use crate::scoped_id::ScopedId;
use crate::symtab::{Arena, EntryId, FileScope, SymbolEntry};
use crate::types::Type;
use std::collections::HashSet;
use std::path::PathBuf;

/// What a driver hands the pipeline for one translation unit: a resolved
/// path and a code/declaration classification (spec.md §6's explicit
/// non-goal "file-list construction, extension filtering" — the crate
/// itself never walks a directory or inspects an extension beyond this
/// convenience constructor).
#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: PathBuf,
    pub is_code: bool,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, is_code: bool) -> Self {
        Self { path: path.into(), is_code }
    }

    /// Classifies by suffix: anything other than `.td` is treated as code,
    /// matching spec.md §6 ("`.tc` code, `.td` declaration").
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let is_code = path.extension().and_then(|e| e.to_str()) != Some("td");
        Self { path, is_code }
    }
}

/// One translation unit's full state across all three passes (spec.md §3
/// "File entry"). IR/assembler slots are out of this crate's scope (§1
/// non-goals) so are not modelled here.
#[derive(Debug)]
pub struct FileEntry {
    pub source: FileSource,
    pub ast: crate::ast::File,
    pub errored: bool,
    /// The declaration file whose module name matches this file's own,
    /// set during Stage A for code files only (spec.md §3 "Environment").
    pub implicit_import: Option<usize>,
}

/// The process-wide file list (spec.md §3: "owned by a single process-wide
/// file list; populated once and never resized after pass 1 begins").
#[derive(Debug, Default)]
pub struct FileList {
    pub entries: Vec<FileEntry>,
}

impl FileList {
    pub fn new() -> Self {
        Self::default()
    }
}

fn report_policy(
    policy: &Policy,
    kind: WarningKind,
    messages: &mut CompilerMessages,
    errored: &mut bool,
    message: String,
    loc: SourceLoc,
) {
    match policy.severity(kind) {
        Severity::Ignore => {}
        Severity::Warn => messages.push_warning(CompileWarning::new(message, loc)),
        Severity::Error => {
            messages.push_error(CompileError::import(message, loc));
            *errored = true;
        }
    }
}

/// Runs all five stages in order, returning whether any file's sticky
/// `errored` flag became true during this pass (spec.md §6).
pub fn build_symbol_tables(
    files: &mut FileList,
    table: &mut StringTable,
    arena: &mut Arena,
    policy: &Policy,
    messages: &mut CompilerMessages,
) -> PassOutcome {
    let before: Vec<bool> = files.entries.iter().map(|f| f.errored).collect();
    stage_a_imports(files, table, policy, messages);
    stage_b_top_level_entries(files, table, arena, policy, messages);
    stage_c_enum_values(files, table, arena, messages);
    stage_d_aggregate_completion(files, table, arena, policy, messages);
    stage_e_scoped_id_collisions(files, table, arena, messages);
    let newly_errored = files
        .entries
        .iter()
        .zip(&before)
        .any(|(after, was)| after.errored && !was);
    if newly_errored {
        PassOutcome::failed()
    } else {
        PassOutcome::ok()
    }
}

/// Stage A: module-name uniqueness among declaration files, import
/// resolution, and implicit-import linking (spec.md §4.4 Stage A).
fn stage_a_imports(files: &mut FileList, table: &StringTable, policy: &Policy, messages: &mut CompilerMessages) {
    let mut decl_by_name: Vec<(ScopedId, usize, SourceLoc)> = Vec::new();
    for i in 0..files.entries.len() {
        if !files.entries[i].source.is_code {
            let name = files.entries[i].ast.module.name.clone();
            let loc = SourceLoc::new(files.entries[i].source.path.clone(), files.entries[i].ast.module.pos);
            match decl_by_name.iter().find(|(n, _, _)| *n == name) {
                Some((_, _, prev_loc)) => {
                    let error = CompileError::import(format!("duplicate module name `{}`", name.stringify(table)), loc)
                        .with_note("previously declared here", prev_loc.clone());
                    messages.push_error(error);
                    files.entries[i].errored = true;
                }
                None => decl_by_name.push((name, i, loc)),
            }
        }
    }

    for i in 0..files.entries.len() {
        let is_code = files.entries[i].source.is_code;
        let own_module = files.entries[i].ast.module.name.clone();
        if is_code {
            files.entries[i].implicit_import = decl_by_name
                .iter()
                .find(|(name, _, _)| *name == own_module)
                .map(|(_, idx, _)| *idx);
        }

        let mut seen = HashSet::new();
        let import_count = files.entries[i].ast.imports.len();
        for j in 0..import_count {
            let import_module = files.entries[i].ast.imports[j].module.clone();
            let import_pos = files.entries[i].ast.imports[j].pos;
            let resolved = decl_by_name.iter().find(|(name, _, _)| *name == import_module).map(|(_, idx, _)| *idx);
            match resolved {
                Some(idx) => {
                    files.entries[i].ast.imports[j].resolved_file = Some(idx);
                    if !seen.insert(import_module.clone()) {
                        let loc = SourceLoc::new(files.entries[i].source.path.clone(), import_pos);
                        let mut errored = files.entries[i].errored;
                        report_policy(
                            policy,
                            WarningKind::DuplicateImport,
                            messages,
                            &mut errored,
                            format!("duplicate import of `{}`", import_module.stringify(table)),
                            loc,
                        );
                        files.entries[i].errored = errored;
                    }
                }
                None => {
                    let loc = SourceLoc::new(files.entries[i].source.path.clone(), import_pos);
                    messages.push_error(CompileError::import(
                        format!("cannot find declaration module `{}`", import_module.stringify(table)),
                        loc,
                    ));
                    files.entries[i].errored = true;
                }
            }
        }
    }
}

/// An implicit-import overlap that Stage B permits (spec.md §4.4 Stage B):
/// opaque-then-concrete, variable declaration-then-definition, function
/// declaration-then-definition. Any other collision against either the
/// implicit import or this file's own table is a redeclaration error.
fn overlap_is_legal(existing: &SymbolEntry, new_item: &TopLevel) -> bool {
    matches!(
        (existing, new_item),
        (
            SymbolEntry::Opaque { .. },
            TopLevel::Struct { .. } | TopLevel::Union { .. } | TopLevel::Enum { .. } | TopLevel::Typedef { .. }
        ) | (SymbolEntry::Variable { .. }, TopLevel::VariableDefinition { .. })
            | (SymbolEntry::Function { .. }, TopLevel::FunctionDefinition { .. })
    )
}

/// Stage B: creates one arena entry per named top-level item in every
/// file, applying the opaque/variable/function overlap rules against the
/// implicit import (spec.md §4.4 Stage B). Entry payloads are placeholders
/// here (empty field lists, `Type::Keyword(Void)` for variables/functions)
/// — Stage D fills them in once every name in the program is visible.
fn stage_b_top_level_entries(
    files: &mut FileList,
    table: &mut StringTable,
    arena: &mut Arena,
    policy: &Policy,
    messages: &mut CompilerMessages,
) {
    for i in 0..files.entries.len() {
        let implicit = files.entries[i].implicit_import;
        let item_count = files.entries[i].ast.items.len();
        for j in 0..item_count {
            declare_top_level_item(files, i, j, implicit, table, arena, policy, messages);
        }
    }
}

fn declare_top_level_item(
    files: &mut FileList,
    file_idx: usize,
    item_idx: usize,
    implicit: Option<usize>,
    table: &mut StringTable,
    arena: &mut Arena,
    policy: &Policy,
    messages: &mut CompilerMessages,
) {
    let name_id = files.entries[file_idx].ast.items[item_idx].name().scoped.last().expect("plain top-level name");
    let pos = files.entries[file_idx].ast.items[item_idx].pos();
    let path = files.entries[file_idx].source.path.clone();

    let existing_in_implicit = implicit.and_then(|idx| files.entries[idx].ast.top_level_scope.get(&name_id).copied());
    let existing_in_own = files.entries[file_idx].ast.top_level_scope.get(&name_id).copied();

    if existing_in_own.is_some() {
        let loc = SourceLoc::new(path, pos);
        let name_str = table.resolve(name_id).to_string();
        let mut errored = files.entries[file_idx].errored;
        report_policy(
            policy,
            WarningKind::DuplicateDeclaration,
            messages,
            &mut errored,
            format!("redeclaration of `{name_str}`"),
            loc,
        );
        files.entries[file_idx].errored = errored;
        return;
    }

    let new_id = match &files.entries[file_idx].ast.items[item_idx] {
        TopLevel::FunctionDefinition { .. } | TopLevel::FunctionDeclaration { .. } => arena.alloc(SymbolEntry::Function {
            name: name_id,
            return_type: Type::Keyword(crate::types::Keyword::Void),
            arg_types: Vec::new(),
        }),
        TopLevel::VariableDefinition { .. } | TopLevel::VariableDeclaration { .. } => arena.alloc(SymbolEntry::Variable {
            name: name_id,
            ty: Type::Keyword(crate::types::Keyword::Void),
            escapes: false,
        }),
        TopLevel::Opaque { .. } => arena.alloc(SymbolEntry::Opaque { name: name_id, definition: None }),
        TopLevel::Struct { .. } => arena.alloc(SymbolEntry::Struct { name: name_id, field_names: Vec::new(), field_types: Vec::new() }),
        TopLevel::Union { .. } => arena.alloc(SymbolEntry::Union { name: name_id, option_names: Vec::new(), option_types: Vec::new() }),
        TopLevel::Enum { .. } => arena.alloc(SymbolEntry::Enum {
            name: name_id,
            constant_names: Vec::new(),
            constants: Vec::new(),
            backing_type: None,
        }),
        TopLevel::Typedef { .. } => arena.alloc(SymbolEntry::Typedef { name: name_id, aliased: Type::Keyword(crate::types::Keyword::Void) }),
    };

    if let Some(existing_id) = existing_in_implicit {
        let legal = overlap_is_legal(arena.get(existing_id), &files.entries[file_idx].ast.items[item_idx]);
        if legal {
            if let SymbolEntry::Opaque { definition, .. } = arena.get_mut(existing_id) {
                *definition = Some(new_id);
            }
        } else {
            let loc = SourceLoc::new(files.entries[file_idx].source.path.clone(), pos);
            let name_str = table.resolve(name_id).to_string();
            let mut errored = files.entries[file_idx].errored;
            report_policy(
                policy,
                WarningKind::DuplicateDeclaration,
                messages,
                &mut errored,
                format!("`{name_str}` conflicts with its declaration in the implicit import"),
                loc,
            );
            files.entries[file_idx].errored = errored;
        }
    }

    if let TopLevel::Enum { constants, .. } = &mut files.entries[file_idx].ast.items[item_idx] {
        for constant in constants.iter_mut() {
            let cname = constant.name.scoped.last().expect("plain constant name");
            let centry = arena.alloc(SymbolEntry::EnumConstant { name: cname, parent: new_id, signed: false, value: 0 });
            constant.entry = Some(centry);
            if let SymbolEntry::Enum { constant_names, constants: list, .. } = arena.get_mut(new_id) {
                constant_names.push(cname);
                list.push(centry);
            }
        }
    }

    files.entries[file_idx].ast.items[item_idx].set_entry(new_id);
    files.entries[file_idx].ast.top_level_scope.insert(name_id, new_id);
}

/// Dependency classification for one enum constant (spec.md §4.4 Stage C).
enum Dependency {
    None,
    Previous(EntryId),
    Other(EntryId),
}

struct ConstNode {
    entry: EntryId,
    dependency: Dependency,
    literal: Option<(bool, u64)>,
    loc: SourceLoc,
}

/// Resolves a (possibly `::`-scoped) initializer identifier to the entry
/// it names: a sibling top-level name visible from `file_idx` (own table,
/// implicit import, or an explicit import), or — for a two-component
/// id — an enum's constant by name. General three-component "module::enum
/// ::constant" forms are left to the late-parser's identifier resolution;
/// Stage C only ever needs to reach a constant in scope of this file or one
/// named enum away (spec.md §4.4 Stage C's "another enum constant").
fn resolve_initializer_target(files: &FileList, file_idx: usize, scoped: &ScopedId, table: &StringTable, arena: &Arena) -> Option<EntryId> {
    let components = scoped.as_components();
    if components.is_empty() {
        return None;
    }
    let head = *components.first().unwrap();
    let head_entry = lookup_visible(files, file_idx, head)?;
    if components.len() == 1 {
        return Some(head_entry);
    }
    if components.len() == 2 {
        let member = components[1];
        if let SymbolEntry::Enum { constant_names, constants, .. } = arena.get(head_entry) {
            return constant_names
                .iter()
                .position(|n| *n == member)
                .map(|pos| constants[pos]);
        }
        return None;
    }
    let _ = table;
    None
}

fn lookup_visible(files: &FileList, file_idx: usize, name: crate::interning::StringId) -> Option<EntryId> {
    let file = &files.entries[file_idx];
    if let Some(&id) = file.ast.top_level_scope.get(&name) {
        return Some(id);
    }
    if let Some(idx) = file.implicit_import {
        if let Some(&id) = files.entries[idx].ast.top_level_scope.get(&name) {
            return Some(id);
        }
    }
    for import in &file.ast.imports {
        if let Some(idx) = import.resolved_file {
            if let Some(&id) = files.entries[idx].ast.top_level_scope.get(&name) {
                return Some(id);
            }
        }
    }
    None
}

fn eval_int_literal(expr: &Expr) -> Option<(bool, u64)> {
    match expr {
        Expr::Literal { value, .. } => literal_to_bits(value),
        Expr::Prefix { op: PrefixOp::Negate, operand, .. } => {
            let (_, bits) = eval_int_literal(operand)?;
            Some((true, (-(bits as i64)) as u64))
        }
        Expr::Prefix { op: PrefixOp::BitNot, operand, .. } => {
            let (signed, bits) = eval_int_literal(operand)?;
            Some((signed, !bits))
        }
        _ => None,
    }
}

fn literal_to_bits(value: &LiteralValue) -> Option<(bool, u64)> {
    match value {
        LiteralValue::Int0 => Some((false, 0)),
        LiteralValue::IntDecimal(text) => text.parse::<u64>().ok().map(|v| (false, v)),
        LiteralValue::IntBinary(text) => {
            u64::from_str_radix(text.trim_start_matches("0b").trim_start_matches("0B"), 2).ok().map(|v| (false, v))
        }
        LiteralValue::IntHex(text) => {
            u64::from_str_radix(text.trim_start_matches("0x").trim_start_matches("0X"), 16).ok().map(|v| (false, v))
        }
        LiteralValue::IntOctal(text) => {
            let digits = text.trim_start_matches('0');
            if digits.is_empty() {
                Some((false, 0))
            } else {
                u64::from_str_radix(digits, 8).ok().map(|v| (false, v))
            }
        }
        _ => None,
    }
}

/// Stage C: builds the enum-constant dependency graph across every file,
/// detects cycles, solves values topologically, then normalises each
/// enum's signedness (spec.md §4.4 Stage C, points 1-3).
fn stage_c_enum_values(files: &mut FileList, table: &StringTable, arena: &mut Arena, messages: &mut CompilerMessages) {
    let mut nodes: Vec<ConstNode> = Vec::new();
    let mut enum_members: Vec<(EntryId, Vec<EntryId>)> = Vec::new();

    for (fi, file) in files.entries.iter().enumerate() {
        for item in &file.ast.items {
            let TopLevel::Enum { entry: Some(enum_entry), constants, .. } = item else {
                continue;
            };
            let mut members = Vec::new();
            for (k, constant) in constants.iter().enumerate() {
                let Some(entry) = constant.entry else { continue };
                members.push(entry);
                let loc = SourceLoc::new(file.source.path.clone(), constant.pos);
                let dependency = match &constant.initializer {
                    Some(expr) => {
                        if let Some(bits) = eval_int_literal(expr) {
                            ConstNode { entry, dependency: Dependency::None, literal: Some(bits), loc }
                        } else if let Expr::Id { ident, .. } = expr {
                            match resolve_initializer_target(files, fi, &ident.scoped, table, arena) {
                                Some(target) => ConstNode { entry, dependency: Dependency::Other(target), literal: None, loc },
                                None => {
                                    messages.push_error(CompileError::resolution(
                                        format!("cannot resolve enum initialiser `{}`", ident.scoped.stringify(table)),
                                        loc.clone(),
                                    ));
                                    ConstNode { entry, dependency: Dependency::None, literal: Some((false, 0)), loc }
                                }
                            }
                        } else {
                            ConstNode { entry, dependency: Dependency::None, literal: Some((false, 0)), loc }
                        }
                    }
                    None if k == 0 => ConstNode { entry, dependency: Dependency::None, literal: Some((false, 0)), loc },
                    None => ConstNode { entry, dependency: Dependency::Previous(members[k - 1]), literal: None, loc },
                };
                nodes.push(dependency);
            }
            enum_members.push((*enum_entry, members));
        }
    }

    let index_of = |id: EntryId, nodes: &[ConstNode]| nodes.iter().position(|n| n.entry == id);

    // 1. Cycle detection (DFS with temp/visited marks, same shape as
    // `module_dependencies.rs`'s dependency-graph walk).
    let mut visited = HashSet::new();
    let mut on_stack = HashSet::new();
    for start in 0..nodes.len() {
        if visited.contains(&start) {
            continue;
        }
        let mut stack = vec![start];
        let mut path = Vec::new();
        let mut finished = HashSet::new();
        while let Some(&cur) = stack.last() {
            if !on_stack.contains(&cur) {
                on_stack.insert(cur);
                path.push(cur);
            }
            let next = match nodes[cur].dependency {
                Dependency::Previous(id) | Dependency::Other(id) => index_of(id, &nodes),
                Dependency::None => None,
            };
            match next {
                Some(n) if on_stack.contains(&n) => {
                    let cycle_start = path.iter().position(|&p| p == n).unwrap_or(0);
                    let mut error = CompileError::resolution("circular enum-constant dependency", nodes[n].loc.clone());
                    for &p in &path[cycle_start..] {
                        if p != n {
                            error = error.with_note("part of the cycle", nodes[p].loc.clone());
                        }
                    }
                    messages.push_error(error);
                    for &p in &path[cycle_start..] {
                        finished.insert(p);
                    }
                    stack.pop();
                    on_stack.remove(&cur);
                    path.pop();
                }
                Some(n) if !visited.contains(&n) && !finished.contains(&n) => {
                    stack.push(n);
                }
                _ => {
                    visited.insert(cur);
                    on_stack.remove(&cur);
                    path.pop();
                    stack.pop();
                }
            }
        }
    }

    // 2. Topological valuation.
    let mut solved: Vec<Option<(bool, u64)>> = vec![None; nodes.len()];
    let mut changed = true;
    while changed {
        changed = false;
        for i in 0..nodes.len() {
            if solved[i].is_some() {
                continue;
            }
            let value = match &nodes[i].dependency {
                Dependency::None => nodes[i].literal,
                Dependency::Previous(dep) => index_of(*dep, &nodes).and_then(|d| solved[d]).map(|(signed, bits)| {
                    if signed && (bits as i64) == -1 {
                        (false, 0)
                    } else {
                        (signed, bits.wrapping_add(1))
                    }
                }),
                Dependency::Other(dep) => index_of(*dep, &nodes).and_then(|d| solved[d]),
            };
            if let Some(v) = value {
                let overflowed = matches!(&nodes[i].dependency, Dependency::Previous(dep)
                    if index_of(*dep, &nodes).and_then(|d| solved[d]).is_some_and(|(s, b)| !s && b == u64::MAX));
                if overflowed {
                    messages.push_error(CompileError::ty("unrepresentable enum constant (overflow past the maximum unsigned 64-bit value)", nodes[i].loc.clone()));
                }
                solved[i] = Some(v);
                changed = true;
            }
        }
    }
    for (i, node) in nodes.iter().enumerate() {
        if solved[i].is_none() {
            messages.push_error(CompileError::resolution("enum constant could not be resolved (unsatisfiable dependency)", node.loc.clone()));
            solved[i] = Some((false, 0));
        }
    }
    for (i, node) in nodes.iter().enumerate() {
        let (signed, value) = solved[i].unwrap();
        if let SymbolEntry::EnumConstant { signed: s, value: v, .. } = arena.get_mut(node.entry) {
            *s = signed;
            *v = value;
        }
    }

    // 3. Sign normalisation, per enum.
    for (enum_entry, members) in &enum_members {
        let any_signed = members.iter().any(|&m| matches!(arena.get(m), SymbolEntry::EnumConstant { signed: true, .. }));
        if any_signed {
            for &m in members {
                let loc = nodes.iter().find(|n| n.entry == m).map(|n| n.loc.clone()).unwrap_or_default();
                if let SymbolEntry::EnumConstant { signed, value, .. } = arena.get_mut(m) {
                    if !*signed {
                        if *value > i64::MAX as u64 {
                            messages.push_error(CompileError::ty("unrepresentable enum constant (exceeds LONG_MAX once the enum is signed)", loc));
                        }
                        *signed = true;
                    }
                }
            }
        }
        if let SymbolEntry::Enum { backing_type, .. } = arena.get_mut(*enum_entry) {
            *backing_type = Some(Type::Keyword(if any_signed { crate::types::Keyword::Long } else { crate::types::Keyword::ULong }));
        }
    }
}

/// Converts a syntactic `TypeExpr` into a semantic `Type`, resolving named
/// types against the file's visible scope (spec.md §4.4 Stage D).
fn resolve_type_expr(expr: &TypeExpr, files: &FileList, file_idx: usize, messages: &mut CompilerMessages) -> Type {
    match expr {
        TypeExpr::Keyword { keyword, .. } => Type::Keyword(*keyword),
        TypeExpr::Named { name, .. } => {
            let components = name.scoped.as_components();
            let head = *components.first().expect("non-empty scoped id");
            match lookup_visible(files, file_idx, head) {
                Some(id) => Type::Reference(id),
                None => {
                    let loc = SourceLoc::new(files.entries[file_idx].source.path.clone(), name.pos);
                    messages.push_error(CompileError::resolution("unknown type name", loc));
                    Type::Keyword(crate::types::Keyword::Void)
                }
            }
        }
        TypeExpr::Const { base, .. } => resolve_type_expr(base, files, file_idx, messages).qualify(true, false),
        TypeExpr::Volatile { base, .. } => resolve_type_expr(base, files, file_idx, messages).qualify(false, true),
        TypeExpr::Pointer { base, .. } => Type::Pointer(Box::new(resolve_type_expr(base, files, file_idx, messages))),
        TypeExpr::Array { base, len, .. } => {
            let element = resolve_type_expr(base, files, file_idx, messages);
            let length = eval_int_literal(len).map(|(_, v)| v).unwrap_or_else(|| {
                let loc = SourceLoc::new(files.entries[file_idx].source.path.clone(), len.pos());
                messages.push_error(CompileError::ty("array length must be a constant expression", loc));
                0
            });
            Type::Array { element: Box::new(element), len: length }
        }
        TypeExpr::FunPtr { ret, args, .. } => Type::FunPtr {
            ret: Box::new(resolve_type_expr(ret, files, file_idx, messages)),
            args: args.iter().map(|a| resolve_type_expr(a, files, file_idx, messages)).collect(),
        },
    }
}

/// Stage D: completes every aggregate/typedef/function/variable entry's
/// `Type` payload, cross-checking against any implicit-import declaration
/// (spec.md §4.4 Stage D).
fn stage_d_aggregate_completion(files: &mut FileList, table: &StringTable, arena: &mut Arena, policy: &Policy, messages: &mut CompilerMessages) {
    for fi in 0..files.entries.len() {
        let item_count = files.entries[fi].ast.items.len();
        for ji in 0..item_count {
            complete_item(files, fi, ji, table, arena, policy, messages);
        }
    }
}

fn complete_item(
    files: &mut FileList,
    file_idx: usize,
    item_idx: usize,
    table: &StringTable,
    arena: &mut Arena,
    policy: &Policy,
    messages: &mut CompilerMessages,
) {
    let implicit = files.entries[file_idx].implicit_import;
    let item = files.entries[file_idx].ast.items[item_idx].clone();
    match item {
        TopLevel::Struct { fields, entry: Some(entry), .. } => {
            let (names, types) = complete_fields(&fields, files, file_idx, messages);
            if let SymbolEntry::Struct { field_names, field_types, .. } = arena.get_mut(entry) {
                *field_names = names;
                *field_types = types;
            }
        }
        TopLevel::Union { options, entry: Some(entry), .. } => {
            let (names, types) = complete_fields(&options, files, file_idx, messages);
            if let SymbolEntry::Union { option_names, option_types, .. } = arena.get_mut(entry) {
                *option_names = names;
                *option_types = types;
            }
        }
        TopLevel::Typedef { ty, entry: Some(entry), .. } => {
            let resolved = resolve_type_expr(&ty, files, file_idx, messages);
            if let SymbolEntry::Typedef { aliased, .. } = arena.get_mut(entry) {
                *aliased = resolved;
            }
        }
        TopLevel::VariableDefinition { ty, pos, name, entry: Some(entry), .. }
        | TopLevel::VariableDeclaration { ty, pos, name, entry: Some(entry), .. } => {
            let resolved = resolve_type_expr(&ty, files, file_idx, messages);
            if let Some(prior) = implicit.and_then(|idx| files.entries[idx].ast.top_level_scope.get(&name.scoped.last().unwrap()).copied()) {
                if let SymbolEntry::Variable { ty: prior_ty, .. } = arena.get(prior) {
                    if !prior_ty.structurally_equal(&resolved, arena) {
                        let loc = SourceLoc::new(files.entries[file_idx].source.path.clone(), pos);
                        let mut errored = files.entries[file_idx].errored;
                        report_policy(
                            policy,
                            WarningKind::DuplicateDeclaration,
                            messages,
                            &mut errored,
                            format!("`{}` redeclared with a different type than its implicit-import declaration", table.resolve(name.scoped.last().unwrap())),
                            loc,
                        );
                        files.entries[file_idx].errored = errored;
                    }
                }
            }
            if let SymbolEntry::Variable { ty: slot, .. } = arena.get_mut(entry) {
                *slot = resolved;
            }
        }
        TopLevel::FunctionDefinition { return_type, params, pos, name, entry: Some(entry), .. }
        | TopLevel::FunctionDeclaration { return_type, params, pos, name, entry: Some(entry), .. } => {
            let ret = resolve_type_expr(&return_type, files, file_idx, messages);
            let args: Vec<Type> = params.iter().map(|p| resolve_type_expr(&p.ty, files, file_idx, messages)).collect();
            let param_entries: Vec<EntryId> = params
                .iter()
                .zip(&args)
                .map(|(p, ty)| {
                    arena.alloc(SymbolEntry::Variable {
                        name: p.name.scoped.last().expect("plain parameter name"),
                        ty: ty.clone(),
                        escapes: false,
                    })
                })
                .collect();
            if let TopLevel::FunctionDefinition { params: live_params, .. } | TopLevel::FunctionDeclaration { params: live_params, .. } =
                &mut files.entries[file_idx].ast.items[item_idx]
            {
                for (param, id) in live_params.iter_mut().zip(&param_entries) {
                    param.entry = Some(*id);
                }
            }
            if let Some(prior) = implicit.and_then(|idx| files.entries[idx].ast.top_level_scope.get(&name.scoped.last().unwrap()).copied()) {
                if let SymbolEntry::Function { return_type: prior_ret, arg_types: prior_args, .. } = arena.get(prior) {
                    let matches = prior_ret.structurally_equal(&ret, arena)
                        && prior_args.len() == args.len()
                        && prior_args.iter().zip(&args).all(|(a, b)| a.structurally_equal(b, arena));
                    if !matches {
                        let loc = SourceLoc::new(files.entries[file_idx].source.path.clone(), pos);
                        let mut errored = files.entries[file_idx].errored;
                        report_policy(
                            policy,
                            WarningKind::DuplicateDeclaration,
                            messages,
                            &mut errored,
                            format!("`{}` redeclared with a different signature than its implicit-import declaration", table.resolve(name.scoped.last().unwrap())),
                            loc,
                        );
                        files.entries[file_idx].errored = errored;
                    }
                }
            }
            if let SymbolEntry::Function { return_type: rt, arg_types: at, .. } = arena.get_mut(entry) {
                *rt = ret;
                *at = args;
            }
        }
        _ => {}
    }
}

fn complete_fields(fields: &[Field], files: &FileList, file_idx: usize, messages: &mut CompilerMessages) -> (Vec<crate::interning::StringId>, Vec<Type>) {
    let mut names = Vec::with_capacity(fields.len());
    let mut types = Vec::with_capacity(fields.len());
    for field in fields {
        names.push(field.name.scoped.last().expect("plain field name"));
        types.push(resolve_type_expr(&field.ty, files, file_idx, messages));
    }
    (names, types)
}

/// Stage E: for every pair of imports in a file where one module name is
/// the other's with its final component dropped, flags any enum-constant
/// name in the longer-named module that collides with a top-level name in
/// the shorter-named module (or the current file) — the `A::B::C`
/// ambiguity spec.md §4.4 Stage E describes.
fn stage_e_scoped_id_collisions(files: &mut FileList, table: &StringTable, arena: &Arena, messages: &mut CompilerMessages) {
    struct Ambiguity {
        file_idx: usize,
        loc: SourceLoc,
        message: String,
    }

    let mut found = Vec::new();
    for fi in 0..files.entries.len() {
        let imports = files.entries[fi].ast.imports.clone();
        for a in &imports {
            for b in &imports {
                let (Some(a_idx), Some(b_idx)) = (a.resolved_file, b.resolved_file) else { continue };
                if a_idx == b_idx {
                    continue;
                }
                let Some(shorter) = b.module.drop_last() else { continue };
                if shorter != a.module {
                    continue;
                }
                // `b` is the longer-named module (e.g. `A::B`), `a` the
                // shorter one (`A`). Any enum in `b`'s top-level table whose
                // constant name collides with a top-level name visible in
                // `a` (or this file) is ambiguous.
                for (_, &entry) in files.entries[b_idx].ast.top_level_scope.iter() {
                    let SymbolEntry::Enum { constant_names, .. } = arena.get(entry) else { continue };
                    for &cname in constant_names {
                        let collides = files.entries[fi].ast.top_level_scope.contains_key(&cname)
                            || files.entries[a_idx].ast.top_level_scope.contains_key(&cname);
                        if collides {
                            found.push(Ambiguity {
                                file_idx: fi,
                                loc: SourceLoc::new(files.entries[fi].source.path.clone(), b.pos),
                                message: format!(
                                    "`{}::{}` is ambiguous between a constant of enum `{}` and a member of module `{}`",
                                    a.module.stringify(table),
                                    table.resolve(cname),
                                    table.resolve(arena.get(entry).name()),
                                    b.module.stringify(table),
                                ),
                            });
                        }
                    }
                }
            }
        }
    }

    for ambiguity in found {
        messages.push_error(CompileError::resolution(ambiguity.message, ambiguity.loc));
        files.entries[ambiguity.file_idx].errored = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{File, Ident, ModuleHeader};
    use crate::diagnostics::location::SourcePos;
    use crate::interning::StringTable;

    pub(super) fn bare_file(table: &mut StringTable, module_name: &str, is_code: bool) -> FileEntry {
        let name = ScopedId::single(table.intern(module_name));
        FileEntry {
            source: FileSource::new(format!("{module_name}.{}", if is_code { "tc" } else { "td" }), is_code),
            ast: File {
                pos: SourcePos::new(1, 1),
                module: ModuleHeader { pos: SourcePos::new(1, 1), name },
                imports: Vec::new(),
                items: Vec::new(),
                top_level_scope: FileScope::default(),
            },
            errored: false,
            implicit_import: None,
        }
    }

    #[test]
    fn duplicate_declaration_module_name_is_an_error() {
        let mut table = StringTable::new();
        let policy = Policy::default_policy();
        let mut messages = CompilerMessages::new();
        let mut files = FileList { entries: vec![bare_file(&mut table, "a", false), bare_file(&mut table, "a", false)] };

        stage_a_imports(&mut files, &table, &policy, &mut messages);
        assert!(files.entries[1].errored);
        assert!(messages.has_errors());
    }

    #[test]
    fn code_file_links_its_implicit_import() {
        let mut table = StringTable::new();
        let policy = Policy::default_policy();
        let mut messages = CompilerMessages::new();
        let mut files = FileList { entries: vec![bare_file(&mut table, "a", false), bare_file(&mut table, "a", true)] };

        stage_a_imports(&mut files, &table, &policy, &mut messages);
        assert_eq!(files.entries[1].implicit_import, Some(0));
    }

    #[test]
    fn struct_completing_an_opaque_sets_the_definition_link() {
        let mut table = StringTable::new();
        let mut arena = Arena::new();
        let policy = Policy::default_policy();
        let mut messages = CompilerMessages::new();
        let point = table.intern("Point");

        let mut decl = bare_file(&mut table, "geom", false);
        decl.ast.items.push(TopLevel::Opaque { pos: SourcePos::new(2, 1), name: Ident::new(SourcePos::new(2, 1), ScopedId::single(point)), entry: None });

        let mut code = bare_file(&mut table, "geom", true);
        code.ast.items.push(TopLevel::Struct {
            pos: SourcePos::new(2, 1),
            name: Ident::new(SourcePos::new(2, 1), ScopedId::single(point)),
            fields: Vec::new(),
            entry: None,
        });

        let mut files = FileList { entries: vec![decl, code] };
        stage_a_imports(&mut files, &table, &policy, &mut messages);
        stage_b_top_level_entries(&mut files, &mut table, &mut arena, &policy, &mut messages);

        let opaque_id = *files.entries[0].ast.top_level_scope.get(&point).unwrap();
        match arena.get(opaque_id) {
            SymbolEntry::Opaque { definition, .. } => assert!(definition.is_some()),
            other => panic!("expected opaque, got {other:?}"),
        }
        assert!(!messages.has_errors());
    }

    #[test]
    fn enum_constants_default_to_zero_then_increment() {
        let mut table = StringTable::new();
        let mut arena = Arena::new();
        let mut messages = CompilerMessages::new();
        let red = table.intern("RED");
        let green = table.intern("GREEN");

        let mut file = bare_file(&mut table, "colors", false);
        let epos = SourcePos::new(2, 1);
        file.ast.items.push(TopLevel::Enum {
            pos: epos,
            name: Ident::new(epos, ScopedId::single(table.intern("Color"))),
            constants: vec![
                EnumConstantDecl { pos: epos, name: Ident::new(epos, ScopedId::single(red)), initializer: None, entry: None },
                EnumConstantDecl { pos: epos, name: Ident::new(epos, ScopedId::single(green)), initializer: None, entry: None },
            ],
            entry: None,
        });
        let policy = Policy::default_policy();
        let mut files = FileList { entries: vec![file] };
        stage_a_imports(&mut files, &table, &policy, &mut messages);
        stage_b_top_level_entries(&mut files, &mut table, &mut arena, &policy, &mut messages);
        stage_c_enum_values(&mut files, &table, &mut arena, &mut messages);

        let red_id = *files.entries[0].ast.top_level_scope.get(&table.intern("Color")).map(|e| e).unwrap();
        let SymbolEntry::Enum { constants, .. } = arena.get(red_id) else { panic!("expected enum") };
        let (first, second) = (constants[0], constants[1]);
        assert!(matches!(arena.get(first), SymbolEntry::EnumConstant { value: 0, signed: false, .. }));
        assert!(matches!(arena.get(second), SymbolEntry::EnumConstant { value: 1, signed: false, .. }));
        assert!(!messages.has_errors());
    }
}

#[cfg(test)]
mod proptests {
    use super::tests::bare_file;
    use super::*;
    use crate::ast::{EnumConstantDecl, Ident};
    use crate::diagnostics::location::SourcePos;
    use proptest::prelude::*;

    proptest! {
        /// An enum whose constants are all implicit (no initialisers) always
        /// resolves totally, to the strictly increasing run 0..N-1 — Stage C's
        /// dependency graph degenerates to a simple chain with no cycles and
        /// no unresolved nodes in this shape.
        #[test]
        fn implicit_enum_constants_always_resolve_totally(count in 1usize..12) {
            let mut table = StringTable::new();
            let mut arena = Arena::new();
            let mut messages = CompilerMessages::new();
            let pos = SourcePos::new(2, 1);
            let enum_name = table.intern("Gen");
            let constants: Vec<EnumConstantDecl> = (0..count)
                .map(|i| {
                    let name = table.intern(&format!("K{i}"));
                    EnumConstantDecl { pos, name: Ident::new(pos, ScopedId::single(name)), initializer: None, entry: None }
                })
                .collect();

            let mut file = bare_file(&mut table, "gen", false);
            file.ast.items.push(TopLevel::Enum { pos, name: Ident::new(pos, ScopedId::single(enum_name)), constants, entry: None });

            let policy = Policy::default_policy();
            let mut files = FileList { entries: vec![file] };
            stage_a_imports(&mut files, &table, &policy, &mut messages);
            stage_b_top_level_entries(&mut files, &mut table, &mut arena, &policy, &mut messages);
            stage_c_enum_values(&mut files, &table, &mut arena, &mut messages);

            prop_assert!(!messages.has_errors());
            let enum_id = *files.entries[0].ast.top_level_scope.get(&enum_name).unwrap();
            let SymbolEntry::Enum { constants, .. } = arena.get(enum_id) else {
                panic!("expected enum");
            };
            for (i, &c) in constants.iter().enumerate() {
                match arena.get(c) {
                    SymbolEntry::EnumConstant { value, signed, .. } => {
                        prop_assert_eq!(*value, i as u64);
                        prop_assert!(!signed);
                    }
                    other => panic!("expected enum constant, got {other:?}"),
                }
            }
        }
    }
}
