//! Pass 3's type checker (spec.md §4.6): walks every late-parsed function
//! body and deferred top-level initialiser, assigning a `Type` to each
//! expression node and enforcing the operator contracts, lvalue rule,
//! switch/case rules, return-type rule, and escape marking the symbol
//! table alone doesn't.
//!
//! Grounded on `stab_builder`'s accumulate-into-`CompilerMessages` style
//! and its Stage D `resolve_type_expr` (this module's own version
//! resolves against a live `Environment` instead of a `FileList`, since
//! `cast<T>`/`sizeof(T)` and local variable declarations can name a type
//! declared inside the current function, not just at file scope).

use crate::ast::{
    BinOp, Body, DeferredExpr, Expr, Ident, LiteralValue, PostfixOp, PrefixOp, Stmt, TopLevel, TypeExpr,
};
use crate::diagnostics::error::{CompileError, CompilerMessages};
use crate::diagnostics::location::{SourceLoc, SourcePos};
use crate::diagnostics::policy::{Policy, Severity, WarningKind};
use crate::interning::StringTable;
use crate::stab_builder::FileList;
use crate::symtab::{Arena, EntryId, Environment, SymbolEntry};
use crate::types::{self, arithmetic_type_merge, comparison_type_merge, ternary_type_merge, Keyword, Type};
use std::path::Path;

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
        Severity::Warn => messages.push_warning(crate::diagnostics::error::CompileWarning::new(message, loc)),
        Severity::Error => {
            messages.push_error(CompileError::ty(message, loc));
            *errored = true;
        }
    }
}

/// Converts a syntactic type expression into a semantic `Type` against a
/// live environment — the late-parse-time counterpart of `stab_builder`'s
/// Stage D conversion, needed for local variable declarations and
/// `cast<T>(`/`sizeof(T)` forms Stage D never visits (spec.md §4.5, §4.6).
pub(crate) fn resolve_type_expr(
    ty: &TypeExpr,
    env: &Environment,
    table: &StringTable,
    arena: &Arena,
    path: &Path,
    messages: &mut CompilerMessages,
) -> Type {
    match ty {
        TypeExpr::Keyword { keyword, .. } => Type::Keyword(*keyword),
        TypeExpr::Named { name, .. } => {
            let head = *name.scoped.as_components().first().expect("non-empty scoped id");
            match env.lookup(head) {
                Some(id) => Type::Reference(id),
                None => {
                    messages.push_error(CompileError::resolution(
                        format!("unknown type name `{}`", name.scoped.stringify(table)),
                        SourceLoc::new(path.to_path_buf(), name.pos),
                    ));
                    Type::Keyword(Keyword::Void)
                }
            }
        }
        TypeExpr::Const { base, .. } => resolve_type_expr(base, env, table, arena, path, messages).qualify(true, false),
        TypeExpr::Volatile { base, .. } => resolve_type_expr(base, env, table, arena, path, messages).qualify(false, true),
        TypeExpr::Pointer { base, .. } => Type::Pointer(Box::new(resolve_type_expr(base, env, table, arena, path, messages))),
        TypeExpr::Array { base, len, .. } => {
            let element = resolve_type_expr(base, env, table, arena, path, messages);
            let length = eval_const_int(len, arena).map(|(_, bits)| bits).unwrap_or_else(|| {
                messages.push_error(CompileError::ty(
                    "array length must be a constant expression",
                    SourceLoc::new(path.to_path_buf(), len.pos()),
                ));
                0
            });
            Type::Array { element: Box::new(element), len: length }
        }
        TypeExpr::FunPtr { ret, args, .. } => Type::FunPtr {
            ret: Box::new(resolve_type_expr(ret, env, table, arena, path, messages)),
            args: args.iter().map(|a| resolve_type_expr(a, env, table, arena, path, messages)).collect(),
        },
    }
}

/// Entry point: type-checks every late-parsed function body and deferred
/// top-level initialiser across the whole file list (spec.md §4.6),
/// after first checking every aggregate/typedef for infinite size.
pub fn check_files(files: &mut FileList, table: &StringTable, arena: &mut Arena, policy: &Policy, messages: &mut CompilerMessages) {
    check_recursive_aggregates(files, arena, table, messages);

    for fi in 0..files.entries.len() {
        let item_count = files.entries[fi].ast.items.len();
        for ji in 0..item_count {
            check_top_level_item(files, fi, ji, table, arena, policy, messages);
        }
    }
}

fn check_top_level_item(
    files: &mut FileList,
    file_idx: usize,
    item_idx: usize,
    table: &StringTable,
    arena: &mut Arena,
    policy: &Policy,
    messages: &mut CompilerMessages,
) {
    let path = files.entries[file_idx].source.path.clone();
    let file_scope = files.entries[file_idx].ast.top_level_scope.clone();
    let implicit_scope = files.entries[file_idx]
        .implicit_import
        .map(|idx| files.entries[idx].ast.top_level_scope.clone());
    let mut errored = false;

    match &mut files.entries[file_idx].ast.items[item_idx] {
        TopLevel::FunctionDefinition { body: Body::Parsed(stmt), entry: Some(entry), params, .. } => {
            let return_type = match arena.get(*entry) {
                SymbolEntry::Function { return_type, .. } => return_type.clone(),
                _ => Type::Keyword(Keyword::Void),
            };
            if return_type.is_const() {
                report_policy(
                    policy,
                    WarningKind::ConstReturn,
                    messages,
                    &mut errored,
                    "function return type is const-qualified".to_string(),
                    SourceLoc::new(path.clone(), stmt.pos()),
                );
            }
            let mut env = Environment::new(&file_scope, implicit_scope.as_ref(), Vec::new());
            env.push_scope();
            for p in params.iter() {
                if let Some(id) = p.entry {
                    env.declare(p.name.scoped.last().expect("plain parameter name"), id);
                }
            }
            check_stmt(stmt, &mut env, table, arena, policy, &path, &return_type, messages, &mut errored);
            env.pop_scope();
        }
        TopLevel::VariableDefinition { initializer: Some(DeferredExpr::Parsed(expr)), entry: Some(entry), pos, .. } => {
            let declared = match arena.get(*entry) {
                SymbolEntry::Variable { ty, .. } => ty.clone(),
                _ => Type::Keyword(Keyword::Void),
            };
            let env = Environment::new(&file_scope, implicit_scope.as_ref(), Vec::new());
            let actual = check_expr(expr, &env, table, arena, &path, messages, &mut errored);
            if !actual.is_implicitly_convertible_to(&declared, arena) {
                messages.push_error(CompileError::ty(
                    "initialiser type does not convert to the declared variable type",
                    SourceLoc::new(path.clone(), *pos),
                ));
                errored = true;
            }
        }
        _ => {}
    }

    if errored {
        files.entries[file_idx].errored = true;
    }
}

fn check_recursive_aggregates(files: &FileList, arena: &Arena, table: &StringTable, messages: &mut CompilerMessages) {
    for i in 0..arena.len() {
        let id = EntryId(i);
        let is_aggregate = matches!(
            arena.get(id),
            SymbolEntry::Struct { .. } | SymbolEntry::Union { .. } | SymbolEntry::Typedef { .. }
        );
        if is_aggregate && types::is_recursive(id, arena) {
            let name = table.resolve(arena.get(id).name()).to_string();
            let loc = find_decl_loc(files, id).unwrap_or_default();
            messages.push_error(CompileError::ty(
                format!("`{name}` has infinite size (recursive without a pointer indirection)"),
                loc,
            ));
        }
    }
}

fn find_decl_loc(files: &FileList, id: EntryId) -> Option<SourceLoc> {
    for file in &files.entries {
        for item in &file.ast.items {
            if item_entry(item) == Some(id) {
                return Some(SourceLoc::new(file.source.path.clone(), item.pos()));
            }
        }
    }
    None
}

fn item_entry(item: &TopLevel) -> Option<EntryId> {
    match item {
        TopLevel::FunctionDefinition { entry, .. }
        | TopLevel::FunctionDeclaration { entry, .. }
        | TopLevel::VariableDefinition { entry, .. }
        | TopLevel::VariableDeclaration { entry, .. }
        | TopLevel::Opaque { entry, .. }
        | TopLevel::Struct { entry, .. }
        | TopLevel::Union { entry, .. }
        | TopLevel::Enum { entry, .. }
        | TopLevel::Typedef { entry, .. } => *entry,
    }
}

#[allow(clippy::too_many_arguments)]
fn check_stmt(
    stmt: &mut Stmt,
    env: &mut Environment,
    table: &StringTable,
    arena: &mut Arena,
    policy: &Policy,
    path: &Path,
    return_type: &Type,
    messages: &mut CompilerMessages,
    errored: &mut bool,
) {
    match stmt {
        Stmt::Compound { stmts, .. } => {
            env.push_scope();
            for s in stmts.iter_mut() {
                check_stmt(s, env, table, arena, policy, path, return_type, messages, errored);
            }
            env.pop_scope();
        }
        Stmt::If { cond, then_branch, else_branch, .. } => {
            check_expr(cond, env, table, arena, path, messages, errored);
            check_stmt(then_branch, env, table, arena, policy, path, return_type, messages, errored);
            if let Some(else_branch) = else_branch {
                check_stmt(else_branch, env, table, arena, policy, path, return_type, messages, errored);
            }
        }
        Stmt::While { cond, body, .. } | Stmt::DoWhile { cond, body, .. } => {
            check_expr(cond, env, table, arena, path, messages, errored);
            check_stmt(body, env, table, arena, policy, path, return_type, messages, errored);
        }
        Stmt::For { init, cond, update, body, .. } => {
            env.push_scope();
            if let Some(init) = init {
                check_stmt(init, env, table, arena, policy, path, return_type, messages, errored);
            }
            if let Some(cond) = cond {
                check_expr(cond, env, table, arena, path, messages, errored);
            }
            if let Some(update) = update {
                check_expr(update, env, table, arena, path, messages, errored);
            }
            env.push_scope();
            check_stmt(body, env, table, arena, policy, path, return_type, messages, errored);
            env.pop_scope();
            env.pop_scope();
        }
        Stmt::Switch { pos, operand, cases } => {
            let operand_ty = check_expr(operand, env, table, arena, path, messages, errored);
            if !operand_ty.is_switchable(arena) {
                messages.push_error(CompileError::ty(
                    "switch operand must be integral, character, or an enum reference",
                    SourceLoc::new(path.to_path_buf(), *pos),
                ));
                *errored = true;
            }
            env.push_scope();
            let mut seen: Vec<(bool, u64, SourcePos)> = Vec::new();
            let mut has_default = false;
            for case in cases.iter_mut() {
                if let Some(value) = &mut case.value {
                    let vty = check_expr(value, env, table, arena, path, messages, errored);
                    if !vty.is_implicitly_convertible_to(&operand_ty, arena) && !operand_ty.is_implicitly_convertible_to(&vty, arena) {
                        messages.push_error(CompileError::ty(
                            "case value type does not match the switch operand",
                            SourceLoc::new(path.to_path_buf(), case.pos),
                        ));
                        *errored = true;
                    }
                    if let Some((signed, bits)) = eval_const_int(value, arena) {
                        if let Some((_, _, prev_pos)) = seen.iter().find(|(s, b, _)| *s == signed && *b == bits) {
                            let err = CompileError::ty("duplicate case value", SourceLoc::new(path.to_path_buf(), case.pos))
                                .with_note("previous case here", SourceLoc::new(path.to_path_buf(), *prev_pos));
                            messages.push_error(err);
                            *errored = true;
                        } else {
                            seen.push((signed, bits, case.pos));
                        }
                    }
                } else if has_default {
                    messages.push_error(CompileError::ty("duplicate default case", SourceLoc::new(path.to_path_buf(), case.pos)));
                    *errored = true;
                } else {
                    has_default = true;
                }
                for s in case.body.iter_mut() {
                    check_stmt(s, env, table, arena, policy, path, return_type, messages, errored);
                }
            }
            env.pop_scope();
        }
        Stmt::Break { .. } | Stmt::Continue { .. } | Stmt::Null { .. } | Stmt::Asm { .. } => {}
        Stmt::Return { value, pos, .. } => match value {
            Some(expr) => {
                if *return_type.strip_cv() == Type::Keyword(Keyword::Void) {
                    report_policy(
                        policy,
                        WarningKind::VoidReturn,
                        messages,
                        errored,
                        "returning a value from a void function".to_string(),
                        SourceLoc::new(path.to_path_buf(), *pos),
                    );
                }
                let actual = check_expr(expr, env, table, arena, path, messages, errored);
                if !actual.is_implicitly_convertible_to(return_type, arena) {
                    messages.push_error(CompileError::ty(
                        "return value does not convert to the function's return type",
                        SourceLoc::new(path.to_path_buf(), *pos),
                    ));
                    *errored = true;
                }
            }
            None => {
                if *return_type.strip_cv() != Type::Keyword(Keyword::Void) {
                    report_policy(
                        policy,
                        WarningKind::VoidReturn,
                        messages,
                        errored,
                        "missing return value in a non-void function".to_string(),
                        SourceLoc::new(path.to_path_buf(), *pos),
                    );
                }
            }
        },
        Stmt::VariableDefinition { initializer, entry, pos, .. } => {
            if let (Some(DeferredExpr::Parsed(expr)), Some(entry_id)) = (initializer, *entry) {
                let declared = match arena.get(entry_id) {
                    SymbolEntry::Variable { ty, .. } => ty.clone(),
                    _ => Type::Keyword(Keyword::Void),
                };
                let actual = check_expr(expr, env, table, arena, path, messages, errored);
                if !actual.is_implicitly_convertible_to(&declared, arena) {
                    messages.push_error(CompileError::ty(
                        "initialiser type does not convert to the declared variable type",
                        SourceLoc::new(path.to_path_buf(), *pos),
                    ));
                    *errored = true;
                }
            }
        }
        Stmt::Expression { expr, .. } => {
            check_expr(expr, env, table, arena, path, messages, errored);
        }
        Stmt::NestedDecl { decl, pos } => {
            check_nested_decl(decl, env, table, arena, path, *pos, messages);
        }
    }
}

/// A struct/union/enum/typedef/opaque declared inside a function body
/// (spec.md §4.5). Completed in a single pass rather than the file-level
/// builder's five-stage process, since every program-wide name is
/// already resolvable by the time a function body is checked; local
/// enum constants resolve only against a literal or the previous
/// constant (no cross-file dependency graph, since nothing outside this
/// scope could reference them).
fn check_nested_decl(decl: &mut TopLevel, env: &mut Environment, table: &StringTable, arena: &mut Arena, path: &Path, pos: SourcePos, messages: &mut CompilerMessages) {
    let name_id = decl.name().scoped.last().expect("plain nested declaration name");
    let _ = pos;

    let id = match decl {
        TopLevel::Opaque { .. } => arena.alloc(SymbolEntry::Opaque { name: name_id, definition: None }),
        TopLevel::Struct { fields, .. } => {
            let (names, types) = fields
                .iter()
                .map(|f| (f.name.scoped.last().expect("plain field name"), resolve_type_expr(&f.ty, env, table, arena, path, messages)))
                .unzip();
            arena.alloc(SymbolEntry::Struct { name: name_id, field_names: names, field_types: types })
        }
        TopLevel::Union { options, .. } => {
            let (names, types) = options
                .iter()
                .map(|f| (f.name.scoped.last().expect("plain field name"), resolve_type_expr(&f.ty, env, table, arena, path, messages)))
                .unzip();
            arena.alloc(SymbolEntry::Union { name: name_id, option_names: names, option_types: types })
        }
        TopLevel::Typedef { ty, .. } => {
            let aliased = resolve_type_expr(ty, env, table, arena, path, messages);
            arena.alloc(SymbolEntry::Typedef { name: name_id, aliased })
        }
        TopLevel::Enum { constants, .. } => {
            let enum_id = arena.alloc(SymbolEntry::Enum {
                name: name_id,
                constant_names: Vec::new(),
                constants: Vec::new(),
                backing_type: Some(Type::Keyword(Keyword::Long)),
            });
            let mut prev: Option<i64> = None;
            for constant in constants.iter_mut() {
                let cname = constant.name.scoped.last().expect("plain constant name");
                let value = match &constant.initializer {
                    Some(expr) => eval_const_int(expr, arena)
                        .map(|(_, bits)| bits as i64)
                        .unwrap_or_else(|| prev.map_or(0, |p| p + 1)),
                    None => prev.map_or(0, |p| p + 1),
                };
                prev = Some(value);
                let centry = arena.alloc(SymbolEntry::EnumConstant { name: cname, parent: enum_id, signed: true, value: value as u64 });
                constant.entry = Some(centry);
                if let SymbolEntry::Enum { constant_names, constants: list, .. } = arena.get_mut(enum_id) {
                    constant_names.push(cname);
                    list.push(centry);
                }
                env.declare(cname, centry);
            }
            enum_id
        }
        _ => return,
    };
    decl.set_entry(id);
    env.declare(name_id, id);
}

#[allow(clippy::too_many_arguments)]
fn check_expr(
    expr: &mut Expr,
    env: &Environment,
    table: &StringTable,
    arena: &mut Arena,
    path: &Path,
    messages: &mut CompilerMessages,
    errored: &mut bool,
) -> Type {
    let ty = match expr {
        Expr::Literal { value, .. } => check_literal(value, env, table, arena, path, messages, errored),
        Expr::Id { ident, pos, .. } => check_id(ident, *pos, table, arena, path, messages, errored),
        Expr::Binary { op, lhs, rhs, pos, .. } => check_binary(*op, lhs, rhs, *pos, env, table, arena, path, messages, errored),
        Expr::Ternary { cond, then_branch, else_branch, pos, .. } => {
            let c = check_expr(cond, env, table, arena, path, messages, errored);
            if !c.is_numeric() && !c.is_pointer() {
                messages.push_error(CompileError::ty("ternary condition must be numeric or a pointer", SourceLoc::new(path.to_path_buf(), *pos)));
                *errored = true;
            }
            let t = check_expr(then_branch, env, table, arena, path, messages, errored);
            let e = check_expr(else_branch, env, table, arena, path, messages, errored);
            match ternary_type_merge(&t, &e, arena) {
                Some(merged) => merged,
                None => {
                    messages.push_error(CompileError::ty("ternary branches have incompatible types", SourceLoc::new(path.to_path_buf(), *pos)));
                    *errored = true;
                    t
                }
            }
        }
        Expr::Prefix { op, operand, pos, .. } => check_prefix(*op, operand, *pos, env, table, arena, path, messages, errored),
        Expr::Postfix { op, operand, pos, .. } => check_postfix(*op, operand, *pos, env, table, arena, path, messages, errored),
        Expr::Member { base, arrow, field, pos, .. } => check_member(base, *arrow, field, *pos, env, table, arena, path, messages, errored),
        Expr::Index { base, index, pos, .. } => check_index(base, index, *pos, env, table, arena, path, messages, errored),
        Expr::Call { callee, args, pos, .. } => check_call(callee, args, *pos, env, table, arena, path, messages, errored),
        Expr::SizeofExpr { operand, .. } => {
            check_expr(operand, env, table, arena, path, messages, errored);
            Type::Keyword(Keyword::ULong)
        }
        Expr::SizeofType { operand, .. } => {
            resolve_type_expr(operand, env, table, arena, path, messages);
            Type::Keyword(Keyword::ULong)
        }
        Expr::Cast { target, operand, pos, .. } => {
            let operand_ty = check_expr(operand, env, table, arena, path, messages, errored);
            let target_ty = resolve_type_expr(target, env, table, arena, path, messages);
            if !operand_ty.is_castable_to(&target_ty, arena) {
                messages.push_error(CompileError::ty(
                    "this expression cannot be cast to the target type",
                    SourceLoc::new(path.to_path_buf(), *pos),
                ));
                *errored = true;
            }
            target_ty
        }
    };
    expr.set_ty(ty.clone());
    ty
}

fn check_literal(
    value: &mut LiteralValue,
    env: &Environment,
    table: &StringTable,
    arena: &mut Arena,
    path: &Path,
    messages: &mut CompilerMessages,
    errored: &mut bool,
) -> Type {
    match value {
        LiteralValue::Char(_) => Type::Keyword(Keyword::Char),
        LiteralValue::WChar(_) => Type::Keyword(Keyword::WChar),
        LiteralValue::Str(_) => Type::Pointer(Box::new(Type::Keyword(Keyword::Char).qualify(true, false))),
        LiteralValue::WStr(_) => Type::Pointer(Box::new(Type::Keyword(Keyword::WChar).qualify(true, false))),
        LiteralValue::Int0 | LiteralValue::IntBinary(_) | LiteralValue::IntOctal(_) | LiteralValue::IntDecimal(_) | LiteralValue::IntHex(_) => {
            Type::Keyword(Keyword::Int)
        }
        LiteralValue::Float(_) => Type::Keyword(Keyword::Float),
        LiteralValue::Double(_) => Type::Keyword(Keyword::Double),
        LiteralValue::Bool(_) => Type::Keyword(Keyword::Bool),
        LiteralValue::Null => Type::Pointer(Box::new(Type::Keyword(Keyword::Void))),
        LiteralValue::Aggregate(elems) => {
            let types = elems.iter_mut().map(|e| check_expr(e, env, table, arena, path, messages, errored)).collect();
            Type::Aggregate(types)
        }
    }
}

fn check_id(ident: &mut Ident, pos: SourcePos, table: &StringTable, arena: &Arena, path: &Path, messages: &mut CompilerMessages, errored: &mut bool) -> Type {
    let Some(id) = ident.entry else {
        return Type::Keyword(Keyword::Void);
    };
    match arena.get(id) {
        SymbolEntry::Variable { ty, .. } => ty.clone(),
        SymbolEntry::Function { return_type, arg_types, .. } => {
            Type::FunPtr { ret: Box::new(return_type.clone()), args: arg_types.clone() }
        }
        SymbolEntry::EnumConstant { parent, .. } => Type::Reference(*parent),
        other => {
            messages.push_error(CompileError::resolution(
                format!("`{}` names a {}, not a value", table.resolve(other.name()), other.kind_label()),
                SourceLoc::new(path.to_path_buf(), pos),
            ));
            *errored = true;
            Type::Keyword(Keyword::Void)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn check_binary(
    op: BinOp,
    lhs: &mut Expr,
    rhs: &mut Expr,
    pos: SourcePos,
    env: &Environment,
    table: &StringTable,
    arena: &mut Arena,
    path: &Path,
    messages: &mut CompilerMessages,
    errored: &mut bool,
) -> Type {
    let lt = check_expr(lhs, env, table, arena, path, messages, errored);
    let rt = check_expr(rhs, env, table, arena, path, messages, errored);
    let loc = || SourceLoc::new(path.to_path_buf(), pos);

    let is_assign = matches!(
        op,
        BinOp::Assign
            | BinOp::AddAssign
            | BinOp::SubAssign
            | BinOp::MulAssign
            | BinOp::DivAssign
            | BinOp::ModAssign
            | BinOp::ShlAssign
            | BinOp::AShrAssign
            | BinOp::LShrAssign
            | BinOp::AndAssign
            | BinOp::OrAssign
            | BinOp::XorAssign
            | BinOp::LogAndAssign
            | BinOp::LogOrAssign
    );
    if is_assign {
        if !lhs.is_lvalue() {
            messages.push_error(CompileError::ty("left side of an assignment must be an lvalue", loc()));
            *errored = true;
        }
        if matches!(op, BinOp::ShlAssign | BinOp::AShrAssign | BinOp::LShrAssign) {
            check_shift_operands(op, &lt, &rt, loc(), messages, errored);
        } else if !lt.is_assignable_from(&rt, arena) {
            messages.push_error(CompileError::ty("right side does not convert to the left side's type", loc()));
            *errored = true;
        }
        return lt;
    }

    match op {
        BinOp::Add | BinOp::Sub => {
            if lt.is_pointer() && rt.is_integral() {
                return lt;
            }
            if op == BinOp::Add && lt.is_integral() && rt.is_pointer() {
                return rt;
            }
            if op == BinOp::Sub && lt.is_pointer() && rt.is_pointer() {
                return Type::Keyword(Keyword::Long);
            }
            arithmetic_type_merge(&lt, &rt).unwrap_or_else(|| {
                messages.push_error(CompileError::ty("operands of an arithmetic operator must both be numeric", loc()));
                *errored = true;
                Type::Keyword(Keyword::Int)
            })
        }
        BinOp::Mul | BinOp::Div | BinOp::Mod => arithmetic_type_merge(&lt, &rt).unwrap_or_else(|| {
            messages.push_error(CompileError::ty("operands of an arithmetic operator must both be numeric", loc()));
            *errored = true;
            Type::Keyword(Keyword::Int)
        }),
        BinOp::Shl | BinOp::AShr | BinOp::LShr => {
            check_shift_operands(op, &lt, &rt, loc(), messages, errored);
            lt
        }
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
            if lt.is_integral() && rt.is_integral() {
                arithmetic_type_merge(&lt, &rt).unwrap_or(lt)
            } else {
                messages.push_error(CompileError::ty("bitwise operands must be integral", loc()));
                *errored = true;
                Type::Keyword(Keyword::Int)
            }
        }
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Eq | BinOp::Ne => {
            if !comparison_type_merge(&lt, &rt, arena) {
                messages.push_error(CompileError::ty("operands are not comparable", loc()));
                *errored = true;
            }
            Type::Keyword(Keyword::Bool)
        }
        BinOp::Spaceship => {
            if !comparison_type_merge(&lt, &rt, arena) {
                messages.push_error(CompileError::ty("operands are not comparable", loc()));
                *errored = true;
            }
            Type::Keyword(Keyword::Int)
        }
        BinOp::LogAnd | BinOp::LogOr => {
            if !(lt.is_numeric() || lt.is_pointer()) || !(rt.is_numeric() || rt.is_pointer()) {
                messages.push_error(CompileError::ty("logical operands must be numeric or pointers", loc()));
                *errored = true;
            }
            Type::Keyword(Keyword::Bool)
        }
        BinOp::Sequence => rt,
        _ => unreachable!("assignment operators handled above"),
    }
}

/// Logical shifts (`Shl`/`LShr`) require an integral-or-pointer LHS and an
/// unsigned-integral RHS; arithmetic right shift (`AShr`) additionally
/// requires the LHS itself be signed-integral.
fn check_shift_operands(
    op: BinOp,
    lt: &Type,
    rt: &Type,
    loc: SourceLoc,
    messages: &mut CompilerMessages,
    errored: &mut bool,
) {
    let lhs_ok = match op {
        BinOp::AShr | BinOp::AShrAssign => lt.is_signed_integral(),
        _ => lt.is_integral() || lt.is_pointer(),
    };
    if !lhs_ok {
        let msg = if matches!(op, BinOp::AShr | BinOp::AShrAssign) {
            "left side of an arithmetic right shift must be signed integral"
        } else {
            "left side of a shift must be integral or a pointer"
        };
        messages.push_error(CompileError::ty(msg, loc.clone()));
        *errored = true;
    }
    if !rt.is_unsigned_integral() {
        messages.push_error(CompileError::ty("right side of a shift must be unsigned integral", loc));
        *errored = true;
    }
}

#[allow(clippy::too_many_arguments)]
fn check_prefix(
    op: PrefixOp,
    operand: &mut Expr,
    pos: SourcePos,
    env: &Environment,
    table: &StringTable,
    arena: &mut Arena,
    path: &Path,
    messages: &mut CompilerMessages,
    errored: &mut bool,
) -> Type {
    let ot = check_expr(operand, env, table, arena, path, messages, errored);
    let loc = || SourceLoc::new(path.to_path_buf(), pos);
    match op {
        PrefixOp::Deref => ot.element_type().cloned().unwrap_or_else(|| {
            messages.push_error(CompileError::ty("cannot dereference a non-pointer, non-array value", loc()));
            *errored = true;
            Type::Keyword(Keyword::Int)
        }),
        PrefixOp::AddressOf => {
            if !operand.is_lvalue() {
                messages.push_error(CompileError::ty("cannot take the address of a non-lvalue", loc()));
                *errored = true;
            } else if let Some(id) = lvalue_entry(operand) {
                if let SymbolEntry::Variable { escapes, .. } = arena.get_mut(id) {
                    *escapes = true;
                }
            }
            Type::Pointer(Box::new(ot))
        }
        PrefixOp::PreInc | PrefixOp::PreDec => {
            if !operand.is_lvalue() || !(ot.is_numeric() || ot.is_pointer()) {
                messages.push_error(CompileError::ty("increment/decrement operand must be a numeric or pointer lvalue", loc()));
                *errored = true;
            }
            ot
        }
        PrefixOp::Negate => {
            if !ot.is_numeric() {
                messages.push_error(CompileError::ty("negation operand must be numeric", loc()));
                *errored = true;
            }
            ot
        }
        PrefixOp::LogNot => {
            if !(ot.is_numeric() || ot.is_pointer()) {
                messages.push_error(CompileError::ty("logical-not operand must be numeric or a pointer", loc()));
                *errored = true;
            }
            Type::Keyword(Keyword::Bool)
        }
        PrefixOp::BitNot => {
            if !ot.is_integral() {
                messages.push_error(CompileError::ty("bitwise-not operand must be integral", loc()));
                *errored = true;
            }
            ot
        }
    }
}

/// The symbol-table entry an lvalue ultimately names, for escape marking
/// (spec.md §4.6: taking an address marks the underlying variable as
/// escaping). `None` for lvalues that don't bottom out in a plain
/// variable, such as a dereference.
fn lvalue_entry(expr: &Expr) -> Option<EntryId> {
    match expr {
        Expr::Id { ident, .. } => ident.entry,
        Expr::Member { base, arrow: false, .. } => lvalue_entry(base),
        _ => None,
    }
}

#[allow(clippy::too_many_arguments)]
fn check_postfix(
    op: PostfixOp,
    operand: &mut Expr,
    pos: SourcePos,
    env: &Environment,
    table: &StringTable,
    arena: &mut Arena,
    path: &Path,
    messages: &mut CompilerMessages,
    errored: &mut bool,
) -> Type {
    let ot = check_expr(operand, env, table, arena, path, messages, errored);
    match op {
        PostfixOp::PostInc | PostfixOp::PostDec => {
            if !operand.is_lvalue() || !(ot.is_numeric() || ot.is_pointer()) {
                messages.push_error(CompileError::ty(
                    "increment/decrement operand must be a numeric or pointer lvalue",
                    SourceLoc::new(path.to_path_buf(), pos),
                ));
                *errored = true;
            }
            ot
        }
        // No surface grammar currently produces these compound suffix
        // forms; kept so the match stays exhaustive as the AST defines it.
        PostfixOp::NegateAssign | PostfixOp::LogNotAssign | PostfixOp::BitNotAssign => ot,
    }
}

#[allow(clippy::too_many_arguments)]
fn check_member(
    base: &mut Expr,
    arrow: bool,
    field: &mut Ident,
    pos: SourcePos,
    env: &Environment,
    table: &StringTable,
    arena: &mut Arena,
    path: &Path,
    messages: &mut CompilerMessages,
    errored: &mut bool,
) -> Type {
    let base_ty = check_expr(base, env, table, arena, path, messages, errored);
    let loc = || SourceLoc::new(path.to_path_buf(), pos);
    let compound_ty = if arrow {
        match base_ty.element_type() {
            Some(inner) => inner.clone(),
            None => {
                messages.push_error(CompileError::ty("`->` requires a pointer operand", loc()));
                *errored = true;
                return Type::Keyword(Keyword::Int);
            }
        }
    } else {
        base_ty
    };
    if !compound_ty.is_compound(arena) {
        messages.push_error(CompileError::ty("member access requires a struct or union", loc()));
        *errored = true;
        return Type::Keyword(Keyword::Int);
    }
    let Type::Reference(id) = compound_ty.strip_cv() else {
        unreachable!("is_compound implies a Reference")
    };
    let resolved = arena.resolve_opaque(*id);
    let name = field.scoped.last().expect("plain field name");
    match arena.get(resolved) {
        SymbolEntry::Struct { field_names, field_types, .. } | SymbolEntry::Union { option_names: field_names, option_types: field_types, .. } => {
            match field_names.iter().position(|n| *n == name) {
                Some(i) => field_types[i].clone(),
                None => {
                    messages.push_error(CompileError::resolution(format!("no field named `{}`", table.resolve(name)), loc()));
                    *errored = true;
                    Type::Keyword(Keyword::Int)
                }
            }
        }
        _ => unreachable!("is_compound implies struct or union"),
    }
}

#[allow(clippy::too_many_arguments)]
fn check_index(
    base: &mut Expr,
    index: &mut Expr,
    pos: SourcePos,
    env: &Environment,
    table: &StringTable,
    arena: &mut Arena,
    path: &Path,
    messages: &mut CompilerMessages,
    errored: &mut bool,
) -> Type {
    let base_ty = check_expr(base, env, table, arena, path, messages, errored);
    let index_ty = check_expr(index, env, table, arena, path, messages, errored);
    if !index_ty.is_integral() {
        messages.push_error(CompileError::ty("array index must be integral", SourceLoc::new(path.to_path_buf(), pos)));
        *errored = true;
    }
    base_ty.element_type().cloned().unwrap_or_else(|| {
        messages.push_error(CompileError::ty("indexing requires a pointer or array", SourceLoc::new(path.to_path_buf(), pos)));
        *errored = true;
        Type::Keyword(Keyword::Int)
    })
}

#[allow(clippy::too_many_arguments)]
fn check_call(
    callee: &mut Expr,
    args: &mut [Expr],
    pos: SourcePos,
    env: &Environment,
    table: &StringTable,
    arena: &mut Arena,
    path: &Path,
    messages: &mut CompilerMessages,
    errored: &mut bool,
) -> Type {
    let callee_ty = check_expr(callee, env, table, arena, path, messages, errored);
    let arg_types: Vec<Type> = args.iter_mut().map(|a| check_expr(a, env, table, arena, path, messages, errored)).collect();
    let loc = || SourceLoc::new(path.to_path_buf(), pos);

    let (ret, params) = match callee_ty.strip_cv() {
        Type::FunPtr { ret, args } => (ret.as_ref().clone(), args.clone()),
        _ => {
            messages.push_error(CompileError::ty("callee is not a function", loc()));
            *errored = true;
            return Type::Keyword(Keyword::Void);
        }
    };
    if params.len() != arg_types.len() {
        messages.push_error(CompileError::ty(
            format!("expected {} argument(s), found {}", params.len(), arg_types.len()),
            loc(),
        ));
        *errored = true;
    } else {
        for (i, (expected, actual)) in params.iter().zip(&arg_types).enumerate() {
            if !actual.is_implicitly_convertible_to(expected, arena) {
                messages.push_error(CompileError::ty(format!("argument {} does not convert to its parameter type", i + 1), loc()));
                *errored = true;
            }
        }
    }
    ret
}

/// Evaluates an expression as a compile-time integer constant: a literal,
/// a negation/bitwise-not of one, or a reference to an already-resolved
/// enum constant. Used for array lengths, local enum initialisers, and
/// switch/case duplicate-value detection (spec.md §4.6).
fn eval_const_int(expr: &Expr, arena: &Arena) -> Option<(bool, u64)> {
    match expr {
        Expr::Literal { value, .. } => literal_int_bits(value),
        Expr::Prefix { op: PrefixOp::Negate, operand, .. } => {
            let (_, bits) = eval_const_int(operand, arena)?;
            Some((true, (-(bits as i64)) as u64))
        }
        Expr::Prefix { op: PrefixOp::BitNot, operand, .. } => {
            let (signed, bits) = eval_const_int(operand, arena)?;
            Some((signed, !bits))
        }
        Expr::Id { ident, .. } => match arena.get(ident.entry?) {
            SymbolEntry::EnumConstant { signed, value, .. } => Some((*signed, *value)),
            _ => None,
        },
        _ => None,
    }
}

fn literal_int_bits(value: &LiteralValue) -> Option<(bool, u64)> {
    match value {
        LiteralValue::Int0 => Some((false, 0)),
        LiteralValue::IntDecimal(t) => t.parse::<u64>().ok().map(|v| (false, v)),
        LiteralValue::IntBinary(t) => u64::from_str_radix(t.trim_start_matches("0b").trim_start_matches("0B"), 2).ok().map(|v| (false, v)),
        LiteralValue::IntHex(t) => u64::from_str_radix(t.trim_start_matches("0x").trim_start_matches("0X"), 16).ok().map(|v| (false, v)),
        LiteralValue::IntOctal(t) => {
            let digits = t.trim_start_matches('0');
            if digits.is_empty() {
                Some((false, 0))
            } else {
                u64::from_str_radix(digits, 8).ok().map(|v| (false, v))
            }
        }
        LiteralValue::Bool(b) => Some((false, *b as u64)),
        LiteralValue::Char(c) => c.chars().next().map(|ch| (false, ch as u64)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::location::SourcePos;

    fn int_lit(pos: SourcePos, text: &str) -> Expr {
        Expr::Literal { pos, value: LiteralValue::IntDecimal(text.to_string()), ty: None }
    }

    #[test]
    fn assignment_requires_an_lvalue_on_the_left() {
        let pos = SourcePos::new(1, 1);
        let arena = Arena::new();
        let lhs = int_lit(pos, "1");
        let rhs = int_lit(pos, "2");
        assert!(!Expr::Binary { pos, op: BinOp::Assign, lhs: Box::new(lhs), rhs: Box::new(rhs), ty: None }.is_lvalue());
        let _ = arena;
    }

    #[test]
    fn integer_literal_checks_as_int() {
        let mut arena = Arena::new();
        let mut table = StringTable::new();
        let file_scope = crate::symtab::FileScope::default();
        let env = Environment::new(&file_scope, None, Vec::new());
        let mut messages = CompilerMessages::new();
        let mut errored = false;
        let mut expr = int_lit(SourcePos::new(1, 1), "42");
        let ty = check_expr(&mut expr, &env, &table, &mut arena, Path::new("t.tc"), &mut messages, &mut errored);
        assert_eq!(ty, Type::Keyword(Keyword::Int));
        assert!(!errored);
        let _ = &mut table;
    }

    #[test]
    fn dereferencing_a_non_pointer_is_a_type_error() {
        let mut arena = Arena::new();
        let table = StringTable::new();
        let file_scope = crate::symtab::FileScope::default();
        let env = Environment::new(&file_scope, None, Vec::new());
        let mut messages = CompilerMessages::new();
        let mut errored = false;
        let pos = SourcePos::new(1, 1);
        let mut expr = Expr::Prefix { pos, op: PrefixOp::Deref, operand: Box::new(int_lit(pos, "1")), ty: None };
        check_expr(&mut expr, &env, &table, &mut arena, Path::new("t.tc"), &mut messages, &mut errored);
        assert!(errored);
        assert!(messages.has_errors());
    }

    #[test]
    fn duplicate_switch_case_values_are_flagged() {
        let mut arena = Arena::new();
        let table = StringTable::new();
        let file_scope = crate::symtab::FileScope::default();
        let mut env = Environment::new(&file_scope, None, Vec::new());
        let policy = Policy::default_policy();
        let mut messages = CompilerMessages::new();
        let mut errored = false;
        let pos = SourcePos::new(1, 1);
        let mut stmt = Stmt::Switch {
            pos,
            operand: int_lit(pos, "0"),
            cases: vec![
                crate::ast::SwitchCase { pos, value: Some(int_lit(pos, "1")), body: Vec::new() },
                crate::ast::SwitchCase { pos, value: Some(int_lit(pos, "1")), body: Vec::new() },
            ],
        };
        check_stmt(&mut stmt, &mut env, &table, &mut arena, &policy, Path::new("t.tc"), &Type::Keyword(Keyword::Void), &mut messages, &mut errored);
        assert!(errored);
        assert!(messages.errors.iter().any(|e| e.message.contains("duplicate case")));
    }
}
