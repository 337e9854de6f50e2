//! Pass 3: the late parser (spec.md §4.3, §4.5). Re-enters a captured
//! `UnparsedBody`/`DeferredExpr::Unparsed` span with the symbol table
//! now live, so every context-sensitive construct — `sizeof(`, identifier
//! resolution, nested type declarations — can be resolved in place
//! instead of merely recorded.
//!
//! Statement-level panic-mode recovery resumes at the next `;`, the next
//! statement-starting keyword, or a brace boundary (spec.md §4.3).

use crate::ast::*;
use crate::diagnostics::error::CompilerMessages;
use crate::interning::StringTable;
use crate::parser::expr::{parse_expr, parse_type_expr, ResolveCtx};
use crate::parser::skim::{parse_plain_ident, parse_top_level, token_pos};
use crate::parser::{new_body_cursor, recover_statement, recover_switch_body, Cursor, TokenFeed};
use crate::symtab::{Arena, Environment, SymbolEntry};
use crate::token::TokenKind;
use std::path::Path;

/// Re-parses a function body captured during skim. `env` already has the
/// function's parameter scope pushed by the caller (Stage D); this
/// function pushes/pops the body's own compound-statement scope. Takes
/// the arena mutably because a local variable declaration allocates its
/// own `SymbolEntry` on the spot (spec.md §4.5 — unlike top-level items,
/// locals are never visited by the symbol-table builder).
pub fn late_parse_function_body(
    body: &mut UnparsedBody,
    path: &Path,
    table: &mut StringTable,
    env: &mut Environment,
    arena: &mut Arena,
    messages: &mut CompilerMessages,
) -> Stmt {
    let mut cursor = new_body_cursor(body, path.to_path_buf());
    let pos = token_pos(&mut cursor);
    env.push_scope();
    let mut stmts = Vec::new();
    while !cursor.check(TokenKind::Eof) {
        stmts.push(parse_stmt(&mut cursor, table, env, arena, messages));
    }
    env.pop_scope();
    Stmt::Compound { pos, stmts, scope: crate::symtab::FileScope::default() }
}

/// Re-parses a deferred initializer expression (spec.md §9's
/// generalisation of late-parsing to any context-sensitive expression,
/// not just function bodies — see `ast::DeferredExpr`).
pub fn late_parse_deferred_expr(
    body: &mut UnparsedBody,
    path: &Path,
    table: &mut StringTable,
    env: &Environment,
    arena: &Arena,
    messages: &mut CompilerMessages,
) -> Expr {
    let mut cursor = new_body_cursor(body, path.to_path_buf());
    let ctx = ResolveCtx { env, arena };
    parse_expr(&mut cursor, table, Some(&ctx), messages)
}

fn parse_stmt<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    env: &mut Environment,
    arena: &mut Arena,
    messages: &mut CompilerMessages,
) -> Stmt {
    let pos = token_pos(cursor);
    match cursor.peek_kind() {
        TokenKind::LBrace => {
            cursor.advance();
            env.push_scope();
            let mut stmts = Vec::new();
            while !cursor.check(TokenKind::RBrace) && !cursor.check(TokenKind::Eof) {
                stmts.push(parse_stmt(cursor, table, env, arena, messages));
            }
            cursor.expect(TokenKind::RBrace, "`}`", messages);
            env.pop_scope();
            Stmt::Compound { pos, stmts, scope: crate::symtab::FileScope::default() }
        }
        TokenKind::KwIf => {
            cursor.advance();
            cursor.expect(TokenKind::LParen, "`(`", messages);
            let cond = parse_expr_ctx(cursor, table, env, arena, messages);
            cursor.expect(TokenKind::RParen, "`)`", messages);
            let then_branch = Box::new(parse_stmt(cursor, table, env, arena, messages));
            let else_branch = if cursor.eat(TokenKind::KwElse).is_some() {
                Some(Box::new(parse_stmt(cursor, table, env, arena, messages)))
            } else {
                None
            };
            Stmt::If { pos, cond, then_branch, else_branch }
        }
        TokenKind::KwWhile => {
            cursor.advance();
            cursor.expect(TokenKind::LParen, "`(`", messages);
            let cond = parse_expr_ctx(cursor, table, env, arena, messages);
            cursor.expect(TokenKind::RParen, "`)`", messages);
            let body = Box::new(parse_stmt(cursor, table, env, arena, messages));
            Stmt::While { pos, cond, body }
        }
        TokenKind::KwDo => {
            cursor.advance();
            let body = Box::new(parse_stmt(cursor, table, env, arena, messages));
            cursor.expect(TokenKind::KwWhile, "`while`", messages);
            cursor.expect(TokenKind::LParen, "`(`", messages);
            let cond = parse_expr_ctx(cursor, table, env, arena, messages);
            cursor.expect(TokenKind::RParen, "`)`", messages);
            cursor.expect(TokenKind::Semi, "`;`", messages);
            Stmt::DoWhile { pos, body, cond }
        }
        TokenKind::KwFor => {
            cursor.advance();
            cursor.expect(TokenKind::LParen, "`(`", messages);
            env.push_scope();
            let init = if cursor.check(TokenKind::Semi) {
                cursor.advance();
                None
            } else {
                Some(Box::new(parse_simple_stmt(cursor, table, env, arena, messages)))
            };
            let cond = if cursor.check(TokenKind::Semi) {
                None
            } else {
                Some(parse_expr_ctx(cursor, table, env, arena, messages))
            };
            cursor.expect(TokenKind::Semi, "`;`", messages);
            let update = if cursor.check(TokenKind::RParen) {
                None
            } else {
                Some(parse_expr_ctx(cursor, table, env, arena, messages))
            };
            cursor.expect(TokenKind::RParen, "`)`", messages);
            let header_scope = crate::symtab::FileScope::default();
            env.push_scope();
            let body = Box::new(parse_stmt(cursor, table, env, arena, messages));
            let body_scope = crate::symtab::FileScope::default();
            env.pop_scope();
            env.pop_scope();
            Stmt::For { pos, init, cond, update, body, header_scope, body_scope }
        }
        TokenKind::KwSwitch => {
            cursor.advance();
            cursor.expect(TokenKind::LParen, "`(`", messages);
            let operand = parse_expr_ctx(cursor, table, env, arena, messages);
            cursor.expect(TokenKind::RParen, "`)`", messages);
            cursor.expect(TokenKind::LBrace, "`{`", messages);
            let mut cases = Vec::new();
            env.push_scope();
            while !cursor.check(TokenKind::RBrace) && !cursor.check(TokenKind::Eof) {
                let cpos = token_pos(cursor);
                let value = if cursor.eat(TokenKind::KwCase).is_some() {
                    let v = parse_expr_ctx(cursor, table, env, arena, messages);
                    cursor.expect(TokenKind::Colon, "`:`", messages);
                    Some(v)
                } else if cursor.eat(TokenKind::KwDefault).is_some() {
                    cursor.expect(TokenKind::Colon, "`:`", messages);
                    None
                } else {
                    recover_switch_body(cursor);
                    continue;
                };
                let mut body = Vec::new();
                while !matches!(cursor.peek_kind(), TokenKind::KwCase | TokenKind::KwDefault | TokenKind::RBrace | TokenKind::Eof) {
                    body.push(parse_stmt(cursor, table, env, arena, messages));
                }
                cases.push(SwitchCase { pos: cpos, value, body });
            }
            env.pop_scope();
            cursor.expect(TokenKind::RBrace, "`}`", messages);
            Stmt::Switch { pos, operand, cases }
        }
        TokenKind::KwBreak => {
            cursor.advance();
            cursor.expect(TokenKind::Semi, "`;`", messages);
            Stmt::Break { pos }
        }
        TokenKind::KwContinue => {
            cursor.advance();
            cursor.expect(TokenKind::Semi, "`;`", messages);
            Stmt::Continue { pos }
        }
        TokenKind::KwReturn => {
            cursor.advance();
            let value = if cursor.check(TokenKind::Semi) {
                None
            } else {
                Some(parse_expr_ctx(cursor, table, env, arena, messages))
            };
            cursor.expect(TokenKind::Semi, "`;`", messages);
            Stmt::Return { pos, value }
        }
        TokenKind::KwAsm => {
            cursor.advance();
            cursor.expect(TokenKind::LParen, "`(`", messages);
            let text = match cursor.expect(TokenKind::LitString, "a string literal", messages) {
                Some(tok) => tok.lexeme_str().unwrap_or_default().to_string(),
                None => String::new(),
            };
            cursor.expect(TokenKind::RParen, "`)`", messages);
            cursor.expect(TokenKind::Semi, "`;`", messages);
            Stmt::Asm { pos, text }
        }
        TokenKind::Semi => {
            cursor.advance();
            Stmt::Null { pos }
        }
        TokenKind::KwOpaque | TokenKind::KwStruct | TokenKind::KwUnion | TokenKind::KwEnum | TokenKind::KwTypedef => {
            let decl = parse_top_level(cursor, table, messages)
                .and_then(|mut v| v.pop())
                .unwrap_or(TopLevel::Opaque { pos, name: Ident::new(pos, Default::default()), entry: None });
            Stmt::NestedDecl { pos, decl: Box::new(decl) }
        }
        _ => parse_simple_stmt(cursor, table, env, arena, messages),
    }
}

/// A variable definition or a bare expression statement — the two forms
/// the `for`-header init-clause also accepts (spec.md §4.5).
fn parse_simple_stmt<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    env: &mut Environment,
    arena: &mut Arena,
    messages: &mut CompilerMessages,
) -> Stmt {
    let pos = token_pos(cursor);
    if looks_like_declaration(cursor, table, env, arena) {
        let ty = parse_type_expr(cursor, table, messages);
        let name = parse_plain_ident(cursor, table, messages);
        let resolved = crate::typeck::resolve_type_expr(&ty, env, table, arena, cursor.path(), messages);
        let local_name = name.scoped.last().expect("plain local name");
        let entry = arena.alloc(SymbolEntry::Variable { name: local_name, ty: resolved, escapes: false });
        env.declare(local_name, entry);
        let initializer = if cursor.eat(TokenKind::Assign).is_some() {
            let ctx = ResolveCtx { env, arena };
            Some(DeferredExpr::Parsed(parse_expr(cursor, table, Some(&ctx), messages)))
        } else {
            None
        };
        if cursor.expect(TokenKind::Semi, "`;`", messages).is_none() {
            recover_statement(cursor);
        }
        return Stmt::VariableDefinition { pos, ty, name, initializer, entry: Some(entry) };
    }
    let expr = parse_expr_ctx(cursor, table, env, arena, messages);
    if cursor.expect(TokenKind::Semi, "`;`", messages).is_none() {
        recover_statement(cursor);
    }
    Stmt::Expression { pos, expr }
}

fn parse_expr_ctx<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    env: &Environment,
    arena: &Arena,
    messages: &mut CompilerMessages,
) -> Expr {
    let ctx = ResolveCtx { env, arena };
    parse_expr(cursor, table, Some(&ctx), messages)
}

/// Declaration-vs-expression lookahead: a statement starting with a type
/// keyword, a qualifier, an identifier immediately followed by another
/// identifier, or a scoped-id (`A::B`) whose head names a type-kind symbol
/// is a declaration (spec.md §4.5's disambiguation); everything else is an
/// expression statement. The scoped-id case consults the live symbol table
/// the same way `sizeof(`'s own type/expression lookahead does, since a
/// plain `Id` `Scope` two-token lookahead can't tell `A::B x;` from `A::B;`.
fn looks_like_declaration<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &StringTable,
    env: &Environment,
    arena: &Arena,
) -> bool {
    let kind = cursor.peek_kind();
    if kind.is_type_keyword() || kind.is_qualifier() {
        return true;
    }
    if kind != TokenKind::Id {
        return false;
    }
    if cursor.peek_at(1).kind == TokenKind::Id {
        return true;
    }
    if cursor.peek_at(1).kind == TokenKind::Scope {
        let head = cursor.peek().lexeme_str().map(str::to_string);
        return head
            .and_then(|name| table.get_existing(&name))
            .and_then(|id| env.lookup(id))
            .is_some_and(|entry| arena.get(entry).is_type_kind());
    }
    false
}
