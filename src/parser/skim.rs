//! Pass 1: the skim parser (spec.md §4.3). Reads the whole file once,
//! straight off the lexer, building every top-level declaration shape but
//! deferring anything whose parse depends on a live symbol table:
//! function bodies and top-level variable initialisers are captured as
//! raw token spans (`ast::UnparsedBody`/`ast::DeferredExpr::Unparsed`)
//! for pass 3 to re-enter (`late.rs`).
//!
//! Panic-mode recovery on a malformed top-level form resumes at the next
//! token that can start one (spec.md §4.3); within an aggregate or enum
//! body, recovery resumes at the next field/constant boundary.
//!
//! The per-form parsers are generic over `TokenFeed` (not just
//! `LexerState`) so `late.rs` can reuse them verbatim for a nested type
//! declaration found inside a function body (spec.md §4.5): by pass 3
//! the environment is live, but the *grammar* of a struct/enum/etc. body
//! is identical wherever it's written.

use crate::ast::*;
use crate::diagnostics::error::CompilerMessages;
use crate::diagnostics::location::SourcePos;
use crate::interning::StringTable;
use crate::parser::expr::{parse_const_expr, parse_scoped_id, parse_type_expr};
use crate::parser::{new_skim_cursor, recover_aggregate_body, recover_enum_body, recover_top_level, Cursor, TokenFeed};
use crate::symtab::FileScope;
use crate::token::lexer::LexerState;
use crate::token::{Token, TokenKind};
use std::path::PathBuf;

pub fn skim_file(
    lexer: LexerState,
    path: PathBuf,
    table: &mut StringTable,
    messages: &mut CompilerMessages,
) -> File {
    let mut cursor = new_skim_cursor(lexer, path);
    let file_pos = SourcePos::new(1, 1);

    cursor.expect(TokenKind::KwModule, "`module`", messages);
    let (mpos, mname) = parse_scoped_id(&mut cursor, table, messages);
    cursor.expect(TokenKind::Semi, "`;`", messages);
    let module = ModuleHeader { pos: mpos, name: mname };

    let mut imports = Vec::new();
    while cursor.check(TokenKind::KwImport) {
        let ipos = token_pos(&mut cursor);
        cursor.advance();
        let (_, iname) = parse_scoped_id(&mut cursor, table, messages);
        cursor.expect(TokenKind::Semi, "`;`", messages);
        imports.push(Import { pos: ipos, module: iname, resolved_file: None });
    }

    let mut items = Vec::new();
    while !cursor.check(TokenKind::Eof) {
        match parse_top_level(&mut cursor, table, messages) {
            Some(mut new_items) => items.append(&mut new_items),
            None => recover_top_level(&mut cursor),
        }
    }

    File { pos: file_pos, module, imports, items, top_level_scope: FileScope::default() }
}

pub(crate) fn token_pos<F: TokenFeed>(cursor: &mut Cursor<F>) -> SourcePos {
    let tok = cursor.peek();
    SourcePos::new(tok.line, tok.column)
}

/// A declaration name is always a single identifier, never `::`-scoped
/// (only references use the scoped form).
pub(crate) fn parse_plain_ident<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    messages: &mut CompilerMessages,
) -> Ident {
    let pos = token_pos(cursor);
    let name = match cursor.expect(TokenKind::Id, "an identifier", messages) {
        Some(tok) => tok.lexeme_str().unwrap_or_default().to_string(),
        None => String::new(),
    };
    Ident::new(pos, crate::scoped_id::ScopedId::single(table.intern(&name)))
}

pub(crate) fn parse_top_level<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    messages: &mut CompilerMessages,
) -> Option<Vec<TopLevel>> {
    let pos = token_pos(cursor);
    match cursor.peek_kind() {
        TokenKind::KwOpaque => {
            cursor.advance();
            let name = parse_plain_ident(cursor, table, messages);
            cursor.expect(TokenKind::Semi, "`;`", messages);
            Some(vec![TopLevel::Opaque { pos, name, entry: None }])
        }
        TokenKind::KwStruct => {
            cursor.advance();
            let name = parse_plain_ident(cursor, table, messages);
            cursor.expect(TokenKind::LBrace, "`{`", messages);
            let fields = parse_field_list(cursor, table, messages);
            cursor.expect(TokenKind::RBrace, "`}`", messages);
            cursor.expect(TokenKind::Semi, "`;`", messages);
            Some(vec![TopLevel::Struct { pos, name, fields, entry: None }])
        }
        TokenKind::KwUnion => {
            cursor.advance();
            let name = parse_plain_ident(cursor, table, messages);
            cursor.expect(TokenKind::LBrace, "`{`", messages);
            let options = parse_field_list(cursor, table, messages);
            cursor.expect(TokenKind::RBrace, "`}`", messages);
            cursor.expect(TokenKind::Semi, "`;`", messages);
            Some(vec![TopLevel::Union { pos, name, options, entry: None }])
        }
        TokenKind::KwEnum => {
            cursor.advance();
            let name = parse_plain_ident(cursor, table, messages);
            cursor.expect(TokenKind::LBrace, "`{`", messages);
            let constants = parse_enum_body(cursor, table, messages);
            cursor.expect(TokenKind::RBrace, "`}`", messages);
            cursor.expect(TokenKind::Semi, "`;`", messages);
            Some(vec![TopLevel::Enum { pos, name, constants, entry: None }])
        }
        TokenKind::KwTypedef => {
            cursor.advance();
            let ty = parse_type_expr(cursor, table, messages);
            let name = parse_plain_ident(cursor, table, messages);
            cursor.expect(TokenKind::Semi, "`;`", messages);
            Some(vec![TopLevel::Typedef { pos, ty, name, entry: None }])
        }
        _ => parse_function_or_variable(cursor, table, messages, pos),
    }
}

pub(crate) fn parse_field_list<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    messages: &mut CompilerMessages,
) -> Vec<Field> {
    let mut fields = Vec::new();
    while !cursor.check(TokenKind::RBrace) && !cursor.check(TokenKind::Eof) {
        let pos = token_pos(cursor);
        let ty = parse_type_expr(cursor, table, messages);
        let name = parse_plain_ident(cursor, table, messages);
        fields.push(Field { pos, ty: ty.clone(), name });
        while cursor.eat(TokenKind::Comma).is_some() {
            let npos = token_pos(cursor);
            let n2 = parse_plain_ident(cursor, table, messages);
            fields.push(Field { pos: npos, ty: ty.clone(), name: n2 });
        }
        if cursor.expect(TokenKind::Semi, "`;`", messages).is_none() {
            recover_aggregate_body(cursor);
        }
    }
    fields
}

pub(crate) fn parse_enum_body<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    messages: &mut CompilerMessages,
) -> Vec<EnumConstantDecl> {
    let mut constants = Vec::new();
    while !cursor.check(TokenKind::RBrace) && !cursor.check(TokenKind::Eof) {
        let pos = token_pos(cursor);
        let name = parse_plain_ident(cursor, table, messages);
        let initializer = if cursor.eat(TokenKind::Assign).is_some() {
            Some(parse_const_expr(cursor, table, messages))
        } else {
            None
        };
        constants.push(EnumConstantDecl { pos, name, initializer, entry: None });
        if cursor.eat(TokenKind::Comma).is_none() {
            break;
        }
        if cursor.check(TokenKind::RBrace) {
            break; // trailing comma before `}`
        }
        if !matches!(cursor.peek_kind(), TokenKind::Id) {
            recover_enum_body(cursor);
        }
    }
    constants
}

fn parse_function_or_variable<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    messages: &mut CompilerMessages,
    pos: SourcePos,
) -> Option<Vec<TopLevel>> {
    let ty = parse_type_expr(cursor, table, messages);
    let name = parse_plain_ident(cursor, table, messages);

    if cursor.check(TokenKind::LParen) {
        cursor.advance();
        let params = parse_params(cursor, table, messages);
        cursor.expect(TokenKind::RParen, "`)`", messages);
        if cursor.eat(TokenKind::Semi).is_some() {
            return Some(vec![TopLevel::FunctionDeclaration { pos, return_type: ty, name, params, entry: None }]);
        }
        if cursor.expect(TokenKind::LBrace, "`{` or `;`", messages).is_some() {
            let tokens = capture_brace_delimited_body(cursor);
            return Some(vec![TopLevel::FunctionDefinition {
                pos,
                return_type: ty,
                name,
                params,
                body: Body::Unparsed(UnparsedBody::new(tokens)),
                arg_scope: FileScope::default(),
                entry: None,
            }]);
        }
        return None;
    }

    Some(parse_variable_tail(cursor, table, messages, pos, ty, name))
}

fn parse_params<F: TokenFeed>(cursor: &mut Cursor<F>, table: &mut StringTable, messages: &mut CompilerMessages) -> Vec<Param> {
    let mut params = Vec::new();
    if cursor.check(TokenKind::RParen) {
        return params;
    }
    loop {
        let pos = token_pos(cursor);
        let ty = parse_type_expr(cursor, table, messages);
        let name = parse_plain_ident(cursor, table, messages);
        params.push(Param { pos, ty, name, entry: None });
        if cursor.eat(TokenKind::Comma).is_none() {
            break;
        }
    }
    params
}

fn parse_variable_tail<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    messages: &mut CompilerMessages,
    pos: SourcePos,
    ty: TypeExpr,
    first_name: Ident,
) -> Vec<TopLevel> {
    let mut out = Vec::new();
    let mut name = first_name;
    let mut item_pos = pos;
    loop {
        if cursor.eat(TokenKind::Assign).is_some() {
            let tokens = capture_initializer_tokens(cursor);
            out.push(TopLevel::VariableDefinition {
                pos: item_pos,
                ty: ty.clone(),
                name,
                initializer: Some(DeferredExpr::Unparsed(UnparsedBody::new(tokens))),
                entry: None,
            });
        } else {
            out.push(TopLevel::VariableDeclaration { pos: item_pos, ty: ty.clone(), name, entry: None });
        }
        if cursor.eat(TokenKind::Comma).is_none() {
            break;
        }
        item_pos = token_pos(cursor);
        name = parse_plain_ident(cursor, table, messages);
    }
    cursor.expect(TokenKind::Semi, "`;`", messages);
    out
}

/// Captures tokens up to (not including) the matching top-level `,` or
/// `;`, tracking paren/bracket/brace nesting so a call or aggregate
/// initialiser's internal commas don't end the capture early.
pub(crate) fn capture_initializer_tokens<F: TokenFeed>(cursor: &mut Cursor<F>) -> Vec<Token> {
    let mut depth: i32 = 0;
    let mut tokens = Vec::new();
    loop {
        let kind = cursor.peek_kind();
        if kind == TokenKind::Eof {
            break;
        }
        if depth == 0 && matches!(kind, TokenKind::Comma | TokenKind::Semi) {
            break;
        }
        match kind {
            TokenKind::LParen | TokenKind::LSquare | TokenKind::LBrace => depth += 1,
            TokenKind::RParen | TokenKind::RSquare | TokenKind::RBrace => depth -= 1,
            _ => {}
        }
        tokens.push(cursor.advance());
    }
    tokens
}

/// Captures tokens up to (and consuming) the matching closing `}`; the
/// opening `{` must already have been consumed by the caller.
pub(crate) fn capture_brace_delimited_body<F: TokenFeed>(cursor: &mut Cursor<F>) -> Vec<Token> {
    let mut depth: u32 = 0;
    let mut tokens = Vec::new();
    loop {
        let kind = cursor.peek_kind();
        if kind == TokenKind::Eof {
            break;
        }
        if kind == TokenKind::RBrace && depth == 0 {
            cursor.advance();
            break;
        }
        if kind == TokenKind::LBrace {
            depth += 1;
        } else if kind == TokenKind::RBrace {
            depth -= 1;
        }
        tokens.push(cursor.advance());
    }
    tokens
}
