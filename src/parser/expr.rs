//! Expression parsing, shared by both passes (spec.md §4.5's fixed
//! precedence ladder, `sequence` down to `primary`). Generic over
//! `TokenFeed` so the same ladder runs whether the cursor reads straight
//! from the lexer (enum-constant initialisers and array bounds, parsed
//! eagerly during skim — spec.md §4.4 Stage C restricts their grammar to
//! a bare literal/scoped-id, so no live symbol table is needed) or from a
//! captured `UnparsedBody` (late-parse, pass 3).
//!
//! `ctx` is `None` during skim and `Some` during late-parse. Its only use
//! here is the `sizeof(` lookahead: whether the parenthesised operand
//! names a type or an expression depends on whether the leading
//! identifier resolves to a type-kind symbol-table entry (spec.md §4.5) —
//! undecidable before the symbol table exists, which is exactly why
//! general expressions are deferred to pass 3 in the first place.

use crate::ast::{BinOp, Expr, LiteralValue, PrefixOp, TypeExpr};
use crate::diagnostics::error::{CompileError, CompilerMessages};
use crate::diagnostics::location::SourcePos;
use crate::interning::StringTable;
use crate::parser::{Cursor, TokenFeed};
use crate::scoped_id::ScopedId;
use crate::symtab::{Arena, Environment};
use crate::token::TokenKind;
use crate::types::Keyword;

/// Bundles the live environment with the entry arena it indexes into, so
/// `sizeof(` lookahead can check `SymbolEntry::is_type_kind` without the
/// parser owning the arena itself.
pub struct ResolveCtx<'a> {
    pub env: &'a Environment<'a>,
    pub arena: &'a Arena,
}

fn pos_of<F: TokenFeed>(cursor: &mut Cursor<F>) -> SourcePos {
    let tok = cursor.peek();
    SourcePos::new(tok.line, tok.column)
}

fn keyword_for(kind: TokenKind) -> Option<Keyword> {
    Some(match kind {
        TokenKind::KwVoid => Keyword::Void,
        TokenKind::KwUbyte => Keyword::UByte,
        TokenKind::KwByte => Keyword::Byte,
        TokenKind::KwChar => Keyword::Char,
        TokenKind::KwUshort => Keyword::UShort,
        TokenKind::KwShort => Keyword::Short,
        TokenKind::KwUint => Keyword::UInt,
        TokenKind::KwInt => Keyword::Int,
        TokenKind::KwWchar => Keyword::WChar,
        TokenKind::KwUlong => Keyword::ULong,
        TokenKind::KwLong => Keyword::Long,
        TokenKind::KwFloat => Keyword::Float,
        TokenKind::KwDouble => Keyword::Double,
        TokenKind::KwBool => Keyword::Bool,
        _ => return None,
    })
}

/// Parses a `::`-scoped identifier starting at the current token.
pub fn parse_scoped_id<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    messages: &mut CompilerMessages,
) -> (SourcePos, ScopedId) {
    let pos = pos_of(cursor);
    let mut scoped = ScopedId::new();
    loop {
        match cursor.expect(TokenKind::Id, "an identifier", messages) {
            Some(tok) => {
                let name = tok.lexeme_str().unwrap_or_default();
                scoped.push(table.intern(name));
            }
            None => break,
        }
        if cursor.eat(TokenKind::Scope).is_none() {
            break;
        }
    }
    (pos, scoped)
}

/// A type-level expression, used inside `sizeof(T)` and `cast<T>(e)`
/// (spec.md §3, §6). Suffix `*`/`[n]`/`(args)` mirror `parse_type_expr`
/// in `skim.rs` (kept separate to avoid a parser/type-expr module cycle).
pub fn parse_type_expr<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    messages: &mut CompilerMessages,
) -> TypeExpr {
    let mut quals = Vec::new();
    loop {
        let pos = pos_of(cursor);
        if cursor.eat(TokenKind::KwConst).is_some() {
            quals.push((true, pos));
        } else if cursor.eat(TokenKind::KwVolatile).is_some() {
            quals.push((false, pos));
        } else {
            break;
        }
    }
    let pos = pos_of(cursor);
    let mut ty = if let Some(keyword) = keyword_for(cursor.peek_kind()) {
        cursor.advance();
        TypeExpr::Keyword { pos, keyword }
    } else {
        let (ipos, scoped) = parse_scoped_id(cursor, table, messages);
        TypeExpr::Named { pos: ipos, name: crate::ast::Ident::new(ipos, scoped) }
    };
    for (is_const, qpos) in quals {
        ty = if is_const {
            TypeExpr::Const { pos: qpos, base: Box::new(ty) }
        } else {
            TypeExpr::Volatile { pos: qpos, base: Box::new(ty) }
        };
    }
    loop {
        let pos = pos_of(cursor);
        if cursor.eat(TokenKind::Star).is_some() {
            ty = TypeExpr::Pointer { pos, base: Box::new(ty) };
        } else if cursor.eat(TokenKind::LSquare).is_some() {
            let len = parse_const_expr(cursor, table, messages);
            cursor.expect(TokenKind::RSquare, "`]`", messages);
            ty = TypeExpr::Array { pos, base: Box::new(ty), len: Box::new(len) };
        } else if cursor.check(TokenKind::LParen) {
            cursor.advance();
            let mut args = Vec::new();
            if !cursor.check(TokenKind::RParen) {
                loop {
                    args.push(parse_type_expr(cursor, table, messages));
                    if cursor.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
            }
            cursor.expect(TokenKind::RParen, "`)`", messages);
            ty = TypeExpr::FunPtr { pos, ret: Box::new(ty), args };
        } else {
            break;
        }
    }
    ty
}

/// A bare literal, an optionally sign-prefixed literal, or a scoped
/// identifier — the grammar spec.md §4.4 Stage C allows for an
/// enum-constant initialiser, reused here for array-length expressions
/// too (both are evaluated before any symbol table besides the current
/// file's own top-level entries exists).
pub fn parse_const_expr<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    messages: &mut CompilerMessages,
) -> Expr {
    let pos = pos_of(cursor);
    if cursor.check(TokenKind::Minus) || cursor.check(TokenKind::Tilde) {
        let op = match cursor.advance().kind {
            TokenKind::Minus => PrefixOp::Negate,
            _ => PrefixOp::BitNot,
        };
        let operand = parse_const_expr(cursor, table, messages);
        return Expr::Prefix { pos, op, operand: Box::new(operand), ty: None };
    }
    if cursor.eat(TokenKind::Plus).is_some() {
        return parse_const_expr(cursor, table, messages);
    }
    parse_literal_or_id(cursor, table, messages)
}

fn parse_literal_or_id<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    messages: &mut CompilerMessages,
) -> Expr {
    let pos = pos_of(cursor);
    let kind = cursor.peek_kind();
    if kind == TokenKind::Id {
        let (ipos, scoped) = parse_scoped_id(cursor, table, messages);
        return Expr::Id { pos: ipos, ident: crate::ast::Ident::new(ipos, scoped), ty: None };
    }
    if let Some(value) = literal_value(cursor) {
        cursor.advance();
        return Expr::Literal { pos, value, ty: None };
    }
    let tok = cursor.peek().clone();
    let loc = cursor.loc_at(pos);
    messages.push_error(CompileError::syntax(format!("expected an expression, found {:?}", tok.kind), loc));
    cursor.mark_errored();
    // Always consume the offending token so a caller looping on "not at
    // the closing delimiter yet" is guaranteed forward progress.
    if !cursor.check(TokenKind::Eof) {
        cursor.advance();
    }
    Expr::Literal { pos, value: LiteralValue::Int0, ty: None }
}

fn literal_value<F: TokenFeed>(cursor: &mut Cursor<F>) -> Option<LiteralValue> {
    let tok = cursor.peek();
    let text = || tok.lexeme_str().unwrap_or_default().to_string();
    Some(match tok.kind {
        TokenKind::LitChar => LiteralValue::Char(text()),
        TokenKind::LitWChar => LiteralValue::WChar(text()),
        TokenKind::LitString => LiteralValue::Str(text()),
        TokenKind::LitWString => LiteralValue::WStr(text()),
        TokenKind::LitInt0 => LiteralValue::Int0,
        TokenKind::LitIntBinary => LiteralValue::IntBinary(text()),
        TokenKind::LitIntOctal => LiteralValue::IntOctal(text()),
        TokenKind::LitIntDecimal => LiteralValue::IntDecimal(text()),
        TokenKind::LitIntHex => LiteralValue::IntHex(text()),
        TokenKind::LitFloat => LiteralValue::Float(text()),
        TokenKind::LitDouble => LiteralValue::Double(text()),
        TokenKind::KwTrue => LiteralValue::Bool(true),
        TokenKind::KwFalse => LiteralValue::Bool(false),
        TokenKind::KwNull => LiteralValue::Null,
        _ => return None,
    })
}

/// Full expression grammar (spec.md §4.5), used only during late-parse.
/// `ctx` resolves identifiers as they're built and disambiguates
/// `sizeof(`.
pub fn parse_expr<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    ctx: Option<&ResolveCtx>,
    messages: &mut CompilerMessages,
) -> Expr {
    parse_sequence(cursor, table, ctx, messages)
}

fn parse_sequence<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    ctx: Option<&ResolveCtx>,
    messages: &mut CompilerMessages,
) -> Expr {
    let mut lhs = parse_assignment(cursor, table, ctx, messages);
    while cursor.check(TokenKind::Comma) {
        let pos = pos_of(cursor);
        cursor.advance();
        let rhs = parse_assignment(cursor, table, ctx, messages);
        lhs = Expr::Binary { pos, op: BinOp::Sequence, lhs: Box::new(lhs), rhs: Box::new(rhs), ty: None };
    }
    lhs
}

fn assign_op(kind: TokenKind) -> Option<BinOp> {
    Some(match kind {
        TokenKind::Assign => BinOp::Assign,
        TokenKind::AddAssign => BinOp::AddAssign,
        TokenKind::SubAssign => BinOp::SubAssign,
        TokenKind::MulAssign => BinOp::MulAssign,
        TokenKind::DivAssign => BinOp::DivAssign,
        TokenKind::ModAssign => BinOp::ModAssign,
        TokenKind::LShiftAssign => BinOp::ShlAssign,
        TokenKind::ArShiftAssign => BinOp::AShrAssign,
        TokenKind::LrShiftAssign => BinOp::LShrAssign,
        TokenKind::AndAssign => BinOp::AndAssign,
        TokenKind::OrAssign => BinOp::OrAssign,
        TokenKind::XorAssign => BinOp::XorAssign,
        TokenKind::LAndAssign => BinOp::LogAndAssign,
        TokenKind::LOrAssign => BinOp::LogOrAssign,
        _ => return None,
    })
}

/// Right-associative: `a = b = c` groups as `a = (b = c)`.
fn parse_assignment<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    ctx: Option<&ResolveCtx>,
    messages: &mut CompilerMessages,
) -> Expr {
    let lhs = parse_ternary(cursor, table, ctx, messages);
    if let Some(op) = assign_op(cursor.peek_kind()) {
        let pos = pos_of(cursor);
        cursor.advance();
        let rhs = parse_assignment(cursor, table, ctx, messages);
        return Expr::Binary { pos, op, lhs: Box::new(lhs), rhs: Box::new(rhs), ty: None };
    }
    lhs
}

fn parse_ternary<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    ctx: Option<&ResolveCtx>,
    messages: &mut CompilerMessages,
) -> Expr {
    let cond = parse_logical_or(cursor, table, ctx, messages);
    if cursor.check(TokenKind::Question) {
        let pos = pos_of(cursor);
        cursor.advance();
        let then_branch = parse_assignment(cursor, table, ctx, messages);
        cursor.expect(TokenKind::Colon, "`:`", messages);
        let else_branch = parse_assignment(cursor, table, ctx, messages);
        return Expr::Ternary {
            pos,
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
            ty: None,
        };
    }
    cond
}

macro_rules! left_assoc_level {
    ($name:ident, $next:ident, $($kind:pat => $op:expr),+ $(,)?) => {
        fn $name<F: TokenFeed>(
            cursor: &mut Cursor<F>,
            table: &mut StringTable,
            ctx: Option<&ResolveCtx>,
            messages: &mut CompilerMessages,
        ) -> Expr {
            let mut lhs = $next(cursor, table, ctx, messages);
            loop {
                let op = match cursor.peek_kind() {
                    $($kind => $op,)+
                    _ => break,
                };
                let pos = pos_of(cursor);
                cursor.advance();
                let rhs = $next(cursor, table, ctx, messages);
                lhs = Expr::Binary { pos, op, lhs: Box::new(lhs), rhs: Box::new(rhs), ty: None };
            }
            lhs
        }
    };
}

left_assoc_level!(parse_logical_or, parse_logical_and, TokenKind::LOrOp => BinOp::LogOr);
left_assoc_level!(parse_logical_and, parse_bit_or, TokenKind::LAndOp => BinOp::LogAnd);
left_assoc_level!(parse_bit_or, parse_bit_xor, TokenKind::Bar => BinOp::BitOr);
left_assoc_level!(parse_bit_xor, parse_bit_and, TokenKind::Caret => BinOp::BitXor);
left_assoc_level!(parse_bit_and, parse_equality, TokenKind::Amp => BinOp::BitAnd);
left_assoc_level!(parse_equality, parse_relational, TokenKind::EqEq => BinOp::Eq, TokenKind::NotEq => BinOp::Ne);
left_assoc_level!(
    parse_relational,
    parse_shift,
    TokenKind::LAngle => BinOp::Lt,
    TokenKind::RAngle => BinOp::Gt,
    TokenKind::LtEq => BinOp::Le,
    TokenKind::GtEq => BinOp::Ge,
    TokenKind::Spaceship => BinOp::Spaceship,
);
left_assoc_level!(
    parse_shift,
    parse_additive,
    TokenKind::LShift => BinOp::Shl,
    TokenKind::ArShift => BinOp::AShr,
    TokenKind::LrShift => BinOp::LShr,
);
left_assoc_level!(parse_additive, parse_multiplicative, TokenKind::Plus => BinOp::Add, TokenKind::Minus => BinOp::Sub);
left_assoc_level!(
    parse_multiplicative,
    parse_unary,
    TokenKind::Star => BinOp::Mul,
    TokenKind::Slash => BinOp::Div,
    TokenKind::Percent => BinOp::Mod,
);

fn resolve_ident(ctx: Option<&ResolveCtx>, ident: &mut crate::ast::Ident) {
    if let Some(ctx) = ctx {
        if ident.scoped.len() == 1 {
            if let Some(name) = ident.scoped.last() {
                ident.entry = ctx.env.lookup(name);
            }
        }
    }
}

fn parse_unary<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    ctx: Option<&ResolveCtx>,
    messages: &mut CompilerMessages,
) -> Expr {
    let pos = pos_of(cursor);
    let prefix = match cursor.peek_kind() {
        TokenKind::Star => Some(PrefixOp::Deref),
        TokenKind::Amp => Some(PrefixOp::AddressOf),
        TokenKind::Inc => Some(PrefixOp::PreInc),
        TokenKind::Dec => Some(PrefixOp::PreDec),
        TokenKind::Minus => Some(PrefixOp::Negate),
        TokenKind::Bang => Some(PrefixOp::LogNot),
        TokenKind::Tilde => Some(PrefixOp::BitNot),
        _ => None,
    };
    if let Some(op) = prefix {
        cursor.advance();
        let operand = parse_unary(cursor, table, ctx, messages);
        return Expr::Prefix { pos, op, operand: Box::new(operand), ty: None };
    }
    if cursor.check(TokenKind::KwSizeof) {
        cursor.advance();
        return parse_sizeof(cursor, table, ctx, messages, pos);
    }
    if cursor.check(TokenKind::KwCast) {
        cursor.advance();
        cursor.expect(TokenKind::LAngle, "`<`", messages);
        let target = parse_type_expr(cursor, table, messages);
        cursor.expect(TokenKind::RAngle, "`>`", messages);
        cursor.expect(TokenKind::LParen, "`(`", messages);
        let operand = parse_expr(cursor, table, ctx, messages);
        cursor.expect(TokenKind::RParen, "`)`", messages);
        return Expr::Cast { pos, target, operand: Box::new(operand), ty: None };
    }
    parse_postfix(cursor, table, ctx, messages)
}

/// `sizeof(` is ambiguous between a type and an expression until the
/// identifier resolves (spec.md §4.5). `sizeof` without parens always
/// takes a unary expression.
fn parse_sizeof<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    ctx: Option<&ResolveCtx>,
    messages: &mut CompilerMessages,
    pos: SourcePos,
) -> Expr {
    if !cursor.check(TokenKind::LParen) {
        let operand = parse_unary(cursor, table, ctx, messages);
        return Expr::SizeofExpr { pos, operand: Box::new(operand), ty: None };
    }
    let next = cursor.peek_at(1).kind;
    let next_name = cursor.peek_at(1).lexeme_str().map(str::to_string);
    let names_a_type = keyword_for(next).is_some()
        || next == TokenKind::KwConst
        || next == TokenKind::KwVolatile
        || (next == TokenKind::Id
            && ctx
                .zip(next_name)
                .and_then(|(ctx, name)| table.get_existing(&name).and_then(|id| ctx.env.lookup(id)))
                .is_some_and(|entry| ctx.unwrap().arena.get(entry).is_type_kind()));
    cursor.advance();
    if names_a_type {
        let target = parse_type_expr(cursor, table, messages);
        cursor.expect(TokenKind::RParen, "`)`", messages);
        Expr::SizeofType { pos, operand: target, ty: None }
    } else {
        let operand = parse_expr(cursor, table, ctx, messages);
        cursor.expect(TokenKind::RParen, "`)`", messages);
        Expr::SizeofExpr { pos, operand: Box::new(operand), ty: None }
    }
}

fn parse_postfix<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    ctx: Option<&ResolveCtx>,
    messages: &mut CompilerMessages,
) -> Expr {
    let mut expr = parse_primary(cursor, table, ctx, messages);
    loop {
        let pos = pos_of(cursor);
        if cursor.eat(TokenKind::Dot).is_some() {
            let (ipos, scoped) = parse_scoped_id(cursor, table, messages);
            let field = crate::ast::Ident::new(ipos, scoped);
            expr = Expr::Member { pos, base: Box::new(expr), arrow: false, field, ty: None };
        } else if cursor.eat(TokenKind::Arrow).is_some() {
            let (ipos, scoped) = parse_scoped_id(cursor, table, messages);
            let field = crate::ast::Ident::new(ipos, scoped);
            expr = Expr::Member { pos, base: Box::new(expr), arrow: true, field, ty: None };
        } else if cursor.eat(TokenKind::LSquare).is_some() {
            let index = parse_expr(cursor, table, ctx, messages);
            cursor.expect(TokenKind::RSquare, "`]`", messages);
            expr = Expr::Index { pos, base: Box::new(expr), index: Box::new(index), ty: None };
        } else if cursor.eat(TokenKind::LParen).is_some() {
            let mut args = Vec::new();
            if !cursor.check(TokenKind::RParen) {
                loop {
                    args.push(parse_assignment(cursor, table, ctx, messages));
                    if cursor.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
            }
            cursor.expect(TokenKind::RParen, "`)`", messages);
            expr = Expr::Call { pos, callee: Box::new(expr), args, ty: None };
        } else if cursor.check(TokenKind::Inc) {
            cursor.advance();
            expr = Expr::Postfix { pos, op: crate::ast::PostfixOp::PostInc, operand: Box::new(expr), ty: None };
        } else if cursor.check(TokenKind::Dec) {
            cursor.advance();
            expr = Expr::Postfix { pos, op: crate::ast::PostfixOp::PostDec, operand: Box::new(expr), ty: None };
        } else {
            break;
        }
    }
    expr
}

fn parse_primary<F: TokenFeed>(
    cursor: &mut Cursor<F>,
    table: &mut StringTable,
    ctx: Option<&ResolveCtx>,
    messages: &mut CompilerMessages,
) -> Expr {
    let pos = pos_of(cursor);
    if cursor.eat(TokenKind::LParen).is_some() {
        let inner = parse_expr(cursor, table, ctx, messages);
        cursor.expect(TokenKind::RParen, "`)`", messages);
        return inner;
    }
    if cursor.check(TokenKind::LBrace) {
        cursor.advance();
        let mut elems = Vec::new();
        if !cursor.check(TokenKind::RBrace) {
            loop {
                elems.push(parse_assignment(cursor, table, ctx, messages));
                if cursor.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        cursor.expect(TokenKind::RBrace, "`}`", messages);
        return Expr::Literal { pos, value: LiteralValue::Aggregate(elems), ty: None };
    }
    if cursor.check(TokenKind::Id) {
        let (ipos, scoped) = parse_scoped_id(cursor, table, messages);
        let mut ident = crate::ast::Ident::new(ipos, scoped);
        resolve_ident(ctx, &mut ident);
        return Expr::Id { pos: ipos, ident, ty: None };
    }
    parse_literal_or_id(cursor, table, messages)
}
