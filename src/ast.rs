//! The AST node model (spec.md §3 "AST node", §4.2). A tagged sum: every
//! variant records its source position. No semantic information is
//! attached during construction — symbol-table entries and resolved
//! types are filled in by later passes (Stage D, and the type checker).
//!
//! `unparsed` (spec.md §4.3, §9) substitutes for a function body between
//! pass 1 (skim) and pass 3 (late parse): it owns the raw token vector
//! captured while skimming and a read cursor offering the same
//! `next`/`prev` discipline the lexer gives the parser, rather than
//! splicing a second lexer state back in (spec.md §9's explicit
//! recommendation).

use crate::diagnostics::location::SourcePos;
use crate::scoped_id::ScopedId;
use crate::symtab::{EntryId, FileScope};
use crate::token::Token;
use crate::types::Type;

/// A reference to a name as written in source: a single identifier, or a
/// `::`-scoped one. `entry` is filled in once the identifier is resolved
/// during late-parse/type-check (spec.md §3: "every identifier node has
/// its entry link set before type-checking begins").
#[derive(Debug, Clone)]
pub struct Ident {
    pub pos: SourcePos,
    pub scoped: ScopedId,
    pub entry: Option<EntryId>,
}

impl Ident {
    pub fn new(pos: SourcePos, scoped: ScopedId) -> Self {
        Self { pos, scoped, entry: None }
    }
}

#[derive(Debug, Clone)]
pub struct ModuleHeader {
    pub pos: SourcePos,
    pub name: ScopedId,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub pos: SourcePos,
    pub module: ScopedId,
    /// Late-bound: the index of the referenced file entry in the file
    /// list, filled in during Stage A.
    pub resolved_file: Option<usize>,
}

/// A raw token vector plus a read cursor, captured while skimming a
/// function body (spec.md §4.3). `next`/`prev` mirror the lexer's
/// pushback discipline so the late parser can read through it exactly
/// the way it reads through the live lexer.
#[derive(Debug, Clone, Default)]
pub struct UnparsedBody {
    tokens: Vec<Token>,
    cursor: usize,
}

impl UnparsedBody {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, cursor: 0 }
    }

    pub fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.cursor).cloned();
        if tok.is_some() {
            self.cursor += 1;
        }
        tok
    }

    pub fn prev(&mut self) {
        debug_assert!(self.cursor > 0, "unparsed body cursor underflow");
        self.cursor -= 1;
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.tokens.len()
    }
}

#[derive(Debug, Clone)]
pub enum Body {
    Unparsed(UnparsedBody),
    Parsed(Box<Stmt>),
}

/// An initializer expression captured during skim and re-parsed during
/// late-parse, exactly like a function body: the spec attributes *all*
/// context-sensitive disambiguation (the `sizeof`/postfix-`(`
/// type-vs-expression lookahead) to pass 3, where the symbol table is
/// live (spec.md §4.3, §4.5) — so any expression that could contain that
/// ambiguity, not just function-body statements, is deferred the same
/// way. Top-level variable initializers fall under this; enum-constant
/// initializers do not, since their grammar is restricted to a bare
/// literal or scoped-id token (spec.md §4.4 Stage C) and is parsed
/// directly during skim.
#[derive(Debug, Clone)]
pub enum DeferredExpr {
    Unparsed(UnparsedBody),
    Parsed(Expr),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub pos: SourcePos,
    pub ty: TypeExpr,
    pub name: Ident,
    pub entry: Option<EntryId>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub pos: SourcePos,
    pub ty: TypeExpr,
    pub name: Ident,
}

#[derive(Debug, Clone)]
pub struct EnumConstantDecl {
    pub pos: SourcePos,
    pub name: Ident,
    pub initializer: Option<Expr>,
    pub entry: Option<EntryId>,
}

/// Top-level declaration/definition forms (spec.md §3, §6).
#[derive(Debug, Clone)]
pub enum TopLevel {
    FunctionDefinition {
        pos: SourcePos,
        return_type: TypeExpr,
        name: Ident,
        params: Vec<Param>,
        body: Body,
        arg_scope: FileScope,
        entry: Option<EntryId>,
    },
    FunctionDeclaration {
        pos: SourcePos,
        return_type: TypeExpr,
        name: Ident,
        params: Vec<Param>,
        entry: Option<EntryId>,
    },
    VariableDefinition {
        pos: SourcePos,
        ty: TypeExpr,
        name: Ident,
        initializer: Option<DeferredExpr>,
        entry: Option<EntryId>,
    },
    VariableDeclaration {
        pos: SourcePos,
        ty: TypeExpr,
        name: Ident,
        entry: Option<EntryId>,
    },
    Opaque {
        pos: SourcePos,
        name: Ident,
        entry: Option<EntryId>,
    },
    Struct {
        pos: SourcePos,
        name: Ident,
        fields: Vec<Field>,
        entry: Option<EntryId>,
    },
    Union {
        pos: SourcePos,
        name: Ident,
        options: Vec<Field>,
        entry: Option<EntryId>,
    },
    Enum {
        pos: SourcePos,
        name: Ident,
        constants: Vec<EnumConstantDecl>,
        entry: Option<EntryId>,
    },
    Typedef {
        pos: SourcePos,
        ty: TypeExpr,
        name: Ident,
        entry: Option<EntryId>,
    },
}

impl TopLevel {
    pub fn name(&self) -> &Ident {
        match self {
            TopLevel::FunctionDefinition { name, .. }
            | TopLevel::FunctionDeclaration { name, .. }
            | TopLevel::VariableDefinition { name, .. }
            | TopLevel::VariableDeclaration { name, .. }
            | TopLevel::Opaque { name, .. }
            | TopLevel::Struct { name, .. }
            | TopLevel::Union { name, .. }
            | TopLevel::Enum { name, .. }
            | TopLevel::Typedef { name, .. } => name,
        }
    }

    pub fn pos(&self) -> SourcePos {
        match self {
            TopLevel::FunctionDefinition { pos, .. }
            | TopLevel::FunctionDeclaration { pos, .. }
            | TopLevel::VariableDefinition { pos, .. }
            | TopLevel::VariableDeclaration { pos, .. }
            | TopLevel::Opaque { pos, .. }
            | TopLevel::Struct { pos, .. }
            | TopLevel::Union { pos, .. }
            | TopLevel::Enum { pos, .. }
            | TopLevel::Typedef { pos, .. } => *pos,
        }
    }

    /// Sets the arena entry this item was given during symbol-table
    /// construction Stage B.
    pub fn set_entry(&mut self, id: EntryId) {
        let slot = match self {
            TopLevel::FunctionDefinition { entry, .. }
            | TopLevel::FunctionDeclaration { entry, .. }
            | TopLevel::VariableDefinition { entry, .. }
            | TopLevel::VariableDeclaration { entry, .. }
            | TopLevel::Opaque { entry, .. }
            | TopLevel::Struct { entry, .. }
            | TopLevel::Union { entry, .. }
            | TopLevel::Enum { entry, .. }
            | TopLevel::Typedef { entry, .. } => entry,
        };
        *slot = Some(id);
    }
}

/// A whole translation unit (spec.md §3's "file" top-level variant).
#[derive(Debug, Clone)]
pub struct File {
    pub pos: SourcePos,
    pub module: ModuleHeader,
    pub imports: Vec<Import>,
    pub items: Vec<TopLevel>,
    pub top_level_scope: FileScope,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Compound {
        pos: SourcePos,
        stmts: Vec<Stmt>,
        scope: FileScope,
    },
    If {
        pos: SourcePos,
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        pos: SourcePos,
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        pos: SourcePos,
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        pos: SourcePos,
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        header_scope: FileScope,
        body_scope: FileScope,
    },
    Switch {
        pos: SourcePos,
        operand: Expr,
        cases: Vec<SwitchCase>,
    },
    Break {
        pos: SourcePos,
    },
    Continue {
        pos: SourcePos,
    },
    Return {
        pos: SourcePos,
        value: Option<Expr>,
    },
    Asm {
        pos: SourcePos,
        text: String,
    },
    VariableDefinition {
        pos: SourcePos,
        ty: TypeExpr,
        name: Ident,
        initializer: Option<DeferredExpr>,
        entry: Option<EntryId>,
    },
    Expression {
        pos: SourcePos,
        expr: Expr,
    },
    Null {
        pos: SourcePos,
    },
    /// An opaque/struct/union/enum/typedef declared inside a function
    /// body (spec.md §3, §4.5's "nested type declarations").
    NestedDecl {
        pos: SourcePos,
        decl: Box<TopLevel>,
    },
}

impl Stmt {
    pub fn pos(&self) -> SourcePos {
        match self {
            Stmt::Compound { pos, .. }
            | Stmt::If { pos, .. }
            | Stmt::While { pos, .. }
            | Stmt::DoWhile { pos, .. }
            | Stmt::For { pos, .. }
            | Stmt::Switch { pos, .. }
            | Stmt::Break { pos }
            | Stmt::Continue { pos }
            | Stmt::Return { pos, .. }
            | Stmt::Asm { pos, .. }
            | Stmt::VariableDefinition { pos, .. }
            | Stmt::Expression { pos, .. }
            | Stmt::Null { pos }
            | Stmt::NestedDecl { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub pos: SourcePos,
    /// `None` marks the `default` case.
    pub value: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    AShr,
    LShr,
    Spaceship,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    LogAnd,
    LogOr,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ShlAssign,
    AShrAssign,
    LShrAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    LogAndAssign,
    LogOrAssign,
    Sequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Deref,
    AddressOf,
    PreInc,
    PreDec,
    Negate,
    LogNot,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    PostInc,
    PostDec,
    /// In-place compound negate/not/bitnot suffix forms (spec.md §4.5).
    NegateAssign,
    LogNotAssign,
    BitNotAssign,
}

#[derive(Debug, Clone)]
pub enum LiteralValue {
    Char(String),
    WChar(String),
    Str(String),
    WStr(String),
    Int0,
    IntBinary(String),
    IntOctal(String),
    IntDecimal(String),
    IntHex(String),
    Float(String),
    Double(String),
    Bool(bool),
    Null,
    /// An aggregate initialiser `{ e0, e1, ... }`.
    Aggregate(Vec<Expr>),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Binary {
        pos: SourcePos,
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        ty: Option<Type>,
    },
    Ternary {
        pos: SourcePos,
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        ty: Option<Type>,
    },
    Prefix {
        pos: SourcePos,
        op: PrefixOp,
        operand: Box<Expr>,
        ty: Option<Type>,
    },
    Postfix {
        pos: SourcePos,
        op: PostfixOp,
        operand: Box<Expr>,
        ty: Option<Type>,
    },
    Member {
        pos: SourcePos,
        base: Box<Expr>,
        arrow: bool,
        field: Ident,
        ty: Option<Type>,
    },
    Index {
        pos: SourcePos,
        base: Box<Expr>,
        index: Box<Expr>,
        ty: Option<Type>,
    },
    Call {
        pos: SourcePos,
        callee: Box<Expr>,
        args: Vec<Expr>,
        ty: Option<Type>,
    },
    SizeofExpr {
        pos: SourcePos,
        operand: Box<Expr>,
        ty: Option<Type>,
    },
    SizeofType {
        pos: SourcePos,
        operand: TypeExpr,
        ty: Option<Type>,
    },
    Cast {
        pos: SourcePos,
        target: TypeExpr,
        operand: Box<Expr>,
        ty: Option<Type>,
    },
    Literal {
        pos: SourcePos,
        value: LiteralValue,
        ty: Option<Type>,
    },
    Id {
        pos: SourcePos,
        ident: Ident,
        ty: Option<Type>,
    },
}

impl Expr {
    pub fn pos(&self) -> SourcePos {
        match self {
            Expr::Binary { pos, .. }
            | Expr::Ternary { pos, .. }
            | Expr::Prefix { pos, .. }
            | Expr::Postfix { pos, .. }
            | Expr::Member { pos, .. }
            | Expr::Index { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::SizeofExpr { pos, .. }
            | Expr::SizeofType { pos, .. }
            | Expr::Cast { pos, .. }
            | Expr::Literal { pos, .. }
            | Expr::Id { pos, .. } => *pos,
        }
    }

    pub fn ty(&self) -> Option<&Type> {
        match self {
            Expr::Binary { ty, .. }
            | Expr::Ternary { ty, .. }
            | Expr::Prefix { ty, .. }
            | Expr::Postfix { ty, .. }
            | Expr::Member { ty, .. }
            | Expr::Index { ty, .. }
            | Expr::Call { ty, .. }
            | Expr::SizeofExpr { ty, .. }
            | Expr::SizeofType { ty, .. }
            | Expr::Cast { ty, .. }
            | Expr::Literal { ty, .. }
            | Expr::Id { ty, .. } => ty.as_ref(),
        }
    }

    pub fn set_ty(&mut self, resolved: Type) {
        let slot = match self {
            Expr::Binary { ty, .. }
            | Expr::Ternary { ty, .. }
            | Expr::Prefix { ty, .. }
            | Expr::Postfix { ty, .. }
            | Expr::Member { ty, .. }
            | Expr::Index { ty, .. }
            | Expr::Call { ty, .. }
            | Expr::SizeofExpr { ty, .. }
            | Expr::SizeofType { ty, .. }
            | Expr::Cast { ty, .. }
            | Expr::Literal { ty, .. }
            | Expr::Id { ty, .. } => ty,
        };
        *slot = Some(resolved);
    }

    /// Lvalue definition (spec.md §4.6): identifiers and scoped
    /// identifiers; dereference, pre-increment, pre-decrement; members of
    /// an lvalue via `.`; any application of `->`; array indexing of an
    /// lvalue; parenthesised lvalue (transparent in this tree since no
    /// separate paren node is kept); the result of any assignment.
    pub fn is_lvalue(&self) -> bool {
        match self {
            Expr::Id { .. } => true,
            Expr::Prefix { op: PrefixOp::Deref | PrefixOp::PreInc | PrefixOp::PreDec, .. } => true,
            Expr::Member { arrow, base, .. } => *arrow || base.is_lvalue(),
            Expr::Index { .. } => true,
            Expr::Binary { op, .. } => matches!(
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
            ),
            _ => false,
        }
    }
}

/// Type expressions as written in source (spec.md §3, §6): keyword type,
/// modified type (const/volatile/pointer), array type, function-pointer
/// type, and reference by scoped or plain identifier.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Keyword {
        pos: SourcePos,
        keyword: crate::types::Keyword,
    },
    Named {
        pos: SourcePos,
        name: Ident,
    },
    Const {
        pos: SourcePos,
        base: Box<TypeExpr>,
    },
    Volatile {
        pos: SourcePos,
        base: Box<TypeExpr>,
    },
    Pointer {
        pos: SourcePos,
        base: Box<TypeExpr>,
    },
    Array {
        pos: SourcePos,
        base: Box<TypeExpr>,
        len: Box<Expr>,
    },
    FunPtr {
        pos: SourcePos,
        ret: Box<TypeExpr>,
        args: Vec<TypeExpr>,
    },
}

impl TypeExpr {
    pub fn pos(&self) -> SourcePos {
        match self {
            TypeExpr::Keyword { pos, .. }
            | TypeExpr::Named { pos, .. }
            | TypeExpr::Const { pos, .. }
            | TypeExpr::Volatile { pos, .. }
            | TypeExpr::Pointer { pos, .. }
            | TypeExpr::Array { pos, .. }
            | TypeExpr::FunPtr { pos, .. } => *pos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(kind: crate::token::TokenKind) -> Token {
        Token::new(kind, 1, 1, None)
    }

    #[test]
    fn unparsed_body_next_then_prev_replays_the_same_token() {
        let mut body = UnparsedBody::new(vec![
            tok(crate::token::TokenKind::LBrace),
            tok(crate::token::TokenKind::RBrace),
        ]);
        let first = body.next().unwrap();
        body.prev();
        let replayed = body.next().unwrap();
        assert_eq!(first.kind, replayed.kind);
        assert!(body.next().is_some());
        assert!(body.is_exhausted());
        assert!(body.next().is_none());
    }

    #[test]
    fn assignment_result_is_an_lvalue() {
        let pos = SourcePos::new(1, 1);
        let x = Expr::Id { pos, ident: Ident::new(pos, ScopedId::default()), ty: None };
        let one = Expr::Literal { pos, value: LiteralValue::IntDecimal("1".into()), ty: None };
        let assign = Expr::Binary {
            pos,
            op: BinOp::Assign,
            lhs: Box::new(x),
            rhs: Box::new(one),
            ty: None,
        };
        assert!(assign.is_lvalue());
    }
}
