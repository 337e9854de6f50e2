//! Token kinds for the fixed T grammar (spec.md §3, cross-checked against
//! `TokenType` in the original T compiler's `lexer/lexer.h`).
//!
//! A lexeme is carried on the `Token` itself (spec.md §3: "a lexeme is
//! present exactly when the kind is an identifier or any literal or
//! bad-literal kind") rather than folded into the kind the way the
//! teacher's `TokenKind::Symbol(StringId)` does it, so `TokenKind` here is
//! a plain, `Copy` tag enum.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eof,

    // Keywords
    KwModule,
    KwImport,
    KwOpaque,
    KwStruct,
    KwUnion,
    KwEnum,
    KwTypedef,
    KwIf,
    KwElse,
    KwWhile,
    KwDo,
    KwFor,
    KwSwitch,
    KwCase,
    KwDefault,
    KwBreak,
    KwContinue,
    KwReturn,
    KwAsm,
    KwCast,
    KwSizeof,
    KwTrue,
    KwFalse,
    KwNull,

    // Type keywords
    KwVoid,
    KwUbyte,
    KwByte,
    KwChar,
    KwUshort,
    KwShort,
    KwUint,
    KwInt,
    KwWchar,
    KwUlong,
    KwLong,
    KwFloat,
    KwDouble,
    KwBool,

    // Qualifiers
    KwConst,
    KwVolatile,

    // Punctuation
    Semi,
    Comma,
    LParen,
    RParen,
    LSquare,
    RSquare,
    LBrace,
    RBrace,
    Dot,
    Arrow,
    Inc,
    Dec,
    Star,
    Amp,
    Plus,
    Minus,
    Bang,
    Tilde,
    Slash,
    Percent,
    LShift,
    ArShift,
    LrShift,
    Spaceship,
    LAngle,
    RAngle,
    LtEq,
    GtEq,
    EqEq,
    NotEq,
    Bar,
    Caret,
    LAndOp,
    LOrOp,
    Question,
    Colon,
    Assign,
    MulAssign,
    DivAssign,
    ModAssign,
    AddAssign,
    SubAssign,
    LShiftAssign,
    ArShiftAssign,
    LrShiftAssign,
    AndAssign,
    XorAssign,
    OrAssign,
    LAndAssign,
    LOrAssign,
    Scope,

    // Identifier
    Id,

    // Literals (lexeme carries the raw text, per spec.md §6)
    LitString,
    LitWString,
    LitChar,
    LitWChar,
    LitInt0,
    LitIntBinary,
    LitIntOctal,
    LitIntDecimal,
    LitIntHex,
    LitFloat,
    LitDouble,

    // Bad literals: malformed char/binary/hex/string (spec.md §3, §7)
    BadChar,
    BadIntBinary,
    BadIntHex,
    BadString,

    /// A byte outside the fixed grammar entirely. Not part of the closed
    /// token set the spec enumerates, but needed to keep `lex` total
    /// (spec.md §7: lexical errors are "always reported; always set
    /// `errored`" rather than aborting the scan).
    Unknown,
}

impl TokenKind {
    /// "A lexeme is present exactly when the kind is an identifier or any
    /// literal or bad-literal kind." (spec.md §3)
    pub fn carries_lexeme(self) -> bool {
        matches!(
            self,
            TokenKind::Id
                | TokenKind::LitString
                | TokenKind::LitWString
                | TokenKind::LitChar
                | TokenKind::LitWChar
                | TokenKind::LitInt0
                | TokenKind::LitIntBinary
                | TokenKind::LitIntOctal
                | TokenKind::LitIntDecimal
                | TokenKind::LitIntHex
                | TokenKind::LitFloat
                | TokenKind::LitDouble
                | TokenKind::BadChar
                | TokenKind::BadIntBinary
                | TokenKind::BadIntHex
                | TokenKind::BadString
        )
    }

    pub fn is_bad_literal(self) -> bool {
        matches!(
            self,
            TokenKind::BadChar | TokenKind::BadIntBinary | TokenKind::BadIntHex | TokenKind::BadString
        )
    }

    pub fn is_type_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::KwVoid
                | TokenKind::KwUbyte
                | TokenKind::KwByte
                | TokenKind::KwChar
                | TokenKind::KwUshort
                | TokenKind::KwShort
                | TokenKind::KwUint
                | TokenKind::KwInt
                | TokenKind::KwWchar
                | TokenKind::KwUlong
                | TokenKind::KwLong
                | TokenKind::KwFloat
                | TokenKind::KwDouble
                | TokenKind::KwBool
        )
    }

    pub fn is_qualifier(self) -> bool {
        matches!(self, TokenKind::KwConst | TokenKind::KwVolatile)
    }

    /// Panic-mode helper (spec.md §4.3): tokens that start a new top-level
    /// form.
    pub fn starts_top_level_form(self) -> bool {
        matches!(
            self,
            TokenKind::KwModule
                | TokenKind::KwImport
                | TokenKind::KwOpaque
                | TokenKind::KwStruct
                | TokenKind::KwUnion
                | TokenKind::KwEnum
                | TokenKind::KwTypedef
                | TokenKind::Id
        ) || self.is_type_keyword()
            || self.is_qualifier()
    }

    /// Panic-mode helper: tokens that start a new statement.
    pub fn starts_statement(self) -> bool {
        matches!(
            self,
            TokenKind::KwIf
                | TokenKind::KwWhile
                | TokenKind::KwDo
                | TokenKind::KwFor
                | TokenKind::KwSwitch
                | TokenKind::KwBreak
                | TokenKind::KwContinue
                | TokenKind::KwReturn
                | TokenKind::KwAsm
                | TokenKind::LBrace
                | TokenKind::KwOpaque
                | TokenKind::KwStruct
                | TokenKind::KwUnion
                | TokenKind::KwEnum
                | TokenKind::KwTypedef
        ) || self.is_type_keyword()
            || self.is_qualifier()
    }
}

/// Maximal-munch keyword reclassification for an already-scanned
/// identifier span (spec.md §4.1).
pub fn classify_keyword(word: &str) -> Option<TokenKind> {
    Some(match word {
        "module" => TokenKind::KwModule,
        "import" => TokenKind::KwImport,
        "opaque" => TokenKind::KwOpaque,
        "struct" => TokenKind::KwStruct,
        "union" => TokenKind::KwUnion,
        "enum" => TokenKind::KwEnum,
        "typedef" => TokenKind::KwTypedef,
        "if" => TokenKind::KwIf,
        "else" => TokenKind::KwElse,
        "while" => TokenKind::KwWhile,
        "do" => TokenKind::KwDo,
        "for" => TokenKind::KwFor,
        "switch" => TokenKind::KwSwitch,
        "case" => TokenKind::KwCase,
        "default" => TokenKind::KwDefault,
        "break" => TokenKind::KwBreak,
        "continue" => TokenKind::KwContinue,
        "return" => TokenKind::KwReturn,
        "asm" => TokenKind::KwAsm,
        "cast" => TokenKind::KwCast,
        "sizeof" => TokenKind::KwSizeof,
        "true" => TokenKind::KwTrue,
        "false" => TokenKind::KwFalse,
        "null" => TokenKind::KwNull,
        "void" => TokenKind::KwVoid,
        "ubyte" => TokenKind::KwUbyte,
        "byte" => TokenKind::KwByte,
        "char" => TokenKind::KwChar,
        "ushort" => TokenKind::KwUshort,
        "short" => TokenKind::KwShort,
        "uint" => TokenKind::KwUint,
        "int" => TokenKind::KwInt,
        "wchar" => TokenKind::KwWchar,
        "ulong" => TokenKind::KwUlong,
        "long" => TokenKind::KwLong,
        "float" => TokenKind::KwFloat,
        "double" => TokenKind::KwDouble,
        "bool" => TokenKind::KwBool,
        "const" => TokenKind::KwConst,
        "volatile" => TokenKind::KwVolatile,
        _ => return None,
    })
}
