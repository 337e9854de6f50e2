//! Shared parser plumbing: a buffered token cursor offering up to
//! LL(2) lookahead on top of the lexer's single-token pushback
//! (spec.md §4.3: "The grammar is LL(k<=2)"), and the panic-mode
//! recovery helpers §4.3 enumerates.
//!
//! `Cursor<F>` is generic over where tokens come from so the same
//! lookahead/expect machinery serves both the skim parser (reading
//! straight from `LexerState`) and the late parser (reading from an
//! `UnparsedBody`'s captured token vector) — spec.md §9's redesign note
//! on modelling the unparsed body as "a restartable iterator with a
//! one-element holdback", generalised one step further here into a
//! small buffered queue so both passes share one parsing core.

pub mod expr;
pub mod late;
pub mod skim;

use crate::ast::UnparsedBody;
use crate::diagnostics::error::CompileError;
use crate::diagnostics::location::{SourceLoc, SourcePos};
use crate::token::kind::TokenKind;
use crate::token::lexer::{lex, LexerState};
use crate::token::Token;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Something that can be pulled from, one token at a time, for the
/// cursor to buffer.
pub trait TokenFeed {
    fn pull(&mut self) -> Token;
    fn errored(&self) -> bool {
        false
    }
    fn mark_errored(&mut self) {}
}

impl TokenFeed for LexerState {
    fn pull(&mut self) -> Token {
        lex(self)
    }
    fn errored(&self) -> bool {
        self.errored
    }
}

/// Feeds tokens from a captured unparsed body; once exhausted, yields a
/// synthetic EOF forever (late-parse bodies are always brace-delimited,
/// so running off the end means a genuine syntax error upstream).
pub struct BodyFeed<'a> {
    body: &'a mut UnparsedBody,
    errored: bool,
}

impl<'a> BodyFeed<'a> {
    pub fn new(body: &'a mut UnparsedBody) -> Self {
        Self { body, errored: false }
    }
}

impl<'a> TokenFeed for BodyFeed<'a> {
    fn pull(&mut self) -> Token {
        self.body.next().unwrap_or_else(|| Token::new(TokenKind::Eof, 0, 0, None))
    }
    fn errored(&self) -> bool {
        self.errored
    }
    fn mark_errored(&mut self) {
        self.errored = true;
    }
}

pub struct Cursor<F: TokenFeed> {
    feed: F,
    buffer: VecDeque<Token>,
    path: PathBuf,
}

impl<F: TokenFeed> Cursor<F> {
    pub fn new(feed: F, path: impl Into<PathBuf>) -> Self {
        Self { feed, buffer: VecDeque::new(), path: path.into() }
    }

    fn fill(&mut self, upto: usize) {
        while self.buffer.len() <= upto {
            let tok = self.feed.pull();
            self.buffer.push_back(tok);
        }
    }

    pub fn peek(&mut self) -> &Token {
        self.fill(0);
        &self.buffer[0]
    }

    pub fn peek_at(&mut self, n: usize) -> &Token {
        self.fill(n);
        &self.buffer[n]
    }

    pub fn peek_kind(&mut self) -> TokenKind {
        self.peek().kind
    }

    pub fn advance(&mut self) -> Token {
        self.fill(0);
        self.buffer.pop_front().expect("just filled")
    }

    pub fn check(&mut self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn loc_at(&self, pos: SourcePos) -> SourceLoc {
        SourceLoc::new(self.path.clone(), pos)
    }

    pub fn mark_errored(&mut self) {
        self.feed.mark_errored();
    }

    pub fn is_errored(&self) -> bool {
        self.feed.errored()
    }

    /// Expects `kind`, consuming it; on mismatch records a syntax error
    /// at the current position, marks the file errored, and returns
    /// `None` without consuming the unexpected token (so panic-mode
    /// recovery can inspect it).
    pub fn expect(&mut self, kind: TokenKind, what: &str, messages: &mut crate::diagnostics::error::CompilerMessages) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            let tok = self.peek().clone();
            let loc = self.loc_at(SourcePos::new(tok.line, tok.column));
            messages.push_error(CompileError::syntax(format!("expected {what}, found {:?}", tok.kind), loc));
            self.mark_errored();
            None
        }
    }
}

pub type SkimCursor = Cursor<LexerState>;

pub fn new_skim_cursor(lexer: LexerState, path: impl Into<PathBuf>) -> SkimCursor {
    Cursor::new(lexer, path)
}

pub fn new_body_cursor<'a>(body: &'a mut UnparsedBody, path: impl Into<PathBuf>) -> Cursor<BodyFeed<'a>> {
    Cursor::new(BodyFeed::new(body), path)
}

/// Panic-mode recovery: consume tokens until one of `stop` is the next
/// token (not consumed) or EOF is reached (spec.md §4.3).
pub fn recover_until<F: TokenFeed>(cursor: &mut Cursor<F>, stop: impl Fn(TokenKind) -> bool) {
    loop {
        let kind = cursor.peek_kind();
        if kind == TokenKind::Eof || stop(kind) {
            return;
        }
        cursor.advance();
    }
}

/// Top-level resumption point: stop at the start of a new top-level form
/// or EOF.
pub fn recover_top_level<F: TokenFeed>(cursor: &mut Cursor<F>) {
    recover_until(cursor, TokenKind::starts_top_level_form);
}

/// Statement resumption point: stop at `;`, a statement-starting
/// keyword, `{`, `}`, or EOF. The boundary `;` is consumed (it ends the
/// broken statement); the others are left for the caller to handle.
pub fn recover_statement<F: TokenFeed>(cursor: &mut Cursor<F>) {
    loop {
        let kind = cursor.peek_kind();
        if kind == TokenKind::Eof || kind == TokenKind::LBrace || kind == TokenKind::RBrace || kind.starts_statement() {
            return;
        }
        if kind == TokenKind::Semi {
            cursor.advance();
            return;
        }
        cursor.advance();
    }
}

/// struct/union body resumption: stop at `;`, a field-type start, `}`,
/// or EOF.
pub fn recover_aggregate_body<F: TokenFeed>(cursor: &mut Cursor<F>) {
    loop {
        let kind = cursor.peek_kind();
        if kind == TokenKind::Eof || kind == TokenKind::RBrace || kind.is_type_keyword() || kind == TokenKind::Id {
            return;
        }
        if kind == TokenKind::Semi {
            cursor.advance();
            return;
        }
        cursor.advance();
    }
}

/// enum body resumption: stop at `,`, `}`, or EOF.
pub fn recover_enum_body<F: TokenFeed>(cursor: &mut Cursor<F>) {
    recover_until(cursor, |k| matches!(k, TokenKind::Comma | TokenKind::RBrace));
}

/// switch body resumption: stop at statement-starting keywords, `case`,
/// `default`, or EOF.
pub fn recover_switch_body<F: TokenFeed>(cursor: &mut Cursor<F>) {
    recover_until(cursor, |k| k.starts_statement() || matches!(k, TokenKind::KwCase | TokenKind::KwDefault));
}
