//! Maximal-munch lexer over a memory-mapped source file (spec.md §4.1),
//! grounded directly on the original T compiler's `lexerStateInit`/`lex`/
//! `unLex`/`lexerStateUninit` resource lifecycle
//! (`original_source/src/main/lexer/lexer.c`), re-expressed with RAII
//! instead of manual `mmap`/`munmap` pairing.
//!
//! The teacher crate has no mmap-backed lexer of its own (its tokenizer
//! reads a `String` it already owns), so the memory-mapping itself is
//! grounded on `memmap2` usage elsewhere in the retrieved pack
//! (`rustc_data_structures`) rather than on the teacher; the pushback
//! slot, line/column bookkeeping and panic-mode-friendly token shape
//! follow the teacher's general "hold one token of lookahead" idiom in
//! `compiler_frontend::tokenizer`.

use crate::token::kind::{classify_keyword, TokenKind};
use crate::token::Token;
use memmap2::Mmap;
use std::path::{Path, PathBuf};

/// Lexer state for a single source file: a memory-mapped byte buffer, a
/// byte-offset cursor, 1-based line/column counters, and a single
/// pushback slot.
///
/// The pushback slot is a scoped resource: at most one token may be
/// pushed back at a time, and it must be empty again before the state is
/// dropped (the original's `assert(!pushedBack)` in `unLex`, and the
/// conditional `tokenUninit` in `lexerStateUninit`).
pub struct LexerState {
    mmap: Option<Mmap>,
    len: usize,
    path: PathBuf,
    pos: usize,
    line: u32,
    column: u32,
    pushback: Option<Token>,
    /// Sticky per-file error flag (spec.md §7: "once set it is never
    /// cleared"); sites outside the lexer OR further bad tokens into it.
    pub errored: bool,
}

impl LexerState {
    /// Maps `path` into memory read-only. Mirrors `lexerStateInit`'s
    /// `open`/`fstat`/`mmap` sequence; the file descriptor itself is
    /// dropped immediately after mapping, exactly as the original closes
    /// it right after `mmap` succeeds.
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let file = std::fs::File::open(&path)?;
        let len = file.metadata()?.len() as usize;
        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: the file is opened read-only for the lifetime of
            // this mapping and not concurrently truncated by this
            // process; standard caveat of all `memmap2::Mmap::map` uses.
            Some(unsafe { Mmap::map(&file)? })
        };
        Ok(Self {
            mmap,
            len,
            path,
            pos: 0,
            line: 1,
            column: 1,
            pushback: None,
            errored: false,
        })
    }

    /// Builds lexer state directly over an in-memory source string, via
    /// an anonymous mapping, so unit and property tests don't need a
    /// real file on disk.
    pub fn from_source_for_test(path: impl Into<PathBuf>, source: &str) -> std::io::Result<Self> {
        let len = source.len();
        let mmap = if len == 0 {
            None
        } else {
            let mut anon = memmap2::MmapMut::map_anon(len)?;
            anon[..len].copy_from_slice(source.as_bytes());
            Some(anon.make_read_only()?)
        };
        Ok(Self {
            mmap,
            len,
            path: path.into(),
            pos: 0,
            line: 1,
            column: 1,
            pushback: None,
            errored: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bytes(&self) -> &[u8] {
        match &self.mmap {
            Some(m) => &m[..self.len],
            None => &[],
        }
    }

    /// Decodes the character starting at byte offset `pos`, returning it
    /// with its UTF-8 length. `None` at or past end of file.
    fn char_at(&self, pos: usize) -> Option<(char, usize)> {
        let bytes = self.bytes();
        if pos >= bytes.len() {
            return None;
        }
        let window_end = (pos + 4).min(bytes.len());
        match std::str::from_utf8(&bytes[pos..window_end]) {
            Ok(s) => s.chars().next().map(|c| (c, c.len_utf8())),
            Err(e) => {
                let valid = e.valid_up_to();
                if valid == 0 {
                    None
                } else {
                    std::str::from_utf8(&bytes[pos..pos + valid])
                        .ok()
                        .and_then(|s| s.chars().next())
                        .map(|c| (c, c.len_utf8()))
                }
            }
        }
    }

    fn nth_char(&self, n: usize) -> Option<char> {
        let mut p = self.pos;
        let mut found = None;
        for _ in 0..=n {
            let (c, len) = self.char_at(p)?;
            found = Some(c);
            p += len;
        }
        found
    }

    fn peek(&self) -> Option<char> {
        self.nth_char(0)
    }

    fn peek2(&self) -> Option<char> {
        self.nth_char(1)
    }

    /// Advances the cursor past the current character, updating line and
    /// column (tabs count as a single column, per spec.md §4.1).
    fn bump(&mut self) -> Option<char> {
        let (c, len) = self.char_at(self.pos)?;
        self.pos += len;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn slice(&self, start: usize, end: usize) -> &str {
        std::str::from_utf8(&self.bytes()[start..end]).expect("char boundaries are tracked exactly")
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => break,
                            Some('*') if self.peek2() == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_identifier_or_keyword(&mut self, start: usize) -> (TokenKind, Option<String>) {
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                self.bump();
            } else {
                break;
            }
        }
        let text = self.slice(start, self.pos).to_string();
        match classify_keyword(&text) {
            Some(kind) => (kind, None),
            None => (TokenKind::Id, Some(text)),
        }
    }

    fn scan_number(&mut self, first: char, start: usize) -> (TokenKind, Option<String>) {
        if first == '0' {
            match self.peek() {
                Some('b') => {
                    self.bump();
                    let digits_start = self.pos;
                    self.consume_while(|c| c.is_ascii_alphanumeric());
                    let digits = self.slice(digits_start, self.pos);
                    let kind = if !digits.is_empty() && digits.chars().all(|c| c == '0' || c == '1') {
                        TokenKind::LitIntBinary
                    } else {
                        self.errored = true;
                        TokenKind::BadIntBinary
                    };
                    (kind, Some(self.slice(start, self.pos).to_string()))
                }
                Some('x') => {
                    self.bump();
                    let digits_start = self.pos;
                    self.consume_while(|c| c.is_ascii_alphanumeric());
                    let digits = self.slice(digits_start, self.pos);
                    let kind = if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()) {
                        TokenKind::LitIntHex
                    } else {
                        self.errored = true;
                        TokenKind::BadIntHex
                    };
                    (kind, Some(self.slice(start, self.pos).to_string()))
                }
                Some(c) if ('0'..='7').contains(&c) => {
                    self.consume_while(|c| ('0'..='7').contains(&c));
                    (TokenKind::LitIntOctal, Some(self.slice(start, self.pos).to_string()))
                }
                _ => (TokenKind::LitInt0, Some("0".to_string())),
            }
        } else {
            self.consume_while(|c| c.is_ascii_digit());
            if self.peek() == Some('.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
                self.consume_while(|c| c.is_ascii_digit());
                let is_float = matches!(self.peek(), Some('f') | Some('F'));
                if is_float {
                    self.bump();
                }
                let kind = if is_float { TokenKind::LitFloat } else { TokenKind::LitDouble };
                (kind, Some(self.slice(start, self.pos).to_string()))
            } else {
                (TokenKind::LitIntDecimal, Some(self.slice(start, self.pos).to_string()))
            }
        }
    }

    fn consume_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if pred(c) {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// Consumes one escape body after a `\` already bumped past, returning
    /// the raw text of the escape (without the leading backslash) when
    /// valid. Literal content is kept unexpanded (spec.md §6): the AST
    /// builder is responsible for decoding `\n`, `\x41`, and so on.
    fn scan_escape(&mut self, wide: bool) -> Option<String> {
        match self.peek() {
            Some(c @ ('n' | 'r' | 't' | '0' | '\\' | '\'' | '"')) => {
                self.bump();
                Some(c.to_string())
            }
            Some('x') => {
                self.bump();
                let mut hex = String::new();
                for _ in 0..2 {
                    match self.peek() {
                        Some(h) if h.is_ascii_hexdigit() => {
                            hex.push(h);
                            self.bump();
                        }
                        _ => break,
                    }
                }
                if hex.len() == 2 {
                    Some(format!("x{hex}"))
                } else {
                    None
                }
            }
            Some('u') if wide => {
                self.bump();
                let mut hex = String::new();
                for _ in 0..8 {
                    match self.peek() {
                        Some(h) if h.is_ascii_hexdigit() => {
                            hex.push(h);
                            self.bump();
                        }
                        _ => break,
                    }
                }
                if hex.len() == 8 {
                    Some(format!("u{hex}"))
                } else {
                    None
                }
            }
            Some(_) => {
                self.bump();
                None
            }
            None => None,
        }
    }

    /// Scans a (possibly wide) char literal; the opening `'` has already
    /// been consumed by the caller.
    fn scan_char_literal(&mut self, wide: bool) -> (TokenKind, Option<String>) {
        let mut content = String::new();
        let mut bad = false;

        match self.peek() {
            None => bad = true,
            Some('\'') => {
                self.bump();
                bad = true;
            }
            Some('\\') => {
                self.bump();
                match self.scan_escape(wide) {
                    Some(text) => {
                        content.push('\\');
                        content.push_str(&text);
                    }
                    None => bad = true,
                }
            }
            Some(c) => {
                self.bump();
                content.push(c);
            }
        }

        if !bad {
            match self.peek() {
                Some('\'') => {
                    self.bump();
                }
                _ => bad = true,
            }
        }

        if bad {
            // Recover up to the closing quote (or end of line/file) so the
            // next call to `lex` starts at a sane boundary.
            while let Some(c) = self.peek() {
                if c == '\'' {
                    self.bump();
                    break;
                }
                if c == '\n' {
                    break;
                }
                content.push(c);
                self.bump();
            }
            self.errored = true;
            (TokenKind::BadChar, Some(content))
        } else {
            let kind = if wide { TokenKind::LitWChar } else { TokenKind::LitChar };
            (kind, Some(content))
        }
    }

    /// Scans a (possibly wide) string literal; the opening `"` has
    /// already been consumed by the caller. An unterminated string stays
    /// a normal string token with the partial payload (spec.md §4.1); an
    /// invalid escape inside it becomes a bad-string token.
    fn scan_string_literal(&mut self, wide: bool) -> (TokenKind, Option<String>) {
        let mut content = String::new();
        let mut invalid_escape = false;

        loop {
            match self.peek() {
                None => {
                    self.errored = true;
                    break;
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\n') => {
                    self.errored = true;
                    break;
                }
                Some('\\') => {
                    self.bump();
                    match self.scan_escape(wide) {
                        Some(text) => {
                            content.push('\\');
                            content.push_str(&text);
                        }
                        None => {
                            invalid_escape = true;
                            self.errored = true;
                        }
                    }
                }
                Some(c) => {
                    self.bump();
                    content.push(c);
                }
            }
        }

        let kind = if invalid_escape {
            TokenKind::BadString
        } else if wide {
            TokenKind::LitWString
        } else {
            TokenKind::LitString
        };
        (kind, Some(content))
    }

    /// Longest-prefix-priority punctuation/operator matching (spec.md
    /// §4.1): each arm checks the longest candidate form first.
    fn scan_operator(&mut self, first: char) -> TokenKind {
        match first {
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LSquare,
            ']' => TokenKind::RSquare,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            '~' => TokenKind::Tilde,
            '^' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::XorAssign
                } else {
                    TokenKind::Caret
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::LAndAssign
                    } else {
                        TokenKind::LAndOp
                    }
                } else if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::AndAssign
                } else {
                    TokenKind::Amp
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::LOrAssign
                    } else {
                        TokenKind::LOrOp
                    }
                } else if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::OrAssign
                } else {
                    TokenKind::Bar
                }
            }
            '+' => {
                if self.peek() == Some('+') {
                    self.bump();
                    TokenKind::Inc
                } else if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::AddAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.peek() == Some('-') {
                    self.bump();
                    TokenKind::Dec
                } else if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::SubAssign
                } else if self.peek() == Some('>') {
                    self.bump();
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::MulAssign
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::DivAssign
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::ModAssign
                } else {
                    TokenKind::Percent
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            '<' => {
                if self.peek() == Some('<') {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::LShiftAssign
                    } else {
                        TokenKind::LShift
                    }
                } else if self.peek() == Some('=') {
                    self.bump();
                    if self.peek() == Some('>') {
                        self.bump();
                        TokenKind::Spaceship
                    } else {
                        TokenKind::LtEq
                    }
                } else {
                    TokenKind::LAngle
                }
            }
            '>' => {
                if self.peek() == Some('>') {
                    self.bump();
                    if self.peek() == Some('>') {
                        self.bump();
                        if self.peek() == Some('=') {
                            self.bump();
                            TokenKind::LrShiftAssign
                        } else {
                            TokenKind::LrShift
                        }
                    } else if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::ArShiftAssign
                    } else {
                        TokenKind::ArShift
                    }
                } else if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::GtEq
                } else {
                    TokenKind::RAngle
                }
            }
            ':' => {
                if self.peek() == Some(':') {
                    self.bump();
                    TokenKind::Scope
                } else {
                    TokenKind::Colon
                }
            }
            _ => {
                self.errored = true;
                TokenKind::Unknown
            }
        }
    }
}

impl Drop for LexerState {
    fn drop(&mut self) {
        debug_assert!(
            self.pushback.is_none(),
            "lexer state dropped with a pending pushback token"
        );
        // `self.mmap`'s own `Drop` unmaps the region; no manual `munmap`
        // call is needed the way the original's `lexerStateUninit` makes
        // one explicitly.
    }
}

/// Returns the next token, consuming a pushed-back token first if one is
/// waiting. Never fails to produce *a* token: a byte outside the grammar
/// becomes `TokenKind::Unknown` with `errored` set, rather than aborting
/// the scan (spec.md §7: lexical errors are always reported, never
/// fatal).
pub fn lex(state: &mut LexerState) -> Token {
    if let Some(tok) = state.pushback.take() {
        return tok;
    }

    state.skip_trivia();
    let start = state.pos;
    let start_line = state.line;
    let start_col = state.column;

    let Some(c) = state.bump() else {
        return Token::new(TokenKind::Eof, start_line, start_col, None);
    };

    let (kind, lexeme) = if c == '_' || c.is_alphabetic() {
        if c == 'w' && matches!(state.peek(), Some('\'') | Some('"')) {
            let wide_quote = state.bump().expect("peeked");
            if wide_quote == '\'' {
                state.scan_char_literal(true)
            } else {
                state.scan_string_literal(true)
            }
        } else {
            state.scan_identifier_or_keyword(start)
        }
    } else if c.is_ascii_digit() {
        state.scan_number(c, start)
    } else if c == '\'' {
        state.scan_char_literal(false)
    } else if c == '"' {
        state.scan_string_literal(false)
    } else {
        (state.scan_operator(c), None)
    };

    Token::new(kind, start_line, start_col, lexeme)
}

/// Pushes a token back onto the lexer so the next `lex` call returns it
/// again. Only one token of pushback is allowed at a time; calling this
/// twice in a row without an intervening `lex` is a programmer error
/// (mirrors the original's `assert(!pushedBack)`).
pub fn unlex(state: &mut LexerState, token: Token) {
    assert!(
        state.pushback.is_none(),
        "lexer: two successive pushbacks are a programmer error"
    );
    state.pushback = Some(token);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str) -> Vec<Token> {
        let mut state = LexerState::from_source_for_test("test.tc", source).unwrap();
        let mut tokens = Vec::new();
        loop {
            let tok = lex(&mut state);
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        tokens
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        let tokens = lex_all("module foo import x");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::KwModule,
                TokenKind::Id,
                TokenKind::KwImport,
                TokenKind::Id,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[1].lexeme_str(), Some("foo"));
        assert_eq!(tokens[3].lexeme_str(), Some("x"));
    }

    #[test]
    fn isolated_zero_is_its_own_kind() {
        let tokens = lex_all("0");
        assert_eq!(tokens[0].kind, TokenKind::LitInt0);
        assert_eq!(tokens[0].lexeme_str(), Some("0"));
    }

    #[test]
    fn octal_literal_keeps_the_leading_zero_in_its_lexeme() {
        let tokens = lex_all("0755");
        assert_eq!(tokens[0].kind, TokenKind::LitIntOctal);
        assert_eq!(tokens[0].lexeme_str(), Some("0755"));
    }

    #[test]
    fn leading_zero_followed_by_non_octal_splits_into_two_literals() {
        let tokens = lex_all("078");
        assert_eq!(tokens.len(), 3); // octal, decimal, eof
        assert_eq!(tokens[0].kind, TokenKind::LitIntOctal);
        assert_eq!(tokens[0].lexeme_str(), Some("07"));
        assert_eq!(tokens[1].kind, TokenKind::LitIntDecimal);
        assert_eq!(tokens[1].lexeme_str(), Some("8"));
    }

    #[test]
    fn binary_and_hex_literals() {
        let tokens = lex_all("0b101 0x1A");
        assert_eq!(tokens[0].kind, TokenKind::LitIntBinary);
        assert_eq!(tokens[0].lexeme_str(), Some("0b101"));
        assert_eq!(tokens[1].kind, TokenKind::LitIntHex);
        assert_eq!(tokens[1].lexeme_str(), Some("0x1A"));
    }

    #[test]
    fn malformed_binary_and_hex_recover_as_bad_tokens() {
        let tokens = lex_all("0b2 0x");
        assert_eq!(tokens[0].kind, TokenKind::BadIntBinary);
        assert_eq!(tokens[1].kind, TokenKind::BadIntHex);
    }

    #[test]
    fn float_and_double_literals() {
        let tokens = lex_all("1.5f 2.25");
        assert_eq!(tokens[0].kind, TokenKind::LitFloat);
        assert_eq!(tokens[1].kind, TokenKind::LitDouble);
    }

    #[test]
    fn decimal_then_dot_without_fraction_is_not_a_float() {
        let tokens = lex_all("5.foo");
        assert_eq!(tokens[0].kind, TokenKind::LitIntDecimal);
        assert_eq!(tokens[1].kind, TokenKind::Dot);
        assert_eq!(tokens[2].kind, TokenKind::Id);
    }

    #[test]
    fn string_and_char_literals_keep_escapes_unexpanded() {
        let tokens = lex_all(r#" "a\nb" 'x' "#);
        assert_eq!(tokens[0].kind, TokenKind::LitString);
        assert_eq!(tokens[0].lexeme_str(), Some("a\\nb"));
        assert_eq!(tokens[1].kind, TokenKind::LitChar);
        assert_eq!(tokens[1].lexeme_str(), Some("x"));
    }

    #[test]
    fn wide_literals_strip_the_w_prefix_from_the_lexeme() {
        let tokens = lex_all(r#"w"hi" w'c'"#);
        assert_eq!(tokens[0].kind, TokenKind::LitWString);
        assert_eq!(tokens[0].lexeme_str(), Some("hi"));
        assert_eq!(tokens[1].kind, TokenKind::LitWChar);
        assert_eq!(tokens[1].lexeme_str(), Some("c"));
    }

    #[test]
    fn unterminated_string_stays_a_string_token_but_sets_errored() {
        let mut state = LexerState::from_source_for_test("test.tc", "\"abc").unwrap();
        let tok = lex(&mut state);
        assert_eq!(tok.kind, TokenKind::LitString);
        assert_eq!(tok.lexeme_str(), Some("abc"));
        assert!(state.errored);
    }

    #[test]
    fn unterminated_char_is_a_bad_token() {
        let mut state = LexerState::from_source_for_test("test.tc", "'a").unwrap();
        let tok = lex(&mut state);
        assert_eq!(tok.kind, TokenKind::BadChar);
        assert!(state.errored);
    }

    #[test]
    fn invalid_escape_in_string_makes_it_bad() {
        let mut state = LexerState::from_source_for_test("test.tc", r#""a\qb""#).unwrap();
        let tok = lex(&mut state);
        assert_eq!(tok.kind, TokenKind::BadString);
        assert!(state.errored);
    }

    #[test]
    fn longest_prefix_operator_matching() {
        let tokens = lex_all("<<= << <= < :: : -> ++ -- && || <=>");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::LShiftAssign,
                TokenKind::LShift,
                TokenKind::LtEq,
                TokenKind::LAngle,
                TokenKind::Scope,
                TokenKind::Colon,
                TokenKind::Arrow,
                TokenKind::Inc,
                TokenKind::Dec,
                TokenKind::LAndOp,
                TokenKind::LOrOp,
                TokenKind::Spaceship,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn line_comments_and_block_comments_are_skipped() {
        let tokens = lex_all("a // comment\nb /* block\ncomment */ c");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::Id, TokenKind::Id, TokenKind::Id, TokenKind::Eof]);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 3);
    }

    #[test]
    fn tabs_count_as_a_single_column() {
        let tokens = lex_all("\tx");
        assert_eq!(tokens[0].column, 2);
    }

    #[test]
    fn pushback_round_trips() {
        let mut state = LexerState::from_source_for_test("test.tc", "a b").unwrap();
        let first = lex(&mut state);
        let second = lex(&mut state);
        unlex(&mut state, second.clone());
        let replayed = lex(&mut state);
        assert_eq!(replayed, second);
        let third = lex(&mut state);
        assert_eq!(third.kind, TokenKind::Eof);
        let _ = first;
    }

    #[test]
    #[should_panic(expected = "programmer error")]
    fn double_pushback_panics() {
        let mut state = LexerState::from_source_for_test("test.tc", "a b").unwrap();
        let first = lex(&mut state);
        let second = lex(&mut state);
        unlex(&mut state, first);
        unlex(&mut state, second);
    }

    #[test]
    fn unknown_byte_is_reported_but_scanning_continues() {
        let tokens = lex_all("a @ b");
        assert_eq!(tokens[0].kind, TokenKind::Id);
        assert_eq!(tokens[1].kind, TokenKind::Unknown);
        assert_eq!(tokens[2].kind, TokenKind::Id);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn ident() -> impl Strategy<Value = String> {
        "[a-zA-Z_][a-zA-Z0-9_]{0,8}".prop_filter("not a keyword", |s| classify_keyword(s).is_none())
    }

    proptest! {
        #[test]
        fn unlex_then_lex_returns_an_equal_token(idents in proptest::collection::vec(ident(), 1..6)) {
            let source = idents.join(" ");
            let mut state = LexerState::from_source_for_test("prop.tc", &source).unwrap();
            let first = lex(&mut state);
            unlex(&mut state, first.clone());
            let replayed = lex(&mut state);
            prop_assert_eq!(replayed, first);
        }
    }
}
