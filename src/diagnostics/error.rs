//! Unified compiler error type.
//!
//! Grounded on `compiler_frontend::compiler_errors::CompileError`, trimmed
//! of the LLM/LSP metadata map (out of scope for this spec) and of the
//! macro-heavy `return_*_error!` construction API: plain constructors and
//! a builder-style `with_note` stand in, since the checkers in this crate
//! mostly push errors into an accumulator rather than bailing out of a
//! function with an early `return`.

use crate::diagnostics::location::SourceLoc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Import,
    Resolution,
    Type,
    Internal,
}

impl ErrorKind {
    fn label(self) -> &'static str {
        match self {
            ErrorKind::Lexical => "error",
            ErrorKind::Syntax => "error",
            ErrorKind::Import => "error",
            ErrorKind::Resolution => "error",
            ErrorKind::Type => "error",
            ErrorKind::Internal => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
    pub location: SourceLoc,
    pub kind: ErrorKind,
    pub notes: Vec<(String, SourceLoc)>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, location: SourceLoc) -> Self {
        Self {
            message: message.into(),
            location,
            kind,
            notes: Vec::new(),
        }
    }

    pub fn lexical(message: impl Into<String>, location: SourceLoc) -> Self {
        Self::new(ErrorKind::Lexical, message, location)
    }

    pub fn syntax(message: impl Into<String>, location: SourceLoc) -> Self {
        Self::new(ErrorKind::Syntax, message, location)
    }

    pub fn import(message: impl Into<String>, location: SourceLoc) -> Self {
        Self::new(ErrorKind::Import, message, location)
    }

    pub fn resolution(message: impl Into<String>, location: SourceLoc) -> Self {
        Self::new(ErrorKind::Resolution, message, location)
    }

    pub fn ty(message: impl Into<String>, location: SourceLoc) -> Self {
        Self::new(ErrorKind::Type, message, location)
    }

    pub fn internal(message: impl Into<String>, location: SourceLoc) -> Self {
        Self::new(ErrorKind::Internal, message, location)
    }

    pub fn with_note(mut self, message: impl Into<String>, location: SourceLoc) -> Self {
        self.notes.push((message.into(), location));
        self
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }
}

#[derive(Debug, Clone)]
pub struct CompileWarning {
    pub message: String,
    pub location: SourceLoc,
}

impl CompileWarning {
    pub fn new(message: impl Into<String>, location: SourceLoc) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

/// The accumulated output of one pass over the file list, mirroring the
/// teacher's `CompilerMessages { errors, warnings }`.
#[derive(Debug, Clone, Default)]
pub struct CompilerMessages {
    pub errors: Vec<CompileError>,
    pub warnings: Vec<CompileWarning>,
}

impl CompilerMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_error(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    pub fn push_warning(&mut self, warning: CompileWarning) {
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, other: CompilerMessages) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Returned from each pipeline stage (spec.md §6: "a stage returns 0 on
/// success, -1 if any file's sticky `errored` flag became true").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOutcome {
    pub errored: bool,
}

impl PassOutcome {
    pub fn ok() -> Self {
        Self { errored: false }
    }

    pub fn failed() -> Self {
        Self { errored: true }
    }

    pub fn exit_code(self) -> i32 {
        if self.errored { -1 } else { 0 }
    }
}
