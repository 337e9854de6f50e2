//! Source positions, generalising the teacher's `CharPosition`/
//! `TextLocation` (`compiler_frontend::tokenizer::tokens`) down to the
//! single-point locations this spec's diagnostics actually need: every
//! token, AST node and diagnostic carries one `(line, column)`, not a
//! start/end range.

use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A position tied to the file it occurs in, ready to print as
/// `PATH:LINE:COLUMN`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SourceLoc {
    pub path: PathBuf,
    pub pos: SourcePos,
}

impl SourceLoc {
    pub fn new(path: impl Into<PathBuf>, pos: SourcePos) -> Self {
        Self {
            path: path.into(),
            pos,
        }
    }

    pub fn synthetic() -> Self {
        Self::default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.path.display(),
            self.pos.line,
            self.pos.column
        )
    }
}
