//! Front-end crate root (spec.md §1-§2): wires the lexer, two-phase
//! parser, symbol-table builder, and type checker into a three-pass
//! pipeline a driver can run over a whole file list.
//!
//! Grounded on `compiler_frontend::mod.rs`'s `CompilerFrontend`, which
//! owns a project config plus a shared string table and drives its own
//! multi-pass compilation the same way `Pipeline` does here — minus the
//! host-function registry and IR/codegen stages, out of scope for a
//! front-end-only crate (spec.md §1 Non-goals).

pub mod ast;
pub mod diagnostics;
pub mod interning;
pub mod parser;
pub mod scoped_id;
pub mod stab_builder;
pub mod symtab;
pub mod token;
pub mod typeck;
pub mod types;

pub use stab_builder::{FileEntry, FileList, FileSource};

use diagnostics::error::{CompileError, CompilerMessages, PassOutcome};
use diagnostics::location::SourceLoc;
use diagnostics::policy::Policy;
use interning::StringTable;
use parser::late::{late_parse_deferred_expr, late_parse_function_body};
use parser::skim::skim_file;
use symtab::{Arena, Environment, FileScope};
use token::lexer::LexerState;

/// Owns everything that outlives a single file list: the warning policy,
/// the shared string table, and the symbol-table arena (spec.md §3:
/// "owned by a single process-wide file list" for the entries, here
/// scoped to one `Pipeline` instead of a process-wide global since this
/// crate is a library, not the whole compiler binary).
pub struct Pipeline {
    policy: Policy,
    pub table: StringTable,
    pub arena: Arena,
}

impl Pipeline {
    pub fn new(policy: Policy) -> Self {
        Self { policy, table: StringTable::new(), arena: Arena::new() }
    }

    /// Pass 1 (spec.md §4.3): opens and lexes every source, skim-parsing
    /// each into its `File` AST with function bodies and top-level
    /// initialisers captured unparsed. A source that fails to open is
    /// recorded as an error against a synthetic location and dropped from
    /// the returned list rather than aborting the whole pass.
    pub fn lex_and_skim(&mut self, files: Vec<FileSource>, messages: &mut CompilerMessages) -> FileList {
        let mut entries = Vec::with_capacity(files.len());
        for source in files {
            let lexer = match LexerState::open(&source.path) {
                Ok(lexer) => lexer,
                Err(err) => {
                    messages.push_error(CompileError::internal(
                        format!("cannot open {}: {err}", source.path.display()),
                        SourceLoc::synthetic(),
                    ));
                    continue;
                }
            };
            let errored_opening = lexer.errored;
            let ast = skim_file(lexer, source.path.clone(), &mut self.table, messages);
            entries.push(FileEntry { source, ast, errored: errored_opening, implicit_import: None });
        }
        FileList { entries }
    }

    /// Pass 2 (spec.md §4.4): runs symbol-table construction Stages A-E
    /// over the whole file list.
    pub fn build_symbol_tables(&mut self, files: &mut FileList, messages: &mut CompilerMessages) -> PassOutcome {
        stab_builder::build_symbol_tables(files, &mut self.table, &mut self.arena, &self.policy, messages)
    }

    /// Pass 3 (spec.md §4.3, §4.5, §4.6): re-enters every captured
    /// function body and deferred top-level initialiser now that the
    /// symbol table is live, then type-checks the resulting statements
    /// and expressions.
    pub fn late_parse_and_check(&mut self, files: &mut FileList, messages: &mut CompilerMessages) -> PassOutcome {
        let before: Vec<bool> = files.entries.iter().map(|f| f.errored).collect();

        for fi in 0..files.entries.len() {
            let implicit_import = files.entries[fi].implicit_import;
            let file_scope_snapshot = files.entries[fi].ast.top_level_scope.clone();
            let implicit_snapshot: Option<FileScope> =
                implicit_import.map(|idx| files.entries[idx].ast.top_level_scope.clone());
            let path = files.entries[fi].source.path.clone();

            let item_count = files.entries[fi].ast.items.len();
            for ji in 0..item_count {
                late_parse_top_level_item(
                    files,
                    fi,
                    ji,
                    &path,
                    &file_scope_snapshot,
                    implicit_snapshot.as_ref(),
                    &mut self.table,
                    &mut self.arena,
                    messages,
                );
            }
        }

        typeck::check_files(files, &self.table, &mut self.arena, &self.policy, messages);

        let newly_errored = files.entries.iter().zip(&before).any(|(after, was)| after.errored && !was);
        if newly_errored {
            PassOutcome::failed()
        } else {
            PassOutcome::ok()
        }
    }
}

fn late_parse_top_level_item(
    files: &mut FileList,
    file_idx: usize,
    item_idx: usize,
    path: &std::path::Path,
    file_scope: &FileScope,
    implicit_scope: Option<&FileScope>,
    table: &mut StringTable,
    arena: &mut Arena,
    messages: &mut CompilerMessages,
) {
    let mut env = Environment::new(file_scope, implicit_scope, Vec::new());
    match &mut files.entries[file_idx].ast.items[item_idx] {
        ast::TopLevel::FunctionDefinition { body: ast::Body::Unparsed(unparsed), params, .. } => {
            env.push_scope();
            for param in params.iter() {
                if let Some(entry) = param.entry {
                    env.declare(param.name.scoped.last().expect("plain parameter name"), entry);
                }
            }
            let stmt = late_parse_function_body(unparsed, path, table, &mut env, arena, messages);
            env.pop_scope();
            if let ast::TopLevel::FunctionDefinition { body, .. } = &mut files.entries[file_idx].ast.items[item_idx] {
                *body = ast::Body::Parsed(Box::new(stmt));
            }
        }
        ast::TopLevel::VariableDefinition { initializer: Some(ast::DeferredExpr::Unparsed(unparsed)), .. } => {
            let expr = late_parse_deferred_expr(unparsed, path, table, &env, arena, messages);
            if let ast::TopLevel::VariableDefinition { initializer, .. } = &mut files.entries[file_idx].ast.items[item_idx] {
                *initializer = Some(ast::DeferredExpr::Parsed(expr));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diagnostics::policy::Policy;
    use std::io::Write;

    fn write_source(dir: &tempfile::TempDir, name: &str, text: &str) -> FileSource {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
        FileSource::from_path(path)
    }

    #[test]
    fn file_source_classifies_by_extension() {
        let td = FileSource::from_path("geom.td");
        let tc = FileSource::from_path("geom.tc");
        assert!(!td.is_code);
        assert!(tc.is_code);
    }

    #[test]
    fn full_pipeline_compiles_a_trivial_program() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_source(
            &dir,
            "main.tc",
            "module main;\nint add(int a, int b) { return a + b; }\n",
        );

        let mut pipeline = Pipeline::new(Policy::default_policy());
        let mut messages = CompilerMessages::new();
        let mut files = pipeline.lex_and_skim(vec![src], &mut messages);
        let stab_outcome = pipeline.build_symbol_tables(&mut files, &mut messages);
        assert!(!stab_outcome.errored, "{:?}", messages.errors);
        let check_outcome = pipeline.late_parse_and_check(&mut files, &mut messages);
        assert!(!check_outcome.errored, "{:?}", messages.errors);
    }
}
