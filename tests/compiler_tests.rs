//! Corpus tests: every file under `testFiles/accepted` must compile clean
//! through all three passes; every file under `testFiles/rejected` must
//! produce at least one diagnostic by the time `late_parse_and_check` runs.
//!
//! Mirrors the teacher's `test_all_examples_in_folder` shape: walk a
//! directory with `std::fs::read_dir`, run the whole pipeline per file,
//! assert on the aggregate outcome rather than hand-writing one test per
//! fixture.

use std::path::{Path, PathBuf};

use tlang_frontend::diagnostics::error::CompilerMessages;
use tlang_frontend::diagnostics::policy::Policy;
use tlang_frontend::{FileSource, Pipeline};

fn tc_files_in(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return out,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("tc") {
            out.push(path);
        }
    }
    out.sort();
    out
}

fn compile(path: PathBuf) -> (bool, CompilerMessages) {
    let mut pipeline = Pipeline::new(Policy::default_policy());
    let mut messages = CompilerMessages::new();
    let mut files = pipeline.lex_and_skim(vec![FileSource::from_path(path)], &mut messages);
    let stab_outcome = pipeline.build_symbol_tables(&mut files, &mut messages);
    if stab_outcome.errored {
        return (true, messages);
    }
    let check_outcome = pipeline.late_parse_and_check(&mut files, &mut messages);
    (check_outcome.errored || messages.has_errors(), messages)
}

#[test]
fn accepted_programs_compile_without_errors() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/testFiles/accepted");
    let files = tc_files_in(&dir);
    assert!(!files.is_empty(), "no fixtures found under {}", dir.display());
    for path in files {
        let (errored, messages) = compile(path.clone());
        assert!(!errored, "{} was rejected: {:?}", path.display(), messages.errors);
    }
}

#[test]
fn rejected_programs_are_flagged() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/testFiles/rejected");
    let files = tc_files_in(&dir);
    assert!(!files.is_empty(), "no fixtures found under {}", dir.display());
    for path in files {
        let (errored, _) = compile(path.clone());
        assert!(errored, "{} was accepted but should have been rejected", path.display());
    }
}
