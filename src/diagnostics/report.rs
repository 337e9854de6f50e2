//! Diagnostic rendering: `PATH:LINE:COLUMN: (error|warning|note): MESSAGE`.
//!
//! Grounded on the overall shape of `compiler_messages::display_messages`
//! (`print_compiler_messages` walks errors then warnings, one print
//! function per message) but follows spec.md §6's plain, greppable wire
//! format instead of the teacher's decorative `saying`-crate banners,
//! which this spec's deterministic diagnostic contract rules out.

use crate::diagnostics::error::{CompileError, CompileWarning, CompilerMessages};
use std::io::Write;

pub fn print_diagnostics(messages: &CompilerMessages) {
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    write_diagnostics(&mut handle, messages).ok();
}

pub fn write_diagnostics(out: &mut impl Write, messages: &CompilerMessages) -> std::io::Result<()> {
    for error in &messages.errors {
        write_error(out, error)?;
    }
    for warning in &messages.warnings {
        write_warning(out, warning)?;
    }
    Ok(())
}

fn write_error(out: &mut impl Write, error: &CompileError) -> std::io::Result<()> {
    writeln!(out, "{}: error: {}", error.location, error.message)?;
    for (note, location) in &error.notes {
        writeln!(out, "{}: note: {}", location, note)?;
    }
    Ok(())
}

fn write_warning(out: &mut impl Write, warning: &CompileWarning) -> std::io::Result<()> {
    writeln!(out, "{}: warning: {}", warning.location, warning.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::location::{SourceLoc, SourcePos};

    #[test]
    fn formats_error_with_note() {
        let loc = SourceLoc::new("a.tc", SourcePos::new(3, 5));
        let note_loc = SourceLoc::new("b.td", SourcePos::new(1, 1));
        let error = CompileError::syntax("expected ';'", loc).with_note("declared here", note_loc);

        let mut messages = CompilerMessages::new();
        messages.push_error(error);

        let mut buf = Vec::new();
        write_diagnostics(&mut buf, &messages).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(
            text,
            "a.tc:3:5: error: expected ';'\nb.td:1:1: note: declared here\n"
        );
    }

    #[test]
    fn formats_warning() {
        let loc = SourceLoc::new("a.tc", SourcePos::new(10, 2));
        let mut messages = CompilerMessages::new();
        messages.push_warning(CompileWarning::new("unused import", loc));

        let mut buf = Vec::new();
        write_diagnostics(&mut buf, &messages).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "a.tc:10:2: warning: unused import\n"
        );
    }
}
