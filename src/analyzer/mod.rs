//! Semantic analysis: the check pass (name/type validation, member
//! collection) and the optimize pass (dead-code rewrites), run in that
//! order by the driver.

pub mod check;
pub mod optimize;

use crate::ast::Program;
use crate::classtable::ClassTable;
use crate::diagnostics::{Diagnostic, DiagnosticSink};

/// Runs the check pass, then (if `optimize` is set) rewrites `program` in
/// place. Returns the completed class table — rebuilt after optimisation,
/// since a rewrite can change field or constructor shapes — plus the
/// accumulated diagnostics.
pub fn analyze(program: &mut Program, optimize: bool) -> Result<(ClassTable, DiagnosticSink), Vec<Diagnostic>> {
    let (mut table, mut sink) = check::check(program)?;
    if optimize {
        optimize::optimize(program, &mut sink);
        table = check::check(program).map(|(t, s)| {
            sink.warnings.extend(s.warnings);
            t
        })?;
    }
    Ok((table, sink))
}
