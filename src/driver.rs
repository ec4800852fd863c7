//! Ties the pipeline together: parse, analyze, emit. One entry point for
//! both the CLI and integration tests.

use crate::analyzer;
use crate::codegen::{self, Module};
use crate::config::CompilerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink};

pub struct CompileResult {
    pub module: Module,
    pub diagnostics: DiagnosticSink,
}

/// Runs tokenize → parse → analyze → emit over `source`. A syntax error
/// short-circuits before analysis; semantic errors are returned as the
/// first of (possibly several) diagnostics.
pub fn compile(source: &str, config: &CompilerConfig) -> Result<CompileResult, Vec<Diagnostic>> {
    let mut program = crate::parser::parse(source).map_err(|e| vec![e])?;
    let (table, diagnostics) = analyzer::analyze(&mut program, config.optimize)?;
    let module = codegen::emit_module(&program, &table, config).map_err(|e| vec![e])?;
    Ok(CompileResult { module, diagnostics })
}
