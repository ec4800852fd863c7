//! Diagnostic kinds for the O compiler.
//!
//! Four disjoint kinds, matching the driver's propagation model: syntax and
//! semantic and emit errors are unrecoverable at the point of detection and
//! bubble to the driver; warnings never abort.

use std::fmt;

/// A single compiler diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Raised by the parser. `position` is a token index.
    Syntax { position: usize, message: String },
    /// Raised by the semantic analyzer.
    Semantic { message: String },
    /// Raised by the IL emitter.
    Emit { message: String },
    /// Never aborts compilation.
    Warning { message: String },
}

impl Diagnostic {
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        Diagnostic::Syntax {
            position,
            message: message.into(),
        }
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Diagnostic::Semantic {
            message: message.into(),
        }
    }

    pub fn emit(message: impl Into<String>) -> Self {
        Diagnostic::Emit {
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic::Warning {
            message: message.into(),
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Diagnostic::Warning { .. })
    }

    /// Informational/success markers are chosen by the caller (driver), this
    /// only covers the diagnostic kinds.
    pub fn marker(&self) -> &'static str {
        if self.is_warning() { "⚠" } else { "✗" }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Syntax { position, message } => {
                write!(f, "{} syntax error at token {}: {}", self.marker(), position, message)
            }
            Diagnostic::Semantic { message } => write!(f, "{} semantic error: {}", self.marker(), message),
            Diagnostic::Emit { message } => write!(f, "{} emit error: {}", self.marker(), message),
            Diagnostic::Warning { message } => write!(f, "{} warning: {}", self.marker(), message),
        }
    }
}

impl std::error::Error for Diagnostic {}

/// The error type threaded through `Result` by every compiler stage.
pub type CompileError = Diagnostic;

/// Accumulates warnings emitted during a compile without aborting it.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticSink {
    pub warnings: Vec<Diagnostic>,
    /// One line per optimiser rewrite ("what it was, where"). Kept separate
    /// from `warnings` since these are informational, not problems.
    pub optimizer_log: Vec<String>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.warnings.push(Diagnostic::warning(message));
    }

    pub fn log_rewrite(&mut self, description: impl Into<String>) {
        let description = description.into();
        tracing::debug!(target: "optimizer", "{description}");
        self.optimizer_log.push(description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_diagnostic_renders_with_position() {
        let d = Diagnostic::syntax(7, "expected 'end'");
        assert_eq!(d.to_string(), "✗ syntax error at token 7: expected 'end'");
    }

    #[test]
    fn warning_renders_with_warning_marker() {
        let d = Diagnostic::warning("unused variable 'x'");
        assert!(d.is_warning());
        assert_eq!(d.marker(), "⚠");
    }

    #[test]
    fn sink_collects_warnings_and_rewrites() {
        let mut sink = DiagnosticSink::new();
        sink.warn("unused field 'z'");
        sink.log_rewrite("if(true) collapsed at method main");
        assert_eq!(sink.warnings.len(), 1);
        assert_eq!(sink.optimizer_log.len(), 1);
    }
}
