//! Compiler configuration.
//!
//! Mirrors the CLI flags as a plain builder so the driver and integration
//! tests can construct a config without going through `clap`.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// `--no-optimize` turns this off; on by default.
    pub optimize: bool,
    /// `--start <Class>`; defaults to the last top-level class declared.
    pub start_class: Option<String>,
    /// `--compile-net`: render the deterministic text IL form instead of
    /// running it.
    pub emit_il_text: bool,
    /// `-o <path>`; defaults to the source path with its extension swapped.
    pub output_path: Option<PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            optimize: true,
            start_class: None,
            emit_il_text: false,
            output_path: None,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_start_class(mut self, name: impl Into<String>) -> Self {
        self.start_class = Some(name.into());
        self
    }

    pub fn with_emit_il_text(mut self, emit: bool) -> Self {
        self.emit_il_text = emit;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_optimizes_with_no_start_override() {
        let config = CompilerConfig::default();
        assert!(config.optimize);
        assert!(config.start_class.is_none());
    }

    #[test]
    fn builder_sets_every_field() {
        let config = CompilerConfig::new()
            .with_optimize(false)
            .with_start_class("Main")
            .with_emit_il_text(true)
            .with_output_path("out.il");
        assert!(!config.optimize);
        assert_eq!(config.start_class.as_deref(), Some("Main"));
        assert!(config.emit_il_text);
        assert_eq!(config.output_path, Some(PathBuf::from("out.il")));
    }
}
