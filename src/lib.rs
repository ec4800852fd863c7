//! A whole-program compiler for O: a small class-based, purely
//! object-oriented language where every value — including `Integer`,
//! `Real`, `Boolean`, and `String` — is an object and every operator is a
//! method call.
//!
//! The pipeline: `lexer`/`parser` produce an AST, `analyzer` resolves names
//! and checks types (building a whole-program `classtable` along the way),
//! and `codegen` lowers the checked AST to the managed stack-machine IL.

pub mod analyzer;
pub mod ast;
pub mod classtable;
pub mod codegen;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod driver;
pub mod infer;
pub mod lexer;
pub mod parser;
pub mod symbol;
pub mod types;

pub use config::CompilerConfig;
pub use diagnostics::{CompileError, Diagnostic, DiagnosticSink};
pub use driver::{compile, CompileResult};
