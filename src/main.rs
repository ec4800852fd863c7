//! O compiler CLI.

use clap::Parser as ClapParser;
use ocompiler::{compile, CompilerConfig};
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing::info;

#[derive(ClapParser)]
#[command(name = "ocompiler")]
#[command(about = "Whole-program compiler for the O class-based object language", long_about = None)]
struct Cli {
    /// Input .o source file
    input: PathBuf,

    /// Skip the optimize pass (dead-field removal, branch collapsing)
    #[arg(long)]
    no_optimize: bool,

    /// Render the deterministic text IL form instead of the binary module
    #[arg(long)]
    compile_net: bool,

    /// Output path; defaults to the input path with its extension swapped
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the class the synthesised entry point constructs and calls
    #[arg(long)]
    start: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("ocompiler=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let source = match fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("✗ could not read {}: {e}", cli.input.display());
            process::exit(1);
        }
    };

    let mut config = CompilerConfig::new().with_optimize(!cli.no_optimize).with_emit_il_text(cli.compile_net);
    if let Some(start) = cli.start {
        config = config.with_start_class(start);
    }
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension(if cli.compile_net { "il" } else { "ob" }));
    config = config.with_output_path(output_path.clone());

    match compile(&source, &config) {
        Ok(result) => {
            for line in &result.diagnostics.optimizer_log {
                info!("optimizer: {line}");
            }
            for warning in &result.diagnostics.warnings {
                eprintln!("{warning}");
            }
            // No binary stack-machine layout is specified; the text rendering
            // is the one deterministic output this compiler can promise, so
            // it is also what a plain run writes, `--compile-net` or not.
            let rendered = result.module.render();
            if let Err(e) = fs::write(&output_path, rendered) {
                eprintln!("✗ could not write {}: {e}", output_path.display());
                process::exit(1);
            }
            println!("✓ compiled {} -> {}", cli.input.display(), output_path.display());
        }
        Err(diagnostics) => {
            for diagnostic in &diagnostics {
                eprintln!("{diagnostic}");
            }
            process::exit(1);
        }
    }
}
