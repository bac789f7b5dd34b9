//! `velac`: the Vela compiler command line.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Compiles Vela source files to Vela VM bytecode.
#[derive(Parser)]
#[command(name = "velac", version)]
struct Args {
    /// Path to the input Vela source file.
    #[arg(short, long)]
    input: PathBuf,

    /// Path to the output bytecode file.
    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), String> {
    let source = fs::read_to_string(&args.input)
        .map_err(|e| format!("failed to read {}: {e}", args.input.display()))?;
    let file_name = args.input.display().to_string();

    let program = vela::compile(&source, &file_name).map_err(|e| format!("[{}] {e}", e.stage()))?;

    fs::write(&args.output, program.serialize())
        .map_err(|e| format!("failed to write {}: {e}", args.output.display()))?;
    tracing::info!(
        functions = program.functions.len(),
        natives = program.native_functions.len(),
        "compilation succeeded"
    );
    Ok(())
}
