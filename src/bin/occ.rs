//! Batch compiler CLI.
//!
//! Reads C-subset source files and compiles them to executable artifacts
//! runnable by the shell.
//!
//! # Usage
//! ```text
//! occ <input.c> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `input.c`: Source file to compile
//!
//! # Options
//! - `-o, --output <file>`: Output file path (defaults to `<input>.obc`)
//!
//! # Examples
//! ```text
//! occ program.c
//! occ program.c -o demo.obc
//! ```

use optimus_os::compiler::{compile, CompileError};
use optimus_os::process::program::Executable;
use optimus_os::shell::ARTIFACT_EXT;
use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let input_path = &args[1];
    let mut output_path: Option<String> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--output" | "-o") => {
                i += 1;
                if i >= args.len() {
                    eprintln!("{k} requires an argument");
                    process::exit(1);
                }
                output_path = Some(args[i].clone());
                i += 1;
            }
            other => {
                eprintln!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    let source = match fs::read_to_string(input_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Failed to read {}: {}", input_path, err);
            process::exit(1);
        }
    };

    let output = match compile(&source) {
        Ok(output) => output,
        Err(err) => {
            eprint!("{}", render_diagnostic(input_path, &source, &err));
            process::exit(1);
        }
    };

    for warning in &output.warnings {
        eprintln!("{input_path}: {warning}");
    }

    let output_path = output_path.unwrap_or_else(|| {
        Path::new(input_path)
            .with_extension(ARTIFACT_EXT)
            .to_string_lossy()
            .into_owned()
    });

    let executable = Executable::new(output.bytecode, output.data);
    if let Err(err) = fs::write(&output_path, executable.to_bytes()) {
        eprintln!("Failed to write {}: {}", output_path, err);
        process::exit(1);
    }

    println!(
        "compiled {} -> {} ({} instructions, {} data bytes)",
        input_path,
        output_path,
        executable.bytecode.len(),
        executable.data.len()
    );
}

/// Formats a compiler-style diagnostic pointing at the offending line.
fn render_diagnostic(file: &str, source: &str, err: &CompileError) -> String {
    let line = err.line();
    let mut diag = String::new();
    let _ = writeln!(diag, "error: {err}");
    let _ = writeln!(diag, " --> {file}:{line}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let line_text = raw_line.trim_end_matches('\r');
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, line_text);
        let _ = writeln!(diag, "  |");
    }

    diag
}

const USAGE: &str = "\
Optimus-OS C compiler

USAGE:
    {program} <input.c> [OPTIONS]

ARGS:
    <input.c>              Source file to compile

OPTIONS:
    -o, --output <file>    Output file path (defaults to <input>.obc)
    -h, --help             Print this help message

EXAMPLES:
    {program} program.c
    {program} program.c -o demo.obc
";

/// Prints usage information to stderr.
fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
