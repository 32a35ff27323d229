//! Single-pass compiler for the C subset.
//!
//! Pipeline: [`preprocessor`] (directives, macro table) -> [`lexer`] ->
//! [`expansion`] (macro substitution) -> [`parser`] (recursive descent with
//! direct bytecode emission). There is no AST and no optimization pass.
//!
//! Compile-time errors are fatal and carry a 1-based line number; warnings
//! accumulate and come back alongside the bytecode.

pub mod errors;
pub mod expansion;
pub mod lexer;
pub mod parser;
pub mod preprocessor;
pub mod symbols;

pub use errors::CompileError;

use crate::process::isa::Instruction;

/// Result of a successful compilation.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// Flat instruction stream ready for a process image.
    pub bytecode: Vec<Instruction>,
    /// Static data segment of interned string literals.
    pub data: Vec<u8>,
    /// Non-fatal findings, each prefixed with its source line.
    pub warnings: Vec<String>,
}

/// Compiles C-subset source into bytecode and a data segment.
///
/// All per-compile state lives in a fresh parser, so repeated calls are
/// independent and deterministic.
pub fn compile(source: &str) -> Result<CompileOutput, CompileError> {
    let preprocessed = preprocessor::preprocess(source)?;
    let tokens = lexer::tokenize(&preprocessed.text, 1)?;
    let tokens = expansion::expand(tokens, &preprocessed.macros)?;

    let mut parser = parser::Parser::new(&tokens);
    parser.parse_program()?;
    Ok(parser.into_output())
}
