//! Compile-time error types.
//!
//! Every error carries a 1-based source line and renders as
//! `Line <n>: <message>`. Errors are fatal: compilation aborts with no
//! partial artifact. Non-fatal findings are returned as warnings instead.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    /// `#ifdef`/`#ifndef` without a matching `#endif`.
    #[error("Line {line}: unterminated conditional block (missing #endif)")]
    UnterminatedConditional { line: usize },
    /// Character literal without a closing quote.
    #[error("Line {line}: unterminated character literal")]
    UnterminatedChar { line: usize },
    /// The parser wanted one token and found another.
    #[error("Line {line}: expected {expected}, found {found}")]
    Expected {
        line: usize,
        expected: String,
        found: String,
    },
    /// A statement ran into the next keyword without its terminator.
    #[error("Line {line}: missing semicolon before {found}")]
    MissingSemicolon { line: usize, found: String },
    /// Use of a name with no visible declaration.
    #[error("Line {line}: undefined identifier '{name}'")]
    UndefinedIdentifier { line: usize, name: String },
    /// Construct recognized but deliberately not supported.
    #[error("Line {line}: {message}")]
    Unsupported { line: usize, message: String },
    /// `break` with no enclosing loop or switch.
    #[error("Line {line}: break outside of loop or switch")]
    BreakOutsideLoop { line: usize },
    /// `continue` with no enclosing loop.
    #[error("Line {line}: continue outside of loop")]
    ContinueOutsideLoop { line: usize },
}

impl CompileError {
    /// The 1-based source line the error points at.
    pub fn line(&self) -> usize {
        match self {
            CompileError::UnterminatedConditional { line }
            | CompileError::UnterminatedChar { line }
            | CompileError::Expected { line, .. }
            | CompileError::MissingSemicolon { line, .. }
            | CompileError::UndefinedIdentifier { line, .. }
            | CompileError::Unsupported { line, .. }
            | CompileError::BreakOutsideLoop { line }
            | CompileError::ContinueOutsideLoop { line } => *line,
        }
    }
}
