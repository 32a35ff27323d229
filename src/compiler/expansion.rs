//! Macro expansion over the token stream.
//!
//! A single pass: every identifier whose lexeme names a defined macro is
//! replaced by the tokens produced by lexing the macro body with the call
//! site's line number. The body is lexed, not re-expanded, so expansion is
//! non-recursive by construction.

use crate::compiler::errors::CompileError;
use crate::compiler::lexer::{tokenize, Token, TokenKind};
use std::collections::HashMap;

/// Expands macro identifiers in `tokens` using the given macro table.
pub fn expand(
    tokens: Vec<Token>,
    macros: &HashMap<String, String>,
) -> Result<Vec<Token>, CompileError> {
    if macros.is_empty() {
        return Ok(tokens);
    }

    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        if token.kind == TokenKind::Identifier {
            if let Some(body) = macros.get(&token.text) {
                let mut body_tokens = tokenize(body, token.line)?;
                body_tokens.pop(); // drop the trailing Eof
                out.extend(body_tokens);
                continue;
            }
        }
        out.push(token);
    }
    Ok(out)
}
