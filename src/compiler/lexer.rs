//! Tokenizer for the C subset.
//!
//! Produces `{kind, text, line}` tokens with 1-based line numbers. Lexing is
//! restartable from an arbitrary starting line so the macro expander can
//! re-lex macro bodies at their call sites.
//!
//! Rules:
//! - whitespace and `//` line comments are skipped
//! - numbers are contiguous runs of digits and dots
//! - identifiers are `[A-Za-z_][A-Za-z_0-9]*`; the fixed keyword set
//!   promotes them to keywords
//! - string and char literals resolve the escapes `\n \t \r \\ \" \' \0`;
//!   any other escape yields the raw character
//! - two-character symbols `== != <= >=` are matched greedily, then the
//!   single-character set
//! - unknown characters are silently skipped

use crate::compiler::errors::CompileError;

/// Keywords of the language, including the builtin function names.
pub const KEYWORDS: &[&str] = &[
    "int", "void", "char", "float", "double", "return", "if", "else", "while", "for", "do",
    "switch", "case", "default", "break", "continue", "printf", "scanf", "malloc", "free", "sin",
    "cos", "tan", "sqrt", "pow", "abs",
];

/// Single-character symbols. `!` is included so the unary not operator
/// survives lexing; it otherwise only occurs inside `!=`.
const SYMBOL_CHARS: &str = "+-*/%=(){};,<>&[]:!";

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Number,
    StringLit,
    CharLit,
    Symbol,
    Eof,
}

/// A lexed token. `text` holds the lexeme; for string and char literals the
/// escapes are already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }

    /// Human-readable rendering for diagnostics.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::StringLit => format!("string \"{}\"", self.text),
            TokenKind::CharLit => format!("char '{}'", self.text),
            _ => format!("'{}'", self.text),
        }
    }
}

/// Resolves a character following a backslash.
fn resolve_escape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '\\' => '\\',
        '"' => '"',
        '\'' => '\'',
        '0' => '\0',
        other => other,
    }
}

/// Tokenizes `source`, counting lines from `start_line`.
///
/// Appends a single `Eof` token so the parser never runs off the end.
pub fn tokenize(source: &str, start_line: usize) -> Result<Vec<Token>, CompileError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut line = start_line;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Line comment
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        // Number: digits and dots
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(Token::new(TokenKind::Number, text, line));
            continue;
        }

        // Identifier or keyword
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let kind = if KEYWORDS.contains(&text.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            };
            tokens.push(Token::new(kind, text, line));
            continue;
        }

        // String literal; unterminated strings recover with what was read
        if c == '"' {
            let token_line = line;
            let mut text = String::new();
            i += 1;
            while i < chars.len() && chars[i] != '"' {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    text.push(resolve_escape(chars[i + 1]));
                    i += 2;
                } else {
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    text.push(chars[i]);
                    i += 1;
                }
            }
            i += 1; // past the closing quote, or past the end on recovery
            tokens.push(Token::new(TokenKind::StringLit, text, token_line));
            continue;
        }

        // Char literal; a missing closing quote is a hard stop
        if c == '\'' {
            let token_line = line;
            i += 1;
            let value = match chars.get(i) {
                Some('\\') => {
                    let escaped = chars.get(i + 1).copied();
                    i += 2;
                    match escaped {
                        Some(e) => resolve_escape(e),
                        None => return Err(CompileError::UnterminatedChar { line: token_line }),
                    }
                }
                Some(&ch) => {
                    i += 1;
                    ch
                }
                None => return Err(CompileError::UnterminatedChar { line: token_line }),
            };
            if chars.get(i) != Some(&'\'') {
                return Err(CompileError::UnterminatedChar { line: token_line });
            }
            i += 1;
            tokens.push(Token::new(TokenKind::CharLit, value.to_string(), token_line));
            continue;
        }

        // Two-character symbols, matched greedily
        if matches!(c, '=' | '!' | '<' | '>') && chars.get(i + 1) == Some(&'=') {
            let text: String = chars[i..i + 2].iter().collect();
            tokens.push(Token::new(TokenKind::Symbol, text, line));
            i += 2;
            continue;
        }

        // Single-character symbols
        if SYMBOL_CHARS.contains(c) {
            tokens.push(Token::new(TokenKind::Symbol, c.to_string(), line));
            i += 1;
            continue;
        }

        // Anything else is skipped
        i += 1;
    }

    tokens.push(Token::new(TokenKind::Eof, "", line));
    Ok(tokens)
}
