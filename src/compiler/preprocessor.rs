//! Directive pass over raw source text.
//!
//! Recognizes `#define NAME VALUE?`, `#ifdef NAME`, `#ifndef NAME` and
//! `#endif`. Output has the same line count as the input: directive lines and
//! suppressed lines are replaced by blank lines, so token line numbers still
//! point into the original source. `#include` (and any other directive) is
//! treated as inert and blanked.
//!
//! Macros are single-token replacements; a `#define` without a value defines
//! the name as `1`. Function-like macros, multi-line definitions and `#if`
//! expressions are deliberately unsupported.

use crate::compiler::errors::CompileError;
use std::collections::HashMap;

/// Result of the directive pass: blanked text plus the collected macro table.
#[derive(Debug)]
pub struct Preprocessed {
    /// Same line count as the input source.
    pub text: String,
    /// Macro name to replacement body.
    pub macros: HashMap<String, String>,
}

/// Runs the directive pass over the given source.
pub fn preprocess(source: &str) -> Result<Preprocessed, CompileError> {
    let mut macros = HashMap::new();
    // Stack of conditional frames. A line is emitted only while every frame
    // is true.
    let mut emit_stack: Vec<bool> = Vec::new();
    // Line each open frame started on, for the unterminated diagnostic.
    let mut open_lines: Vec<usize> = Vec::new();
    let mut out = String::with_capacity(source.len());

    for (index, line) in source.lines().enumerate() {
        let line_no = index + 1;
        let emitting = emit_stack.iter().all(|&e| e);
        let trimmed = line.trim_start();

        if let Some(directive) = trimmed.strip_prefix('#') {
            let mut words = directive.split_whitespace();
            match words.next() {
                Some("define") => {
                    if emitting {
                        if let Some(name) = words.next() {
                            let value: String =
                                words.collect::<Vec<_>>().join(" ");
                            let value = if value.is_empty() {
                                "1".to_string()
                            } else {
                                value
                            };
                            macros.insert(name.to_string(), value);
                        }
                    }
                }
                Some("ifdef") => {
                    let name = words.next().unwrap_or("");
                    emit_stack.push(emitting && macros.contains_key(name));
                    open_lines.push(line_no);
                }
                Some("ifndef") => {
                    let name = words.next().unwrap_or("");
                    emit_stack.push(emitting && !macros.contains_key(name));
                    open_lines.push(line_no);
                }
                Some("endif") => {
                    emit_stack.pop();
                    open_lines.pop();
                }
                _ => {
                    // Unsupported directives, #include among them, are inert.
                }
            }
            out.push('\n');
            continue;
        }

        if emitting {
            out.push_str(line);
        }
        out.push('\n');
    }

    if let Some(&line) = open_lines.first() {
        return Err(CompileError::UnterminatedConditional { line });
    }

    Ok(Preprocessed { text: out, macros })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_records_macro_and_blanks_line() {
        let result = preprocess("#define MAX 3\nint x;\n").unwrap();
        assert_eq!(result.text, "\nint x;\n");
        assert_eq!(result.macros.get("MAX").unwrap(), "3");
    }

    #[test]
    fn define_without_value_defaults_to_one() {
        let result = preprocess("#define DEBUG\n").unwrap();
        assert_eq!(result.macros.get("DEBUG").unwrap(), "1");
    }

    #[test]
    fn ifdef_suppresses_undefined_branch() {
        let source = "#ifdef MISSING\nint hidden;\n#endif\nint shown;\n";
        let result = preprocess(source).unwrap();
        assert_eq!(result.text, "\n\n\nint shown;\n");
    }

    #[test]
    fn ifndef_emits_when_undefined() {
        let source = "#ifndef MISSING\nint shown;\n#endif\n";
        let result = preprocess(source).unwrap();
        assert_eq!(result.text, "\nint shown;\n\n");
    }

    #[test]
    fn nested_conditionals_stay_suppressed() {
        let source = "#ifdef A\n#ifndef B\nint hidden;\n#endif\nint also_hidden;\n#endif\n";
        let result = preprocess(source).unwrap();
        assert!(!result.text.contains("hidden"));
        // Line count is preserved.
        assert_eq!(result.text.lines().count(), source.lines().count());
    }

    #[test]
    fn define_inside_suppressed_block_is_ignored() {
        let source = "#ifdef MISSING\n#define SNEAKY 9\n#endif\n";
        let result = preprocess(source).unwrap();
        assert!(!result.macros.contains_key("SNEAKY"));
    }

    #[test]
    fn include_is_inert() {
        let result = preprocess("#include <stdio.h>\nint x;\n").unwrap();
        assert_eq!(result.text, "\nint x;\n");
        assert!(result.macros.is_empty());
    }

    #[test]
    fn unterminated_conditional_is_fatal() {
        let err = preprocess("int a;\n#ifdef X\nint b;\n").unwrap_err();
        assert_eq!(err, CompileError::UnterminatedConditional { line: 2 });
    }

    #[test]
    fn stray_endif_is_ignored() {
        let result = preprocess("#endif\nint x;\n").unwrap();
        assert_eq!(result.text, "\nint x;\n");
    }
}
