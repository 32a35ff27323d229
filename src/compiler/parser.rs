//! Single-pass recursive-descent parser and code generator.
//!
//! There is no AST: statements and expressions emit instructions into an
//! append-only vector as they parse, and forward jumps are patched once
//! their targets are known. String literals intern into the data segment and
//! compile to their byte offset.
//!
//! The expression grammar is layered lowest to highest: assignment,
//! equality, relational, additive, multiplicative, unary, primary. Every
//! expression leaves exactly one value on the evaluation stack; expression
//! statements emit a trailing `POP` so their net stack effect is zero.

use crate::compiler::errors::CompileError;
use crate::compiler::lexer::{Token, TokenKind};
use crate::compiler::symbols::{CType, FlowCtx, SymbolTable};
use crate::compiler::CompileOutput;
use crate::process::isa::{Instruction, Opcode};
use std::collections::HashMap;

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    code: Vec<Instruction>,
    data: Vec<u8>,
    /// Interned string literal to data-segment offset.
    interned: HashMap<String, usize>,
    symbols: SymbolTable,
    /// Innermost-last stack of loop/switch contexts.
    flow: Vec<FlowCtx>,
    warnings: Vec<String>,
}

impl<'a> Parser<'a> {
    /// Creates a parser over a token stream ending in `Eof`.
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            code: Vec::new(),
            data: Vec::new(),
            interned: HashMap::new(),
            symbols: SymbolTable::new(),
            flow: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Parses zero or more function definitions.
    pub fn parse_program(&mut self) -> Result<(), CompileError> {
        while self.peek().kind != TokenKind::Eof {
            self.parse_function()?;
        }
        Ok(())
    }

    /// Consumes the parser, yielding the compiled artifacts.
    pub fn into_output(self) -> CompileOutput {
        CompileOutput {
            bytecode: self.code,
            data: self.data,
            warnings: self.warnings,
        }
    }

    // ==================== Token cursor ====================

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn line(&self) -> usize {
        self.peek().line
    }

    fn is_symbol(&self, symbol: &str) -> bool {
        let t = self.peek();
        t.kind == TokenKind::Symbol && t.text == symbol
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        let t = self.peek();
        t.kind == TokenKind::Keyword && t.text == keyword
    }

    fn accept_symbol(&mut self, symbol: &str) -> bool {
        if self.is_symbol(symbol) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn accept_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<(), CompileError> {
        if self.accept_symbol(symbol) {
            Ok(())
        } else {
            Err(CompileError::Expected {
                line: self.line(),
                expected: format!("'{symbol}'"),
                found: self.peek().describe(),
            })
        }
    }

    /// Expects `;`, reporting a friendlier diagnostic when the statement ran
    /// straight into the next keyword.
    fn expect_semicolon(&mut self) -> Result<(), CompileError> {
        if self.accept_symbol(";") {
            return Ok(());
        }
        let found = self.peek();
        if found.kind == TokenKind::Keyword {
            Err(CompileError::MissingSemicolon {
                line: found.line,
                found: found.text.clone(),
            })
        } else {
            Err(CompileError::Expected {
                line: found.line,
                expected: "';'".to_string(),
                found: found.describe(),
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<Token, CompileError> {
        if self.peek().kind == TokenKind::Identifier {
            Ok(self.advance())
        } else {
            Err(CompileError::Expected {
                line: self.line(),
                expected: "identifier".to_string(),
                found: self.peek().describe(),
            })
        }
    }

    fn is_type_keyword(&self) -> bool {
        self.peek().kind == TokenKind::Keyword && CType::from_keyword(&self.peek().text).is_some()
    }

    // ==================== Emission ====================

    fn here(&self) -> usize {
        self.code.len()
    }

    fn emit(&mut self, opcode: Opcode) -> usize {
        self.code.push(Instruction::new(opcode));
        self.code.len() - 1
    }

    fn emit_arg(&mut self, opcode: Opcode, arg: f64) -> usize {
        self.code.push(Instruction::with_arg(opcode, arg));
        self.code.len() - 1
    }

    /// Backpatches a forward jump with its now-known target.
    fn patch(&mut self, index: usize, target: usize) {
        self.code[index].arg = Some(target as f64);
    }

    /// Interns a string literal, returning its data-segment byte offset.
    fn intern(&mut self, literal: &str) -> usize {
        if let Some(&offset) = self.interned.get(literal) {
            return offset;
        }
        let offset = self.data.len();
        self.data.extend_from_slice(literal.as_bytes());
        self.data.push(0);
        self.interned.insert(literal.to_string(), offset);
        offset
    }

    fn warn(&mut self, line: usize, message: &str) {
        self.warnings.push(format!("Line {line}: warning: {message}"));
    }

    // ==================== Functions ====================

    /// `type name ( ...ignored... ) { statements }`
    ///
    /// Parameter lists are skipped entirely; there are no call opcodes, so
    /// only `main` ever runs. Each function body ends in an explicit `HALT`,
    /// and the symbol table resets per function so sibling definitions do
    /// not share frame slots.
    fn parse_function(&mut self) -> Result<(), CompileError> {
        if !self.is_type_keyword() {
            return Err(CompileError::Expected {
                line: self.line(),
                expected: "function definition".to_string(),
                found: self.peek().describe(),
            });
        }
        self.advance(); // return type
        self.expect_identifier()?;
        self.expect_symbol("(")?;
        while !self.is_symbol(")") {
            if self.peek().kind == TokenKind::Eof {
                return Err(CompileError::Expected {
                    line: self.line(),
                    expected: "')'".to_string(),
                    found: "end of input".to_string(),
                });
            }
            self.advance();
        }
        self.advance(); // ')'
        self.expect_symbol("{")?;

        self.symbols.reset();
        while !self.is_symbol("}") {
            if self.peek().kind == TokenKind::Eof {
                return Err(CompileError::Expected {
                    line: self.line(),
                    expected: "'}'".to_string(),
                    found: "end of input".to_string(),
                });
            }
            self.parse_statement()?;
        }
        self.advance(); // '}'
        self.emit(Opcode::Halt);
        Ok(())
    }

    // ==================== Statements ====================

    fn parse_statement(&mut self) -> Result<(), CompileError> {
        if self.is_symbol("{") {
            self.advance();
            while !self.is_symbol("}") {
                if self.peek().kind == TokenKind::Eof {
                    return Err(CompileError::Expected {
                        line: self.line(),
                        expected: "'}'".to_string(),
                        found: "end of input".to_string(),
                    });
                }
                self.parse_statement()?;
            }
            self.advance();
            return Ok(());
        }
        if self.accept_symbol(";") {
            return Ok(());
        }
        if self.is_type_keyword() {
            return self.parse_declaration();
        }
        if self.peek().kind == TokenKind::Keyword {
            match self.peek().text.as_str() {
                "if" => return self.parse_if(),
                "while" => return self.parse_while(),
                "do" => return self.parse_do_while(),
                "for" => return self.parse_for(),
                "switch" => return self.parse_switch(),
                "break" => return self.parse_break(),
                "continue" => return self.parse_continue(),
                "return" => return self.parse_return(),
                "printf" => return self.parse_io(Opcode::Print),
                "scanf" => return self.parse_io(Opcode::Scanf),
                _ => {}
            }
        }

        // Expression statement: evaluate and discard.
        self.parse_expression()?;
        self.expect_semicolon()?;
        self.emit(Opcode::Pop);
        Ok(())
    }

    /// `type [*]name ([N])? (= expr)? (, ...)* ;`
    fn parse_declaration(&mut self) -> Result<(), CompileError> {
        let type_tok = self.advance();
        let ctype = CType::from_keyword(&type_tok.text).expect("caller checked type keyword");

        loop {
            let mut is_pointer = false;
            while self.accept_symbol("*") {
                is_pointer = true;
            }
            let name_tok = self.expect_identifier()?;

            let mut array_size = None;
            if self.accept_symbol("[") {
                let size_tok = self.advance();
                if size_tok.kind != TokenKind::Number {
                    return Err(CompileError::Expected {
                        line: size_tok.line,
                        expected: "array size".to_string(),
                        found: size_tok.describe(),
                    });
                }
                let size = size_tok.text.parse::<f64>().unwrap_or(0.0) as usize;
                self.expect_symbol("]")?;
                array_size = Some(size);
            }

            if self.symbols.contains(&name_tok.text) {
                self.warn(
                    name_tok.line,
                    &format!("redeclaration of '{}'", name_tok.text),
                );
            }
            let offset = self.symbols.declare(&name_tok.text, ctype, is_pointer, array_size);
            let element_size = self
                .symbols
                .get(&name_tok.text)
                .expect("just declared")
                .element_size;

            if self.accept_symbol("=") {
                if array_size.is_some() {
                    return Err(CompileError::Unsupported {
                        line: name_tok.line,
                        message: "array initializers are not supported".to_string(),
                    });
                }
                self.parse_assignment()?;
                let store = if element_size == 8 {
                    Opcode::Store64
                } else {
                    Opcode::Store
                };
                self.emit_arg(store, offset as f64);
            }

            if self.accept_symbol(",") {
                continue;
            }
            self.expect_semicolon()?;
            return Ok(());
        }
    }

    /// `if ( expr ) stmt (else stmt)?`
    fn parse_if(&mut self) -> Result<(), CompileError> {
        self.advance(); // 'if'
        self.expect_symbol("(")?;
        self.parse_expression()?;
        self.expect_symbol(")")?;

        let jz = self.emit_arg(Opcode::Jz, 0.0);
        self.parse_statement()?;

        if self.accept_keyword("else") {
            let jmp = self.emit_arg(Opcode::Jmp, 0.0);
            let else_start = self.here();
            self.patch(jz, else_start);
            self.parse_statement()?;
            let end = self.here();
            self.patch(jmp, end);
        } else {
            let end = self.here();
            self.patch(jz, end);
        }
        Ok(())
    }

    /// `while ( expr ) stmt`; continue jumps to the condition, break past
    /// the loop.
    fn parse_while(&mut self) -> Result<(), CompileError> {
        self.advance(); // 'while'
        let cond = self.here();
        self.expect_symbol("(")?;
        self.parse_expression()?;
        self.expect_symbol(")")?;
        let jz = self.emit_arg(Opcode::Jz, 0.0);

        self.flow.push(FlowCtx::loop_with_target(cond));
        self.parse_statement()?;
        self.emit_arg(Opcode::Jmp, cond as f64);

        let end = self.here();
        self.patch(jz, end);
        let ctx = self.flow.pop().expect("pushed above");
        self.finish_loop(ctx, end, cond);
        Ok(())
    }

    /// `do stmt while ( expr ) ;` — the continue target is unknown while
    /// the body parses, so continues register as pending patches.
    fn parse_do_while(&mut self) -> Result<(), CompileError> {
        self.advance(); // 'do'
        let body = self.here();

        self.flow.push(FlowCtx::loop_pending());
        self.parse_statement()?;

        if !self.accept_keyword("while") {
            return Err(CompileError::Expected {
                line: self.line(),
                expected: "'while'".to_string(),
                found: self.peek().describe(),
            });
        }
        let cond = self.here();
        self.expect_symbol("(")?;
        self.parse_expression()?;
        self.expect_symbol(")")?;
        let jz = self.emit_arg(Opcode::Jz, 0.0);
        self.emit_arg(Opcode::Jmp, body as f64);
        self.expect_semicolon()?;

        let end = self.here();
        self.patch(jz, end);
        let ctx = self.flow.pop().expect("pushed above");
        self.finish_loop(ctx, end, cond);
        Ok(())
    }

    /// Classic 3-clause `for`. Layout:
    /// `init; cond; JZ end; JMP body; inc: inc; POP; JMP cond; body: stmt; JMP inc; end:`
    fn parse_for(&mut self) -> Result<(), CompileError> {
        self.advance(); // 'for'
        self.expect_symbol("(")?;

        // Init clause: declaration, expression or empty.
        if self.is_type_keyword() {
            self.parse_declaration()?;
        } else if !self.accept_symbol(";") {
            self.parse_expression()?;
            self.expect_semicolon()?;
            self.emit(Opcode::Pop);
        }

        // Condition clause; empty means forever.
        let cond = self.here();
        if self.is_symbol(";") {
            self.emit_arg(Opcode::Lit, 1.0);
        } else {
            self.parse_expression()?;
        }
        self.expect_semicolon()?;
        let jz_end = self.emit_arg(Opcode::Jz, 0.0);
        let jmp_body = self.emit_arg(Opcode::Jmp, 0.0);

        // Increment clause, jumped to by `continue` and the body's tail.
        let inc = self.here();
        if !self.is_symbol(")") {
            self.parse_expression()?;
            self.emit(Opcode::Pop);
        }
        self.emit_arg(Opcode::Jmp, cond as f64);
        self.expect_symbol(")")?;

        let body_start = self.here();
        self.patch(jmp_body, body_start);
        self.flow.push(FlowCtx::loop_with_target(inc));
        self.parse_statement()?;
        self.emit_arg(Opcode::Jmp, inc as f64);

        let end = self.here();
        self.patch(jz_end, end);
        let ctx = self.flow.pop().expect("pushed above");
        self.finish_loop(ctx, end, inc);
        Ok(())
    }

    /// `switch ( expr ) { case C: ... default: ... }`
    ///
    /// Case bodies are emitted inline with fall-through; `case` and
    /// `default` labels only record the current instruction index. The
    /// dispatch chain comes after the bodies and compares the subject
    /// against each case constant in declaration order.
    fn parse_switch(&mut self) -> Result<(), CompileError> {
        self.advance(); // 'switch'
        self.expect_symbol("(")?;
        self.parse_expression()?;
        self.expect_symbol(")")?;

        let jmp_dispatch = self.emit_arg(Opcode::Jmp, 0.0);
        self.flow.push(FlowCtx::switch());
        self.expect_symbol("{")?;

        let mut cases: Vec<(f64, usize)> = Vec::new();
        let mut default_target: Option<usize> = None;
        while !self.is_symbol("}") {
            if self.peek().kind == TokenKind::Eof {
                return Err(CompileError::Expected {
                    line: self.line(),
                    expected: "'}'".to_string(),
                    found: "end of input".to_string(),
                });
            }
            if self.accept_keyword("case") {
                let value = self.parse_case_constant()?;
                self.expect_symbol(":")?;
                cases.push((value, self.here()));
            } else if self.accept_keyword("default") {
                self.expect_symbol(":")?;
                default_target = Some(self.here());
            } else {
                self.parse_statement()?;
            }
        }
        self.advance(); // '}'

        // Keep the last case body from falling into the dispatch chain.
        let jmp_exit = self.emit_arg(Opcode::Jmp, 0.0);

        let dispatch = self.here();
        self.patch(jmp_dispatch, dispatch);
        for (value, target) in cases {
            self.emit(Opcode::Dup);
            self.emit_arg(Opcode::Lit, value);
            self.emit(Opcode::Eq);
            let jz_next = self.emit_arg(Opcode::Jz, 0.0);
            self.emit(Opcode::Pop);
            self.emit_arg(Opcode::Jmp, target as f64);
            let next = self.here();
            self.patch(jz_next, next);
        }
        match default_target {
            Some(target) => {
                self.emit(Opcode::Pop);
                self.emit_arg(Opcode::Jmp, target as f64);
            }
            None => {
                self.emit(Opcode::Pop);
            }
        }

        let exit = self.here();
        self.patch(jmp_exit, exit);
        match self.flow.pop().expect("pushed above") {
            FlowCtx::Switch { break_patches } => {
                for index in break_patches {
                    self.patch(index, exit);
                }
            }
            FlowCtx::Loop { .. } => unreachable!("switch context expected"),
        }
        Ok(())
    }

    /// Integer, negative integer or char literal.
    fn parse_case_constant(&mut self) -> Result<f64, CompileError> {
        let negative = self.accept_symbol("-");
        let token = self.advance();
        let value = match token.kind {
            TokenKind::Number => token.text.parse::<f64>().unwrap_or(0.0),
            TokenKind::CharLit if !negative => {
                token.text.chars().next().map(|c| c as u32 as f64).unwrap_or(0.0)
            }
            _ => {
                return Err(CompileError::Expected {
                    line: token.line,
                    expected: "case constant".to_string(),
                    found: token.describe(),
                });
            }
        };
        Ok(if negative { -value } else { value })
    }

    fn parse_break(&mut self) -> Result<(), CompileError> {
        let line = self.line();
        self.advance(); // 'break'
        self.expect_semicolon()?;
        if self.flow.is_empty() {
            return Err(CompileError::BreakOutsideLoop { line });
        }
        let index = self.emit_arg(Opcode::Jmp, 0.0);
        self.flow
            .last_mut()
            .expect("checked non-empty")
            .push_break(index);
        Ok(())
    }

    fn parse_continue(&mut self) -> Result<(), CompileError> {
        let line = self.line();
        self.advance(); // 'continue'
        self.expect_semicolon()?;

        // Innermost loop; switch frames are skipped.
        let Some(loop_index) = self
            .flow
            .iter()
            .rposition(|ctx| matches!(ctx, FlowCtx::Loop { .. }))
        else {
            return Err(CompileError::ContinueOutsideLoop { line });
        };
        let target = match &self.flow[loop_index] {
            FlowCtx::Loop {
                continue_target, ..
            } => *continue_target,
            FlowCtx::Switch { .. } => unreachable!("rposition matched a loop"),
        };
        match target {
            Some(target) => {
                self.emit_arg(Opcode::Jmp, target as f64);
            }
            None => {
                let index = self.emit_arg(Opcode::Jmp, 0.0);
                if let FlowCtx::Loop {
                    pending_continues, ..
                } = &mut self.flow[loop_index]
                {
                    pending_continues.push(index);
                }
            }
        }
        Ok(())
    }

    /// `return expr? ;` — the value, if any, stays on the stack; with no
    /// call opcodes wired in, `return` just halts.
    fn parse_return(&mut self) -> Result<(), CompileError> {
        self.advance(); // 'return'
        if !self.is_symbol(";") {
            self.parse_expression()?;
        }
        self.expect_semicolon()?;
        self.emit(Opcode::Halt);
        Ok(())
    }

    /// `printf ( "fmt" (, expr)* ) ;` and `scanf ( "fmt" (, expr)* ) ;`
    ///
    /// The conversion count in the format string decides how many value
    /// arguments are consumed. Arguments are pushed left to right, then the
    /// format-string address goes on top for the VM to pop first.
    fn parse_io(&mut self, opcode: Opcode) -> Result<(), CompileError> {
        self.advance(); // 'printf' | 'scanf'
        self.expect_symbol("(")?;

        let format_tok = self.advance();
        if format_tok.kind != TokenKind::StringLit {
            return Err(CompileError::Expected {
                line: format_tok.line,
                expected: "format string".to_string(),
                found: format_tok.describe(),
            });
        }
        let address = self.intern(&format_tok.text);
        let count = count_format_args(&format_tok.text);

        for _ in 0..count {
            self.expect_symbol(",")?;
            self.parse_assignment()?;
        }
        self.expect_symbol(")")?;
        self.expect_semicolon()?;

        self.emit_arg(Opcode::Lit, address as f64);
        self.emit_arg(opcode, count as f64);
        Ok(())
    }

    /// Patches a finished loop context: breaks to `break_target`, pending
    /// continues to `continue_target`.
    fn finish_loop(&mut self, ctx: FlowCtx, break_target: usize, continue_target: usize) {
        match ctx {
            FlowCtx::Loop {
                break_patches,
                pending_continues,
                ..
            } => {
                for index in break_patches {
                    self.patch(index, break_target);
                }
                for index in pending_continues {
                    self.patch(index, continue_target);
                }
            }
            FlowCtx::Switch { .. } => unreachable!("loop context expected"),
        }
    }

    // ==================== Expressions ====================

    fn parse_expression(&mut self) -> Result<(), CompileError> {
        self.parse_assignment()
    }

    /// Right-associative simple assignment. Array-element and
    /// pointer-target assignment live in the unary/primary layers.
    fn parse_assignment(&mut self) -> Result<(), CompileError> {
        if self.peek().kind == TokenKind::Identifier {
            let next_is_assign = self
                .peek_next()
                .is_some_and(|t| t.kind == TokenKind::Symbol && t.text == "=");
            if next_is_assign {
                let name_tok = self.advance();
                self.advance(); // '='
                let var = self.symbols.get(&name_tok.text).cloned().ok_or(
                    CompileError::UndefinedIdentifier {
                        line: name_tok.line,
                        name: name_tok.text.clone(),
                    },
                )?;
                self.parse_assignment()?;
                let (store, load) = if var.element_size == 8 {
                    (Opcode::Store64, Opcode::Load64)
                } else {
                    (Opcode::Store, Opcode::Load)
                };
                // Store, then reload so the expression still has a value.
                self.emit_arg(store, var.offset as f64);
                self.emit_arg(load, var.offset as f64);
                return Ok(());
            }
        }
        self.parse_equality()
    }

    fn parse_equality(&mut self) -> Result<(), CompileError> {
        self.parse_relational()?;
        loop {
            if self.accept_symbol("==") {
                self.parse_relational()?;
                self.emit(Opcode::Eq);
            } else if self.accept_symbol("!=") {
                self.parse_relational()?;
                self.emit(Opcode::Neq);
            } else {
                return Ok(());
            }
        }
    }

    fn parse_relational(&mut self) -> Result<(), CompileError> {
        self.parse_additive()?;
        loop {
            let opcode = if self.accept_symbol("<=") {
                Opcode::Le
            } else if self.accept_symbol(">=") {
                Opcode::Ge
            } else if self.accept_symbol("<") {
                Opcode::Lt
            } else if self.accept_symbol(">") {
                Opcode::Gt
            } else {
                return Ok(());
            };
            self.parse_additive()?;
            self.emit(opcode);
        }
    }

    fn parse_additive(&mut self) -> Result<(), CompileError> {
        self.parse_multiplicative()?;
        loop {
            let opcode = if self.accept_symbol("+") {
                Opcode::Add
            } else if self.accept_symbol("-") {
                Opcode::Sub
            } else {
                return Ok(());
            };
            self.parse_multiplicative()?;
            self.emit(opcode);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<(), CompileError> {
        self.parse_unary()?;
        loop {
            let opcode = if self.accept_symbol("*") {
                Opcode::Mul
            } else if self.accept_symbol("/") {
                Opcode::Div
            } else if self.accept_symbol("%") {
                Opcode::Mod
            } else {
                return Ok(());
            };
            self.parse_unary()?;
            self.emit(opcode);
        }
    }

    fn parse_unary(&mut self) -> Result<(), CompileError> {
        if self.accept_symbol("!") {
            self.parse_unary()?;
            self.emit_arg(Opcode::Lit, 0.0);
            self.emit(Opcode::Eq);
            return Ok(());
        }
        if self.accept_symbol("-") {
            self.parse_unary()?;
            self.emit_arg(Opcode::Lit, -1.0);
            self.emit(Opcode::Mul);
            return Ok(());
        }
        if self.accept_symbol("+") {
            return self.parse_unary();
        }
        // Dereference, with optional store-through: `*e` and `*e = expr`.
        if self.accept_symbol("*") {
            self.parse_unary()?;
            if self.accept_symbol("=") {
                self.parse_assignment()?;
                self.emit(Opcode::StoreInd);
            } else {
                self.emit(Opcode::LoadInd);
            }
            return Ok(());
        }
        // Address-of a named variable.
        if self.accept_symbol("&") {
            let name_tok = self.expect_identifier()?;
            let var = self.symbols.get(&name_tok.text).cloned().ok_or(
                CompileError::UndefinedIdentifier {
                    line: name_tok.line,
                    name: name_tok.text.clone(),
                },
            )?;
            self.emit_arg(Opcode::PushAddr, var.offset as f64);
            return Ok(());
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<(), CompileError> {
        if self.accept_symbol("(") {
            self.parse_expression()?;
            self.expect_symbol(")")?;
            return Ok(());
        }

        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number => {
                self.advance();
                let value = match token.text.parse::<f64>() {
                    Ok(v) => v,
                    Err(_) => {
                        self.warn(
                            token.line,
                            &format!("invalid number literal '{}'", token.text),
                        );
                        0.0
                    }
                };
                self.emit_arg(Opcode::Lit, value);
                Ok(())
            }
            TokenKind::CharLit => {
                self.advance();
                let code = token.text.chars().next().map(|c| c as u32 as f64).unwrap_or(0.0);
                self.emit_arg(Opcode::Lit, code);
                Ok(())
            }
            TokenKind::StringLit => {
                self.advance();
                let address = self.intern(&token.text);
                self.emit_arg(Opcode::Lit, address as f64);
                Ok(())
            }
            TokenKind::Keyword => self.parse_builtin_call(&token),
            TokenKind::Identifier => self.parse_variable(&token),
            _ => Err(CompileError::Expected {
                line: token.line,
                expected: "expression".to_string(),
                found: token.describe(),
            }),
        }
    }

    /// Math intrinsics, `malloc` and `free` in expression position.
    fn parse_builtin_call(&mut self, token: &Token) -> Result<(), CompileError> {
        let unary_op = match token.text.as_str() {
            "sin" => Some(Opcode::Sin),
            "cos" => Some(Opcode::Cos),
            "tan" => Some(Opcode::Tan),
            "sqrt" => Some(Opcode::Sqrt),
            "abs" => Some(Opcode::Abs),
            _ => None,
        };
        if let Some(opcode) = unary_op {
            self.advance();
            self.expect_symbol("(")?;
            self.parse_expression()?;
            self.expect_symbol(")")?;
            self.emit(opcode);
            return Ok(());
        }
        match token.text.as_str() {
            "pow" => {
                self.advance();
                self.expect_symbol("(")?;
                self.parse_expression()?;
                self.expect_symbol(",")?;
                self.parse_expression()?;
                self.expect_symbol(")")?;
                self.emit(Opcode::Pow);
                Ok(())
            }
            "malloc" => {
                self.advance();
                self.expect_symbol("(")?;
                self.parse_expression()?;
                self.expect_symbol(")")?;
                self.emit(Opcode::Malloc);
                Ok(())
            }
            "free" => {
                self.advance();
                self.expect_symbol("(")?;
                self.parse_expression()?;
                self.expect_symbol(")")?;
                self.warn(
                    token.line,
                    "free has no effect; memory is reclaimed when the process exits",
                );
                Ok(())
            }
            _ => Err(CompileError::Expected {
                line: token.line,
                expected: "expression".to_string(),
                found: token.describe(),
            }),
        }
    }

    /// Identifier in expression position: array indexing with optional
    /// store, array decay to its address, or a plain load.
    fn parse_variable(&mut self, token: &Token) -> Result<(), CompileError> {
        self.advance();
        let var = self
            .symbols
            .get(&token.text)
            .cloned()
            .ok_or(CompileError::UndefinedIdentifier {
                line: token.line,
                name: token.text.clone(),
            })?;

        if self.accept_symbol("[") {
            // addr = &var + index * element_size
            self.emit_arg(Opcode::PushAddr, var.offset as f64);
            self.parse_expression()?;
            self.expect_symbol("]")?;
            self.emit_arg(Opcode::Lit, var.element_size as f64);
            self.emit(Opcode::Mul);
            self.emit(Opcode::Add);

            let wide = var.element_size == 8;
            if self.accept_symbol("=") {
                self.parse_assignment()?;
                self.emit(if wide {
                    Opcode::StoreInd64
                } else {
                    Opcode::StoreInd
                });
            } else {
                self.emit(if wide { Opcode::LoadInd64 } else { Opcode::LoadInd });
            }
            return Ok(());
        }

        if var.is_array {
            // Arrays decay to their base address.
            self.emit_arg(Opcode::PushAddr, var.offset as f64);
            return Ok(());
        }

        let load = if var.element_size == 8 {
            Opcode::Load64
        } else {
            Opcode::Load
        };
        self.emit_arg(load, var.offset as f64);
        Ok(())
    }
}

/// Counts the conversion specifiers in a format string.
///
/// A conversion is `%`, any run of `-+ #0-9.`, an optional `l`, then one of
/// `d f c s x X`. Anything else after the `%` is not a conversion and
/// scanning resumes at the character after the `%`.
pub fn count_format_args(format: &str) -> usize {
    let chars: Vec<char> = format.chars().collect();
    let mut count = 0;
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '%' {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < chars.len()
            && (matches!(chars[j], '-' | '+' | ' ' | '#' | '.') || chars[j].is_ascii_digit())
        {
            j += 1;
        }
        if j < chars.len() && chars[j] == 'l' {
            j += 1;
        }
        if j < chars.len() && matches!(chars[j], 'd' | 'f' | 'c' | 's' | 'x' | 'X') {
            count += 1;
            i = j + 1;
        } else {
            i += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;

    #[test]
    fn format_arg_counting() {
        assert_eq!(count_format_args("no conversions"), 0);
        assert_eq!(count_format_args("%d"), 1);
        assert_eq!(count_format_args("%d %f %s"), 3);
        assert_eq!(count_format_args("%.2f"), 1);
        assert_eq!(count_format_args("%lf"), 1);
        assert_eq!(count_format_args("%-8d"), 1);
        assert_eq!(count_format_args("%x %X"), 2);
        assert_eq!(count_format_args("100%"), 0);
        assert_eq!(count_format_args("%q"), 0);
    }

    #[test]
    fn jump_targets_stay_in_range() {
        let source = "int main() {
            int i;
            for (i = 0; i < 10; i = i + 1) {
                if (i == 2) continue;
                if (i == 8) break;
                switch (i) {
                    case 1: printf(\"a\"); break;
                    default: printf(\"b\");
                }
            }
            while (i > 0) { i = i - 1; }
            do { i = i + 1; } while (i < 3);
        }";
        let output = compile(source).unwrap();
        let len = output.bytecode.len();
        for (index, instr) in output.bytecode.iter().enumerate() {
            if matches!(instr.opcode, Opcode::Jmp | Opcode::Jz) {
                let target = instr.arg.expect("jump must be patched") as usize;
                assert!(target < len, "instr {index} jumps to {target}, len {len}");
            }
        }
    }

    #[test]
    fn no_unpatched_forward_jumps_remain() {
        let source = "int main() {
            int i;
            for (i = 0; i < 3; i = i + 1) { if (i == 1) break; }
        }";
        let output = compile(source).unwrap();
        // Every jump argument must be present.
        for instr in &output.bytecode {
            if matches!(instr.opcode, Opcode::Jmp | Opcode::Jz) {
                assert!(instr.arg.is_some());
            }
        }
    }

    #[test]
    fn missing_semicolon_reports_next_keyword() {
        let err = compile("int main() { int a = 1 return a; }").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line 1: missing semicolon before return"
        );
    }

    #[test]
    fn undefined_identifier_is_an_error() {
        let err = compile("int main() { x = 1; }").unwrap_err();
        assert!(err.to_string().contains("undefined identifier 'x'"));
    }

    #[test]
    fn array_initializer_is_unsupported() {
        let err = compile("int main() { int a[3] = 1; }").unwrap_err();
        assert!(err.to_string().contains("array initializers"));
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let err = compile("int main() { break; }").unwrap_err();
        assert_eq!(err.to_string(), "Line 1: break outside of loop or switch");
    }

    #[test]
    fn continue_inside_switch_needs_a_loop() {
        let err = compile("int main() { switch (1) { default: continue; } }").unwrap_err();
        assert_eq!(err.to_string(), "Line 1: continue outside of loop");
    }

    #[test]
    fn redeclaration_warns_but_compiles() {
        let output = compile("int main() { int a; int a; }").unwrap();
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("redeclaration of 'a'"));
    }

    #[test]
    fn string_literals_are_interned_once() {
        let output =
            compile("int main() { printf(\"x\"); printf(\"x\"); printf(\"y\"); }").unwrap();
        // "x\0" + "y\0"
        assert_eq!(output.data, b"x\0y\0");
    }

    #[test]
    fn function_bodies_end_with_halt() {
        let output = compile("int main() { }").unwrap();
        assert_eq!(output.bytecode.len(), 1);
        assert_eq!(output.bytecode[0].opcode, Opcode::Halt);
    }

    #[test]
    fn empty_source_compiles_to_nothing() {
        let output = compile("").unwrap();
        assert!(output.bytecode.is_empty());
        assert!(output.data.is_empty());
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn compiling_twice_yields_identical_output() {
        let source = "int main() { printf(\"%d\", 1 + 2); return 0; }";
        let a = compile(source).unwrap();
        let b = compile(source).unwrap();
        assert_eq!(a.bytecode, b.bytecode);
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn not_equal_emits_neq() {
        let output = compile("int main() { int a = 1; a != 2; }").unwrap();
        assert!(output.bytecode.iter().any(|i| i.opcode == Opcode::Neq));
        assert!(!output.bytecode.iter().any(|i| i.opcode == Opcode::Eq));
    }

    #[test]
    fn sibling_functions_reuse_frame_offsets() {
        let source = "void first() { int a = 1; }\nint main() { int b = 2; }";
        let output = compile(source).unwrap();
        let stores: Vec<f64> = output
            .bytecode
            .iter()
            .filter(|i| i.opcode == Opcode::Store)
            .map(|i| i.arg.unwrap())
            .collect();
        // Both locals land at offset 0: the table resets per function.
        assert_eq!(stores, [0.0, 0.0]);
    }
}
