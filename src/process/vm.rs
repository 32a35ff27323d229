//! The process virtual machine.
//!
//! A [`Process`] is a stack machine over a flat 64 KiB memory image. It is
//! driven cooperatively: [`Process::step`] executes up to a caller-chosen
//! number of instructions and returns whether the process still wants CPU.
//! `SCANF` suspends the process in [`ProcessState::WaitingInput`]; the host
//! delivers the pending line through [`Process::resolve_input`] and resumes
//! stepping.
//!
//! Runtime faults never escape `step`: they are rendered as a
//! `Segmentation Fault (Core Dumped)` diagnostic on the process stdout and
//! the process degrades to `Terminated`.

use crate::process::errors::Fault;
use crate::process::isa::{Instruction, Opcode};
use crate::process::memory::{align4, Memory, FRAME_BASE, HEAP_GAP, MEM_SIZE};
use crate::process::state::{ProcessState, ScanContext};

/// Process identifier assigned by the process manager.
pub type Pid = u32;

/// Character sink for process standard output.
///
/// Owned by the caller; the VM assumes it never fails and calls it
/// synchronously from inside `step`.
pub trait OutputSink: Send {
    /// Writes a chunk of output text.
    fn write(&mut self, text: &str);
}

impl<F: FnMut(&str) + Send> OutputSink for F {
    fn write(&mut self, text: &str) {
        self(text)
    }
}

/// A parsed `scanf` conversion specifier.
enum ScanConv {
    Int,
    Float,
    LongFloat,
    Char,
    Str,
}

/// A single process: bytecode, memory image, evaluation stack and lifecycle
/// state.
pub struct Process {
    pid: Pid,
    state: ProcessState,
    code: Vec<Instruction>,
    memory: Memory,
    /// Evaluation stack. Values are uniformly `f64`; the opcode selects the
    /// interpretation at memory-access time.
    stack: Vec<f64>,
    /// Program counter, indexing into `code`.
    pc: usize,
    /// Frame pointer: base address of the local variable frame.
    fp: usize,
    /// Heap bump cursor.
    hp: usize,
    /// Captured scanf arguments while suspended.
    scan: Option<ScanContext>,
    stdout: Box<dyn OutputSink>,
}

impl Process {
    /// Creates a process with its data segment copied to low memory.
    ///
    /// The heap cursor starts just past the data segment plus a fixed gap,
    /// aligned to 4 bytes. A data segment larger than the image terminates
    /// the process immediately with a fault diagnostic.
    pub fn new(pid: Pid, bytecode: Vec<Instruction>, data: Vec<u8>, stdout: Box<dyn OutputSink>) -> Self {
        let mut process = Self {
            pid,
            state: ProcessState::Running,
            code: bytecode,
            memory: Memory::new(&[]).expect("empty image always fits"),
            stack: Vec::with_capacity(64),
            pc: 0,
            fp: FRAME_BASE,
            hp: align4(data.len() + HEAP_GAP),
            scan: None,
            stdout,
        };
        match Memory::new(&data) {
            Ok(memory) => process.memory = memory,
            Err(fault) => process.fault(fault),
        }
        process
    }

    /// Returns this process's identifier.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Returns the size of the memory image in bytes.
    pub fn memory_usage(&self) -> usize {
        MEM_SIZE
    }

    /// Forces the process into the terminal state. Used by `kill`.
    pub fn terminate(&mut self) {
        self.state = ProcessState::Terminated;
    }

    /// Executes up to `max_cycles` instructions.
    ///
    /// Returns `true` if the process is still `Running` and wants another
    /// chunk, `false` once it terminated or suspended waiting for input.
    /// Running off the end of the instruction stream terminates the process.
    pub fn step(&mut self, max_cycles: usize) -> bool {
        if self.state != ProcessState::Running {
            return false;
        }

        for _ in 0..max_cycles {
            let Some(&instr) = self.code.get(self.pc) else {
                self.state = ProcessState::Terminated;
                return false;
            };
            self.pc += 1;

            if let Err(fault) = self.exec(instr) {
                self.fault(fault);
                return false;
            }

            if self.state != ProcessState::Running {
                return false;
            }
        }

        true
    }

    /// Delivers a line of input to a process suspended in `WaitingInput`.
    ///
    /// The line is split on whitespace and each token is converted according
    /// to the captured format string. Conversions beyond the available tokens
    /// leave their target addresses untouched. The process returns to
    /// `Running` unless a conversion write faults.
    pub fn resolve_input(&mut self, line: &str) {
        if self.state != ProcessState::WaitingInput {
            return;
        }
        let Some(ctx) = self.scan.take() else {
            self.state = ProcessState::Running;
            return;
        };

        let mut tokens = line.split_whitespace();
        for (conv, &addr) in parse_scan_conversions(&ctx.format)
            .iter()
            .zip(ctx.addresses.iter())
        {
            let Some(token) = tokens.next() else {
                break;
            };
            let result = match conv {
                ScanConv::Int => {
                    let v = token.parse::<f64>().map(f64::trunc).unwrap_or(f64::NAN);
                    self.memory.write_f32(addr, v)
                }
                ScanConv::Float => {
                    let v = token.parse::<f64>().unwrap_or(f64::NAN);
                    self.memory.write_f32(addr, v)
                }
                ScanConv::LongFloat => {
                    let v = token.parse::<f64>().unwrap_or(f64::NAN);
                    self.memory.write_f64(addr, v)
                }
                ScanConv::Char => {
                    let v = token.chars().next().map(|c| c as u32 as f64).unwrap_or(0.0);
                    self.memory.write_f32(addr, v)
                }
                ScanConv::Str => self
                    .memory
                    .write_bytes(addr, token.as_bytes())
                    .and_then(|_| self.memory.write_bytes(addr + token.len(), &[0])),
            };
            if let Err(fault) = result {
                self.fault(fault);
                return;
            }
        }

        self.state = ProcessState::Running;
    }

    /// Renders a fault on the process stdout and terminates the process.
    fn fault(&mut self, fault: Fault) {
        self.stdout
            .write(&format!("Segmentation Fault (Core Dumped): {fault}\n"));
        self.state = ProcessState::Terminated;
    }

    /// Executes a single instruction.
    fn exec(&mut self, instr: Instruction) -> Result<(), Fault> {
        let op = instr.opcode;
        match op {
            // Control
            Opcode::Halt => {
                self.state = ProcessState::Terminated;
            }
            Opcode::Jmp => {
                self.pc = self.jump_target(&instr)?;
            }
            Opcode::Jz => {
                let target = self.jump_target(&instr)?;
                if self.pop(op)? == 0.0 {
                    self.pc = target;
                }
            }

            // Stack
            Opcode::Lit => {
                self.stack.push(self.num_arg(&instr)?);
            }
            Opcode::Pop => {
                self.pop(op)?;
            }
            Opcode::Dup => {
                let top = self.pop(op)?;
                self.stack.push(top);
                self.stack.push(top);
            }

            // Arithmetic. The right-hand operand is pushed last, so it pops
            // first.
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
                let rhs = self.pop(op)?;
                let lhs = self.pop(op)?;
                let result = match op {
                    Opcode::Add => lhs + rhs,
                    Opcode::Sub => lhs - rhs,
                    Opcode::Mul => lhs * rhs,
                    Opcode::Div => {
                        if rhs == 0.0 {
                            return Err(Fault::DivisionByZero);
                        }
                        lhs / rhs
                    }
                    Opcode::Mod => {
                        if rhs == 0.0 {
                            return Err(Fault::DivisionByZero);
                        }
                        lhs % rhs
                    }
                    _ => unreachable!(),
                };
                self.stack.push(result);
            }

            // Comparison
            Opcode::Eq | Opcode::Neq | Opcode::Lt | Opcode::Gt | Opcode::Le | Opcode::Ge => {
                let rhs = self.pop(op)?;
                let lhs = self.pop(op)?;
                let truth = match op {
                    Opcode::Eq => lhs == rhs,
                    Opcode::Neq => lhs != rhs,
                    Opcode::Lt => lhs < rhs,
                    Opcode::Gt => lhs > rhs,
                    Opcode::Le => lhs <= rhs,
                    Opcode::Ge => lhs >= rhs,
                    _ => unreachable!(),
                };
                self.stack.push(if truth { 1.0 } else { 0.0 });
            }

            // Locals
            Opcode::Load => {
                let addr = self.frame_addr(&instr)?;
                self.stack.push(self.memory.read_f32(addr)?);
            }
            Opcode::Store => {
                let addr = self.frame_addr(&instr)?;
                let value = self.pop(op)?;
                self.memory.write_f32(addr, value)?;
            }
            Opcode::Load64 => {
                let addr = self.frame_addr(&instr)?;
                self.stack.push(self.memory.read_f64(addr)?);
            }
            Opcode::Store64 => {
                let addr = self.frame_addr(&instr)?;
                let value = self.pop(op)?;
                self.memory.write_f64(addr, value)?;
            }

            // Addressing and indirection
            Opcode::PushAddr => {
                let addr = self.frame_addr(&instr)?;
                self.stack.push(addr as f64);
            }
            Opcode::LoadInd => {
                let addr = self.pop_addr(op)?;
                self.stack.push(self.memory.read_f32(addr)?);
            }
            Opcode::LoadInd64 => {
                let addr = self.pop_addr(op)?;
                self.stack.push(self.memory.read_f64(addr)?);
            }
            Opcode::StoreInd => {
                let value = self.pop(op)?;
                let addr = self.pop_addr(op)?;
                self.memory.write_f32(addr, value)?;
                self.stack.push(value);
            }
            Opcode::StoreInd64 => {
                let value = self.pop(op)?;
                let addr = self.pop_addr(op)?;
                self.memory.write_f64(addr, value)?;
                self.stack.push(value);
            }

            // Heap. The bump cursor is never checked against the frame
            // region; a program that outgrows the gap corrupts its own
            // locals and faults only at the image boundary.
            Opcode::Malloc => {
                let size = self.pop(op)?.max(0.0) as usize;
                self.stack.push(self.hp as f64);
                self.hp = align4(self.hp + size);
            }
            Opcode::Free => {
                // Reserved opcode.
            }

            // Math intrinsics
            Opcode::Sin => {
                let v = self.pop(op)?;
                self.stack.push(v.sin());
            }
            Opcode::Cos => {
                let v = self.pop(op)?;
                self.stack.push(v.cos());
            }
            Opcode::Tan => {
                let v = self.pop(op)?;
                self.stack.push(v.tan());
            }
            Opcode::Sqrt => {
                let v = self.pop(op)?;
                self.stack.push(v.sqrt());
            }
            Opcode::Abs => {
                let v = self.pop(op)?;
                self.stack.push(v.abs());
            }
            Opcode::Pow => {
                let exponent = self.pop(op)?;
                let base = self.pop(op)?;
                self.stack.push(base.powf(exponent));
            }

            // Host I/O
            Opcode::Print => self.op_print(&instr)?,
            Opcode::Scanf => self.op_scanf(&instr)?,
        }
        Ok(())
    }

    /// Pops the format address and `n` value arguments, renders the format
    /// string and writes the result to the stdout sink.
    fn op_print(&mut self, instr: &Instruction) -> Result<(), Fault> {
        let count = self.num_arg(instr)?.max(0.0) as usize;
        let format_addr = self.pop_addr(Opcode::Print)?;
        let format = self.memory.read_cstr(format_addr)?;

        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(self.pop(Opcode::Print)?);
        }
        // Arguments were pushed left to right, so popping reversed them.
        args.reverse();

        let rendered = self.render_format(&format, &args)?;
        self.stdout.write(&rendered);
        Ok(())
    }

    /// Pops the format address and `n` target addresses, then suspends the
    /// process until the host delivers a line via [`Process::resolve_input`].
    fn op_scanf(&mut self, instr: &Instruction) -> Result<(), Fault> {
        let count = self.num_arg(instr)?.max(0.0) as usize;
        let format_addr = self.pop_addr(Opcode::Scanf)?;
        let format = self.memory.read_cstr(format_addr)?;

        let mut addresses = Vec::with_capacity(count);
        for _ in 0..count {
            addresses.push(self.pop_addr(Opcode::Scanf)?);
        }
        addresses.reverse();

        self.scan = Some(ScanContext { format, addresses });
        self.state = ProcessState::WaitingInput;
        Ok(())
    }

    /// Interprets `%[flags][.precision]<type>` conversions against `args`.
    ///
    /// `%d` floors (not truncates) its value, matching the source system;
    /// `%f` defaults to six fractional digits; `%x` renders lowercase hex;
    /// `%s` reads a NUL-terminated string from the argument address. Unknown
    /// specifiers are emitted verbatim and consume no argument.
    fn render_format(&self, format: &str, args: &[f64]) -> Result<String, Fault> {
        let chars: Vec<char> = format.chars().collect();
        let mut out = String::with_capacity(format.len());
        let mut i = 0;
        let mut arg_i = 0;

        let mut next_arg = |arg_i: &mut usize| -> f64 {
            let v = args.get(*arg_i).copied().unwrap_or(0.0);
            *arg_i += 1;
            v
        };

        while i < chars.len() {
            if chars[i] != '%' {
                out.push(chars[i]);
                i += 1;
                continue;
            }

            // Collect the specifier body: flags, width and precision, then
            // an optional length modifier.
            let mut spec = String::from('%');
            i += 1;
            while i < chars.len() && is_spec_flag(chars[i]) {
                spec.push(chars[i]);
                i += 1;
            }
            if i < chars.len() && chars[i] == 'l' {
                spec.push('l');
                i += 1;
            }
            let Some(&ty) = chars.get(i) else {
                out.push_str(&spec);
                break;
            };

            match ty {
                'd' => {
                    i += 1;
                    let v = next_arg(&mut arg_i);
                    out.push_str(&format_int(v));
                }
                'f' => {
                    i += 1;
                    let v = next_arg(&mut arg_i);
                    let precision = spec_precision(&spec).unwrap_or(6);
                    out.push_str(&format!("{v:.precision$}"));
                }
                'x' => {
                    i += 1;
                    let v = next_arg(&mut arg_i);
                    out.push_str(&format_hex(v));
                }
                'c' => {
                    i += 1;
                    let v = next_arg(&mut arg_i);
                    let code = v.floor().max(0.0) as u32;
                    out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                's' => {
                    i += 1;
                    let v = next_arg(&mut arg_i);
                    let addr = value_as_addr(v)?;
                    out.push_str(&self.memory.read_cstr(addr)?);
                }
                _ => {
                    // Unknown conversion: emit the collected prefix verbatim
                    // and let the type character re-enter the loop as a
                    // literal.
                    out.push_str(&spec);
                }
            }
        }

        Ok(out)
    }

    // Small decoding helpers shared by the handlers.

    fn pop(&mut self, op: Opcode) -> Result<f64, Fault> {
        self.stack.pop().ok_or(Fault::StackUnderflow {
            mnemonic: op.mnemonic(),
        })
    }

    fn pop_addr(&mut self, op: Opcode) -> Result<usize, Fault> {
        let v = self.pop(op)?;
        value_as_addr(v)
    }

    fn num_arg(&self, instr: &Instruction) -> Result<f64, Fault> {
        instr.arg.ok_or(Fault::MissingOperand {
            mnemonic: instr.opcode.mnemonic(),
        })
    }

    /// Resolves a frame-relative operand to an absolute address.
    fn frame_addr(&self, instr: &Instruction) -> Result<usize, Fault> {
        let offset = self.num_arg(instr)?;
        if !offset.is_finite() || offset < 0.0 {
            return Err(Fault::InvalidAddress { value: offset });
        }
        Ok(self.fp + offset as usize)
    }

    /// Resolves a jump operand, validating it against the code length.
    fn jump_target(&self, instr: &Instruction) -> Result<usize, Fault> {
        let v = self.num_arg(instr)?;
        let len = self.code.len();
        if !v.is_finite() || v < 0.0 || v as usize > len {
            return Err(Fault::BadJumpTarget {
                target: if v.is_finite() && v >= 0.0 { v as usize } else { usize::MAX },
                len,
            });
        }
        Ok(v as usize)
    }
}

/// Converts a stack value into a memory address.
fn value_as_addr(v: f64) -> Result<usize, Fault> {
    if !v.is_finite() || v < 0.0 {
        return Err(Fault::InvalidAddress { value: v });
    }
    Ok(v as usize)
}

/// Characters allowed between `%` and the conversion type.
fn is_spec_flag(c: char) -> bool {
    matches!(c, '-' | '+' | ' ' | '#' | '.') || c.is_ascii_digit()
}

/// Extracts the `.precision` digits from a collected specifier prefix.
fn spec_precision(spec: &str) -> Option<usize> {
    let dot = spec.find('.')?;
    let digits: String = spec[dot + 1..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// `%d` rendering: floor, then decimal.
fn format_int(v: f64) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    (v.floor() as i64).to_string()
}

/// `%x` rendering: floor, then lowercase hex with an explicit sign.
fn format_hex(v: f64) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let n = v.floor() as i64;
    if n < 0 {
        format!("-{:x}", n.unsigned_abs())
    } else {
        format!("{n:x}")
    }
}

/// Extracts the `%d`/`%f`/`%lf`/`%c`/`%s` conversions from a scanf format.
fn parse_scan_conversions(format: &str) -> Vec<ScanConv> {
    let chars: Vec<char> = format.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '%' {
            i += 1;
            continue;
        }
        i += 1;
        let long_mod = chars.get(i) == Some(&'l');
        if long_mod {
            i += 1;
        }
        match chars.get(i) {
            Some('d') => out.push(ScanConv::Int),
            Some('f') => out.push(if long_mod {
                ScanConv::LongFloat
            } else {
                ScanConv::Float
            }),
            Some('c') => out.push(ScanConv::Char),
            Some('s') => out.push(ScanConv::Str),
            _ => continue,
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn capture() -> (Arc<Mutex<String>>, Box<dyn OutputSink>) {
        let buffer = Arc::new(Mutex::new(String::new()));
        let sink = buffer.clone();
        (
            buffer,
            Box::new(move |text: &str| sink.lock().unwrap().push_str(text)),
        )
    }

    fn run(bytecode: Vec<Instruction>, data: &[u8]) -> (String, ProcessState) {
        let (buffer, sink) = capture();
        let mut process = Process::new(100, bytecode, data.to_vec(), sink);
        while process.step(1024) {}
        let output = buffer.lock().unwrap().clone();
        (output, process.state())
    }

    #[test]
    fn empty_bytecode_terminates_immediately() {
        let (output, state) = run(vec![], &[]);
        assert_eq!(output, "");
        assert_eq!(state, ProcessState::Terminated);
    }

    #[test]
    fn arithmetic_pops_rhs_first() {
        // 10 - 4 = 6
        let (output, _) = run(
            vec![
                Instruction::with_arg(Opcode::Lit, 10.0),
                Instruction::with_arg(Opcode::Lit, 4.0),
                Instruction::new(Opcode::Sub),
                Instruction::with_arg(Opcode::Lit, 0.0),
                Instruction::with_arg(Opcode::Print, 1.0),
                Instruction::new(Opcode::Halt),
            ],
            b"%d\0",
        );
        assert_eq!(output, "6");
    }

    #[test]
    fn division_by_zero_faults() {
        let (output, state) = run(
            vec![
                Instruction::with_arg(Opcode::Lit, 1.0),
                Instruction::with_arg(Opcode::Lit, 0.0),
                Instruction::new(Opcode::Div),
                Instruction::new(Opcode::Halt),
            ],
            &[],
        );
        assert_eq!(
            output,
            "Segmentation Fault (Core Dumped): division by zero\n"
        );
        assert_eq!(state, ProcessState::Terminated);
    }

    #[test]
    fn out_of_bounds_store_faults() {
        let (output, state) = run(
            vec![
                Instruction::with_arg(Opcode::Lit, 1.0),
                Instruction::with_arg(Opcode::Store, (MEM_SIZE - FRAME_BASE) as f64),
            ],
            &[],
        );
        assert!(output.starts_with("Segmentation Fault (Core Dumped): out of bounds write"));
        assert_eq!(state, ProcessState::Terminated);
    }

    #[test]
    fn step_reports_chunk_exhaustion() {
        // An infinite loop: JMP 0.
        let (_, sink) = capture();
        let mut process = Process::new(100, vec![Instruction::with_arg(Opcode::Jmp, 0.0)], vec![], sink);
        assert!(process.step(100));
        assert_eq!(process.state(), ProcessState::Running);
    }

    #[test]
    fn malloc_returns_aligned_pointers() {
        let (output, _) = run(
            vec![
                Instruction::with_arg(Opcode::Lit, 3.0),
                Instruction::new(Opcode::Malloc),
                Instruction::with_arg(Opcode::Lit, 5.0),
                Instruction::new(Opcode::Malloc),
                Instruction::with_arg(Opcode::Lit, 0.0),
                Instruction::with_arg(Opcode::Print, 2.0),
                Instruction::new(Opcode::Halt),
            ],
            b"%d %d\0",
        );
        let parts: Vec<usize> = output
            .split_whitespace()
            .map(|p| p.parse().unwrap())
            .collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0] % 4, 0);
        assert_eq!(parts[1] % 4, 0);
        assert!(parts[1] > parts[0]);
    }

    #[test]
    fn scanf_suspends_and_resolve_resumes() {
        let (buffer, sink) = capture();
        let mut process = Process::new(
            100,
            vec![
                // scanf("%d", fp+0); the format string sits at data address 0
                Instruction::with_arg(Opcode::PushAddr, 0.0),
                Instruction::with_arg(Opcode::Lit, 0.0),
                Instruction::with_arg(Opcode::Scanf, 1.0),
                // printf("%d", load fp+0)
                Instruction::with_arg(Opcode::Load, 0.0),
                Instruction::with_arg(Opcode::Lit, 0.0),
                Instruction::with_arg(Opcode::Print, 1.0),
                Instruction::new(Opcode::Halt),
            ],
            b"%d\0".to_vec(),
            sink,
        );
        assert!(!process.step(1024));
        assert_eq!(process.state(), ProcessState::WaitingInput);

        process.resolve_input("42");
        assert_eq!(process.state(), ProcessState::Running);
        while process.step(1024) {}
        assert_eq!(buffer.lock().unwrap().as_str(), "42");
    }

    #[test]
    fn scanf_with_too_few_tokens_leaves_addresses_untouched() {
        let (buffer, sink) = capture();
        let mut process = Process::new(
            100,
            vec![
                Instruction::with_arg(Opcode::PushAddr, 0.0),
                Instruction::with_arg(Opcode::PushAddr, 4.0),
                Instruction::with_arg(Opcode::Lit, 0.0),
                Instruction::with_arg(Opcode::Scanf, 2.0),
                Instruction::with_arg(Opcode::Load, 0.0),
                Instruction::with_arg(Opcode::Load, 4.0),
                Instruction::with_arg(Opcode::Lit, 0.0),
                Instruction::with_arg(Opcode::Print, 2.0),
                Instruction::new(Opcode::Halt),
            ],
            b"%d %d\0".to_vec(),
            sink,
        );
        process.step(1024);
        process.resolve_input("7");
        while process.step(1024) {}
        // The second conversion had no token; its slot keeps its zeroed value.
        assert_eq!(buffer.lock().unwrap().as_str(), "7 0");
    }

    #[test]
    fn kill_while_waiting_wins_over_late_input() {
        let (_, sink) = capture();
        let mut process = Process::new(
            100,
            vec![
                Instruction::with_arg(Opcode::PushAddr, 0.0),
                Instruction::with_arg(Opcode::Lit, 0.0),
                Instruction::with_arg(Opcode::Scanf, 1.0),
                Instruction::new(Opcode::Halt),
            ],
            b"%d\0".to_vec(),
            sink,
        );
        process.step(1024);
        process.terminate();
        process.resolve_input("5");
        assert_eq!(process.state(), ProcessState::Terminated);
        assert!(!process.step(1024));
    }

    #[test]
    fn print_renders_string_from_data_segment() {
        let (output, _) = run(
            vec![
                Instruction::with_arg(Opcode::Lit, 3.0),
                Instruction::with_arg(Opcode::Lit, 0.0),
                Instruction::with_arg(Opcode::Print, 1.0),
                Instruction::new(Opcode::Halt),
            ],
            b"%s\0abc\0",
        );
        assert_eq!(output, "abc");
    }

    #[test]
    fn print_floor_semantics_for_negative_d() {
        let (output, _) = run(
            vec![
                Instruction::with_arg(Opcode::Lit, -2.5),
                Instruction::with_arg(Opcode::Lit, 0.0),
                Instruction::with_arg(Opcode::Print, 1.0),
                Instruction::new(Opcode::Halt),
            ],
            b"%d\0",
        );
        // floor(-2.5) = -3, unlike C's truncation toward zero.
        assert_eq!(output, "-3");
    }

    #[test]
    fn print_unknown_specifier_passes_through() {
        let (output, _) = run(
            vec![
                Instruction::with_arg(Opcode::Lit, 0.0),
                Instruction::with_arg(Opcode::Print, 0.0),
                Instruction::new(Opcode::Halt),
            ],
            b"100%!\0",
        );
        assert_eq!(output, "100%!");
    }

    #[test]
    fn print_precision_and_hex() {
        let (output, _) = run(
            vec![
                Instruction::with_arg(Opcode::Lit, 3.14159),
                Instruction::with_arg(Opcode::Lit, 255.0),
                Instruction::with_arg(Opcode::Lit, 0.0),
                Instruction::with_arg(Opcode::Print, 2.0),
                Instruction::new(Opcode::Halt),
            ],
            b"%.2f %x\0",
        );
        assert_eq!(output, "3.14 ff");
    }

    #[test]
    fn stack_underflow_faults_instead_of_panicking() {
        let (output, state) = run(vec![Instruction::new(Opcode::Add)], &[]);
        assert!(output.starts_with("Segmentation Fault (Core Dumped): evaluation stack underflow"));
        assert_eq!(state, ProcessState::Terminated);
    }

    #[test]
    fn free_is_a_noop() {
        let (output, state) = run(
            vec![
                Instruction::with_arg(Opcode::Lit, 7.0),
                Instruction::new(Opcode::Free),
                Instruction::with_arg(Opcode::Lit, 0.0),
                Instruction::with_arg(Opcode::Print, 1.0),
                Instruction::new(Opcode::Halt),
            ],
            b"%d\0",
        );
        assert_eq!(output, "7");
        assert_eq!(state, ProcessState::Terminated);
    }
}
