//! Instruction set definitions for the process virtual machine.
//!
//! The [`for_each_opcode!`](crate::for_each_opcode) macro holds the canonical
//! opcode definitions and invokes a callback macro for code generation, so
//! multiple modules can generate opcode-related code without duplicating the
//! definitions.
//!
//! This module generates:
//! - The [`Opcode`] enum with explicit byte values
//! - `TryFrom<u8>` for decoding opcodes from artifacts
//! - `mnemonic()` and `has_arg()` accessors
//!
//! Instructions are `(opcode, optional numeric argument)` records. The
//! argument is an instruction index for jumps, a frame offset for local
//! access, a literal for `LIT`, and a value-argument count for `PRINT` and
//! `SCANF`. The uniform `f64` payload matches the VM's evaluation stack; the
//! opcode selects the interpretation.

use crate::process::errors::ArtifactError;
use std::fmt::{Display, Formatter};

/// Invokes a callback macro with the complete opcode definition list.
///
/// Entry format: `Name = byte, "MNEMONIC" => OperandKind` where the operand
/// kind is `None` (bare opcode) or `Num` (carries an `f64` payload).
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Control
            // =========================
            /// HALT ; terminate the process
            Halt = 0x00, "HALT" => None,
            /// JMP target ; jump to instruction index
            Jmp = 0x01, "JMP" => Num,
            /// JZ target ; pop, jump to instruction index iff zero
            Jz = 0x02, "JZ" => Num,
            // =========================
            // Stack
            // =========================
            /// LIT value ; push a literal
            Lit = 0x10, "LIT" => Num,
            /// POP ; discard the top of the stack
            Pop = 0x11, "POP" => None,
            /// DUP ; duplicate the top of the stack
            Dup = 0x12, "DUP" => None,
            // =========================
            // Arithmetic (pop rhs, pop lhs, push result)
            // =========================
            /// ADD ; lhs + rhs
            Add = 0x20, "ADD" => None,
            /// SUB ; lhs - rhs
            Sub = 0x21, "SUB" => None,
            /// MUL ; lhs * rhs
            Mul = 0x22, "MUL" => None,
            /// DIV ; lhs / rhs (faults on division by zero)
            Div = 0x23, "DIV" => None,
            /// MOD ; lhs % rhs (faults on division by zero)
            Mod = 0x24, "MOD" => None,
            // =========================
            // Comparison (pop two, push 1 or 0)
            // =========================
            /// EQ ; lhs == rhs
            Eq = 0x30, "EQ" => None,
            /// NEQ ; lhs != rhs
            Neq = 0x31, "NEQ" => None,
            /// LT ; lhs < rhs
            Lt = 0x32, "LT" => None,
            /// GT ; lhs > rhs
            Gt = 0x33, "GT" => None,
            /// LE ; lhs <= rhs
            Le = 0x34, "LE" => None,
            /// GE ; lhs >= rhs
            Ge = 0x35, "GE" => None,
            // =========================
            // Locals (frame-relative, 32- and 64-bit floats)
            // =========================
            /// LOAD off ; push f32 at fp+off
            Load = 0x40, "LOAD" => Num,
            /// STORE off ; pop, write f32 at fp+off
            Store = 0x41, "STORE" => Num,
            /// LOAD64 off ; push f64 at fp+off
            Load64 = 0x42, "LOAD64" => Num,
            /// STORE64 off ; pop, write f64 at fp+off
            Store64 = 0x43, "STORE64" => Num,
            // =========================
            // Addressing and indirection
            // =========================
            /// P_PUSH off ; push the absolute address fp+off
            PushAddr = 0x50, "P_PUSH" => Num,
            /// L_IND ; pop address, push f32 at address
            LoadInd = 0x51, "L_IND" => None,
            /// S_IND ; pop value, pop address, write f32, push value back
            StoreInd = 0x52, "S_IND" => None,
            /// L_IND64 ; pop address, push f64 at address
            LoadInd64 = 0x53, "L_IND64" => None,
            /// S_IND64 ; pop value, pop address, write f64, push value back
            StoreInd64 = 0x54, "S_IND64" => None,
            // =========================
            // Heap
            // =========================
            /// MALLOC ; pop size, push heap pointer, bump it (4-byte aligned)
            Malloc = 0x60, "MALLOC" => None,
            /// FREE ; reserved, executes as a no-op
            Free = 0x61, "FREE" => None,
            // =========================
            // Math intrinsics
            // =========================
            /// SIN ; replace top with its sine
            Sin = 0x70, "SIN" => None,
            /// COS ; replace top with its cosine
            Cos = 0x71, "COS" => None,
            /// TAN ; replace top with its tangent
            Tan = 0x72, "TAN" => None,
            /// SQRT ; replace top with its square root
            Sqrt = 0x73, "SQRT" => None,
            /// POW ; pop exponent, pop base, push base^exponent
            Pow = 0x74, "POW" => None,
            /// ABS ; replace top with its absolute value
            Abs = 0x75, "ABS" => None,
            // =========================
            // Host I/O
            // =========================
            /// PRINT n ; pop format address, pop n value args, write to stdout
            Print = 0x80, "PRINT" => Num,
            /// SCANF n ; pop format address, pop n target addresses, suspend
            Scanf = 0x81, "SCANF" => Num,
        }
    };
}

#[macro_export]
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $byte:expr, $mnemonic:literal => $kind:ident
        ),* $(,)?
    ) => {
        /// Opcodes of the process virtual machine. The set is closed: the
        /// compiler emits nothing else and the artifact decoder rejects
        /// anything else.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $byte,
            )*
        }

        impl TryFrom<u8> for Opcode {
            type Error = ArtifactError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $byte => Ok(Opcode::$name), )*
                    _ => Err(ArtifactError::InvalidOpcode { opcode: value }),
                }
            }
        }

        impl Opcode {
            /// Returns the textual mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Returns true if this opcode carries a numeric argument.
            pub const fn has_arg(&self) -> bool {
                match self {
                    $( Opcode::$name => define_opcodes!(@has $kind), )*
                }
            }
        }
    };

    // ---------- operand kinds ----------
    (@has None) => { false };
    (@has Num)  => { true };
}

for_each_opcode!(define_opcodes);

/// A single VM instruction: an opcode plus its optional numeric argument.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub arg: Option<f64>,
}

impl Instruction {
    /// Creates an instruction without an argument.
    pub const fn new(opcode: Opcode) -> Self {
        Self { opcode, arg: None }
    }

    /// Creates an instruction with a numeric argument.
    pub const fn with_arg(opcode: Opcode, arg: f64) -> Self {
        Self {
            opcode,
            arg: Some(arg),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.arg {
            Some(arg) => write!(f, "{} {}", self.opcode.mnemonic(), arg),
            None => write!(f, "{}", self.opcode.mnemonic()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_try_from_roundtrip() {
        for byte in 0u8..=255 {
            if let Ok(op) = Opcode::try_from(byte) {
                assert_eq!(op as u8, byte);
            }
        }
    }

    #[test]
    fn opcode_try_from_invalid() {
        assert!(matches!(
            Opcode::try_from(0xFF),
            Err(ArtifactError::InvalidOpcode { opcode: 0xFF })
        ));
    }

    #[test]
    fn operand_kinds() {
        assert!(Opcode::Jmp.has_arg());
        assert!(Opcode::Lit.has_arg());
        assert!(Opcode::Print.has_arg());
        assert!(!Opcode::Halt.has_arg());
        assert!(!Opcode::Add.has_arg());
        assert!(!Opcode::Malloc.has_arg());
    }

    #[test]
    fn instruction_display() {
        assert_eq!(format!("{}", Instruction::with_arg(Opcode::Jmp, 12.0)), "JMP 12");
        assert_eq!(format!("{}", Instruction::new(Opcode::Halt)), "HALT");
        assert_eq!(
            format!("{}", Instruction::with_arg(Opcode::PushAddr, 8.0)),
            "P_PUSH 8"
        );
    }
}
