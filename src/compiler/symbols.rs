//! Compile-time bookkeeping: the per-function symbol table and the
//! break/continue resolution stack.

use std::collections::HashMap;

/// Declared type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CType {
    Int,
    Void,
    Char,
    Float,
    Double,
}

impl CType {
    /// Maps a type keyword to its `CType`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "int" => Some(CType::Int),
            "void" => Some(CType::Void),
            "char" => Some(CType::Char),
            "float" => Some(CType::Float),
            "double" => Some(CType::Double),
            _ => None,
        }
    }
}

/// A declared local variable.
#[derive(Debug, Clone)]
pub struct VarInfo {
    /// Frame-relative byte offset.
    pub offset: usize,
    pub ctype: CType,
    pub is_pointer: bool,
    pub is_array: bool,
    pub array_size: usize,
    /// Bytes per element: 8 for a non-pointer `double`, 4 otherwise.
    pub element_size: usize,
}

/// Flat per-function symbol table with a bump cursor over the frame.
///
/// Declarations append: each variable takes `element_size * array_size`
/// bytes starting at the current cursor. The table resets at every function
/// header.
#[derive(Debug, Default)]
pub struct SymbolTable {
    vars: HashMap<String, VarInfo>,
    bump: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable and returns its frame offset.
    ///
    /// Redeclaration overwrites the mapping but still consumes new frame
    /// space; callers surface it as a warning.
    pub fn declare(
        &mut self,
        name: &str,
        ctype: CType,
        is_pointer: bool,
        array_size: Option<usize>,
    ) -> usize {
        let element_size = if ctype == CType::Double && !is_pointer {
            8
        } else {
            4
        };
        let offset = self.bump;
        self.bump += element_size * array_size.unwrap_or(1).max(1);
        self.vars.insert(
            name.to_string(),
            VarInfo {
                offset,
                ctype,
                is_pointer,
                is_array: array_size.is_some(),
                array_size: array_size.unwrap_or(0),
                element_size,
            },
        );
        offset
    }

    /// Looks up a declared variable.
    pub fn get(&self, name: &str) -> Option<&VarInfo> {
        self.vars.get(name)
    }

    /// Returns true if the name is already declared.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Clears all declarations and rewinds the frame cursor.
    pub fn reset(&mut self) {
        self.vars.clear();
        self.bump = 0;
    }
}

/// Context frame used to resolve `break` and `continue` targets.
///
/// `continue_target` may be unknown when the frame is pushed (a `do-while`
/// condition comes after its body); such jumps land in `pending_continues`
/// and are patched once the target is known.
#[derive(Debug)]
pub enum FlowCtx {
    Loop {
        break_patches: Vec<usize>,
        continue_target: Option<usize>,
        pending_continues: Vec<usize>,
    },
    Switch {
        break_patches: Vec<usize>,
    },
}

impl FlowCtx {
    pub fn loop_with_target(continue_target: usize) -> Self {
        FlowCtx::Loop {
            break_patches: Vec::new(),
            continue_target: Some(continue_target),
            pending_continues: Vec::new(),
        }
    }

    pub fn loop_pending() -> Self {
        FlowCtx::Loop {
            break_patches: Vec::new(),
            continue_target: None,
            pending_continues: Vec::new(),
        }
    }

    pub fn switch() -> Self {
        FlowCtx::Switch {
            break_patches: Vec::new(),
        }
    }

    /// Records a `break` jump index on this frame.
    pub fn push_break(&mut self, index: usize) {
        match self {
            FlowCtx::Loop { break_patches, .. } | FlowCtx::Switch { break_patches } => {
                break_patches.push(index)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_append_to_the_frame() {
        let mut table = SymbolTable::new();
        assert_eq!(table.declare("a", CType::Int, false, None), 0);
        assert_eq!(table.declare("b", CType::Double, false, None), 4);
        assert_eq!(table.declare("c", CType::Char, false, None), 12);
    }

    #[test]
    fn arrays_reserve_element_size_times_count() {
        let mut table = SymbolTable::new();
        table.declare("arr", CType::Int, false, Some(10));
        assert_eq!(table.declare("next", CType::Int, false, None), 40);
        let arr = table.get("arr").unwrap();
        assert!(arr.is_array);
        assert_eq!(arr.array_size, 10);
    }

    #[test]
    fn double_is_eight_bytes_unless_pointer() {
        let mut table = SymbolTable::new();
        table.declare("d", CType::Double, false, None);
        table.declare("p", CType::Double, true, None);
        assert_eq!(table.get("d").unwrap().element_size, 8);
        assert_eq!(table.get("p").unwrap().element_size, 4);
    }

    #[test]
    fn reset_clears_names_and_cursor() {
        let mut table = SymbolTable::new();
        table.declare("a", CType::Int, false, None);
        table.reset();
        assert!(table.get("a").is_none());
        assert_eq!(table.declare("b", CType::Int, false, None), 0);
    }
}
