//! Process lifecycle state.

use std::fmt::{Display, Formatter};

/// Execution state of a process.
///
/// Transitions: `Running -> {Running, WaitingInput, Terminated}` and
/// `WaitingInput -> {Running, Terminated}`. `Terminated` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Eligible for stepping.
    Running,
    /// Suspended inside a `SCANF`, waiting for a line of input.
    WaitingInput,
    /// Halted, faulted or killed. Final.
    Terminated,
}

impl Display for ProcessState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessState::Running => write!(f, "running"),
            ProcessState::WaitingInput => write!(f, "waiting"),
            ProcessState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Captured `SCANF` arguments while a process is suspended in
/// [`ProcessState::WaitingInput`].
///
/// `addresses` are absolute target addresses in declaration order, one per
/// conversion specifier in `format`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanContext {
    pub format: String,
    pub addresses: Vec<usize>,
}
