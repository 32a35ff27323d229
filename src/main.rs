//! Interactive shell for the Optimus-OS core.
//!
//! Reads one line at a time, classifies it through the shell, and drives
//! foreground processes cooperatively: step a chunk of instructions, yield
//! back to the runtime, repeat. While the foreground process waits on
//! `scanf`, terminal lines are routed to it as program input instead of
//! being parsed as commands. Ctrl-C kills the foreground process.
//!
//! # Usage
//! ```text
//! osh [file.c ...] [OPTIONS]
//! ```
//!
//! # Arguments
//! - `file.c`: Source files compiled on startup, runnable as `./<name>`
//!
//! # Options
//! - `-v, --verbose`: Log informational messages
//! - `-h, --help`: Print this help message

use optimus_os::process::manager::ProcessManager;
use optimus_os::process::state::ProcessState;
use optimus_os::process::vm::Pid;
use optimus_os::shell::{LineOutcome, Shell};
use optimus_os::utils::log;
use std::env;
use std::io::Write;
use std::process;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Instructions executed per scheduling slice before yielding.
const STEP_CHUNK: usize = 2048;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let mut sources: Vec<String> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            "-v" | "--verbose" => log::init(log::Level::Info),
            other if other.starts_with('-') => {
                eprintln!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
            other => sources.push(other.to_string()),
        }
    }

    let manager = Arc::new(ProcessManager::new());
    manager.register_system_process("osh", None, None);

    // PID of the process currently wired to the terminal; 0 means none.
    let foreground = Arc::new(AtomicU32::new(0));

    // Ctrl-C maps to `kill` on the foreground PID. The driver loop observes
    // the removal before its next chunk.
    {
        let manager = manager.clone();
        let foreground = foreground.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                let pid = foreground.load(Ordering::SeqCst);
                if pid != 0 {
                    println!("^C");
                    manager.kill(pid);
                }
            }
        });
    }

    let mut shell = Shell::new(
        manager.clone(),
        Box::new(|| {
            Box::new(|text: &str| {
                print!("{text}");
                let _ = std::io::stdout().flush();
            })
        }),
    );

    for path in &sources {
        shell.handle_line(&format!("cc {path}"));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("osh> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            _ => break,
        };
        match shell.handle_line(&line) {
            LineOutcome::Handled => {}
            LineOutcome::Exit => break,
            LineOutcome::Started(pid) => {
                foreground.store(pid, Ordering::SeqCst);
                drive(&manager, pid, &mut lines).await;
                foreground.store(0, Ordering::SeqCst);
                // Sweep the terminated entry out of the table.
                manager.list();
            }
        }
    }
}

/// Cooperative step pump for the foreground process.
///
/// Steps a chunk, yields to the runtime, and repeats until the process
/// terminates, gets killed, or suspends on input; suspension reads the next
/// terminal line and delivers it as program input.
async fn drive(manager: &Arc<ProcessManager>, pid: Pid, lines: &mut Lines<BufReader<Stdin>>) {
    loop {
        // `get` failing means the process was killed and removed.
        let Some(handle) = manager.get(pid) else {
            return;
        };

        if handle.lock().unwrap().step(STEP_CHUNK) {
            tokio::task::yield_now().await;
            continue;
        }

        let state = handle.lock().unwrap().state();
        match state {
            ProcessState::Terminated => return,
            ProcessState::WaitingInput => match lines.next_line().await {
                Ok(Some(line)) => handle.lock().unwrap().resolve_input(&line),
                _ => {
                    // Stdin closed while the program wanted input.
                    manager.kill(pid);
                    return;
                }
            },
            ProcessState::Running => {}
        }
    }
}

const USAGE: &str = "\
Optimus-OS shell

USAGE:
    {program} [file.c ...] [OPTIONS]

ARGS:
    <file.c>         Source files compiled on startup, runnable as ./<name>

OPTIONS:
    -v, --verbose    Log informational messages
    -h, --help       Print this help message

BUILTINS:
    cc <file.c>      Compile a program and write its artifact
    ./<name>         Run a compiled program in the foreground
    ps               List processes
    kill <pid>       Terminate a process
    exit             Leave the shell

EXAMPLES:
    # Compile and run a program
    {program} hello.c
    osh> ./hello
";

/// Prints usage information to stderr.
fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
