//! Line-oriented shell glue over the compiler and process manager.
//!
//! The shell classifies each input line as `./name` (instantiate a compiled
//! executable), a builtin (`cc`, `ps`, `kill`, `help`, `exit`), or an unknown
//! command. Process stepping itself is owned by the binary's driver loop;
//! [`Shell::handle_line`] only reports that a process was started and which
//! PID is now in the foreground.

use crate::compiler::compile;
use crate::process::manager::ProcessManager;
use crate::process::program::Executable;
use crate::process::vm::{OutputSink, Pid};
use crate::{error, info};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// File extension of executable artifacts.
pub const ARTIFACT_EXT: &str = "obc";

/// What a handled line asks the driver to do next.
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome {
    /// Nothing to drive; prompt for the next line.
    Handled,
    /// A process was created; it is now the foreground PID.
    Started(Pid),
    /// The user asked to leave the shell.
    Exit,
}

/// Shell state: the process manager plus the table of compiled programs.
pub struct Shell {
    manager: Arc<ProcessManager>,
    programs: HashMap<String, Executable>,
    make_sink: Box<dyn Fn() -> Box<dyn OutputSink>>,
}

impl Shell {
    /// Creates a shell whose spawned processes write through sinks produced
    /// by `make_sink`.
    pub fn new(
        manager: Arc<ProcessManager>,
        make_sink: Box<dyn Fn() -> Box<dyn OutputSink>>,
    ) -> Self {
        Self {
            manager,
            programs: HashMap::new(),
            make_sink,
        }
    }

    /// Registers a compiled program under a name, making `./name` work.
    pub fn register_program(&mut self, name: &str, executable: Executable) {
        self.programs.insert(name.to_string(), executable);
    }

    /// Classifies and executes one input line.
    pub fn handle_line(&mut self, line: &str) -> LineOutcome {
        let line = line.trim();
        if line.is_empty() {
            return LineOutcome::Handled;
        }

        if let Some(name) = line.strip_prefix("./") {
            return self.run_program(name);
        }

        let mut words = line.split_whitespace();
        match words.next() {
            Some("help") => {
                println!("builtins:");
                println!("  cc <file.c>    compile a program and write <file>.{ARTIFACT_EXT}");
                println!("  ./<name>       run a compiled program");
                println!("  ps             list processes");
                println!("  kill <pid>     terminate a process");
                println!("  exit           leave the shell");
                LineOutcome::Handled
            }
            Some("exit") => LineOutcome::Exit,
            Some("ps") => {
                self.print_process_table();
                LineOutcome::Handled
            }
            Some("kill") => {
                match words.next().and_then(|w| w.parse::<Pid>().ok()) {
                    Some(pid) => self.manager.kill(pid),
                    None => eprintln!("usage: kill <pid>"),
                }
                LineOutcome::Handled
            }
            Some("cc") => {
                match words.next() {
                    Some(path) => self.compile_file(path),
                    None => eprintln!("usage: cc <file.c>"),
                }
                LineOutcome::Handled
            }
            Some(other) => {
                eprintln!("osh: command not found: {other}");
                LineOutcome::Handled
            }
            None => LineOutcome::Handled,
        }
    }

    /// Starts a program from the table, falling back to a `.obc` artifact
    /// file next to the shell.
    fn run_program(&mut self, name: &str) -> LineOutcome {
        if !self.programs.contains_key(name) {
            let path = format!("{name}.{ARTIFACT_EXT}");
            match std::fs::read(&path) {
                Ok(bytes) => match Executable::from_bytes(&bytes) {
                    Ok(executable) => {
                        self.programs.insert(name.to_string(), executable);
                    }
                    Err(err) => {
                        eprintln!("osh: {path}: {err}");
                        return LineOutcome::Handled;
                    }
                },
                Err(_) => {
                    eprintln!("osh: no such program: {name}");
                    return LineOutcome::Handled;
                }
            }
        }

        let executable = self.programs.get(name).expect("inserted above").clone();
        let pid = self.manager.create_process(
            name,
            executable.bytecode,
            executable.data,
            (self.make_sink)(),
        );
        LineOutcome::Started(pid)
    }

    /// Compiles a source file, registers it and writes its artifact.
    fn compile_file(&mut self, path: &str) {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("cc: {path}: {err}");
                return;
            }
        };
        match compile(&source) {
            Ok(output) => {
                for warning in &output.warnings {
                    eprintln!("cc: {warning}");
                }
                let stem = Path::new(path)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.to_string());
                let executable = Executable::new(output.bytecode, output.data);

                let artifact = format!("{stem}.{ARTIFACT_EXT}");
                if let Err(err) = std::fs::write(&artifact, executable.to_bytes()) {
                    error!("failed to write {artifact}: {err}");
                } else {
                    info!("wrote {artifact}");
                }
                self.register_program(&stem, executable);
                println!("compiled {path} -> ./{stem}");
            }
            Err(err) => eprintln!("cc: {err}"),
        }
    }

    fn print_process_table(&self) {
        let rows = self.manager.list();
        println!("{:>6}  {:<16}{:<12}{:>8}  {:>8}", "PID", "NAME", "STATE", "MEM", "UPTIME");
        for row in rows {
            let uptime = SystemTime::now()
                .duration_since(row.start_time)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            println!(
                "{:>6}  {:<16}{:<12}{:>8}  {:>7}s",
                row.pid,
                row.name,
                row.state.to_string(),
                row.memory_usage,
                uptime
            );
        }
    }
}
