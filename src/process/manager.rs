//! Process registry with change notification.
//!
//! Owns every live process, assigns PIDs and fans out change notifications
//! to subscribers. The manager is an explicit context object constructed by
//! the host and shared as `Arc<ProcessManager>`; mutating calls notify
//! subscribers synchronously before returning.

use crate::info;
use crate::process::isa::Instruction;
use crate::process::state::ProcessState;
use crate::process::vm::{OutputSink, Pid, Process};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

/// First PID handed out. The counter never decreases within a host lifetime.
const FIRST_PID: Pid = 100;

/// Identifier returned by [`ProcessManager::subscribe`], used to unsubscribe.
pub type SubscriptionId = u64;

/// Callback invoked on every registry change.
pub type SubscriberFn = Box<dyn Fn() + Send + Sync>;

/// A registry entry: the process itself plus bookkeeping the process table
/// view needs.
struct ProcessEntry {
    process: Arc<Mutex<Process>>,
    name: String,
    start_time: SystemTime,
    memory_usage: usize,
    window_id: Option<u32>,
}

/// Row returned by [`ProcessManager::list`].
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    pub pid: Pid,
    pub name: String,
    pub state: ProcessState,
    pub memory_usage: usize,
    pub start_time: SystemTime,
    pub window_id: Option<u32>,
}

/// Registry of live processes keyed by PID.
///
/// Maintains insertion order for a stable process-table view while providing
/// O(1) lookup by PID. Operations on unknown PIDs are silent no-ops: the host
/// UI may issue `kill` concurrently with autonomous termination.
pub struct ProcessManager {
    /// Entries indexed by PID for fast lookup.
    entries: DashMap<Pid, ProcessEntry>,
    /// Insertion order for a deterministic `list()` view.
    order: RwLock<Vec<Pid>>,
    next_pid: AtomicU32,
    subscribers: Mutex<Vec<(SubscriptionId, SubscriberFn)>>,
    next_subscription: AtomicU64,
}

impl ProcessManager {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            order: RwLock::new(Vec::new()),
            next_pid: AtomicU32::new(FIRST_PID),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    /// Creates a process from compiled artifacts and registers it.
    ///
    /// Returns the assigned PID. Subscribers are notified before returning.
    pub fn create_process(
        &self,
        name: &str,
        bytecode: Vec<Instruction>,
        data: Vec<u8>,
        stdout: Box<dyn OutputSink>,
    ) -> Pid {
        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        let process = Process::new(pid, bytecode, data, stdout);
        let memory_usage = process.memory_usage();
        self.insert(
            pid,
            ProcessEntry {
                process: Arc::new(Mutex::new(process)),
                name: name.to_string(),
                start_time: SystemTime::now(),
                memory_usage,
                window_id: None,
            },
        );
        info!("created process {pid} ({name})");
        pid
    }

    /// Registers a zero-bytecode placeholder entry used purely for
    /// bookkeeping (system services that never execute bytecode).
    pub fn register_system_process(
        &self,
        name: &str,
        memory_usage: Option<usize>,
        window_id: Option<u32>,
    ) -> Pid {
        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        let process = Process::new(pid, Vec::new(), Vec::new(), Box::new(|_: &str| {}));
        self.insert(
            pid,
            ProcessEntry {
                process: Arc::new(Mutex::new(process)),
                name: name.to_string(),
                start_time: SystemTime::now(),
                memory_usage: memory_usage.unwrap_or(0),
                window_id,
            },
        );
        pid
    }

    /// Terminates and removes the process with the given PID.
    ///
    /// Unknown PIDs are silent no-ops. Subscribers are notified on removal.
    pub fn kill(&self, pid: Pid) {
        if let Some((_, entry)) = self.entries.remove(&pid) {
            entry.process.lock().unwrap().terminate();
            self.order.write().unwrap().retain(|p| *p != pid);
            info!("killed process {pid}");
            self.notify();
        }
    }

    /// Kills every process owned by the given window.
    pub fn kill_by_window(&self, window_id: u32) {
        let pids: Vec<Pid> = self
            .entries
            .iter()
            .filter(|e| e.window_id == Some(window_id))
            .map(|e| *e.key())
            .collect();
        for pid in pids {
            self.kill(pid);
        }
    }

    /// Returns a handle to the process for stepping and input delivery.
    pub fn get(&self, pid: Pid) -> Option<Arc<Mutex<Process>>> {
        self.entries.get(&pid).map(|e| e.process.clone())
    }

    /// Returns a snapshot of the process table in creation order.
    ///
    /// Entries whose process terminated on its own are swept out first; the
    /// sweep notifies subscribers like any other removal.
    pub fn list(&self) -> Vec<ProcessSnapshot> {
        self.sweep_terminated();

        let order = self.order.read().unwrap();
        order
            .iter()
            .filter_map(|pid| {
                self.entries.get(pid).map(|entry| ProcessSnapshot {
                    pid: *pid,
                    name: entry.name.clone(),
                    state: entry.process.lock().unwrap().state(),
                    memory_usage: entry.memory_usage,
                    start_time: entry.start_time,
                    window_id: entry.window_id,
                })
            })
            .collect()
    }

    /// Registers a change callback; returns an id for [`unsubscribe`].
    ///
    /// Callbacks run synchronously inside the mutating call and must not
    /// call back into the manager.
    ///
    /// [`unsubscribe`]: ProcessManager::unsubscribe
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap()
            .push((id, Box::new(callback)));
        id
    }

    /// Removes a previously registered change callback.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().unwrap().retain(|(i, _)| *i != id);
    }

    /// Number of live entries, placeholders included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no process is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&self, pid: Pid, entry: ProcessEntry) {
        self.order.write().unwrap().push(pid);
        self.entries.insert(pid, entry);
        self.notify();
    }

    /// Removes entries whose process terminated autonomously.
    fn sweep_terminated(&self) {
        let dead: Vec<Pid> = self
            .entries
            .iter()
            .filter(|e| e.process.lock().unwrap().state() == ProcessState::Terminated)
            .map(|e| *e.key())
            .collect();
        if dead.is_empty() {
            return;
        }
        for pid in &dead {
            self.entries.remove(pid);
        }
        self.order
            .write()
            .unwrap()
            .retain(|p| !dead.contains(p));
        self.notify();
    }

    fn notify(&self) {
        for (_, callback) in self.subscribers.lock().unwrap().iter() {
            callback();
        }
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}
