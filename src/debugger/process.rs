use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};

use crate::debugger::module::{MemoryModule, ModuleId};

/// Word width of the target architecture.
///
/// All expression arithmetic and memory word reads are masked to this
/// width, so a 32-bit target wraps exactly where the real hardware would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchitectureWidth {
    Bits32,
    Bits64,
}

impl ArchitectureWidth {
    pub const fn mask(self) -> u64 {
        match self {
            Self::Bits32 => 0xffff_ffff,
            Self::Bits64 => u64::MAX,
        }
    }

    pub const fn word_bytes(self) -> usize {
        match self {
            Self::Bits32 => 4,
            Self::Bits64 => 8,
        }
    }
}

impl fmt::Display for ArchitectureWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bits32 => f.write_str("32-bit"),
            Self::Bits64 => f.write_str("64-bit"),
        }
    }
}

/// Identifier of a thread in the target process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(u64);

impl ThreadId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

/// Scheduling state of a target thread as last reported by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Running,
    Suspended,
}

/// A thread of the target process with its last known register snapshot.
///
/// Registers are only meaningful while the thread is suspended; the agent
/// sends a fresh snapshot with every breakpoint hit.
#[derive(Debug, Clone)]
pub struct Thread {
    id: ThreadId,
    state: ThreadState,
    registers: HashMap<String, u64>,
}

impl Thread {
    pub fn new(id: ThreadId, state: ThreadState) -> Self {
        Self {
            id,
            state,
            registers: HashMap::new(),
        }
    }

    pub const fn id(&self) -> ThreadId {
        self.id
    }

    pub const fn state(&self) -> ThreadState {
        self.state
    }

    pub fn registers(&self) -> &HashMap<String, u64> {
        &self.registers
    }

    pub fn register(&self, name: &str) -> Option<u64> {
        self.registers.get(name).copied()
    }

    pub(crate) fn set_state(&mut self, state: ThreadState) {
        self.state = state;
    }

    pub(crate) fn set_registers(&mut self, registers: HashMap<String, u64>) {
        self.registers = registers;
    }

    pub(crate) fn set_register(&mut self, name: impl Into<String>, value: u64) {
        self.registers.insert(name.into(), value);
    }
}

/// Mirror of the target process as reported by the debug agent.
///
/// Tracks the loaded modules, the known threads and which thread the user
/// currently works with. The mirror is only ever mutated from agent
/// replies, never speculatively.
#[derive(Debug, Default)]
pub struct ProcessMirror {
    modules: HashMap<ModuleId, MemoryModule>,
    threads: HashMap<ThreadId, Thread>,
    active_thread: Option<ThreadId>,
}

impl ProcessMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(&self, id: ModuleId) -> Option<&MemoryModule> {
        self.modules.get(&id)
    }

    pub fn modules(&self) -> impl Iterator<Item = &MemoryModule> {
        self.modules.values()
    }

    /// Records a module reported loaded by the agent. A re-report of a
    /// known module replaces the earlier entry, which covers modules that
    /// were unloaded and mapped again at a new base.
    pub fn add_module(&mut self, module: MemoryModule) {
        debug!("module loaded: {} at {:#x?}", module.name(), module.load_base());
        self.modules.insert(module.id(), module);
    }

    pub fn remove_module(&mut self, id: ModuleId) -> Option<MemoryModule> {
        let removed = self.modules.remove(&id);
        if removed.is_none() {
            warn!("agent reported unload of unknown {}", id);
        }
        removed
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(&id)
    }

    pub fn threads(&self) -> impl Iterator<Item = &Thread> {
        self.threads.values()
    }

    pub fn add_thread(&mut self, thread: Thread) {
        debug!("thread created: {}", thread.id());
        self.threads.insert(thread.id(), thread);
    }

    /// Drops a thread that terminated. The active thread selection falls
    /// back to none if it pointed at the terminated thread.
    pub fn remove_thread(&mut self, id: ThreadId) -> Option<Thread> {
        if self.active_thread == Some(id) {
            self.active_thread = None;
        }
        self.threads.remove(&id)
    }

    pub fn set_thread_state(&mut self, id: ThreadId, state: ThreadState) {
        if let Some(thread) = self.threads.get_mut(&id) {
            thread.set_state(state);
        } else {
            warn!("state change for unknown {}", id);
        }
    }

    pub fn set_thread_registers(&mut self, id: ThreadId, registers: HashMap<String, u64>) {
        if let Some(thread) = self.threads.get_mut(&id) {
            thread.set_registers(registers);
        } else {
            warn!("register snapshot for unknown {}", id);
        }
    }

    pub fn set_thread_register(&mut self, id: ThreadId, name: impl Into<String>, value: u64) {
        if let Some(thread) = self.threads.get_mut(&id) {
            thread.set_register(name, value);
        }
    }

    pub fn active_thread(&self) -> Option<&Thread> {
        self.active_thread.and_then(|id| self.threads.get(&id))
    }

    pub fn set_active_thread(&mut self, id: Option<ThreadId>) {
        if let Some(id) = id {
            if !self.threads.contains_key(&id) {
                warn!("cannot activate unknown {}", id);
                return;
            }
        }
        self.active_thread = id;
    }

    /// Forgets all modules and threads, used when the target detaches or
    /// terminates.
    pub fn clear(&mut self) {
        self.modules.clear();
        self.threads.clear();
        self.active_thread = None;
    }
}
