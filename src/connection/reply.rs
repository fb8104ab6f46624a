//! Replies and events arriving from the debug agent.
//!
//! A [`ReplyEnvelope`] with a packet id answers a request with the same id;
//! one without a packet id is an unsolicited event the agent pushed on its
//! own, such as a breakpoint hit or a module load.

use std::collections::HashMap;

use crate::connection::packet::PacketId;
use crate::debugger::address::RelocatedAddress;
use crate::debugger::breakpoint::BreakpointType;
use crate::debugger::process::ThreadId;

/// Outcome the agent reports for one address of a breakpoint batch.
///
/// Batches succeed or fail per address; a page that cannot be written does
/// not prevent the remaining breakpoints from being armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointResult {
    pub address: RelocatedAddress,
    /// Zero means success; any other value is an agent-defined error code
    pub error_code: u32,
}

impl BreakpointResult {
    pub const fn is_success(&self) -> bool {
        self.error_code == 0
    }
}

/// A process the agent offers for attaching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescription {
    pub process_id: u64,
    pub name: String,
}

/// One directory listing entry of the agent's file system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemListing {
    pub path: String,
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

/// A contiguous readable section of target memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySection {
    pub start: RelocatedAddress,
    pub end: RelocatedAddress,
}

/// Description of a module as the agent reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescription {
    pub name: String,
    pub load_base: RelocatedAddress,
    pub size: u64,
}

/// Payload of a message from the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugReply {
    /// Per-address outcome of a set-breakpoints request
    BreakpointsSet {
        kind: BreakpointType,
        results: Vec<BreakpointResult>,
    },
    /// Per-address outcome of a remove-breakpoints request
    BreakpointsRemoved {
        kind: BreakpointType,
        results: Vec<BreakpointResult>,
    },
    ConditionSet { error_code: u32 },
    /// The target suspended on a breakpoint. Carries the registers of the
    /// thread that hit it.
    BreakpointHit {
        kind: BreakpointType,
        address: RelocatedAddress,
        thread: ThreadId,
        registers: HashMap<String, u64>,
    },
    TargetHalted { thread: ThreadId },
    TargetResumed,
    SingleStepped {
        thread: ThreadId,
        registers: HashMap<String, u64>,
    },
    ThreadResumed { thread: ThreadId },
    ThreadSuspended { thread: ThreadId },
    MemoryRead {
        address: RelocatedAddress,
        bytes: Vec<u8>,
    },
    MemoryWritten { address: RelocatedAddress },
    Registers {
        threads: HashMap<ThreadId, HashMap<String, u64>>,
    },
    RegisterSet { thread: ThreadId },
    /// `None` when the pattern was not found
    SearchResult { address: Option<RelocatedAddress> },
    MemoryMap { sections: Vec<MemorySection> },
    MemoryRange { section: Option<MemorySection> },
    FileSystem { listing: FileSystemListing },
    ProcessList {
        processes: Vec<ProcessDescription>,
    },
    TargetSelected,
    SelectionCancelled,
    ExceptionSettingsSet,
    EventSettingsSet,
    Detached,
    Terminated,
    /// A request the agent could not carry out
    RequestFailed { error_code: u32 },
    /// The target process ended on its own
    ProcessClosed,
    /// An exception the settings mark as halting was raised
    ExceptionRaised {
        thread: ThreadId,
        code: u64,
        address: RelocatedAddress,
    },
    ThreadCreated { thread: ThreadId },
    ThreadClosed { thread: ThreadId },
    ModuleLoaded { module: ModuleDescription },
    ModuleUnloaded { load_base: RelocatedAddress },
}

/// A message from the agent together with its correlation id, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEnvelope {
    pub packet_id: Option<PacketId>,
    pub reply: DebugReply,
}

impl ReplyEnvelope {
    /// Whether this message answers a request, as opposed to being an
    /// agent-initiated event.
    pub const fn is_answer(&self) -> bool {
        self.packet_id.is_some()
    }
}
