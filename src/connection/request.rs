//! Requests sent to the debug agent.
//!
//! Each request is a typed value; serialization to the actual wire format
//! is the transport's business. Requests that expect an answer travel in a
//! [`RequestEnvelope`] carrying the packet id the agent will echo back;
//! fire-and-forget requests carry none.

use crate::connection::packet::PacketId;
use crate::debugger::address::RelocatedAddress;
use crate::debugger::breakpoint::BreakpointType;
use crate::debugger::process::ThreadId;
use crate::expr::condition::ConditionInstruction;

/// How the agent should react to an exception code raised in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionAction {
    /// Pass the exception on to the target's own handlers
    Continue,
    /// Suspend the target and report the exception
    Halt,
    /// Swallow the exception silently
    Ignore,
}

/// Per-exception-code handling policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionSetting {
    pub code: u64,
    pub action: ExceptionAction,
}

/// Which process-level events suspend the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebuggerEventSettings {
    pub break_on_module_load: bool,
    pub break_on_module_unload: bool,
}

/// A command for the debug agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugRequest {
    /// Arm breakpoints of one type at live addresses
    SetBreakpoints {
        kind: BreakpointType,
        addresses: Vec<RelocatedAddress>,
    },
    /// Disarm breakpoints of one type
    RemoveBreakpoints {
        kind: BreakpointType,
        addresses: Vec<RelocatedAddress>,
    },
    /// Attach a flattened condition to an armed regular breakpoint. An
    /// empty instruction list clears the condition.
    SetBreakpointCondition {
        address: RelocatedAddress,
        condition: Vec<ConditionInstruction>,
    },
    /// Suspend the whole target
    Halt,
    /// Resume the whole target
    Resume,
    /// Execute a single instruction on one thread
    SingleStep { thread: ThreadId },
    ResumeThread { thread: ThreadId },
    SuspendThread { thread: ThreadId },
    ReadMemory { address: RelocatedAddress, length: u64 },
    WriteMemory {
        address: RelocatedAddress,
        bytes: Vec<u8>,
    },
    /// Request the full register snapshot of every thread
    ReadRegisters,
    SetRegister {
        thread: ThreadId,
        register: String,
        value: u64,
    },
    /// Scan target memory for a byte pattern
    SearchMemory {
        start: RelocatedAddress,
        length: u64,
        pattern: Vec<u8>,
    },
    /// Request the map of readable memory sections
    MemoryMap,
    /// Find the contiguous mapped range around an address
    MemoryRange { address: RelocatedAddress },
    /// List a directory on the agent's machine; `None` lists the roots
    ListFileSystem { path: Option<String> },
    /// List debuggable processes on the agent's machine
    ListProcesses,
    /// Pick an executable for the agent to start and debug
    SelectFile { path: String },
    /// Pick a running process for the agent to attach to
    SelectProcess { process_id: u64 },
    /// Abandon target selection
    CancelTargetSelection,
    SetExceptionSettings { settings: Vec<ExceptionSetting> },
    SetDebuggerEventSettings { settings: DebuggerEventSettings },
    /// Leave the target running and disconnect from it
    Detach,
    /// Kill the target
    Terminate,
}

impl DebugRequest {
    /// Whether the agent answers this request with a correlated reply.
    ///
    /// Memory map, file system and file selection requests are answered
    /// only through unsolicited events, so no packet id is assigned.
    pub fn expects_reply(&self) -> bool {
        !matches!(
            self,
            Self::MemoryMap | Self::ListFileSystem { .. } | Self::SelectFile { .. }
        )
    }
}

/// A request together with its correlation id, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    pub packet_id: Option<PacketId>,
    pub request: DebugRequest,
}
