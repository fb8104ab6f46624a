//! DBGLINK - client core for driving a remote debug agent
//!
//! This library contains the debugger-communication layer of a binary
//! analysis frontend: the wire connection to the debug agent, the
//! breakpoint store with its type hierarchy, the condition engine that
//! ships breakpoint conditions to the agent, and the memory expression
//! engine that follows pointer chains locally.

pub mod connection;
pub mod debugger;
pub mod errors;
pub mod expr;

/// Re-export key types for easier access in tests
pub use connection::{DebugConnection, DebugReply, DebugRequest, PacketId, Transport};
pub use debugger::{
    Breakpoint, BreakpointAddress, BreakpointManager, BreakpointStatus, BreakpointType,
    DebugSession, MemoryModule, ModuleId,
};
pub use expr::{parse_condition, parse_memory_expression, ConditionTree, MemoryExpression};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Initialize the logging system
pub fn init_logging(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .filter_module("dbglink", level)
        .format_timestamp_secs()
        .init();
}
