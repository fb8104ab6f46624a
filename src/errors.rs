use std::io;

use thiserror::Error;

use crate::debugger::address::BreakpointAddress;
use crate::debugger::breakpoint::BreakpointType;

/// Transport-level failures of the connection to the debug agent.
///
/// These always mean the channel itself broke, never that the agent
/// answered with a negative reply.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Establishing the connection failed
    #[error("failed to connect to the debug agent: {0}")]
    Connect(#[source] io::Error),
    /// Sending a request failed mid-session
    #[error("failed to send request to the debug agent: {0}")]
    Send(#[source] io::Error),
    /// The connection was already shut down
    #[error("connection is shut down")]
    Closed,
}

/// Contract violations around the breakpoint store.
#[derive(Debug, Error)]
pub enum BreakpointError {
    /// Lookup of a breakpoint that does not exist
    #[error("no {kind} breakpoint at {address}")]
    NotFound {
        kind: BreakpointType,
        address: BreakpointAddress,
    },
    /// Operation not valid for the given breakpoint type
    #[error("operation not supported for {kind} breakpoints: {operation}")]
    InvalidOperation {
        kind: BreakpointType,
        operation: &'static str,
    },
}

/// Structured syntax error for the condition and memory expression parsers.
///
/// Carries the offending position and token so callers can point the user
/// at the problem instead of swallowing the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at offset {position}: {message} (found {found:?})")]
pub struct ParseError {
    /// Byte offset into the source text
    pub position: usize,
    /// Textual form of the offending token, or "end of input"
    pub found: String,
    /// What the parser expected instead
    pub message: String,
}

impl ParseError {
    pub fn new(position: usize, found: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            position,
            found: found.into(),
            message: message.into(),
        }
    }
}

/// Failures while locally evaluating a memory navigation expression.
///
/// An unmapped dereference is reported distinctly from an expression that
/// merely evaluates to zero.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("no value known for register {0}")]
    UnknownRegister(String),
    #[error("memory read at {address:#x} failed: address not mapped")]
    UnmappedAddress { address: u64 },
}
