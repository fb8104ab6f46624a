//! Wire-level communication with the remote debug agent.
//!
//! Requests and replies are typed values; correlation between the two uses
//! packet ids generated per connection. The actual byte format lives behind
//! the [`Transport`] trait.

#[allow(clippy::module_inception)]
mod connection;
pub mod packet;
pub mod reply;
pub mod request;

pub use connection::{DebugConnection, ReplyListener, Transport};
pub use packet::{PacketId, PacketIdGenerator};
pub use reply::{
    BreakpointResult, DebugReply, FileSystemListing, MemorySection, ModuleDescription,
    ProcessDescription, ReplyEnvelope,
};
pub use request::{
    DebugRequest, DebuggerEventSettings, ExceptionAction, ExceptionSetting, RequestEnvelope,
};
