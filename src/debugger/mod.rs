//! Debugger-side state: breakpoints, modules, threads and the session
//! that keeps them in sync with the debug agent.

pub mod address;
pub mod breakpoint;
pub mod echo;
pub mod manager;
pub mod module;
pub mod process;
pub mod relocation;
pub mod session;

pub use address::{BreakpointAddress, RelocatedAddress, UnrelocatedAddress};
pub use breakpoint::{Breakpoint, BreakpointStatus, BreakpointType};
pub use echo::{CandidateNode, EchoHitBudget, EchoPlanner, FunctionKind};
pub use manager::{BreakpointListener, BreakpointManager};
pub use module::{MemoryModule, ModuleId};
pub use process::{ArchitectureWidth, ProcessMirror, Thread, ThreadId, ThreadState};
pub use relocation::{needs_relocation, relocate_value, ReferenceKind};
pub use session::DebugSession;
