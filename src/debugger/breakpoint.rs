use std::fmt;

use crate::debugger::address::BreakpointAddress;
use crate::expr::condition::ConditionTree;

/// Breakpoint type classification.
///
/// The types form a priority hierarchy: a lower-priority breakpoint is never
/// placed where a higher-priority one already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakpointType {
    /// User-set breakpoint that persists until removed
    Regular,
    /// Transient marker used to visualize execution while stepping a graph
    Echo,
    /// Single-use breakpoint for instruction-level stepping
    Step,
}

impl BreakpointType {
    /// Convert to string representation
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Echo => "echo",
            Self::Step => "step",
        }
    }

    /// Priority used when deciding whether an address is already covered.
    /// Higher wins: adding a breakpoint displaces lower-priority ones at the
    /// same address and is skipped where a higher-priority one exists.
    pub fn priority(self) -> u8 {
        match self {
            Self::Regular => 2,
            Self::Step => 1,
            Self::Echo => 0,
        }
    }

    /// All breakpoint types, ordered by descending [`priority`](Self::priority).
    pub const ALL: [Self; 3] = [Self::Regular, Self::Step, Self::Echo];
}

impl fmt::Display for BreakpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a breakpoint.
///
/// A status is only meaningful together with the breakpoint's type; a
/// disabled regular breakpoint says nothing about an echo breakpoint at the
/// same address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakpointStatus {
    /// Confirmed by the debug agent and armed in the target
    Active,
    /// Known locally, not yet confirmed by the agent
    Inactive,
    /// Enabled by the user, waiting to be written to the target
    Enabled,
    /// Disabled by the user; stays in the store but must not trigger
    Disabled,
    /// The target process stopped on this breakpoint
    Hit,
    /// The agent rejected the set request
    Invalid,
    /// Removal was requested and awaits the agent's confirmation
    Deleting,
}

impl BreakpointStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Hit => "hit",
            Self::Invalid => "invalid",
            Self::Deleting => "deleting",
        }
    }

    /// Initial status assigned when a breakpoint of the given type enters
    /// the store. Echo breakpoints start enabled; everything else waits for
    /// agent confirmation.
    pub fn initial_for(kind: BreakpointType) -> Self {
        match kind {
            BreakpointType::Echo => Self::Enabled,
            BreakpointType::Regular | BreakpointType::Step => Self::Inactive,
        }
    }
}

impl fmt::Display for BreakpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A breakpoint in the target process.
///
/// Owned exclusively by the [`BreakpointManager`](crate::debugger::manager::BreakpointManager);
/// other components look breakpoints up by `(type, address)` instead of
/// holding copies that could drift.
#[derive(Debug, Clone)]
pub struct Breakpoint {
    address: BreakpointAddress,
    kind: BreakpointType,
    status: BreakpointStatus,
    condition: Option<ConditionTree>,
    description: String,
}

impl Breakpoint {
    pub fn new(kind: BreakpointType, address: BreakpointAddress) -> Self {
        Self {
            address,
            kind,
            status: BreakpointStatus::initial_for(kind),
            condition: None,
            description: String::new(),
        }
    }

    pub const fn address(&self) -> BreakpointAddress {
        self.address
    }

    pub const fn kind(&self) -> BreakpointType {
        self.kind
    }

    pub const fn status(&self) -> BreakpointStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: BreakpointStatus) {
        self.status = status;
    }

    pub fn condition(&self) -> Option<&ConditionTree> {
        self.condition.as_ref()
    }

    pub(crate) fn set_condition(&mut self, condition: Option<ConditionTree>) {
        self.condition = condition;
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} breakpoint at {} ({})",
            self.kind, self.address, self.status
        )?;

        if let Some(condition) = &self.condition {
            write!(f, ", condition: {}", condition)?;
        }

        if !self.description.is_empty() {
            write!(f, " \"{}\"", self.description)?;
        }

        Ok(())
    }
}
