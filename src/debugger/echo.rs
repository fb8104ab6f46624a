//! Planning of echo breakpoint placement for trace recording.
//!
//! A trace instruments every reachable node of the current view with echo
//! breakpoints, records which ones get hit while the target runs, and
//! retires each echo breakpoint after a per-address hit budget so a hot
//! loop does not flood the event stream.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::debugger::address::BreakpointAddress;
use crate::debugger::breakpoint::{BreakpointStatus, BreakpointType};
use crate::debugger::manager::BreakpointManager;

/// Classification of a function a candidate node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Library,
    /// Declared in another module; there is no code here to instrument
    Import,
    /// Jump stub into another function
    Thunk,
}

/// A node of the instrumented view that may receive an echo breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateNode {
    /// Basic block; the address is its first instruction
    Code { address: BreakpointAddress },
    /// Function entry
    Function {
        address: BreakpointAddress,
        kind: FunctionKind,
    },
}

impl CandidateNode {
    pub const fn address(self) -> BreakpointAddress {
        match self {
            Self::Code { address } => address,
            Self::Function { address, .. } => address,
        }
    }

    /// Whether a breakpoint at this node can ever trigger. Imported and
    /// thunk functions have no local code behind their entry address.
    pub const fn is_breakpointable(self) -> bool {
        match self {
            Self::Code { .. } => true,
            Self::Function { kind, .. } => !matches!(kind, FunctionKind::Import | FunctionKind::Thunk),
        }
    }
}

/// Decides where echo breakpoints may be placed.
pub struct EchoPlanner<'a> {
    manager: &'a BreakpointManager,
}

impl<'a> EchoPlanner<'a> {
    pub fn new(manager: &'a BreakpointManager) -> Self {
        Self { manager }
    }

    /// Whether an address is unavailable for a new echo breakpoint.
    ///
    /// An address is blocked by a regular breakpoint unless that breakpoint
    /// is disabled, by an existing echo breakpoint, and by a step
    /// breakpoint.
    pub fn is_blocked(&self, address: BreakpointAddress) -> bool {
        if let Ok(status) = self.manager.status(BreakpointType::Regular, address) {
            if status != BreakpointStatus::Disabled {
                return true;
            }
        }

        self.manager.has_breakpoint(BreakpointType::Echo, address)
            || self.manager.has_breakpoint(BreakpointType::Step, address)
    }

    /// Selects the addresses to instrument out of a candidate node list.
    ///
    /// Filters out nodes that cannot trigger, blocked addresses and
    /// duplicate addresses among the candidates themselves.
    pub fn plan(&self, candidates: &[CandidateNode]) -> Vec<BreakpointAddress> {
        let mut planned = Vec::new();
        for candidate in candidates {
            if !candidate.is_breakpointable() {
                continue;
            }
            let address = candidate.address();
            if self.is_blocked(address) || planned.contains(&address) {
                continue;
            }
            planned.push(address);
        }
        debug!(
            "planned {} echo breakpoints out of {} candidates",
            planned.len(),
            candidates.len()
        );
        planned
    }

    /// Counts the addresses [`plan`](Self::plan) would select, without
    /// building the address list. Used to report how many nodes a trace
    /// would instrument before the user commits to it.
    pub fn count(&self, candidates: &[CandidateNode]) -> usize {
        let mut seen = HashSet::new();
        candidates
            .iter()
            .filter(|candidate| candidate.is_breakpointable())
            .map(|candidate| candidate.address())
            .filter(|&address| !self.is_blocked(address))
            .filter(|&address| seen.insert(address))
            .count()
    }
}

/// Per-address hit budget of a running trace.
///
/// Every echo breakpoint hit is counted; once an address reaches the
/// budget its echo breakpoint should be removed from the target.
#[derive(Debug)]
pub struct EchoHitBudget {
    max_hits: u32,
    hits: HashMap<BreakpointAddress, u32>,
}

impl EchoHitBudget {
    pub fn new(max_hits: u32) -> Self {
        Self {
            max_hits,
            hits: HashMap::new(),
        }
    }

    pub const fn max_hits(&self) -> u32 {
        self.max_hits
    }

    pub fn hits(&self, address: BreakpointAddress) -> u32 {
        self.hits.get(&address).copied().unwrap_or(0)
    }

    /// Counts a hit and reports whether the address exhausted its budget
    /// with this hit.
    pub fn register_hit(&mut self, address: BreakpointAddress) -> bool {
        let count = self.hits.entry(address).or_insert(0);
        *count += 1;
        *count >= self.max_hits
    }
}
