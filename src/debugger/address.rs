use std::fmt;

use crate::debugger::module::ModuleId;

/// A static, file-relative address as stored in the disassembly.
///
/// Independent of where the owning module is loaded at runtime; turning it
/// into a live address requires the module's relocation delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnrelocatedAddress(u64);

impl UnrelocatedAddress {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnrelocatedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// An address valid inside the running target process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelocatedAddress(u64);

impl RelocatedAddress {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RelocatedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identity of a breakpoint: module plus unrelocated address.
///
/// Two breakpoint addresses are equal iff both the module and the
/// unrelocated address are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BreakpointAddress {
    module: ModuleId,
    address: UnrelocatedAddress,
}

impl BreakpointAddress {
    pub const fn new(module: ModuleId, address: UnrelocatedAddress) -> Self {
        Self { module, address }
    }

    pub const fn module(self) -> ModuleId {
        self.module
    }

    pub const fn address(self) -> UnrelocatedAddress {
        self.address
    }
}

impl fmt::Display for BreakpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.address)
    }
}
