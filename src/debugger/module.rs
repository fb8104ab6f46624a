use std::fmt;

use crate::debugger::address::{RelocatedAddress, UnrelocatedAddress};

/// Stable identity handle for a module known to the process registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(u32);

impl ModuleId {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// A module of the target process.
///
/// The file base is where the module's static image claims to live; the load
/// base is where the running process actually mapped it. The difference
/// between the two is the relocation delta applied to unrelocated addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryModule {
    id: ModuleId,
    name: String,
    file_base: u64,
    load_base: Option<u64>,
    size: u64,
}

impl MemoryModule {
    pub fn new(id: ModuleId, name: impl Into<String>, file_base: u64, size: u64) -> Self {
        Self {
            id,
            name: name.into(),
            file_base,
            load_base: None,
            size,
        }
    }

    pub const fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn file_base(&self) -> u64 {
        self.file_base
    }

    pub const fn size(&self) -> u64 {
        self.size
    }

    pub const fn load_base(&self) -> Option<u64> {
        self.load_base
    }

    /// Whether the module is currently mapped into the target process.
    pub const fn is_loaded(&self) -> bool {
        self.load_base.is_some()
    }

    /// Records where the running process mapped the module.
    pub fn set_load_base(&mut self, load_base: u64) {
        self.load_base = Some(load_base);
    }

    pub fn clear_load_base(&mut self) {
        self.load_base = None;
    }

    /// The delta added to unrelocated addresses, if the module is mapped.
    pub fn relocation_delta(&self) -> Option<u64> {
        self.load_base
            .map(|load_base| load_base.wrapping_sub(self.file_base))
    }

    /// Computes the live address for a file-relative one.
    ///
    /// Returns `None` while the module is not mapped; the live address of an
    /// unmapped module does not exist.
    pub fn relocate(&self, address: UnrelocatedAddress) -> Option<RelocatedAddress> {
        self.relocation_delta()
            .map(|delta| RelocatedAddress::new(address.value().wrapping_add(delta)))
    }

    /// Inverse of [`relocate`](Self::relocate): maps a live address back into
    /// file-relative space.
    pub fn unrelocate(&self, address: RelocatedAddress) -> Option<UnrelocatedAddress> {
        self.relocation_delta()
            .map(|delta| UnrelocatedAddress::new(address.value().wrapping_sub(delta)))
    }

    /// Whether a live address falls inside this module's mapped range.
    pub fn contains(&self, address: RelocatedAddress) -> bool {
        match self.load_base {
            Some(load_base) => {
                address.value() >= load_base && address.value() < load_base.wrapping_add(self.size)
            }
            None => false,
        }
    }
}
