//! Deciding which operand values must be rebased before display.
//!
//! Operand values in the disassembly are file-relative. When register or
//! memory contents from the live process are compared against them, data
//! references that point into the module image have to be shifted by the
//! module's relocation delta first; flow references and plain immediates
//! must not be touched.

use crate::debugger::module::MemoryModule;

/// Classification of a code or data reference attached to an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    ConditionalTrue,
    ConditionalFalse,
    Unconditional,
    Switch,
    CallDirect,
    CallIndirect,
    CallVirtual,
    Data,
    DataString,
}

impl ReferenceKind {
    /// Whether the reference points at data rather than at control flow.
    pub const fn is_data(self) -> bool {
        matches!(self, Self::Data | Self::DataString)
    }
}

/// Whether `value` must be rebased with the module's relocation delta.
///
/// Only data references are rebased, and only when the value actually
/// points into the module image. Small immediates that happen to appear in
/// a data reference stay as they are.
pub fn needs_relocation(kind: ReferenceKind, value: u64, module: &MemoryModule) -> bool {
    kind.is_data() && value >= module.file_base()
}

/// Rebases `value` if [`needs_relocation`] says so and the module is
/// mapped; otherwise hands the value back unchanged.
pub fn relocate_value(kind: ReferenceKind, value: u64, module: &MemoryModule) -> u64 {
    if !needs_relocation(kind, value, module) {
        return value;
    }
    match module.relocation_delta() {
        Some(delta) => value.wrapping_add(delta),
        None => value,
    }
}
