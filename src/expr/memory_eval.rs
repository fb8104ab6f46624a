//! Local evaluation of memory navigation expressions.
//!
//! Evaluation runs against a snapshot of the active thread's registers and
//! a [`MemoryReader`] backed by memory already fetched from the target. All
//! arithmetic wraps at the target architecture's word width, so a 32-bit
//! target computes `0xffffffff + 1` as `0`.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};

use crate::debugger::process::ArchitectureWidth;
use crate::errors::EvalError;
use crate::expr::memory::MemoryExpression;

/// Provider of target memory for dereferences.
///
/// Implementations report whether the requested range is mapped; an
/// unmapped range surfaces as [`EvalError::UnmappedAddress`] rather than
/// reading as zero.
pub trait MemoryReader {
    /// Fills `buf` with the bytes at `address`. Returns `false` if any part
    /// of the range is not available.
    fn read(&self, address: u64, buf: &mut [u8]) -> bool;
}

/// Evaluates memory navigation expressions against one register snapshot.
pub struct MemoryEvaluator<'a, R: MemoryReader> {
    registers: &'a HashMap<String, u64>,
    memory: &'a R,
    width: ArchitectureWidth,
}

impl<'a, R: MemoryReader> MemoryEvaluator<'a, R> {
    pub fn new(
        registers: &'a HashMap<String, u64>,
        memory: &'a R,
        width: ArchitectureWidth,
    ) -> Self {
        Self {
            registers,
            memory,
            width,
        }
    }

    /// Computes the value of `expression`, wrapping at the architecture
    /// word width.
    pub fn evaluate(&self, expression: &MemoryExpression) -> Result<u64, EvalError> {
        let mask = self.width.mask();
        match expression {
            MemoryExpression::Register { name } => self
                .registers
                .get(name)
                .copied()
                .map(|value| value & mask)
                .ok_or_else(|| EvalError::UnknownRegister(name.clone())),
            MemoryExpression::NumericalValue { value } => Ok(value & mask),
            MemoryExpression::MemoryAccess { child } => {
                let address = self.evaluate(child)?;
                self.read_word(address)
            }
            MemoryExpression::Plus { children } => {
                self.fold(children, |acc, value| acc.wrapping_add(value))
            }
            MemoryExpression::Minus { children } => {
                self.fold(children, |acc, value| acc.wrapping_sub(value))
            }
            MemoryExpression::Multiplication { children } => {
                self.fold(children, |acc, value| acc.wrapping_mul(value))
            }
            MemoryExpression::Sub { child } => self.evaluate(child),
        }
    }

    fn fold(
        &self,
        children: &[MemoryExpression],
        combine: impl Fn(u64, u64) -> u64,
    ) -> Result<u64, EvalError> {
        let mask = self.width.mask();
        let mut accumulator = None;
        for child in children {
            let value = self.evaluate(child)?;
            accumulator = Some(match accumulator {
                None => value,
                Some(acc) => combine(acc, value) & mask,
            });
        }
        Ok(accumulator.unwrap_or(0))
    }

    fn read_word(&self, address: u64) -> Result<u64, EvalError> {
        let mut buffer = [0u8; 8];
        let word = &mut buffer[..self.width.word_bytes()];
        if !self.memory.read(address, word) {
            return Err(EvalError::UnmappedAddress { address });
        }
        let value = match self.width {
            ArchitectureWidth::Bits32 => u64::from(LittleEndian::read_u32(word)),
            ArchitectureWidth::Bits64 => LittleEndian::read_u64(word),
        };
        Ok(value)
    }
}
