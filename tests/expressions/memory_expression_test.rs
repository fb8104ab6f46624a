use std::collections::HashMap;

use dbglink::debugger::process::ArchitectureWidth;
use dbglink::errors::EvalError;
use dbglink::expr::memory_eval::{MemoryEvaluator, MemoryReader};
use dbglink::parse_memory_expression;
use proptest::prelude::*;
use test_case::test_case;

/// Flat byte image starting at a base address.
struct ImageMemory {
    base: u64,
    bytes: Vec<u8>,
}

impl MemoryReader for ImageMemory {
    fn read(&self, address: u64, buf: &mut [u8]) -> bool {
        let Some(offset) = address.checked_sub(self.base) else {
            return false;
        };
        let offset = offset as usize;
        if offset + buf.len() > self.bytes.len() {
            return false;
        }
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        true
    }
}

fn registers(pairs: &[(&str, u64)]) -> HashMap<String, u64> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect()
}

fn empty_memory() -> ImageMemory {
    ImageMemory {
        base: 0,
        bytes: Vec::new(),
    }
}

#[test_case("eax + ecx", 0x18 ; "sum of registers")]
#[test_case("4 * eax", 0x40 ; "scaled register")]
#[test_case("4 * eax + ecx", 0x48 ; "scaled index")]
#[test_case("(eax + ecx) * 2", 0x30 ; "grouped sum")]
#[test_case("eax - ecx", 0x8 ; "difference")]
#[test_case("0x10 + 2", 0x12 ; "literals only")]
fn pure_arithmetic(input: &str, expected: u64) {
    let regs = registers(&[("eax", 0x10), ("ecx", 0x8)]);
    let memory = empty_memory();
    let evaluator = MemoryEvaluator::new(&regs, &memory, ArchitectureWidth::Bits32);
    let expression = parse_memory_expression(input).unwrap();
    assert_eq!(evaluator.evaluate(&expression).unwrap(), expected);
}

#[test]
fn pointer_chain_follows_memory() {
    // [[0x1000]] where 0x1000 holds 0x1008 and 0x1008 holds 0xcafe
    let mut bytes = vec![0u8; 0x10];
    bytes[0..4].copy_from_slice(&0x1008u32.to_le_bytes());
    bytes[8..12].copy_from_slice(&0xcafeu32.to_le_bytes());
    let memory = ImageMemory {
        base: 0x1000,
        bytes,
    };

    let regs = registers(&[]);
    let evaluator = MemoryEvaluator::new(&regs, &memory, ArchitectureWidth::Bits32);
    let expression = parse_memory_expression("[[0x1000]]").unwrap();
    assert_eq!(evaluator.evaluate(&expression).unwrap(), 0xcafe);
}

#[test]
fn evaluation_on_64_bit_reads_full_words() {
    let mut bytes = vec![0u8; 8];
    bytes.copy_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());
    let memory = ImageMemory { base: 0x2000, bytes };

    let regs = registers(&[]);
    let evaluator = MemoryEvaluator::new(&regs, &memory, ArchitectureWidth::Bits64);
    let expression = parse_memory_expression("[0x2000]").unwrap();
    assert_eq!(
        evaluator.evaluate(&expression).unwrap(),
        0x1122_3344_5566_7788
    );
}

#[test]
fn unmapped_read_is_distinct_from_zero() {
    let regs = registers(&[]);
    let memory = empty_memory();
    let evaluator = MemoryEvaluator::new(&regs, &memory, ArchitectureWidth::Bits32);
    let expression = parse_memory_expression("[0x4000]").unwrap();
    assert_eq!(
        evaluator.evaluate(&expression),
        Err(EvalError::UnmappedAddress { address: 0x4000 })
    );
}

#[test]
fn unknown_register_names_the_culprit() {
    let regs = registers(&[("eax", 1)]);
    let memory = empty_memory();
    let evaluator = MemoryEvaluator::new(&regs, &memory, ArchitectureWidth::Bits32);
    let expression = parse_memory_expression("eax + bogus").unwrap();
    assert_eq!(
        evaluator.evaluate(&expression),
        Err(EvalError::UnknownRegister("bogus".to_string()))
    );
}

proptest! {
    #[test]
    fn expressions_round_trip_through_display(
        terms in prop::collection::vec(0u64..0x1_0000, 1..5),
        ops in prop::collection::vec(0usize..3, 4),
    ) {
        let mut input = terms[0].to_string();
        for (index, term) in terms.iter().enumerate().skip(1) {
            let op = ["+", "-", "*"][ops[index - 1]];
            input.push_str(&format!("{}{}", op, term));
        }
        let tree = parse_memory_expression(&input).unwrap();
        let reparsed = parse_memory_expression(&tree.to_string()).unwrap();
        prop_assert_eq!(reparsed, tree);
    }

    #[test]
    fn wraparound_matches_the_architecture_mask(a in 0u64.., b in 0u64..) {
        let regs = registers(&[("ra", a), ("rb", b)]);
        let memory = empty_memory();
        let evaluator = MemoryEvaluator::new(&regs, &memory, ArchitectureWidth::Bits32);
        let expression = parse_memory_expression("ra + rb").unwrap();
        let value = evaluator.evaluate(&expression).unwrap();
        prop_assert_eq!(value, (a & 0xffff_ffff).wrapping_add(b & 0xffff_ffff) & 0xffff_ffff);
    }
}
