use dbglink::expr::condition::{
    ConditionInstruction, ExpressionOperator, FormulaOperator, RelationOperator,
};
use dbglink::parse_condition;
use proptest::prelude::*;
use test_case::test_case;

#[test_case("eax == 5" ; "equality")]
#[test_case("eax != 5" ; "inequality")]
#[test_case("eax <> 5" ; "angle inequality")]
#[test_case("eax < 5" ; "less")]
#[test_case("eax <= 5" ; "less or equal")]
#[test_case("eax > 5" ; "greater")]
#[test_case("eax >= 5" ; "greater or equal")]
fn every_relation_operator_parses(input: &str) {
    let tree = parse_condition(input).unwrap();
    assert_eq!(tree.to_string(), input);
}

#[test_case("eax" ; "bare register")]
#[test_case("5" ; "bare number")]
#[test_case("eax + 5" ; "formula without relation")]
#[test_case("" ; "empty input")]
#[test_case("eax == " ; "missing right operand")]
#[test_case("== 5" ; "missing left operand")]
fn conditions_require_a_relation(input: &str) {
    assert!(parse_condition(input).is_err());
}

#[test]
fn flattened_condition_is_postfix() {
    let tree = parse_condition("eax == 5").unwrap();
    assert_eq!(
        tree.flatten(),
        vec![
            ConditionInstruction::PushRegister("eax".to_string()),
            ConditionInstruction::PushValue(5),
            ConditionInstruction::Relation(RelationOperator::Equal),
        ]
    );
}

#[test]
fn flattening_handles_memory_and_logic() {
    let tree = parse_condition("[esp] == 0 && ecx > 1").unwrap();
    assert_eq!(
        tree.flatten(),
        vec![
            ConditionInstruction::PushRegister("esp".to_string()),
            ConditionInstruction::Dereference,
            ConditionInstruction::PushValue(0),
            ConditionInstruction::Relation(RelationOperator::Equal),
            ConditionInstruction::PushRegister("ecx".to_string()),
            ConditionInstruction::PushValue(1),
            ConditionInstruction::Relation(RelationOperator::Greater),
            ConditionInstruction::Logical(ExpressionOperator::And),
        ]
    );
}

#[test]
fn precedence_ladder_from_loosest_to_tightest() {
    // | binds looser than ^ binds looser than & binds looser than shifts,
    // which bind looser than additive, which bind looser than
    // multiplicative
    let tree = parse_condition("a | b ^ c & d << e + f * g == 0").unwrap();
    let flat = tree.flatten();
    let ops: Vec<&ConditionInstruction> = flat
        .iter()
        .filter(|instruction| matches!(instruction, ConditionInstruction::Arithmetic(_)))
        .collect();
    assert_eq!(
        ops,
        vec![
            &ConditionInstruction::Arithmetic(FormulaOperator::Mul),
            &ConditionInstruction::Arithmetic(FormulaOperator::Add),
            &ConditionInstruction::Arithmetic(FormulaOperator::ShiftLeft),
            &ConditionInstruction::Arithmetic(FormulaOperator::BitAnd),
            &ConditionInstruction::Arithmetic(FormulaOperator::BitXor),
            &ConditionInstruction::Arithmetic(FormulaOperator::BitOr),
        ]
    );
}

#[test]
fn syntax_error_positions_point_at_the_problem() {
    let error = parse_condition("eax == 5 && && ebx == 1").unwrap_err();
    assert_eq!(error.position, 12);
    assert_eq!(error.found, "&&");
}

proptest! {
    #[test]
    fn simple_relations_round_trip(
        left in "[a-z][a-z0-9]{0,6}",
        right in 0u64..1_000_000,
        op_index in 0usize..7,
    ) {
        let operator = ["==", "!=", "<>", "<", "<=", ">", ">="][op_index];
        let input = format!("{} {} {}", left, operator, right);
        let tree = parse_condition(&input).unwrap();
        let reparsed = parse_condition(&tree.to_string()).unwrap();
        prop_assert_eq!(reparsed, tree);
    }

    #[test]
    fn additive_chains_round_trip(
        terms in prop::collection::vec(0u64..1_000, 2..6),
        ops in prop::collection::vec(prop::bool::ANY, 5),
        threshold in 0u64..1_000,
    ) {
        let mut input = terms[0].to_string();
        for (index, term) in terms.iter().enumerate().skip(1) {
            let op = if ops[index - 1] { "+" } else { "-" };
            input.push_str(&format!(" {} {}", op, term));
        }
        input.push_str(&format!(" < {}", threshold));

        let tree = parse_condition(&input).unwrap();
        let reparsed = parse_condition(&tree.to_string()).unwrap();
        prop_assert_eq!(reparsed, tree);
    }

    #[test]
    fn hex_and_decimal_literals_agree(value in 0u64..u64::MAX / 2) {
        let decimal = parse_condition(&format!("eax == {}", value)).unwrap();
        let hex = parse_condition(&format!("eax == {:#x}", value)).unwrap();
        prop_assert_eq!(decimal, hex);
    }
}
