use dbglink::debugger::echo::{CandidateNode, EchoPlanner, FunctionKind};
use dbglink::{BreakpointManager, BreakpointStatus, BreakpointType};
use test_case::test_case;

use crate::test_helpers::addr;

#[test_case(BreakpointType::Echo ; "over echo")]
#[test_case(BreakpointType::Step ; "over step")]
fn regular_breakpoint_displaces_lower_priority(lower: BreakpointType) {
    let manager = BreakpointManager::new();
    manager.add_breakpoints(lower, &[addr(0x100)]);

    let added = manager.add_breakpoints(BreakpointType::Regular, &[addr(0x100)]);
    assert_eq!(added, vec![addr(0x100)]);
    assert!(!manager.has_breakpoint(lower, addr(0x100)));
    assert!(manager.has_breakpoint(BreakpointType::Regular, addr(0x100)));
}

#[test_case(BreakpointType::Regular ; "under regular")]
#[test_case(BreakpointType::Step ; "under step")]
fn echo_breakpoint_yields_to_higher_priority(higher: BreakpointType) {
    let manager = BreakpointManager::new();
    manager.add_breakpoints(higher, &[addr(0x100)]);

    let added = manager.add_breakpoints(BreakpointType::Echo, &[addr(0x100)]);
    assert!(added.is_empty());
    assert!(manager.has_breakpoint(higher, addr(0x100)));
}

#[test]
fn step_breakpoint_sits_between_regular_and_echo() {
    let manager = BreakpointManager::new();
    manager.add_breakpoints(BreakpointType::Regular, &[addr(0x100)]);
    manager.add_breakpoints(BreakpointType::Echo, &[addr(0x200)]);

    let added = manager.add_breakpoints(BreakpointType::Step, &[addr(0x100), addr(0x200)]);
    assert_eq!(added, vec![addr(0x200)]);
    assert!(!manager.has_breakpoint(BreakpointType::Echo, addr(0x200)));
}

#[test]
fn displaced_breakpoint_does_not_come_back() {
    let manager = BreakpointManager::new();
    manager.add_breakpoints(BreakpointType::Echo, &[addr(0x100)]);
    manager.add_breakpoints(BreakpointType::Regular, &[addr(0x100)]);

    // The echo breakpoint is gone; removing the regular one does not
    // resurrect it
    manager
        .remove_breakpoints(BreakpointType::Regular, &[addr(0x100)])
        .unwrap();
    assert!(!manager.has_breakpoint(BreakpointType::Echo, addr(0x100)));
}

#[test]
fn planner_respects_existing_breakpoints_and_node_kinds() {
    let manager = BreakpointManager::new();
    manager.add_breakpoints(BreakpointType::Regular, &[addr(0x100)]);
    manager.add_breakpoints(BreakpointType::Regular, &[addr(0x200)]);
    manager
        .set_breakpoint_status(
            BreakpointType::Regular,
            &[addr(0x200)],
            BreakpointStatus::Disabled,
        )
        .unwrap();

    let planner = EchoPlanner::new(&manager);
    let candidates = [
        // Blocked by the enabled regular breakpoint
        CandidateNode::Code { address: addr(0x100) },
        // A disabled regular breakpoint does not block
        CandidateNode::Code { address: addr(0x200) },
        // Imported functions carry no instrumentable code
        CandidateNode::Function {
            address: addr(0x300),
            kind: FunctionKind::Import,
        },
        CandidateNode::Function {
            address: addr(0x400),
            kind: FunctionKind::Normal,
        },
    ];

    assert_eq!(planner.plan(&candidates), vec![addr(0x200), addr(0x400)]);
}

#[test]
fn planned_echo_breakpoints_enter_the_store_enabled() {
    let manager = BreakpointManager::new();
    let planner = EchoPlanner::new(&manager);
    let planned = planner.plan(&[CandidateNode::Code { address: addr(0x100) }]);
    manager.add_breakpoints(BreakpointType::Echo, &planned);

    assert_eq!(
        manager.status(BreakpointType::Echo, addr(0x100)).unwrap(),
        BreakpointStatus::Enabled
    );
}
