use std::collections::HashMap;

use dbglink::connection::{
    BreakpointResult, DebugRequest, ModuleDescription, ReplyEnvelope,
};
use dbglink::debugger::{DebugSession, RelocatedAddress, ThreadId};
use dbglink::{BreakpointStatus, BreakpointType, DebugReply};

use super::{wait_until, ChannelTransport};
use crate::test_helpers::{addr, loaded_module};

fn hit_event(kind: BreakpointType, relocated: u64) -> ReplyEnvelope {
    let mut registers = HashMap::new();
    registers.insert("eip".to_string(), relocated);
    ReplyEnvelope {
        packet_id: None,
        reply: DebugReply::BreakpointHit {
            kind,
            address: RelocatedAddress::new(relocated),
            thread: ThreadId::new(1),
            registers,
        },
    }
}

#[test]
fn session_arms_breakpoints_and_applies_the_confirmation() {
    let (transport, feed) = ChannelTransport::new();
    let session = DebugSession::new(transport.clone());
    session.register_module(loaded_module());

    session
        .set_breakpoints(BreakpointType::Regular, &[addr(0x40_1000)])
        .unwrap();

    // The set request went out with the relocated address
    let sent = transport.sent_requests();
    let packet_id = sent[0].packet_id.unwrap();
    match &sent[0].request {
        DebugRequest::SetBreakpoints { kind, addresses } => {
            assert_eq!(*kind, BreakpointType::Regular);
            assert_eq!(addresses, &vec![RelocatedAddress::new(0x50_1000)]);
        }
        other => panic!("unexpected request {:?}", other),
    }

    feed.send(ReplyEnvelope {
        packet_id: Some(packet_id),
        reply: DebugReply::BreakpointsSet {
            kind: BreakpointType::Regular,
            results: vec![BreakpointResult {
                address: RelocatedAddress::new(0x50_1000),
                error_code: 0,
            }],
        },
    })
    .unwrap();

    assert!(wait_until(|| {
        session
            .breakpoints()
            .status(BreakpointType::Regular, addr(0x40_1000))
            .map(|status| status == BreakpointStatus::Active)
            .unwrap_or(false)
    }));
}

#[test]
fn rejected_breakpoints_become_invalid() {
    let (transport, feed) = ChannelTransport::new();
    let session = DebugSession::new(transport.clone());
    session.register_module(loaded_module());
    session
        .set_breakpoints(BreakpointType::Regular, &[addr(0x40_1000)])
        .unwrap();
    let packet_id = transport.sent_requests()[0].packet_id.unwrap();

    feed.send(ReplyEnvelope {
        packet_id: Some(packet_id),
        reply: DebugReply::BreakpointsSet {
            kind: BreakpointType::Regular,
            results: vec![BreakpointResult {
                address: RelocatedAddress::new(0x50_1000),
                error_code: 5,
            }],
        },
    })
    .unwrap();

    assert!(wait_until(|| {
        session
            .breakpoints()
            .status(BreakpointType::Regular, addr(0x40_1000))
            .map(|status| status == BreakpointStatus::Invalid)
            .unwrap_or(false)
    }));
}

#[test]
fn breakpoint_hit_updates_store_and_thread_mirror() {
    let (transport, feed) = ChannelTransport::new();
    let session = DebugSession::new(transport);
    session.register_module(loaded_module());
    session
        .set_breakpoints(BreakpointType::Regular, &[addr(0x40_1000)])
        .unwrap();

    feed.send(hit_event(BreakpointType::Regular, 0x50_1000)).unwrap();

    assert!(wait_until(|| {
        session
            .breakpoints()
            .status(BreakpointType::Regular, addr(0x40_1000))
            .map(|status| status == BreakpointStatus::Hit)
            .unwrap_or(false)
    }));
    session.with_process(|process| {
        let thread = process.active_thread().unwrap();
        assert_eq!(thread.id(), ThreadId::new(1));
        assert_eq!(thread.register("eip"), Some(0x50_1000));
    });
}

#[test]
fn removal_waits_for_agent_confirmation() {
    let (transport, feed) = ChannelTransport::new();
    let session = DebugSession::new(transport.clone());
    session.register_module(loaded_module());
    session
        .set_breakpoints(BreakpointType::Regular, &[addr(0x40_1000)])
        .unwrap();
    let set_id = transport.sent_requests()[0].packet_id.unwrap();
    feed.send(ReplyEnvelope {
        packet_id: Some(set_id),
        reply: DebugReply::BreakpointsSet {
            kind: BreakpointType::Regular,
            results: vec![BreakpointResult {
                address: RelocatedAddress::new(0x50_1000),
                error_code: 0,
            }],
        },
    })
    .unwrap();
    assert!(wait_until(|| {
        session
            .breakpoints()
            .status(BreakpointType::Regular, addr(0x40_1000))
            .map(|status| status == BreakpointStatus::Active)
            .unwrap_or(false)
    }));

    session
        .remove_breakpoints(BreakpointType::Regular, &[addr(0x40_1000)])
        .unwrap();
    assert_eq!(
        session
            .breakpoints()
            .status(BreakpointType::Regular, addr(0x40_1000))
            .unwrap(),
        BreakpointStatus::Deleting
    );

    let remove_id = transport
        .sent_requests()
        .last()
        .and_then(|envelope| envelope.packet_id)
        .unwrap();
    feed.send(ReplyEnvelope {
        packet_id: Some(remove_id),
        reply: DebugReply::BreakpointsRemoved {
            kind: BreakpointType::Regular,
            results: vec![BreakpointResult {
                address: RelocatedAddress::new(0x50_1000),
                error_code: 0,
            }],
        },
    })
    .unwrap();

    assert!(wait_until(|| {
        !session
            .breakpoints()
            .has_breakpoint(BreakpointType::Regular, addr(0x40_1000))
    }));
}

#[test]
fn module_load_event_arms_waiting_breakpoints() {
    let (transport, feed) = ChannelTransport::new();
    let session = DebugSession::new(transport.clone());
    session.register_module(dbglink::MemoryModule::new(
        dbglink::ModuleId::new(1),
        "target.exe",
        0x40_0000,
        0x1_0000,
    ));
    session
        .set_breakpoints(BreakpointType::Regular, &[addr(0x40_1000)])
        .unwrap();
    assert!(transport.sent_requests().is_empty());

    feed.send(ReplyEnvelope {
        packet_id: None,
        reply: DebugReply::ModuleLoaded {
            module: ModuleDescription {
                name: "target.exe".to_string(),
                load_base: RelocatedAddress::new(0x50_0000),
                size: 0x1_0000,
            },
        },
    })
    .unwrap();

    assert!(wait_until(|| !transport.sent_requests().is_empty()));
    match &transport.sent_requests()[0].request {
        DebugRequest::SetBreakpoints { addresses, .. } => {
            assert_eq!(addresses, &vec![RelocatedAddress::new(0x50_1000)]);
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn process_end_resets_the_session_state() {
    let (transport, feed) = ChannelTransport::new();
    let session = DebugSession::new(transport);
    session.register_module(loaded_module());
    session
        .set_breakpoints(BreakpointType::Regular, &[addr(0x40_1000)])
        .unwrap();
    session
        .set_breakpoints(BreakpointType::Echo, &[addr(0x40_2000)])
        .unwrap();

    feed.send(ReplyEnvelope {
        packet_id: None,
        reply: DebugReply::ProcessClosed,
    })
    .unwrap();

    assert!(wait_until(|| {
        session.breakpoints().count(BreakpointType::Echo) == 0
    }));
    assert_eq!(
        session
            .breakpoints()
            .status(BreakpointType::Regular, addr(0x40_1000))
            .unwrap(),
        BreakpointStatus::Inactive
    );
}

#[test]
fn close_shuts_the_connection_down() {
    let (transport, _feed) = ChannelTransport::new();
    let session = DebugSession::new(transport.clone());
    session.close();

    assert!(session.connection().is_shut_down());
    // Detach went out before the shutdown
    assert!(transport
        .sent_requests()
        .iter()
        .any(|envelope| matches!(envelope.request, DebugRequest::Detach)));
    assert!(session
        .set_breakpoints(BreakpointType::Regular, &[addr(0x40_1000)])
        .is_ok());
}

#[test]
fn condition_is_pushed_in_flattened_form() {
    let (transport, _feed) = ChannelTransport::new();
    let session = DebugSession::new(transport.clone());
    session.register_module(loaded_module());
    session
        .set_breakpoints(BreakpointType::Regular, &[addr(0x40_1000)])
        .unwrap();

    let condition = dbglink::parse_condition("eax == 5").unwrap();
    session
        .set_breakpoint_condition(addr(0x40_1000), Some(condition.clone()))
        .unwrap();

    let sent = transport.sent_requests();
    match &sent[1].request {
        DebugRequest::SetBreakpointCondition { address, condition: flattened } => {
            assert_eq!(*address, RelocatedAddress::new(0x50_1000));
            assert_eq!(flattened, &condition.flatten());
        }
        other => panic!("unexpected request {:?}", other),
    }
}
