use std::collections::HashSet;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use dbglink::connection::{DebugRequest, ReplyEnvelope, ReplyListener};
use dbglink::{DebugConnection, DebugReply, PacketId};

use super::{wait_until, ChannelTransport};

struct ForwardingListener {
    forward: Mutex<mpsc::Sender<ReplyEnvelope>>,
}

impl ReplyListener for ForwardingListener {
    fn reply_received(&self, envelope: &ReplyEnvelope) {
        let _ = self.forward.lock().unwrap().send(envelope.clone());
    }
}

fn forwarding_listener() -> (Arc<ForwardingListener>, mpsc::Receiver<ReplyEnvelope>) {
    let (sender, receiver) = mpsc::channel();
    (
        Arc::new(ForwardingListener {
            forward: Mutex::new(sender),
        }),
        receiver,
    )
}

#[test]
fn every_correlated_request_gets_a_fresh_packet_id() {
    let (transport, _feed) = ChannelTransport::new();
    let connection = DebugConnection::new(transport.clone());

    let mut ids = HashSet::new();
    ids.insert(connection.send_halt().unwrap());
    ids.insert(connection.send_resume().unwrap());
    ids.insert(connection.send_read_registers().unwrap());
    ids.insert(connection.send_detach().unwrap());
    assert_eq!(ids.len(), 4);

    // The envelope on the wire carries the id handed to the caller
    let sent = transport.sent_requests();
    for envelope in &sent {
        assert!(ids.contains(&envelope.packet_id.unwrap()));
    }
}

#[test]
fn memory_map_and_file_requests_are_fire_and_forget() {
    let (transport, _feed) = ChannelTransport::new();
    let connection = DebugConnection::new(transport.clone());

    connection.send_request_memory_map().unwrap();
    connection.send_request_file_system(None).unwrap();
    connection
        .send_request_file_system(Some("C:\\".to_string()))
        .unwrap();
    connection.send_select_file("C:\\target.exe").unwrap();

    for envelope in transport.sent_requests() {
        assert!(envelope.packet_id.is_none(), "{:?}", envelope.request);
    }
}

#[test]
fn replies_are_dispatched_in_arrival_order() {
    let (transport, feed) = ChannelTransport::new();
    let connection = DebugConnection::new(transport);
    let (listener, received) = forwarding_listener();
    connection.add_listener(listener);

    for id in 0..5 {
        feed.send(ReplyEnvelope {
            packet_id: Some(PacketId::new(id)),
            reply: DebugReply::TargetResumed,
        })
        .unwrap();
    }

    for id in 0..5 {
        let envelope = received.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(envelope.packet_id, Some(PacketId::new(id)));
    }
}

#[test]
fn uncorrelated_events_reach_listeners_too() {
    let (transport, feed) = ChannelTransport::new();
    let connection = DebugConnection::new(transport);
    let (listener, received) = forwarding_listener();
    connection.add_listener(listener);

    feed.send(ReplyEnvelope {
        packet_id: None,
        reply: DebugReply::ProcessClosed,
    })
    .unwrap();

    let envelope = received.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(!envelope.is_answer());
}

#[test]
fn shutdown_stops_sending_and_is_idempotent() {
    let (transport, _feed) = ChannelTransport::new();
    let connection = DebugConnection::new(transport.clone());

    connection.send_halt().unwrap();
    connection.shutdown();
    connection.shutdown();

    assert!(connection.is_shut_down());
    assert!(connection.send_resume().is_err());
    assert_eq!(transport.sent_requests().len(), 1);
}

#[test]
fn late_replies_after_shutdown_are_dropped() {
    let (transport, feed) = ChannelTransport::new();
    let connection = DebugConnection::new(transport);
    let (listener, received) = forwarding_listener();
    connection.add_listener(listener);

    connection.shutdown();
    let _ = feed.send(ReplyEnvelope {
        packet_id: Some(PacketId::new(1)),
        reply: DebugReply::TargetResumed,
    });

    assert!(received.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn requests_carry_their_payload_onto_the_wire() {
    let (transport, _feed) = ChannelTransport::new();
    let connection = DebugConnection::new(transport.clone());

    connection
        .send_write_memory(dbglink::debugger::RelocatedAddress::new(0x5000), vec![0xcc])
        .unwrap();

    let sent = transport.sent_requests();
    match &sent[0].request {
        DebugRequest::WriteMemory { address, bytes } => {
            assert_eq!(address.value(), 0x5000);
            assert_eq!(bytes, &vec![0xcc]);
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn dropped_connection_shuts_the_pump_down() {
    let (transport, feed) = ChannelTransport::new();
    {
        let _connection = DebugConnection::new(transport.clone());
    }
    // The pump is gone; nothing consumes what we feed now
    let _ = feed.send(ReplyEnvelope {
        packet_id: None,
        reply: DebugReply::ProcessClosed,
    });
    assert!(wait_until(|| transport.is_closed()));
}
