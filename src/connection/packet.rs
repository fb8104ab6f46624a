use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Correlation id of a request packet.
///
/// Every request that expects an answer carries a packet id; the agent
/// echoes it in the reply so callers can match answers to the commands
/// they issued, independent of arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId(u64);

impl PacketId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "packet#{}", self.0)
    }
}

/// Process-wide source of unique packet ids.
///
/// Ids are never reused within a connection; two concurrent callers always
/// obtain distinct ids.
#[derive(Debug, Default)]
pub struct PacketIdGenerator {
    next: AtomicU64,
}

impl PacketIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> PacketId {
        PacketId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
