// JDWP event handling
//
// The target may send composite event packets at any time. Hot swapping
// requests no events, so these are only decoded far enough to be logged.

use crate::commands::event_kinds;
use crate::protocol::JdwpResult;
use crate::reader::{read_count, read_i32, read_id, read_string, read_u8};
use crate::types::ThreadId;
use serde::{Deserialize, Serialize};

/// Composite event packet (can contain multiple events)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSet {
    pub suspend_policy: u8,
    pub events: Vec<Event>,
}

/// Single event within an event set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: u8,
    pub request_id: i32,
    pub details: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    VMStart { thread: ThreadId },
    VMDeath,
    ClassUnload { signature: String },
    Unknown { kind: u8 },
}

/// Parse the body of a composite event packet
///
/// Event payload layouts differ per kind. Decoding stops at the first kind
/// this client does not model, since the remaining bytes cannot be framed.
pub fn parse_event_packet(data: &[u8], object_id_size: usize) -> JdwpResult<EventSet> {
    let mut buf = data;

    let suspend_policy = read_u8(&mut buf)?;
    let event_count = read_count(&mut buf)?;

    let mut events = Vec::with_capacity(event_count.min(64));

    for _ in 0..event_count {
        let kind = read_u8(&mut buf)?;
        let request_id = read_i32(&mut buf)?;

        let details = match kind {
            event_kinds::VM_START => EventKind::VMStart {
                thread: read_id(&mut buf, object_id_size)?,
            },
            event_kinds::VM_DEATH => EventKind::VMDeath,
            event_kinds::CLASS_UNLOAD => EventKind::ClassUnload {
                signature: read_string(&mut buf)?,
            },
            _ => EventKind::Unknown { kind },
        };

        let unknown = matches!(details, EventKind::Unknown { .. });
        events.push(Event {
            kind,
            request_id,
            details,
        });
        if unknown {
            break;
        }
    }

    Ok(EventSet {
        suspend_policy,
        events,
    })
}
