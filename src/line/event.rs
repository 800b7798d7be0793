use std::time::Duration;

use crate::uapi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Rising,
    Falling,
}

/// An edge detected on a requested line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEvent {
    timestamp: Duration,
    kind: EventKind,
    offset: u32,
    sequence: u32,
    line_sequence: u32,
}

impl LineEvent {
    pub const fn new(offset: u32, kind: EventKind) -> Self {
        Self {
            timestamp: Duration::ZERO,
            kind,
            offset,
            sequence: 0,
            line_sequence: 0,
        }
    }

    /// `None` for event ids this crate does not know about.
    pub(crate) const fn from_v2(event: uapi::v2::gpio_line_event) -> Option<Self> {
        let kind = match uapi::v2::LineEventId::from_raw(event.id) {
            Some(uapi::v2::LineEventId::RisingEdge) => EventKind::Rising,
            Some(uapi::v2::LineEventId::FallingEdge) => EventKind::Falling,
            None => return None,
        };

        Some(LineEvent {
            timestamp: Duration::from_nanos(event.timestamp_ns),
            kind,
            offset: event.offset,
            sequence: event.seqno,
            line_sequence: event.line_seqno,
        })
    }

    /// Time of the edge on the clock selected by the request, monotonic by
    /// default.
    pub const fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    pub const fn offset(&self) -> u32 {
        self.offset
    }

    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    pub const fn line_sequence(&self) -> u32 {
        self.line_sequence
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    pub fn decodes_kernel_event() {
        let mut raw = uapi::v2::gpio_line_event::zeroed();
        raw.timestamp_ns = 1_500;
        raw.id = uapi::v2::LineEventId::FallingEdge as u32;
        raw.offset = 3;
        raw.seqno = 7;
        raw.line_seqno = 2;

        let event = LineEvent::from_v2(raw).unwrap();
        assert_eq!(event.kind(), EventKind::Falling);
        assert_eq!(event.timestamp(), Duration::from_nanos(1_500));
        assert_eq!(event.offset(), 3);
        assert_eq!(event.sequence(), 7);
        assert_eq!(event.line_sequence(), 2);

        raw.id = 0;
        assert_eq!(LineEvent::from_v2(raw), None);
    }
}
