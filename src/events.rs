/// file: src/events.rs
/// description: Event kinds and payloads decoupling the channel client from its consumers
use crate::registry::{Listener, listener};
use crate::types::{CheckFailure, CheckResult, ProgressUpdate};
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    Progress,
    Result,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Connect,
        EventKind::Disconnect,
        EventKind::Progress,
        EventKind::Result,
        EventKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::Progress => "progress",
            EventKind::Result => "result",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both transport failures and check failures arrive as `EventKind::Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorEvent {
    /// The push connection failed or dropped with an error.
    Transport { reason: String },
    /// The backend reported that a check failed.
    Check(CheckFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connect,
    Disconnect,
    Progress(ProgressUpdate),
    Result(CheckResult),
    Error(ErrorEvent),
}

impl ChannelEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChannelEvent::Connect => EventKind::Connect,
            ChannelEvent::Disconnect => EventKind::Disconnect,
            ChannelEvent::Progress(_) => EventKind::Progress,
            ChannelEvent::Result(_) => EventKind::Result,
            ChannelEvent::Error(_) => EventKind::Error,
        }
    }
}

// A full channel surfaces as a listener failure in the registry log.
const EVENT_CHANNEL_CAPACITY: usize = 1_024;

pub type EventSender = mpsc::Sender<ChannelEvent>;
pub type EventReceiver = mpsc::Receiver<ChannelEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// Listener that hands every event it sees to an async consumer.
pub fn forward_to(sender: EventSender) -> Listener {
    listener(move |event: &ChannelEvent| {
        sender
            .try_send(event.clone())
            .map_err(|e| anyhow::anyhow!("event channel rejected {}: {}", event.kind(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_payload() {
        let transport = ChannelEvent::Error(ErrorEvent::Transport {
            reason: "refused".into(),
        });
        assert_eq!(transport.kind(), EventKind::Error);
        assert_eq!(ChannelEvent::Disconnect.kind().as_str(), "disconnect");
    }

    #[tokio::test]
    async fn forward_to_reports_full_channel() {
        let (tx, mut rx) = mpsc::channel(1);
        let forward = forward_to(tx);

        assert!(forward(&ChannelEvent::Connect).is_ok());
        assert!(forward(&ChannelEvent::Disconnect).is_err());
        assert_eq!(rx.recv().await, Some(ChannelEvent::Connect));
    }
}
