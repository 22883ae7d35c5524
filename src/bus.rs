// ABOUTME: Typed event bus carrying unsolicited session events to subscribers.
// ABOUTME: The session runtime publishes; the forwarder (and tests) subscribe.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::store::MemberRecord;

/// An unsolicited event emitted by the Discord session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Gateway handshake completed; the bridge is accepting work.
    Ready { bot_user: String },
    /// A member joined the configured guild.
    MemberJoined {
        member: MemberRecord,
        at: DateTime<Utc>,
    },
    /// A member left (or was removed from) the configured guild.
    MemberLeft {
        member: MemberRecord,
        at: DateTime<Utc>,
    },
}

/// Broadcast fan-out for session events.
///
/// Publishing never blocks the session context; slow subscribers lag and
/// are told how many events they missed.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(SessionEvent::Ready {
            bot_user: "hookbridge".to_string(),
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::Ready { bot_user } if bot_user == "hookbridge"));
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::new(8);
        bus.publish(SessionEvent::MemberLeft {
            member: MemberRecord {
                discord_id: 1,
                username: "ghost".to_string(),
            },
            at: Utc::now(),
        });
    }
}
