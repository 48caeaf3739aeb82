use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::message::BookingMessage;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
pub struct ChatEvent {
    pub message_id: Uuid,
    pub booking_id: Uuid,
    pub sender_id: Uuid,
    pub content: Option<String>,
    pub file_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

impl From<&BookingMessage> for ChatEvent {
    fn from(m: &BookingMessage) -> Self {
        ChatEvent {
            message_id: m.message_id,
            booking_id: m.booking_id,
            sender_id: m.sender_id,
            content: m.content.clone(),
            file_url: m.file_url.clone(),
            sent_at: m.sent_at,
        }
    }
}

/// In-process fan-out of chat messages, one channel per booking.
/// Messages are persisted before they reach the relay, so a missed
/// broadcast loses a notification, never data.
#[derive(Clone)]
pub struct MessageRelay {
    channels: Arc<Mutex<HashMap<Uuid, broadcast::Sender<ChatEvent>>>>,
}

impl MessageRelay {
    pub fn new() -> Self {
        MessageRelay {
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn subscribe(&self, booking_id: Uuid) -> broadcast::Receiver<ChatEvent> {
        let mut channels = self.channels.lock().expect("relay registry poisoned");
        channels
            .entry(booking_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Returns the number of listeners reached; zero listeners is not an
    /// error.
    pub fn publish(&self, event: ChatEvent) -> usize {
        let channels = self.channels.lock().expect("relay registry poisoned");
        match channels.get(&event.booking_id) {
            Some(tx) => tx.send(event).unwrap_or(0),
            None => 0,
        }
    }
}

impl Default for MessageRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn event(booking_id: Uuid) -> ChatEvent {
        ChatEvent {
            message_id: Uuid::new_v4(),
            booking_id,
            sender_id: Uuid::new_v4(),
            content: Some("is early check-in possible?".into()),
            file_url: None,
            sent_at: datetime!(2025-06-01 12:00 UTC),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let relay = MessageRelay::new();
        let booking_id = Uuid::new_v4();
        let mut rx = relay.subscribe(booking_id);

        let sent = event(booking_id);
        assert_eq!(relay.publish(sent.clone()), 1);

        let got = rx.recv().await.unwrap();
        assert_eq!(got.message_id, sent.message_id);
        assert_eq!(got.content.as_deref(), Some("is early check-in possible?"));
    }

    #[tokio::test]
    async fn publishing_without_listeners_is_a_noop() {
        let relay = MessageRelay::new();
        assert_eq!(relay.publish(event(Uuid::new_v4())), 0);
    }

    #[tokio::test]
    async fn channels_are_scoped_per_booking() {
        let relay = MessageRelay::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_a = relay.subscribe(a);
        let _rx_b = relay.subscribe(b);

        relay.publish(event(b));
        assert!(rx_a.try_recv().is_err());
    }
}
