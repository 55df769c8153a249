//! Cross-tab broadcaster
//!
//! A [`TabChannel`] is the same-origin publish/subscribe transport shared by
//! every tab; each engine holds its own [`Broadcaster`] endpoint. Endpoints
//! never receive their own messages.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 64;

/// Message exchanged between tabs
///
/// Wire form: `{"type":"STATE_UPDATE","payload":"<serialized document>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastMessage {
    StateUpdate { payload: String },
}

impl BroadcastMessage {
    /// Parse a wire message, `None` for anything unrecognized
    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    pub fn encode(&self) -> String {
        // A single-string-field enum always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
struct Envelope {
    origin: Uuid,
    message: BroadcastMessage,
}

/// Named same-origin channel
#[derive(Clone)]
pub struct TabChannel {
    name: String,
    tx: broadcast::Sender<Envelope>,
}

impl TabChannel {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let name = name.into();
        info!(
            "Tab channel '{}' initialized with capacity {}",
            name, CHANNEL_CAPACITY
        );
        Self { name, tx }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A new endpoint with its own origin id
    pub fn endpoint(&self) -> Broadcaster {
        Broadcaster {
            origin: Uuid::new_v4(),
            channel: self.clone(),
        }
    }
}

/// One tab's endpoint on a [`TabChannel`]
#[derive(Clone)]
pub struct Broadcaster {
    origin: Uuid,
    channel: TabChannel,
}

impl Broadcaster {
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    pub fn channel_name(&self) -> &str {
        self.channel.name()
    }

    /// Publish a serialized document; returns how many other endpoints listen
    pub fn publish(&self, serialized: &str) -> usize {
        let envelope = Envelope {
            origin: self.origin,
            message: BroadcastMessage::StateUpdate {
                payload: serialized.to_string(),
            },
        };
        match self.channel.tx.send(envelope) {
            // our own receiver (if any) is counted by the channel
            Ok(count) => count,
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> BroadcastReceiver {
        BroadcastReceiver {
            origin: self.origin,
            rx: self.channel.tx.subscribe(),
        }
    }

    /// Run `callback` for every message from other endpoints
    ///
    /// Must be called within a tokio runtime. Abort the returned handle to
    /// stop listening.
    pub fn on_receive<F>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(BroadcastMessage) + Send + 'static,
    {
        let mut receiver = self.subscribe();
        let channel = self.channel.name.clone();
        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                callback(message);
            }
            debug!("Tab channel '{}' closed", channel);
        })
    }
}

/// Messages from other endpoints
pub struct BroadcastReceiver {
    origin: Uuid,
    rx: broadcast::Receiver<Envelope>,
}

impl BroadcastReceiver {
    /// Next message from another endpoint; `None` once the channel is gone
    pub async fn recv(&mut self) -> Option<BroadcastMessage> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) if envelope.origin == self.origin => continue,
                Ok(envelope) => return Some(envelope.message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Tab channel receiver lagged, skipped {} messages", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let message = BroadcastMessage::StateUpdate {
            payload: "{\"a\":1}".to_string(),
        };
        let encoded = message.encode();
        assert_eq!(encoded, r#"{"type":"STATE_UPDATE","payload":"{\"a\":1}"}"#);
        assert_eq!(BroadcastMessage::decode(&encoded), Some(message));
        assert_eq!(BroadcastMessage::decode(r#"{"type":"PING"}"#), None);
        assert_eq!(
            BroadcastMessage::decode(r#"{"type":"STATE_UPDATE","payload":5}"#),
            None
        );
    }

    #[tokio::test]
    async fn test_no_echo_to_sender() {
        let channel = TabChannel::new("test");
        let a = channel.endpoint();
        let b = channel.endpoint();
        let mut a_rx = a.subscribe();
        let mut b_rx = b.subscribe();

        a.publish("from-a");
        b.publish("from-b");

        assert_eq!(
            b_rx.recv().await,
            Some(BroadcastMessage::StateUpdate {
                payload: "from-a".to_string()
            })
        );
        assert_eq!(
            a_rx.recv().await,
            Some(BroadcastMessage::StateUpdate {
                payload: "from-b".to_string()
            }),
            "a skips its own message"
        );
    }

    #[tokio::test]
    async fn test_on_receive_callback() {
        let channel = TabChannel::new("test");
        let a = channel.endpoint();
        let b = channel.endpoint();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let handle = b.on_receive(move |message| {
            let _ = tx.send(message);
        });
        a.publish("hello");

        let received = rx.recv().await.unwrap();
        assert_eq!(
            received,
            BroadcastMessage::StateUpdate {
                payload: "hello".to_string()
            }
        );
        handle.abort();
    }

    #[test]
    fn test_publish_without_listeners() {
        let channel = TabChannel::new("quiet");
        assert_eq!(channel.endpoint().publish("x"), 0);
    }
}
