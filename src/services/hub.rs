use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error};

/// Envelope every pushed message is wrapped in.
#[derive(Debug, Serialize)]
struct HubMessage<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'a str,
    data: &'a T,
    timestamp: DateTime<Utc>,
}

/// Broadcast channel feeding every connected WebSocket client.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<String>,
}

impl BroadcastHub {
    /// `capacity` is how many messages a slow subscriber may fall behind before it starts missing them.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Serialize `data` as `{type, data, timestamp}` and push it to all subscribers.
    ///
    /// Returns how many subscribers received the message.
    pub fn publish<T: Serialize>(&self, kind: &str, data: &T) -> usize {
        let message = HubMessage {
            kind,
            data,
            timestamp: Utc::now(),
        };
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize {} message: {}", kind, e);
                return 0;
            }
        };

        // Sending only fails when nobody is listening
        match self.sender.send(text) {
            Ok(receivers) => {
                debug!("Broadcast {} message to {} subscribers", kind, receivers);
                receivers
            }
            Err(_) => 0,
        }
    }
}
