//! In-memory network adapter
//!
//! A `LocalNetworkHub` connects any number of `LocalNetwork` endpoints in one
//! process. Delivery is synchronous: `broadcast` calls each peer's handler,
//! which only enqueues, so no engine blocks another.

use crate::ports::{MessageHandler, Network};
use parking_lot::RwLock;
use shared_types::ConsensusMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct LocalNetworkHub {
    handlers: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
}

impl LocalNetworkHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Endpoint for node `id` on this hub.
    pub fn connect(self: &Arc<Self>, id: impl Into<String>) -> LocalNetwork {
        LocalNetwork {
            id: id.into(),
            hub: Arc::clone(self),
        }
    }

    /// Stop delivering to `id`, as if the node went offline.
    pub fn disconnect(&self, id: &str) -> bool {
        self.handlers.write().remove(id).is_some()
    }

    pub fn peer_count(&self) -> usize {
        self.handlers.read().len()
    }

    fn register(&self, id: &str, handler: Arc<dyn MessageHandler>) {
        self.handlers.write().insert(id.to_string(), handler);
    }

    fn handlers_except(&self, id: &str) -> Vec<Arc<dyn MessageHandler>> {
        self.handlers
            .read()
            .iter()
            .filter(|(peer, _)| peer.as_str() != id)
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }

    fn handler(&self, id: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.read().get(id).cloned()
    }
}

/// One node's view of a `LocalNetworkHub`.
#[derive(Clone)]
pub struct LocalNetwork {
    id: String,
    hub: Arc<LocalNetworkHub>,
}

impl Network for LocalNetwork {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn broadcast(&self, message: ConsensusMessage) {
        // Handlers are collected first so no hub lock is held during delivery.
        for handler in self.hub.handlers_except(&self.id) {
            if !handler.handle_message(message.clone()) {
                debug!(from = %self.id, kind = message.kind(), "peer dropped broadcast");
            }
        }
    }

    fn send(&self, peer: &str, message: ConsensusMessage) -> Result<(), String> {
        let handler = self
            .hub
            .handler(peer)
            .ok_or_else(|| format!("unknown peer {peer}"))?;
        if handler.handle_message(message) {
            Ok(())
        } else {
            Err(format!("peer {peer} dropped the message"))
        }
    }

    fn register_message_handler(&self, handler: Arc<dyn MessageHandler>) {
        self.hub.register(&self.id, handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use shared_types::Vote;

    #[derive(Default)]
    struct Recorder {
        received: Mutex<Vec<ConsensusMessage>>,
    }

    impl MessageHandler for Recorder {
        fn handle_message(&self, message: ConsensusMessage) -> bool {
            self.received.lock().push(message);
            true
        }
    }

    fn message() -> ConsensusMessage {
        ConsensusMessage::Vote(Vote::epoch_vote(1, 1, [7; 20]))
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let hub = LocalNetworkHub::new();
        let nodes: Vec<_> = (0..3).map(|i| hub.connect(format!("node-{i}"))).collect();
        let recorders: Vec<Arc<Recorder>> = nodes
            .iter()
            .map(|n| {
                let recorder = Arc::new(Recorder::default());
                n.register_message_handler(recorder.clone());
                recorder
            })
            .collect();

        nodes[0].broadcast(message());

        assert!(recorders[0].received.lock().is_empty());
        assert_eq!(recorders[1].received.lock().len(), 1);
        assert_eq!(recorders[2].received.lock().len(), 1);
    }

    #[test]
    fn test_send_and_disconnect() {
        let hub = LocalNetworkHub::new();
        let a = hub.connect("a");
        let b = hub.connect("b");
        let recorder = Arc::new(Recorder::default());
        b.register_message_handler(recorder.clone());

        assert!(a.send("b", message()).is_ok());
        assert!(a.send("c", message()).is_err());
        assert_eq!(recorder.received.lock().len(), 1);

        assert!(hub.disconnect("b"));
        assert_eq!(hub.peer_count(), 0);
        a.broadcast(message());
        assert_eq!(recorder.received.lock().len(), 1);
    }
}
