//! An in-memory [`PeerTransport`] that routes envelope bytes between
//! in-process node instances by recipient address, without any real
//! socket.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tkms_transport::peer::{PeerError, PeerTransport};
use tkms_types::node::Address;
use tokio::sync::mpsc;

/// A shared in-memory network: every participating node registers an
/// inbound channel keyed by its address, and [`InMemoryTransport::send`]
/// looks up the recipient's channel and forwards the bytes directly.
pub struct InMemoryNetwork {
    inboxes: std::sync::Mutex<HashMap<Address, mpsc::UnboundedSender<Vec<u8>>>>,
}

impl Default for InMemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryNetwork {
    /// Creates an empty network with no registered nodes.
    pub fn new() -> Self {
        Self {
            inboxes: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Registers `address` and returns a transport handle for it. Messages
    /// sent to `address` through any other handle on this network arrive
    /// on this handle's `recv`.
    pub fn register(self: &Arc<Self>, address: Address) -> InMemoryTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes.lock().unwrap().insert(address, tx);
        InMemoryTransport {
            network: Arc::clone(self),
            inbox: tokio::sync::Mutex::new(rx),
        }
    }
}

/// One node's handle onto an [`InMemoryNetwork`].
pub struct InMemoryTransport {
    network: Arc<InMemoryNetwork>,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

#[async_trait]
impl PeerTransport for InMemoryTransport {
    async fn send(&self, recipient: Address, wire_bytes: Vec<u8>) -> Result<(), PeerError> {
        let sender = self
            .network
            .inboxes
            .lock()
            .unwrap()
            .get(&recipient)
            .cloned()
            .ok_or(PeerError::Unreachable(recipient))?;
        sender
            .send(wire_bytes)
            .map_err(|_| PeerError::LinkFailure("recipient inbox closed".to_string()))
    }

    async fn recv(&self) -> Result<Vec<u8>, PeerError> {
        let mut inbox = self.inbox.lock().await;
        inbox
            .recv()
            .await
            .ok_or_else(|| PeerError::LinkFailure("inbox closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn routes_messages_by_address() {
        let network = Arc::new(InMemoryNetwork::new());
        let alice = network.register(Address([1u8; 20]));
        let bob = network.register(Address([2u8; 20]));

        alice.send(Address([2u8; 20]), b"hello".to_vec()).await.unwrap();
        let received = bob.recv().await.unwrap();
        assert_eq!(received, b"hello");
    }

    #[tokio::test]
    async fn sending_to_unregistered_address_is_unreachable() {
        let network = Arc::new(InMemoryNetwork::new());
        let alice = network.register(Address([1u8; 20]));
        let err = alice.send(Address([9u8; 20]), b"hi".to_vec()).await.unwrap_err();
        assert!(matches!(err, PeerError::Unreachable(_)));
    }
}
