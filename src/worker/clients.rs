//! Client Registry Module
//!
//! Pages connected to the worker, each with a mailbox of worker messages.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::worker::WorkerMessage;

#[derive(Debug, Default)]
struct ClientHandle {
    controlled: bool,
    mailbox: Vec<WorkerMessage>,
}

// == Client Registry ==
/// Open clients. Only controlled clients receive broadcasts.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<Uuid, ClientHandle>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new, not yet controlled client.
    pub async fn connect(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.clients.write().await.insert(id, ClientHandle::default());
        id
    }

    pub async fn disconnect(&self, id: Uuid) -> bool {
        self.clients.write().await.remove(&id).is_some()
    }

    /// Takes control of every open client. Returns how many were claimed.
    pub async fn claim(&self) -> usize {
        let mut clients = self.clients.write().await;
        for handle in clients.values_mut() {
            handle.controlled = true;
        }
        clients.len()
    }

    /// Posts a message to every controlled client. Returns the recipient
    /// count.
    pub async fn broadcast(&self, message: WorkerMessage) -> usize {
        let mut clients = self.clients.write().await;
        let mut delivered = 0;
        for handle in clients.values_mut().filter(|handle| handle.controlled) {
            handle.mailbox.push(message.clone());
            delivered += 1;
        }
        delivered
    }

    /// Takes every pending message of a client, or None if it is unknown.
    pub async fn drain(&self, id: Uuid) -> Option<Vec<WorkerMessage>> {
        self.clients
            .write()
            .await
            .get_mut(&id)
            .map(|handle| std::mem::take(&mut handle.mailbox))
    }

    pub async fn is_controlled(&self, id: Uuid) -> bool {
        self.clients
            .read()
            .await
            .get(&id)
            .is_some_and(|handle| handle.controlled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_only_controlled_clients() {
        let registry = ClientRegistry::new();
        let early = registry.connect().await;
        assert_eq!(registry.broadcast(WorkerMessage::SwActivated).await, 0);

        assert_eq!(registry.claim().await, 1);
        let late = registry.connect().await;

        assert_eq!(registry.broadcast(WorkerMessage::SwActivated).await, 1);
        assert_eq!(
            registry.drain(early).await,
            Some(vec![WorkerMessage::SwActivated])
        );
        assert_eq!(registry.drain(late).await, Some(vec![]));
        assert!(!registry.is_controlled(late).await);
    }

    #[tokio::test]
    async fn test_drain_empties_mailbox() {
        let registry = ClientRegistry::new();
        let id = registry.connect().await;
        registry.claim().await;
        registry.broadcast(WorkerMessage::SwActivated).await;

        assert_eq!(registry.drain(id).await.unwrap().len(), 1);
        assert!(registry.drain(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_client() {
        let registry = ClientRegistry::new();
        assert!(registry.drain(Uuid::new_v4()).await.is_none());
        assert!(!registry.disconnect(Uuid::new_v4()).await);
    }
}
