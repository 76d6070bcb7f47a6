//! Connected client sessions.
//!
//! Sessions connect to a [`ClientRegistry`], are claimed (controlled) by an
//! activating instance, and receive broadcast [`ClientMessage`]s.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Messages pushed to every connected session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activation completed; this instance now serves the session's requests.
    SwActivated,
}

/// The client-notification capability the lifecycle consumes.
pub trait ClientNotifier: Send + Sync {
    /// Take control of every connected session. Returns how many were claimed.
    fn claim(&self) -> usize;

    /// Deliver a message to every connected session. Returns how many received it.
    fn notify_all(&self, message: &ClientMessage) -> usize;
}

#[derive(Debug)]
struct SessionState {
    id: u64,
    controlled: AtomicBool,
}

/// One connected client.
#[derive(Debug)]
pub struct ClientSession {
    state: Arc<SessionState>,
    receiver: broadcast::Receiver<ClientMessage>,
}

impl ClientSession {
    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Whether an activated instance has claimed this session.
    pub fn is_controlled(&self) -> bool {
        self.state.controlled.load(Ordering::SeqCst)
    }

    /// Next broadcast message, or None once the registry is gone.
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(session = self.state.id, skipped, "client session lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// A message already waiting, if any.
    pub fn try_recv(&mut self) -> Option<ClientMessage> {
        self.receiver.try_recv().ok()
    }
}

/// Broadcast-backed registry of sessions.
#[derive(Debug)]
pub struct ClientRegistry {
    sender: broadcast::Sender<ClientMessage>,
    sessions: Mutex<Vec<Weak<SessionState>>>,
    next_id: AtomicU64,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender, sessions: Mutex::new(Vec::new()), next_id: AtomicU64::new(1) }
    }

    /// Connect a new session. Dropping the session disconnects it.
    pub fn connect(&self) -> ClientSession {
        let state = Arc::new(SessionState {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            controlled: AtomicBool::new(false),
        });
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::downgrade(&state));
        ClientSession { state, receiver: self.sender.subscribe() }
    }

    /// Live sessions, pruning the ones that were dropped.
    fn live(&self) -> Vec<Arc<SessionState>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|weak| weak.strong_count() > 0);
        sessions.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn connected(&self) -> usize {
        self.live().len()
    }
}

impl ClientNotifier for ClientRegistry {
    fn claim(&self) -> usize {
        let live = self.live();
        for session in &live {
            session.controlled.store(true, Ordering::SeqCst);
        }
        live.len()
    }

    fn notify_all(&self, message: &ClientMessage) -> usize {
        self.sender.send(message.clone()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let json = serde_json::to_value(ClientMessage::SwActivated).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "SW_ACTIVATED" }));
    }

    #[test]
    fn test_claim_marks_connected_sessions() {
        let registry = ClientRegistry::new();
        let a = registry.connect();
        let b = registry.connect();
        assert_ne!(a.id(), b.id());
        assert!(!a.is_controlled());

        assert_eq!(registry.claim(), 2);
        assert!(a.is_controlled());
        assert!(b.is_controlled());
    }

    #[test]
    fn test_dropped_sessions_are_pruned() {
        let registry = ClientRegistry::new();
        let a = registry.connect();
        let b = registry.connect();
        drop(b);

        assert_eq!(registry.connected(), 1);
        assert_eq!(registry.claim(), 1);
        assert!(a.is_controlled());
    }

    #[tokio::test]
    async fn test_notify_all_reaches_every_session() {
        let registry = ClientRegistry::new();
        let mut a = registry.connect();
        let mut b = registry.connect();

        assert_eq!(registry.notify_all(&ClientMessage::SwActivated), 2);
        assert_eq!(a.recv().await, Some(ClientMessage::SwActivated));
        assert_eq!(b.try_recv(), Some(ClientMessage::SwActivated));
    }

    #[test]
    fn test_notify_without_sessions() {
        let registry = ClientRegistry::new();
        assert_eq!(registry.notify_all(&ClientMessage::SwActivated), 0);
    }
}
