use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::protocol::ServerMessage;

/// Identifies one transport connection for the lifetime of its socket.
pub type ConnId = Uuid;

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("identity \"{0}\" is already taken")]
    AlreadyTaken(String),
    #[error("connection already logged in as \"{0}\"")]
    AlreadyIdentified(String),
    #[error("unknown connection")]
    UnknownConnection,
}

/// Clonable handle for enqueueing outbound messages to one connection.
/// Sending never blocks: frames land on the connection's own writer task
/// via an unbounded channel.
#[derive(Clone)]
pub struct PeerSender {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl PeerSender {
    pub fn new(tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { tx }
    }

    /// Fire-and-forget enqueue. A send to a connection whose writer has
    /// already gone away is not an error; the close path cleans up.
    pub fn send(&self, message: ServerMessage) {
        if self.tx.send(message).is_err() {
            debug!("dropping message for a connection that is shutting down");
        }
    }
}

/// Per-connection session record. `identity` is set once by a successful
/// login; `peer` tracks the identity most recently paired with and may be
/// set and cleared many times.
struct SessionState {
    identity: Option<String>,
    peer: Option<String>,
    sender: PeerSender,
}

#[derive(Default)]
struct RegistryInner {
    /// identity -> connection, at most one entry per identity
    names: HashMap<String, ConnId>,
    /// connection -> session record, created at accept, dropped at close
    sessions: HashMap<ConnId, SessionState>,
}

impl RegistryInner {
    fn unregister(&mut self, name: &str) {
        self.names.remove(name);
    }
}

/// Identity registry and session tracker. All mutation goes through one
/// mutex so register is an atomic check-and-insert and the disconnect
/// cascade observes names and sessions in a single snapshot. No `.await`
/// happens while the lock is held.
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Track a newly accepted connection. Both identity and peer start unset.
    pub async fn connect(&self, sender: PeerSender) -> ConnId {
        let conn = Uuid::new_v4();
        let mut inner = self.inner.lock().await;
        inner.sessions.insert(
            conn,
            SessionState {
                identity: None,
                peer: None,
                sender,
            },
        );
        conn
    }

    /// Atomically claim `name` for `conn`. Fails without mutating anything
    /// if the name is taken or the connection already has an identity.
    pub async fn register(&self, conn: ConnId, name: &str) -> Result<(), RegisterError> {
        let mut inner = self.inner.lock().await;
        match inner.sessions.get(&conn) {
            None => return Err(RegisterError::UnknownConnection),
            Some(session) => {
                if let Some(existing) = &session.identity {
                    return Err(RegisterError::AlreadyIdentified(existing.clone()));
                }
            }
        }
        if inner.names.contains_key(name) {
            return Err(RegisterError::AlreadyTaken(name.to_string()));
        }
        inner.names.insert(name.to_string(), conn);
        if let Some(session) = inner.sessions.get_mut(&conn) {
            session.identity = Some(name.to_string());
        }
        Ok(())
    }

    /// Drop the registry entry for `name`, if any. The session record (and
    /// its identity field) is untouched; close handles full teardown.
    pub async fn unregister(&self, name: &str) {
        let mut inner = self.inner.lock().await;
        inner.unregister(name);
    }

    /// Resolve an identity to its connection's outbound handle.
    pub async fn lookup(&self, name: &str) -> Option<PeerSender> {
        let inner = self.inner.lock().await;
        let conn = inner.names.get(name)?;
        inner.sessions.get(conn).map(|s| s.sender.clone())
    }

    /// Record that `conn` is now exchanging negotiation traffic with `name`.
    pub async fn pair(&self, conn: ConnId, name: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.sessions.get_mut(&conn) {
            session.peer = Some(name.to_string());
        }
    }

    /// The identity `conn` registered under, if it has logged in.
    pub async fn identity_of(&self, conn: ConnId) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.sessions.get(&conn).and_then(|s| s.identity.clone())
    }

    /// Outbound handle for `conn` itself, used for direct replies.
    pub async fn sender_of(&self, conn: ConnId) -> Option<PeerSender> {
        let inner = self.inner.lock().await;
        inner.sessions.get(&conn).map(|s| s.sender.clone())
    }

    /// Unpair the connection registered as `name` and return its handle so
    /// the caller can tell it the pairing ended. `None` when the identity
    /// is not registered.
    pub async fn clear_peer_of(&self, name: &str) -> Option<PeerSender> {
        let mut inner = self.inner.lock().await;
        let conn = *inner.names.get(name)?;
        let session = inner.sessions.get_mut(&conn)?;
        session.peer = None;
        Some(session.sender.clone())
    }

    /// Tear down `conn` after transport close: drop its session record,
    /// release its identity, and if it was paired, unpair the surviving
    /// side and return that side's handle for the leave notification.
    pub async fn disconnect(&self, conn: ConnId) -> Option<PeerSender> {
        let mut inner = self.inner.lock().await;
        let session = inner.sessions.remove(&conn)?;
        let identity = session.identity?;
        inner.unregister(&identity);

        let peer_name = session.peer?;
        let peer_conn = *inner.names.get(&peer_name)?;
        let peer = inner.sessions.get_mut(&peer_conn)?;
        peer.peer = None;
        Some(peer.sender.clone())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (PeerSender, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PeerSender::new(tx), rx)
    }

    #[tokio::test]
    async fn register_is_first_come_first_served() {
        let registry = Registry::new();
        let (a, _rx_a) = handle();
        let (b, _rx_b) = handle();
        let conn_a = registry.connect(a).await;
        let conn_b = registry.connect(b).await;

        assert!(registry.register(conn_a, "c1").await.is_ok());
        assert!(matches!(
            registry.register(conn_b, "c1").await,
            Err(RegisterError::AlreadyTaken(_))
        ));

        // The loser kept no identity and can claim another name.
        assert_eq!(registry.identity_of(conn_b).await, None);
        assert!(registry.register(conn_b, "c2").await.is_ok());
    }

    #[tokio::test]
    async fn second_login_on_same_connection_is_rejected() {
        let registry = Registry::new();
        let (a, _rx) = handle();
        let conn = registry.connect(a).await;

        registry.register(conn, "c1").await.unwrap();
        assert!(matches!(
            registry.register(conn, "c9").await,
            Err(RegisterError::AlreadyIdentified(_))
        ));
        // "c9" was never inserted.
        assert!(registry.lookup("c9").await.is_none());
        assert!(registry.lookup("c1").await.is_some());
    }

    #[tokio::test]
    async fn unregister_frees_the_name() {
        let registry = Registry::new();
        let (a, _rx_a) = handle();
        let (b, _rx_b) = handle();
        let conn_a = registry.connect(a).await;
        let conn_b = registry.connect(b).await;

        registry.register(conn_a, "c1").await.unwrap();
        registry.unregister("c1").await;
        assert!(registry.lookup("c1").await.is_none());
        assert!(registry.register(conn_b, "c1").await.is_ok());

        // Unregistering a name nobody holds is a no-op.
        registry.unregister("ghost").await;
    }

    #[tokio::test]
    async fn disconnect_releases_identity_and_reports_peer() {
        let registry = Registry::new();
        let (a, _rx_a) = handle();
        let (b, _rx_b) = handle();
        let conn_a = registry.connect(a).await;
        let conn_b = registry.connect(b).await;

        registry.register(conn_a, "c1").await.unwrap();
        registry.register(conn_b, "c2").await.unwrap();
        registry.pair(conn_a, "c2").await;
        registry.pair(conn_b, "c1").await;

        let survivor = registry.disconnect(conn_a).await;
        assert!(survivor.is_some());
        assert!(registry.lookup("c1").await.is_none());

        // The survivor was unpaired, so its own disconnect cascades nowhere.
        assert!(registry.disconnect(conn_b).await.is_none());
    }

    #[tokio::test]
    async fn anonymous_disconnect_needs_no_cleanup() {
        let registry = Registry::new();
        let (a, _rx) = handle();
        let conn = registry.connect(a).await;
        assert!(registry.disconnect(conn).await.is_none());
        // Already gone; a second close notification is harmless.
        assert!(registry.disconnect(conn).await.is_none());
    }

    #[tokio::test]
    async fn disconnect_skips_peer_that_already_left() {
        let registry = Registry::new();
        let (a, _rx_a) = handle();
        let (b, _rx_b) = handle();
        let conn_a = registry.connect(a).await;
        let conn_b = registry.connect(b).await;

        registry.register(conn_a, "c1").await.unwrap();
        registry.register(conn_b, "c2").await.unwrap();
        registry.pair(conn_a, "c2").await;

        registry.disconnect(conn_b).await;
        assert!(registry.disconnect(conn_a).await.is_none());
    }
}
