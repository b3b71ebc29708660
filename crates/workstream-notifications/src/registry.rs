//! Connection registry: one active session per user identity.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::{debug, info, warn};
use workstream_core::UserIdentity;

use crate::session::{CloseReason, Session, SessionId, SessionListener};

/// Maps each identity to the session currently receiving its events.
///
/// Every operation works on a single `DashMap` entry, so inserts and removals
/// are atomic with respect to concurrent lookups. Lookups hand out clones,
/// and no shard lock is held while a caller sends on the session.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: DashMap<UserIdentity, Session>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the session for `identity`; the last registration wins.
    ///
    /// The displaced session, if any, is returned untouched.
    pub fn register(&self, identity: UserIdentity, session: Session) -> Option<Session> {
        self.sessions.insert(identity, session)
    }

    pub fn lookup(&self, identity: &UserIdentity) -> Option<Session> {
        self.sessions.get(identity).map(|entry| entry.value().clone())
    }

    pub fn deregister(&self, identity: &UserIdentity) -> Option<Session> {
        self.sessions.remove(identity).map(|(_, session)| session)
    }

    /// Remove the entry for `identity` only if it still holds `session_id`.
    ///
    /// Used by terminating sessions so that a replaced session never removes
    /// its replacement.
    pub fn deregister_session(&self, identity: &UserIdentity, session_id: SessionId) -> bool {
        self.sessions
            .remove_if(identity, |_, session| session.id() == session_id)
            .is_some()
    }

    pub fn contains(&self, identity: &UserIdentity) -> bool {
        self.sessions.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Clone out every registered session.
    ///
    /// Closing a session re-enters the registry, so callers must not close
    /// while iterating the map itself.
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Listener that deregisters sessions of this registry when they close.
    pub fn listener(self: &Arc<Self>) -> Arc<dyn SessionListener> {
        Arc::new(RegistryListener {
            registry: Arc::downgrade(self),
        })
    }
}

struct RegistryListener {
    registry: Weak<ConnectionRegistry>,
}

impl SessionListener for RegistryListener {
    fn on_closed(&self, owner: &UserIdentity, session_id: SessionId, reason: CloseReason) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let removed = registry.deregister_session(owner, session_id);

        match reason {
            CloseReason::SendFailed => warn!(
                identity = %owner,
                session_id = %session_id,
                removed,
                "Stream closed after send failure"
            ),
            CloseReason::Completed | CloseReason::TimedOut => info!(
                identity = %owner,
                session_id = %session_id,
                reason = %reason,
                removed,
                "Stream connection ended"
            ),
            CloseReason::ServerClosed => debug!(
                identity = %owner,
                session_id = %session_id,
                removed,
                "Stream closed by server"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionOptions, SessionState, SessionStream};

    fn open(registry: &Arc<ConnectionRegistry>, who: &str) -> (Session, SessionStream) {
        Session::open(UserIdentity::from(who), &SessionOptions::default(), registry.listener())
    }

    #[tokio::test]
    async fn test_register_lookup_deregister() {
        let registry = Arc::new(ConnectionRegistry::new());
        let alice = UserIdentity::from("alice");
        let (session, _stream) = open(&registry, "alice");
        let id = session.id();

        assert!(registry.register(alice.clone(), session).is_none());
        assert_eq!(registry.lookup(&alice).map(|s| s.id()), Some(id));
        assert!(registry.lookup(&UserIdentity::from("bob")).is_none());

        assert!(registry.deregister(&alice).is_some());
        assert!(registry.deregister(&alice).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let registry = Arc::new(ConnectionRegistry::new());
        let alice = UserIdentity::from("alice");
        let (first, _first_stream) = open(&registry, "alice");
        let (second, _second_stream) = open(&registry, "alice");
        let (first_id, second_id) = (first.id(), second.id());

        registry.register(alice.clone(), first);
        let displaced = registry.register(alice.clone(), second).unwrap();

        assert_eq!(displaced.id(), first_id);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(&alice).unwrap().id(), second_id);
    }

    #[tokio::test]
    async fn test_stale_session_does_not_remove_replacement() {
        let registry = Arc::new(ConnectionRegistry::new());
        let alice = UserIdentity::from("alice");
        let (old, old_stream) = open(&registry, "alice");
        let (new, _new_stream) = open(&registry, "alice");
        let new_id = new.id();

        registry.register(alice.clone(), old.clone());
        registry.register(alice.clone(), new);

        // The replaced session is still open and ends on its own.
        assert!(old.is_open());
        drop(old_stream);
        assert_eq!(old.state(), SessionState::Closed(CloseReason::Completed));

        assert_eq!(registry.lookup(&alice).unwrap().id(), new_id);
        assert!(!registry.deregister_session(&alice, old.id()));
    }

    #[tokio::test]
    async fn test_closed_session_is_deregistered() {
        let registry = Arc::new(ConnectionRegistry::new());
        let alice = UserIdentity::from("alice");
        let (session, stream) = open(&registry, "alice");
        registry.register(alice.clone(), session);

        drop(stream);
        assert!(!registry.contains(&alice));
    }

    #[tokio::test]
    async fn test_concurrent_register_and_deregister() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut handles = Vec::new();

        for worker in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let mut streams = Vec::new();
                for round in 0..50 {
                    let who = format!("user-{}", (worker + round) % 4);
                    let (session, stream) = open(&registry, &who);
                    let identity = UserIdentity::from(who);
                    registry.register(identity.clone(), session);
                    let _ = registry.lookup(&identity);
                    if round % 3 == 0 {
                        registry.deregister(&identity);
                    }
                    streams.push(stream);
                }
                streams
            }));
        }

        let mut streams = Vec::new();
        for handle in handles {
            streams.extend(handle.await.unwrap());
        }
        assert!(registry.len() <= 4);
        for session in registry.sessions() {
            assert!(session.is_open());
        }

        drop(streams);
        assert!(registry.is_empty());
    }
}
