use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use workstream_core::{Event, UserIdentity};

use crate::registry::ConnectionRegistry;
use crate::session::{Session, SessionOptions, SessionStream};

/// Default upper bound on how long a send may wait for a slow client.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub session: SessionOptions,
    pub send_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            session: SessionOptions::default(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Opens client streams and delivers events to them.
///
/// Producers only ever see [`NotificationHub::deliver`]; delivery is best
/// effort and never reports failure back to the caller.
#[derive(Debug)]
pub struct NotificationHub {
    registry: Arc<ConnectionRegistry>,
    config: HubConfig,
    /// Parent of every session token, replaced ones included.
    shutdown: CancellationToken,
}

impl NotificationHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn new_shared(config: HubConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Open a stream for `identity`, replacing any stream it already has.
    ///
    /// Returns immediately; the stream deregisters itself when it ends.
    pub fn connect(&self, identity: UserIdentity) -> SessionStream {
        let (session, stream) = Session::open_with_parent(
            identity.clone(),
            &self.config.session,
            self.registry.listener(),
            &self.shutdown,
        );
        let session_id = session.id();

        if let Some(previous) = self.registry.register(identity.clone(), session) {
            debug!(
                identity = %identity,
                previous_session = %previous.id(),
                "Replacing existing stream connection"
            );
        }

        info!(
            identity = %identity,
            session_id = %session_id,
            "Stream connection established"
        );
        stream
    }

    /// Push `event` to the stream registered for `identity`, if any.
    pub async fn deliver(&self, identity: &UserIdentity, event: Event) {
        let Some(session) = self.registry.lookup(identity) else {
            debug!(identity = %identity, event = %event.name, "No active stream; event dropped");
            return;
        };

        match session.send(&event, self.config.send_timeout).await {
            Ok(()) => trace!(
                identity = %identity,
                session_id = %session.id(),
                event = %event.name,
                "Event delivered"
            ),
            Err(e) => {
                // Closing already deregistered it; this covers a session that
                // was closed before the send started.
                self.registry.deregister_session(identity, session.id());
                warn!(
                    identity = %identity,
                    session_id = %session.id(),
                    event = %event.name,
                    error = %e,
                    "Event dropped; stream removed"
                );
            }
        }
    }

    /// Close the stream registered for `identity`.
    pub fn disconnect(&self, identity: &UserIdentity) -> bool {
        match self.registry.lookup(identity) {
            Some(session) => session.close(),
            None => false,
        }
    }

    /// Close every stream, including ones already replaced by a reconnect.
    /// Returns how many registered streams were closed.
    ///
    /// This shuts the hub down: streams connected afterwards end at once.
    pub fn close_all(&self) -> usize {
        let closed = self
            .registry
            .sessions()
            .into_iter()
            .filter(|session| session.close())
            .count();
        self.shutdown.cancel();
        if closed > 0 {
            info!(count = closed, "Closed all stream connections");
        }
        closed
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_connected(&self, identity: &UserIdentity) -> bool {
        self.registry.contains(identity)
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}
