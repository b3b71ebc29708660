//! Stream sessions.
//!
//! A session is split in two halves sharing one terminal state:
//!
//! - [`Session`] is the producer half kept in the registry. It encodes events
//!   and enqueues them on a bounded per-session channel.
//! - [`SessionStream`] is the transport half handed to the HTTP layer. It
//!   yields encoded frames until the session closes.
//!
//! The first transition into `Closed` wins and is recorded in a `OnceLock`;
//! only that transition notifies the [`SessionListener`]. Later attempts
//! (a send failing after a disconnect, the stream being dropped after a
//! timeout, a repeated `close`) are no-ops.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::time::{Instant, Sleep};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use uuid::Uuid;
use workstream_core::{Event, UserIdentity, WireEvent};

pub type SessionId = Uuid;

/// Default number of encoded frames buffered per session.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Why a session left the `Open` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// The client went away (the transport dropped the stream)
    Completed,
    /// No event was written within the idle timeout
    TimedOut,
    /// An event could not be handed to the transport
    SendFailed,
    /// The server closed the session explicitly
    ServerClosed,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Completed => "completed",
            CloseReason::TimedOut => "timed_out",
            CloseReason::SendFailed => "send_failed",
            CloseReason::ServerClosed => "server_closed",
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed(CloseReason),
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("session is closed")]
    Closed,

    #[error("client did not accept the event within {0:?}")]
    Stalled(Duration),

    #[error("failed to encode event payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Receives the one terminal notification of every session.
pub trait SessionListener: Send + Sync {
    fn on_closed(&self, owner: &UserIdentity, session_id: SessionId, reason: CloseReason);
}

/// Per-session tuning.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// `None` keeps the session open until disconnect or failure.
    pub idle_timeout: Option<Duration>,
    pub channel_capacity: usize,
}

impl SessionOptions {
    /// Zero is treated as "no timeout".
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

struct Shared {
    id: SessionId,
    owner: UserIdentity,
    reason: OnceLock<CloseReason>,
    cancel: CancellationToken,
    listener: Arc<dyn SessionListener>,
}

impl Shared {
    /// Returns `true` only for the transition that actually closed the session.
    fn close(&self, reason: CloseReason) -> bool {
        if self.reason.set(reason).is_err() {
            return false;
        }
        self.cancel.cancel();
        self.listener.on_closed(&self.owner, self.id, reason);
        true
    }

    /// A session whose parent token was cancelled reports `ServerClosed`
    /// before its stream has recorded the transition.
    fn state(&self) -> SessionState {
        match self.reason.get() {
            Some(reason) => SessionState::Closed(*reason),
            None if self.cancel.is_cancelled() => SessionState::Closed(CloseReason::ServerClosed),
            None => SessionState::Open,
        }
    }
}

/// Producer half of an open client connection.
#[derive(Clone)]
pub struct Session {
    sender: mpsc::Sender<WireEvent>,
    shared: Arc<Shared>,
}

impl Session {
    /// Allocate a new session in the `Open` state.
    pub fn open(
        owner: UserIdentity,
        options: &SessionOptions,
        listener: Arc<dyn SessionListener>,
    ) -> (Self, SessionStream) {
        Self::open_with_parent(owner, options, listener, &CancellationToken::new())
    }

    /// Like [`Session::open`], but cancelling `parent` closes the session
    /// with [`CloseReason::ServerClosed`].
    pub fn open_with_parent(
        owner: UserIdentity,
        options: &SessionOptions,
        listener: Arc<dyn SessionListener>,
        parent: &CancellationToken,
    ) -> (Self, SessionStream) {
        let (sender, receiver) = mpsc::channel(options.channel_capacity.max(1));
        let shared = Arc::new(Shared {
            id: Uuid::new_v4(),
            owner,
            reason: OnceLock::new(),
            cancel: parent.child_token(),
            listener,
        });

        let stream = SessionStream {
            receiver,
            cancelled: Box::pin(shared.cancel.clone().cancelled_owned()),
            idle: options.idle_timeout.map(IdleTimer::new),
            shared: shared.clone(),
            // Keeps the channel open while the transport is alive, so a
            // replaced session is not ended by the registry dropping it.
            _keep_open: sender.clone(),
            draining: false,
            finished: false,
        };

        (Self { sender, shared }, stream)
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    pub fn owner(&self) -> &UserIdentity {
        &self.shared.owner
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Encode `event` and hand it to the transport as one frame.
    ///
    /// Any failure closes the session with [`CloseReason::SendFailed`].
    pub async fn send(&self, event: &Event, timeout: Duration) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::Closed);
        }

        let frame = match event.encode() {
            Ok(frame) => frame,
            Err(e) => {
                self.shared.close(CloseReason::SendFailed);
                return Err(SendError::Encode(e));
            }
        };

        match self.sender.send_timeout(frame, timeout).await {
            Ok(()) => Ok(()),
            // The stream closed the channel after a concurrent close.
            Err(SendTimeoutError::Closed(_)) => {
                self.shared.close(CloseReason::SendFailed);
                Err(SendError::Closed)
            }
            Err(SendTimeoutError::Timeout(_)) => {
                self.shared.close(CloseReason::SendFailed);
                Err(SendError::Stalled(timeout))
            }
        }
    }

    /// Close the session from the server side. Idempotent.
    ///
    /// Frames already accepted are still yielded by the stream before it ends.
    pub fn close(&self) -> bool {
        self.shared.close(CloseReason::ServerClosed)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.shared.id)
            .field("owner", &self.shared.owner)
            .field("state", &self.shared.state())
            .finish()
    }
}

struct IdleTimer {
    timeout: Duration,
    sleep: Pin<Box<Sleep>>,
}

impl IdleTimer {
    fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sleep: Box::pin(tokio::time::sleep(timeout)),
        }
    }

    fn reset(&mut self) {
        self.sleep.as_mut().reset(Instant::now() + self.timeout);
    }
}

/// Transport half of an open client connection.
///
/// Dropping the stream before the session closed counts as the client
/// disconnecting.
pub struct SessionStream {
    receiver: mpsc::Receiver<WireEvent>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    idle: Option<IdleTimer>,
    shared: Arc<Shared>,
    _keep_open: mpsc::Sender<WireEvent>,
    /// Closed; yielding the frames accepted before the close.
    draining: bool,
    finished: bool,
}

impl SessionStream {
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    pub fn owner(&self) -> &UserIdentity {
        &self.shared.owner
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    fn finish(&mut self, reason: Option<CloseReason>) -> Poll<Option<WireEvent>> {
        if let Some(reason) = reason {
            self.shared.close(reason);
        }
        self.finished = true;
        Poll::Ready(None)
    }
}

impl Stream for SessionStream {
    type Item = WireEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        if !this.draining && this.cancelled.as_mut().poll(cx).is_ready() {
            // No-op unless a parent token did the cancelling.
            this.shared.close(CloseReason::ServerClosed);
            this.receiver.close();
            this.draining = true;
        }

        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(frame)) => {
                if let Some(idle) = this.idle.as_mut() {
                    idle.reset();
                }
                return Poll::Ready(Some(frame));
            }
            // `_keep_open` holds a sender, so the channel only ends once
            // drained after `receiver.close()`.
            Poll::Ready(None) => return this.finish(None),
            Poll::Pending => {}
        }

        if this.draining {
            return Poll::Pending;
        }

        if let Some(idle) = this.idle.as_mut()
            && idle.sleep.as_mut().poll(cx).is_ready()
        {
            return this.finish(Some(CloseReason::TimedOut));
        }

        Poll::Pending
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        let reason = if self.shared.cancel.is_cancelled() {
            CloseReason::ServerClosed
        } else {
            CloseReason::Completed
        };
        self.shared.close(reason);
    }
}

impl std::fmt::Debug for SessionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStream")
            .field("id", &self.shared.id)
            .field("owner", &self.shared.owner)
            .field("state", &self.shared.state())
            .finish()
    }
}
