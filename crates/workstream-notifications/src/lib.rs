//! Best-effort push of events to connected clients.
//!
//! # Architecture
//!
//! ```text
//!  producers                    hub                       transport
//! ┌──────────────┐  deliver  ┌──────────────┐  frames  ┌───────────────┐
//! │ Notification │──────────►│ Notification │─────────►│ SessionStream │──► client
//! │   Service    │           │     Hub      │          └───────────────┘
//! └──────────────┘           └──────┬───────┘                  │
//!                                   │ lookup                   │ closed (once)
//!                            ┌──────▼───────┐                  │
//!                            │  Connection  │◄─────────────────┘
//!                            │   Registry   │   deregister_session
//!                            └──────────────┘
//! ```
//!
//! # Module Structure
//!
//! - [`session`]: one open client connection, split into producer and transport halves
//! - [`registry`]: identity → session map
//! - [`hub`]: connect / deliver / close
//! - [`service`]: notification and task producers on top of the storage ports
//! - [`storage`] / [`memory`]: storage ports and their in-memory backends

pub mod error;
pub mod hub;
pub mod memory;
pub mod registry;
pub mod service;
pub mod session;
pub mod storage;

pub use error::{EntityKind, NotificationError};
pub use hub::{HubConfig, NotificationHub};
pub use memory::{InMemoryDirectory, InMemoryNotificationStore};
pub use registry::ConnectionRegistry;
pub use service::NotificationService;
pub use session::{
    CloseReason, SendError, Session, SessionId, SessionListener, SessionOptions, SessionState,
    SessionStream,
};
pub use storage::{DirectoryStorage, NotificationDraft, NotificationStorage};
