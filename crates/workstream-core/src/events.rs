//! Events pushed to connected clients.
//!
//! An [`Event`] is what producers hand to the hub. Sessions encode it into a
//! [`WireEvent`] (name plus JSON text) before it touches the transport, so a
//! frame is either fully formed or never written.

use serde::{Deserialize, Serialize};

use crate::directory::TaskSummary;
use crate::notification::NotificationRecord;

/// Name carried in the `event:` field of every pushed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventName {
    /// A notification record was stored for the recipient
    Notification,
    /// A task was created in a project the recipient manages
    TaskCreated,
    /// A task was edited in a project the recipient manages
    TaskEdited,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Notification => "notification",
            EventName::TaskCreated => "taskCreated",
            EventName::TaskEdited => "taskEdited",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named payload destined for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: EventName,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(name: EventName, payload: serde_json::Value) -> Self {
        Self { name, payload }
    }

    /// Build an event from any serializable payload.
    pub fn from_payload<T: Serialize>(name: EventName, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(name, serde_json::to_value(payload)?))
    }

    pub fn notification(record: &NotificationRecord) -> Result<Self, serde_json::Error> {
        Self::from_payload(EventName::Notification, record)
    }

    pub fn task_created(task: &TaskSummary) -> Result<Self, serde_json::Error> {
        Self::from_payload(EventName::TaskCreated, task)
    }

    pub fn task_edited(task: &TaskSummary) -> Result<Self, serde_json::Error> {
        Self::from_payload(EventName::TaskEdited, task)
    }

    /// Encode the payload into a single wire frame.
    pub fn encode(&self) -> Result<WireEvent, serde_json::Error> {
        Ok(WireEvent {
            name: self.name,
            data: serde_json::to_string(&self.payload)?,
        })
    }
}

/// One complete, already-serialized message for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireEvent {
    pub name: EventName,
    /// JSON-encoded payload
    pub data: String,
}
