use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::directory::{Employee, EmployeeId, TaskId};

pub type NotificationId = i64;

/// A stored notification with its participants resolved.
///
/// This is the payload of the `notification` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub sender: Employee,
    pub receiver: Employee,
    /// Employee the notification is about
    pub subject: Employee,
    pub title: String,
    pub description: String,
    pub read_status: bool,
    #[serde(rename = "task")]
    pub task_id: TaskId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl NotificationRecord {
    pub fn view(&self) -> NotificationView {
        NotificationView {
            id: self.id,
            sender_id: self.sender.id,
            receiver_id: self.receiver.id,
            subject_id: self.subject.id,
            title: self.title.clone(),
            description: self.description.clone(),
            read_status: self.read_status,
            task_id: self.task_id,
        }
    }
}

/// Flat representation returned by the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: NotificationId,
    pub sender_id: EmployeeId,
    pub receiver_id: EmployeeId,
    pub subject_id: EmployeeId,
    pub title: String,
    pub description: String,
    pub read_status: bool,
    pub task_id: TaskId,
}

/// Body of `POST /api/v1/notifications/send/projects/{project-id}/tasks/{task-id}`.
///
/// The receiver is always the project's manager; a `receiverId` sent by the
/// client is accepted and ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationRequest {
    pub sender_id: EmployeeId,
    pub subject_id: EmployeeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<EmployeeId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub read_status: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_minimal_body() {
        let req: SendNotificationRequest = serde_json::from_value(serde_json::json!({
            "senderId": 1,
            "subjectId": 3,
            "title": "Review needed"
        }))
        .unwrap();
        assert_eq!(req.sender_id, 1);
        assert_eq!(req.subject_id, 3);
        assert!(req.receiver_id.is_none());
        assert!(!req.read_status);
        assert!(req.description.is_empty());
    }

    #[test]
    fn test_record_view_flattens_participants() {
        let employee = |id: i64, username: &str| Employee {
            id,
            username: username.into(),
            name: String::new(),
        };
        let record = NotificationRecord {
            id: 11,
            sender: employee(1, "bob"),
            receiver: employee(2, "alice"),
            subject: employee(3, "carol"),
            title: "Leave request".into(),
            description: "Friday off".into(),
            read_status: false,
            task_id: 5,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["receiver"]["username"], "alice");
        assert_eq!(json["task"], 5);

        let view = record.view();
        assert_eq!(view.sender_id, 1);
        assert_eq!(view.receiver_id, 2);
        assert_eq!(view.subject_id, 3);
        assert_eq!(view.task_id, 5);
    }
}
