use std::sync::Arc;

use tracing::{debug, info, warn};
use workstream_core::{
    Employee, EmployeeId, Event, NotificationRecord, NotificationView, ProjectId,
    SendNotificationRequest, Task, TaskId, TaskInput, UserIdentity,
};

use crate::error::{EntityKind, NotificationError};
use crate::hub::NotificationHub;
use crate::session::SessionStream;
use crate::storage::{DirectoryStorage, NotificationDraft, NotificationStorage};

/// Producer-facing notification operations.
///
/// Persists notifications through the storage ports and pushes the matching
/// events through the hub.
pub struct NotificationService {
    directory: Arc<dyn DirectoryStorage>,
    notifications: Arc<dyn NotificationStorage>,
    hub: Arc<NotificationHub>,
}

impl NotificationService {
    pub fn new(
        directory: Arc<dyn DirectoryStorage>,
        notifications: Arc<dyn NotificationStorage>,
        hub: Arc<NotificationHub>,
    ) -> Self {
        Self {
            directory,
            notifications,
            hub,
        }
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    pub fn directory(&self) -> &Arc<dyn DirectoryStorage> {
        &self.directory
    }

    /// Open the event stream for an authenticated identity.
    pub fn connect(&self, identity: UserIdentity) -> SessionStream {
        self.hub.connect(identity)
    }

    /// Stored notifications for `identity`.
    ///
    /// Notifications whose receiver is the caller are left out.
    pub async fn list_for(
        &self,
        identity: &UserIdentity,
    ) -> Result<Vec<NotificationView>, NotificationError> {
        let records = self.notifications.list().await?;
        Ok(records
            .iter()
            .filter(|record| record.receiver.username != identity.as_str())
            .map(NotificationRecord::view)
            .collect())
    }

    /// Store a notification addressed to the manager of `project_id` and push
    /// it to the manager's stream.
    ///
    /// Nothing is stored or delivered unless every referenced entity resolves.
    pub async fn send_to_project_manager(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        request: SendNotificationRequest,
    ) -> Result<NotificationView, NotificationError> {
        let project = self
            .directory
            .project(project_id)
            .await?
            .ok_or_else(|| NotificationError::not_found(EntityKind::Project, project_id))?;
        let task = self
            .directory
            .task(task_id)
            .await?
            .ok_or_else(|| NotificationError::not_found(EntityKind::Task, task_id))?;

        let sender = self.employee(request.sender_id, EntityKind::Sender).await?;
        let receiver = self.employee(project.manager_id, EntityKind::Receiver).await?;
        let subject = self.employee(request.subject_id, EntityKind::Subject).await?;

        let record = self
            .notifications
            .save(NotificationDraft {
                sender,
                receiver,
                subject,
                title: request.title,
                description: request.description,
                read_status: request.read_status,
                task_id: task.id,
            })
            .await?;

        info!(
            notification_id = record.id,
            project_id,
            task_id = task.id,
            receiver = %record.receiver.username,
            "Notification stored"
        );

        self.publish(&record).await;
        Ok(record.view())
    }

    /// Tell the project manager that `task` was created.
    pub async fn announce_task_created(&self, task: &Task) {
        self.announce(task, Event::task_created(&task.summary())).await;
    }

    /// Tell the project manager that `task` was edited.
    pub async fn announce_task_edited(&self, task: &Task) {
        self.announce(task, Event::task_edited(&task.summary())).await;
    }

    /// Create a task in `project_id` and announce it to the project manager.
    pub async fn create_task(
        &self,
        project_id: ProjectId,
        input: TaskInput,
    ) -> Result<Task, NotificationError> {
        if self.directory.project(project_id).await?.is_none() {
            return Err(NotificationError::not_found(EntityKind::Project, project_id));
        }
        let task = self.directory.save_task(input.into_task(0, project_id)).await?;
        info!(task_id = task.id, project_id, "Task created");
        self.announce_task_created(&task).await;
        Ok(task)
    }

    /// Replace the fields of an existing task and announce the edit.
    ///
    /// The task must belong to `project_id`.
    pub async fn update_task(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        input: TaskInput,
    ) -> Result<Task, NotificationError> {
        match self.directory.task(task_id).await? {
            Some(existing) if existing.project_id == project_id => {}
            _ => return Err(NotificationError::not_found(EntityKind::Task, task_id)),
        }
        let task = self.directory.save_task(input.into_task(task_id, project_id)).await?;
        info!(task_id, project_id, "Task edited");
        self.announce_task_edited(&task).await;
        Ok(task)
    }

    async fn publish(&self, record: &NotificationRecord) {
        match Event::notification(record) {
            Ok(event) => self.hub.deliver(&record.receiver.identity(), event).await,
            Err(e) => warn!(
                notification_id = record.id,
                error = %e,
                "Failed to encode notification event"
            ),
        }
    }

    async fn announce(&self, task: &Task, event: Result<Event, serde_json::Error>) {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!(task_id = task.id, error = %e, "Failed to encode task event");
                return;
            }
        };
        let manager = match self.project_manager(task.project_id).await {
            Ok(Some(manager)) => manager,
            Ok(None) => {
                debug!(
                    task_id = task.id,
                    project_id = task.project_id,
                    event = %event.name,
                    "No manager to notify"
                );
                return;
            }
            Err(e) => {
                warn!(task_id = task.id, error = %e, "Failed to resolve project manager");
                return;
            }
        };

        self.hub.deliver(&manager.identity(), event).await;
    }

    async fn project_manager(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<Employee>, NotificationError> {
        match self.directory.project(project_id).await? {
            Some(project) => self.directory.employee(project.manager_id).await,
            None => Ok(None),
        }
    }

    async fn employee(
        &self,
        id: EmployeeId,
        kind: EntityKind,
    ) -> Result<Employee, NotificationError> {
        self.directory
            .employee(id)
            .await?
            .ok_or_else(|| NotificationError::not_found(kind, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryDirectory, InMemoryNotificationStore};
    use futures_util::{FutureExt, StreamExt};
    use workstream_core::{EventName, Project, TaskStatus};

    struct Fixture {
        service: NotificationService,
        store: Arc<InMemoryNotificationStore>,
    }

    fn employee(id: EmployeeId, username: &str) -> Employee {
        Employee {
            id,
            username: username.into(),
            name: username.to_uppercase(),
        }
    }

    fn task(id: TaskId, project_id: ProjectId) -> Task {
        Task {
            id,
            project_id,
            title: format!("task {id}"),
            description: String::new(),
            status: TaskStatus::Todo,
            assignee_id: Some(2),
        }
    }

    fn fixture() -> Fixture {
        let directory = InMemoryDirectory::with_seed(
            [employee(1, "alice"), employee(2, "bob"), employee(3, "carol")],
            [Project {
                id: 10,
                name: "Apollo".into(),
                manager_id: 1,
            }],
            [task(100, 10)],
        );
        let store = Arc::new(InMemoryNotificationStore::new());
        let service = NotificationService::new(
            Arc::new(directory),
            store.clone(),
            Arc::new(NotificationHub::default()),
        );
        Fixture { service, store }
    }

    fn request(sender_id: EmployeeId) -> SendNotificationRequest {
        SendNotificationRequest {
            sender_id,
            subject_id: 3,
            receiver_id: None,
            title: "Timesheet".into(),
            description: "Please approve".into(),
            read_status: false,
        }
    }

    #[tokio::test]
    async fn test_send_delivers_to_project_manager() {
        let f = fixture();
        let mut stream = f.service.connect(UserIdentity::from("alice"));

        let view = f
            .service
            .send_to_project_manager(10, 100, request(2))
            .await
            .unwrap();
        assert_eq!(view.receiver_id, 1);
        assert_eq!(view.sender_id, 2);
        assert_eq!(view.task_id, 100);

        let frame = stream.next().await.unwrap();
        assert_eq!(frame.name, EventName::Notification);
        let payload: serde_json::Value = serde_json::from_str(&frame.data).unwrap();
        assert_eq!(payload["id"], view.id);
        assert_eq!(payload["receiver"]["username"], "alice");
        assert_eq!(payload["title"], "Timesheet");
        assert!(stream.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_unknown_sender_stores_and_delivers_nothing() {
        let f = fixture();
        let mut stream = f.service.connect(UserIdentity::from("alice"));

        let err = f
            .service
            .send_to_project_manager(10, 100, request(99))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            NotificationError::NotFound { kind: EntityKind::Sender, id: 99 }
        ));
        assert!(f.store.is_empty());
        assert!(stream.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_unknown_project_or_task_is_not_found() {
        let f = fixture();

        let err = f.service.send_to_project_manager(11, 100, request(2)).await.unwrap_err();
        assert!(matches!(err, NotificationError::NotFound { kind: EntityKind::Project, .. }));

        let err = f.service.send_to_project_manager(10, 101, request(2)).await.unwrap_err();
        assert!(matches!(err, NotificationError::NotFound { kind: EntityKind::Task, .. }));

        let mut bad_subject = request(2);
        bad_subject.subject_id = 42;
        let err = f.service.send_to_project_manager(10, 100, bad_subject).await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot find subject: 42");
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_send_without_stream_still_stores() {
        let f = fixture();
        f.service.send_to_project_manager(10, 100, request(2)).await.unwrap();
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn test_list_excludes_notifications_received_by_caller() {
        let f = fixture();
        f.service.send_to_project_manager(10, 100, request(2)).await.unwrap();

        let for_alice = f.service.list_for(&UserIdentity::from("alice")).await.unwrap();
        assert!(for_alice.is_empty());

        let for_bob = f.service.list_for(&UserIdentity::from("bob")).await.unwrap();
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0].receiver_id, 1);
    }

    #[tokio::test]
    async fn test_task_events_reach_manager() {
        let f = fixture();
        let mut stream = f.service.connect(UserIdentity::from("alice"));
        let created = task(100, 10);

        f.service.announce_task_created(&created).await;
        let mut edited = created.clone();
        edited.status = TaskStatus::Done;
        f.service.announce_task_edited(&edited).await;

        let first = stream.next().await.unwrap();
        assert_eq!(first.name, EventName::TaskCreated);
        let second = stream.next().await.unwrap();
        assert_eq!(second.name, EventName::TaskEdited);
        let payload: serde_json::Value = serde_json::from_str(&second.data).unwrap();
        assert_eq!(payload["status"], "DONE");
    }

    fn input(title: &str) -> TaskInput {
        TaskInput {
            title: title.into(),
            description: String::new(),
            status: TaskStatus::InProgress,
            assignee_id: Some(3),
        }
    }

    #[tokio::test]
    async fn test_create_and_update_task_announce_to_manager() {
        let f = fixture();
        let mut stream = f.service.connect(UserIdentity::from("alice"));

        let created = f.service.create_task(10, input("Draft plan")).await.unwrap();
        assert_eq!(created.id, 101);
        assert_eq!(created.project_id, 10);

        let updated = f
            .service
            .update_task(10, created.id, input("Final plan"))
            .await
            .unwrap();
        assert_eq!(updated.title, "Final plan");

        let first = stream.next().await.unwrap();
        assert_eq!(first.name, EventName::TaskCreated);
        let second = stream.next().await.unwrap();
        assert_eq!(second.name, EventName::TaskEdited);
        let payload: serde_json::Value = serde_json::from_str(&second.data).unwrap();
        assert_eq!(payload["title"], "Final plan");
        assert_eq!(payload["status"], "IN_PROGRESS");
    }

    #[tokio::test]
    async fn test_task_writes_reject_unknown_targets() {
        let f = fixture();

        let err = f.service.create_task(11, input("x")).await.unwrap_err();
        assert!(matches!(err, NotificationError::NotFound { kind: EntityKind::Project, id: 11 }));

        let err = f.service.update_task(10, 555, input("x")).await.unwrap_err();
        assert!(matches!(err, NotificationError::NotFound { kind: EntityKind::Task, id: 555 }));

        // Task 100 exists but lives in project 10.
        let err = f.service.update_task(12, 100, input("x")).await.unwrap_err();
        assert!(matches!(err, NotificationError::NotFound { kind: EntityKind::Task, id: 100 }));
    }

    #[tokio::test]
    async fn test_task_in_unknown_project_is_skipped() {
        let f = fixture();
        let mut stream = f.service.connect(UserIdentity::from("alice"));

        f.service.announce_task_created(&task(5, 77)).await;

        assert!(stream.next().now_or_never().is_none());
    }
}
