use async_trait::async_trait;
use workstream_core::{
    Employee, EmployeeId, NotificationRecord, Project, ProjectId, Task, TaskId,
};

use crate::error::NotificationError;

/// Lookup of the entities a notification refers to.
#[async_trait]
pub trait DirectoryStorage: Send + Sync {
    /// Get an employee by ID
    async fn employee(&self, id: EmployeeId) -> Result<Option<Employee>, NotificationError>;

    /// Get a project by ID
    async fn project(&self, id: ProjectId) -> Result<Option<Project>, NotificationError>;

    /// Get a task by ID
    async fn task(&self, id: TaskId) -> Result<Option<Task>, NotificationError>;

    /// Insert a task (assigning its ID when zero) or replace an existing one
    async fn save_task(&self, task: Task) -> Result<Task, NotificationError>;
}

/// A notification before it has been assigned an ID.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub sender: Employee,
    pub receiver: Employee,
    pub subject: Employee,
    pub title: String,
    pub description: String,
    pub read_status: bool,
    pub task_id: TaskId,
}

/// Persistence of notification records.
#[async_trait]
pub trait NotificationStorage: Send + Sync {
    /// Store a notification and return it with its assigned ID
    async fn save(&self, draft: NotificationDraft) -> Result<NotificationRecord, NotificationError>;

    /// List every stored notification, oldest first
    async fn list(&self) -> Result<Vec<NotificationRecord>, NotificationError>;
}
