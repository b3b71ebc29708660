//! In-memory storage backends.
//!
//! Both stores are lock-free `DashMap`s with atomic ID sequences. They hold
//! state for the lifetime of the process only.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use workstream_core::{
    Employee, EmployeeId, NotificationId, NotificationRecord, Project, ProjectId, Task, TaskId,
};

use crate::error::NotificationError;
use crate::storage::{DirectoryStorage, NotificationDraft, NotificationStorage};

#[derive(Debug)]
pub struct InMemoryDirectory {
    employees: DashMap<EmployeeId, Employee>,
    projects: DashMap<ProjectId, Project>,
    tasks: DashMap<TaskId, Task>,
    task_sequence: AtomicI64,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            employees: DashMap::new(),
            projects: DashMap::new(),
            tasks: DashMap::new(),
            task_sequence: AtomicI64::new(0),
        }
    }

    /// Creates a directory pre-populated with the given entities.
    pub fn with_seed(
        employees: impl IntoIterator<Item = Employee>,
        projects: impl IntoIterator<Item = Project>,
        tasks: impl IntoIterator<Item = Task>,
    ) -> Self {
        let directory = Self::new();
        for employee in employees {
            directory.insert_employee(employee);
        }
        for project in projects {
            directory.insert_project(project);
        }
        for task in tasks {
            directory.insert_task(task);
        }
        directory
    }

    pub fn insert_employee(&self, employee: Employee) {
        self.employees.insert(employee.id, employee);
    }

    pub fn insert_project(&self, project: Project) {
        self.projects.insert(project.id, project);
    }

    pub fn insert_task(&self, task: Task) {
        self.task_sequence.fetch_max(task.id, Ordering::SeqCst);
        self.tasks.insert(task.id, task);
    }

    fn next_task_id(&self) -> TaskId {
        self.task_sequence.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryStorage for InMemoryDirectory {
    async fn employee(&self, id: EmployeeId) -> Result<Option<Employee>, NotificationError> {
        Ok(self.employees.get(&id).map(|e| e.value().clone()))
    }

    async fn project(&self, id: ProjectId) -> Result<Option<Project>, NotificationError> {
        Ok(self.projects.get(&id).map(|p| p.value().clone()))
    }

    async fn task(&self, id: TaskId) -> Result<Option<Task>, NotificationError> {
        Ok(self.tasks.get(&id).map(|t| t.value().clone()))
    }

    async fn save_task(&self, mut task: Task) -> Result<Task, NotificationError> {
        if task.id == 0 {
            task.id = self.next_task_id();
        } else {
            self.task_sequence.fetch_max(task.id, Ordering::SeqCst);
        }
        self.tasks.insert(task.id, task.clone());
        Ok(task)
    }
}

#[derive(Debug)]
pub struct InMemoryNotificationStore {
    records: DashMap<NotificationId, NotificationRecord>,
    sequence: AtomicI64,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            sequence: AtomicI64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InMemoryNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationStorage for InMemoryNotificationStore {
    async fn save(&self, draft: NotificationDraft) -> Result<NotificationRecord, NotificationError> {
        let record = NotificationRecord {
            id: self.sequence.fetch_add(1, Ordering::SeqCst),
            sender: draft.sender,
            receiver: draft.receiver,
            subject: draft.subject,
            title: draft.title,
            description: draft.description,
            read_status: draft.read_status,
            task_id: draft.task_id,
            created_at: OffsetDateTime::now_utc(),
        };
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<NotificationRecord>, NotificationError> {
        let mut records: Vec<_> = self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}
