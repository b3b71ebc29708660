pub mod directory;
pub mod events;
pub mod identity;
pub mod notification;

pub use directory::{
    Employee, EmployeeId, Project, ProjectId, Task, TaskId, TaskInput, TaskStatus, TaskSummary,
};
pub use events::{Event, EventName, WireEvent};
pub use identity::UserIdentity;
pub use notification::{NotificationId, NotificationRecord, NotificationView, SendNotificationRequest};
