use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::{net::SocketAddr, time::Duration};
use thiserror::Error;
use workstream_core::{Employee, EmployeeId, Project, ProjectId, Task, TaskId, TaskStatus};
use workstream_notifications::{HubConfig, SessionOptions};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Stream session and delivery settings
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Bearer tokens accepted by the API
    #[serde(default)]
    pub auth: AuthConfig,
    /// Seed data for the in-memory directory
    #[serde(default)]
    pub directory: DirectorySeed,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Notification validations
        if self.notifications.channel_capacity == 0 {
            return Err("notifications.channel_capacity must be > 0".into());
        }
        if self.notifications.send_timeout_ms == 0 {
            return Err("notifications.send_timeout_ms must be > 0".into());
        }
        if self.notifications.keep_alive_secs == 0 {
            return Err("notifications.keep_alive_secs must be > 0".into());
        }
        // Auth validation
        if let Some((token, _)) = self.auth.tokens.iter().find(|(_, who)| who.is_empty()) {
            return Err(format!("auth.tokens.{token} must map to a non-empty username"));
        }
        self.directory.validate()
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn hub_config(&self) -> HubConfig {
        let n = &self.notifications;
        HubConfig {
            session: SessionOptions::default()
                .with_idle_timeout(Duration::from_secs(n.session_idle_timeout_secs))
                .with_channel_capacity(n.channel_capacity),
            send_timeout: Duration::from_millis(n.send_timeout_ms),
        }
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.notifications.keep_alive_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Seconds without a frame before a stream is closed. 0 keeps streams open indefinitely.
    #[serde(default)]
    pub session_idle_timeout_secs: u64,
    /// Upper bound on waiting for a slow client before the stream is dropped
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Frames buffered per stream
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Interval between SSE keep-alive comments
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_send_timeout_ms() -> u64 {
    5_000
}
fn default_channel_capacity() -> usize {
    workstream_notifications::session::DEFAULT_CHANNEL_CAPACITY
}
fn default_keep_alive_secs() -> u64 {
    15
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            session_idle_timeout_secs: 0,
            send_timeout_ms: default_send_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Token → username
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DirectorySeed {
    #[serde(default)]
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub projects: Vec<ProjectSeed>,
    #[serde(default)]
    pub tasks: Vec<TaskSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSeed {
    pub id: ProjectId,
    pub name: String,
    pub manager_id: EmployeeId,
}

impl From<ProjectSeed> for Project {
    fn from(seed: ProjectSeed) -> Self {
        Project {
            id: seed.id,
            name: seed.name,
            manager_id: seed.manager_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSeed {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub assignee_id: Option<EmployeeId>,
}

impl From<TaskSeed> for Task {
    fn from(seed: TaskSeed) -> Self {
        Task {
            id: seed.id,
            project_id: seed.project_id,
            title: seed.title,
            description: seed.description,
            status: seed.status,
            assignee_id: seed.assignee_id,
        }
    }
}

impl DirectorySeed {
    fn validate(&self) -> Result<(), String> {
        let mut employee_ids = HashSet::new();
        let mut usernames = HashSet::new();
        for e in &self.employees {
            if !employee_ids.insert(e.id) {
                return Err(format!("directory.employees: duplicate id {}", e.id));
            }
            if e.username.is_empty() || !usernames.insert(e.username.as_str()) {
                return Err(format!(
                    "directory.employees: username of employee {} must be unique and non-empty",
                    e.id
                ));
            }
        }

        let mut project_ids = HashSet::new();
        for p in &self.projects {
            if !project_ids.insert(p.id) {
                return Err(format!("directory.projects: duplicate id {}", p.id));
            }
            if !employee_ids.contains(&p.manager_id) {
                return Err(format!(
                    "directory.projects: project {} references unknown manager {}",
                    p.id, p.manager_id
                ));
            }
        }

        let mut task_ids = HashSet::new();
        for t in &self.tasks {
            if t.id <= 0 || !task_ids.insert(t.id) {
                return Err(format!("directory.tasks: id {} must be positive and unique", t.id));
            }
            if !project_ids.contains(&t.project_id) {
                return Err(format!(
                    "directory.tasks: task {} references unknown project {}",
                    t.id, t.project_id
                ));
            }
            if let Some(assignee) = t.assignee_id
                && !employee_ids.contains(&assignee)
            {
                return Err(format!(
                    "directory.tasks: task {} references unknown assignee {}",
                    t.id, assignee
                ));
            }
        }
        Ok(())
    }
}

pub mod loader {
    use super::{AppConfig, ConfigError};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "workstream.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., WORKSTREAM__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("WORKSTREAM")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let merged: AppConfig = builder.build()?.try_deserialize()?;
        merged.validate().map_err(ConfigError::Invalid)?;
        Ok(merged)
    }
}
